//! Permission scopes carried by tokens.

// self
use crate::{_prelude::*, error::ValidationError};

/// Permission scope label constraining what a token bearer may do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Perm {
	/// Read-only access.
	Read,
	/// Read + write access.
	Write,
	/// Write access plus message signing.
	Sign,
	/// Full administrative access.
	Admin,
}
impl Perm {
	/// Every supported scope, lowest privilege first.
	pub const ALL: [Perm; 4] = [Perm::Read, Perm::Write, Perm::Sign, Perm::Admin];

	/// Returns the stable wire label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Perm::Read => "read",
			Perm::Write => "write",
			Perm::Sign => "sign",
			Perm::Admin => "admin",
		}
	}
}
impl Display for Perm {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Perm {
	type Err = ValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|perm| perm.as_str() == s)
			.ok_or_else(|| ValidationError::UnknownPerm { label: s.to_owned() })
	}
}
