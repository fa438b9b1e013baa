//! Claims embedded in signed tokens.

// self
use crate::{
	_prelude::*,
	auth::{Perm, UserName},
};

/// Claims body of a token: owning identity, permission scope, and a free-form payload.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JwtPayload {
	/// Owning identity.
	pub name: UserName,
	/// Permission scope.
	pub perm: Perm,
	/// Free-form payload, carried verbatim.
	#[serde(rename = "ext", default)]
	pub extra: String,
}
impl JwtPayload {
	/// Creates a payload.
	pub fn new(name: UserName, perm: Perm, extra: impl Into<String>) -> Self {
		Self { name, perm, extra: extra.into() }
	}
}
