//! Strongly typed identifiers enforced across the identity domain.

// std
use std::{borrow::Borrow, ops::Deref};
// crates.io
use uuid::Uuid;
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal, $validate:ident) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				$validate($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				$validate($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (user, miner, rate limit).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (user, miner, rate limit).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (user, miner, rate limit).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
	/// The identifier does not have the shape of a miner address.
	#[error("{kind} identifier is not a valid address: {reason}.")]
	InvalidAddress {
		/// Kind of identifier.
		kind: &'static str,
		/// Which part of the address is malformed.
		reason: &'static str,
	},
}

def_id! { UserName, "Unique, human-facing name of a user.", "User", validate_view }
def_id! { UserId, "Generated identifier of a user record.", "UserId", validate_view }
def_id! { MinerAddr, "Address of a miner (`f0123`, `t3abc...`).", "Miner", validate_address }
def_id! { RateLimitId, "Generated identifier of a rate-limit record.", "RateLimit", validate_view }

impl UserId {
	/// Generates a fresh random identifier.
	pub fn generate() -> Self {
		Self(Uuid::new_v4().to_string())
	}
}
impl RateLimitId {
	/// Generates a fresh random identifier.
	pub fn generate() -> Self {
		Self(Uuid::new_v4().to_string())
	}
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

// Network prefix, protocol digit, then the protocol payload.
fn validate_address(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	validate_view(kind, view)?;

	let mut chars = view.chars();

	if !matches!(chars.next(), Some('f' | 't')) {
		return Err(IdentifierError::InvalidAddress { kind, reason: "unknown network prefix" });
	}
	if !matches!(chars.next(), Some('0'..='4')) {
		return Err(IdentifierError::InvalidAddress { kind, reason: "unknown protocol" });
	}

	let payload = chars.as_str();

	if payload.is_empty() {
		return Err(IdentifierError::InvalidAddress { kind, reason: "missing payload" });
	}
	if !payload.chars().all(|c| c.is_ascii_alphanumeric()) {
		return Err(IdentifierError::InvalidAddress { kind, reason: "payload is not alphanumeric" });
	}

	Ok(())
}
