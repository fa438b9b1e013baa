//! Persisted token records and their public projection.

// self
use crate::{
	_prelude::*,
	auth::{JwtPayload, Lifecycle, Perm, TokenSecret, UserName},
};

/// Persisted record backing one issued token.
///
/// Records are never purged by normal operation; revocation flips [`KeyPair::lifecycle`]
/// so the row stays available for audit and restore.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
	/// Signed token string; globally unique lookup key.
	pub token: String,
	/// Owning identity.
	pub name: UserName,
	/// Permission scope.
	pub perm: Perm,
	/// Per-token auxiliary secret material.
	pub secret: TokenSecret,
	/// Free-form payload.
	pub extra: String,
	/// Issue instant.
	#[serde(with = "time::serde::rfc3339")]
	pub create_time: OffsetDateTime,
	/// Soft-delete state.
	pub lifecycle: Lifecycle,
}
impl KeyPair {
	/// Builds an active record for a freshly signed token.
	pub fn issue(token: String, payload: &JwtPayload, now: OffsetDateTime) -> Self {
		Self {
			token,
			name: payload.name.clone(),
			perm: payload.perm,
			secret: TokenSecret::random(),
			extra: payload.extra.clone(),
			create_time: now,
			lifecycle: Lifecycle::Active,
		}
	}

	/// Returns `true` if the record is live.
	pub fn is_active(&self) -> bool {
		self.lifecycle.is_active()
	}
}
impl Debug for KeyPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("KeyPair")
			.field("token", &"<redacted>")
			.field("name", &self.name)
			.field("perm", &self.perm)
			.field("secret", &self.secret)
			.field("extra", &self.extra)
			.field("create_time", &self.create_time)
			.field("lifecycle", &self.lifecycle)
			.finish()
	}
}

/// Public projection of a [`KeyPair`] returned by read APIs; never carries the secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
	/// Signed token string.
	pub token: String,
	/// Owning identity.
	pub name: UserName,
	/// Permission scope.
	pub perm: Perm,
	/// Free-form payload.
	pub extra: String,
	/// Issue instant.
	#[serde(with = "time::serde::rfc3339")]
	pub create_time: OffsetDateTime,
	/// `true` when the token has been revoked.
	pub is_deleted: bool,
}
impl From<KeyPair> for TokenInfo {
	fn from(pair: KeyPair) -> Self {
		Self {
			token: pair.token,
			name: pair.name,
			perm: pair.perm,
			extra: pair.extra,
			create_time: pair.create_time,
			is_deleted: pair.lifecycle.is_deleted(),
		}
	}
}
