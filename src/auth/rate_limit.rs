//! Per-user rate-limit configuration records.
//!
//! These records only describe budgets; enforcement against live traffic belongs to the
//! middleware that consults them.

// self
use crate::{
	_prelude::*,
	auth::{RateLimitId, UserName},
	error::ValidationError,
};

/// Request budget: at most `cap` requests per `window`.
///
/// The window is a positive whole number of seconds; every constructor, including
/// deserialization, goes through [`RequestQuota::new`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQuota", into = "RawQuota")]
pub struct RequestQuota {
	cap: u64,
	window: Duration,
}
impl RequestQuota {
	/// Creates a quota; the window must be at least one second with no fractional part.
	pub fn new(cap: u64, window: Duration) -> Result<Self, ValidationError> {
		if window < Duration::SECOND || window.subsec_nanoseconds() != 0 {
			return Err(ValidationError::InvalidWindow);
		}

		Ok(Self { cap, window })
	}

	/// Maximum number of requests in one window.
	pub fn cap(&self) -> u64 {
		self.cap
	}

	/// Window length.
	pub fn window(&self) -> Duration {
		self.window
	}
}
impl TryFrom<RawQuota> for RequestQuota {
	type Error = ValidationError;

	fn try_from(raw: RawQuota) -> Result<Self, Self::Error> {
		Self::new(raw.cap, raw.window)
	}
}

#[derive(Serialize, Deserialize)]
struct RawQuota {
	cap: u64,
	#[serde(with = "window_seconds")]
	window: Duration,
}
impl From<RequestQuota> for RawQuota {
	fn from(quota: RequestQuota) -> Self {
		Self { cap: quota.cap, window: quota.window }
	}
}

/// Rate-limit record scoped to a user and, optionally, a single API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRateLimit {
	/// Generated identifier; preserved across upserts of the same scope.
	pub id: RateLimitId,
	/// Owning user.
	pub name: UserName,
	/// API the record applies to; `None` applies to every API.
	#[serde(default)]
	pub api: Option<String>,
	/// Budget parameters.
	pub quota: RequestQuota,
}
impl UserRateLimit {
	/// Creates a record with a freshly generated id.
	pub fn new(name: UserName, api: Option<String>, quota: RequestQuota) -> Self {
		let api = api.filter(|api| !api.is_empty());

		Self { id: RateLimitId::generate(), name, api, quota }
	}

	/// Storage key for the scope qualifier; the global scope is the empty string.
	pub fn scope_key(&self) -> &str {
		self.api.as_deref().unwrap_or_default()
	}

	/// Returns `true` when both records target the same (user, scope) pair.
	pub fn same_scope(&self, other: &UserRateLimit) -> bool {
		self.name == other.name && self.scope_key() == other.scope_key()
	}
}

mod window_seconds {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(window: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(window.whole_seconds())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		Ok(Duration::seconds(i64::deserialize(deserializer)?))
	}
}
