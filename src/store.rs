//! Storage contract and built-in backends for tokens, users, miners, and rate limits.
//!
//! Every backend enforces its own uniqueness constraints with native machinery (SQL
//! constraints, serialized write batches, or a process lock for the in-memory double);
//! the service layer above never locks. Each mutating call is atomic on its own, but no
//! guarantee spans two calls.

#[cfg(test)] pub(crate) mod conformance;
#[cfg(feature = "fjall")] pub mod embedded;
pub mod memory;
#[cfg(feature = "sqlite")] pub mod sqlite;

#[cfg(feature = "fjall")] pub use embedded::FjallStore;
pub use memory::MemoryStore;
#[cfg(feature = "sqlite")] pub use sqlite::SqliteStore;

// self
use crate::{
	_prelude::*,
	auth::{
		KeyPair, Lifecycle, Miner, MinerAddr, Page, RateLimitId, User, UserFilter, UserName,
		UserPatch, UserRateLimit,
	},
};

/// Boxed future returned by every [`AuthStore`] operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Schema version reached by [`AuthStore::migrate_to_v1`].
pub const SCHEMA_V1: u64 = 1;

/// Persistence contract implemented by every backend.
///
/// Keyed getters return rows in any [`Lifecycle`] so audit paths can see revoked records;
/// list operations only return active rows. Lists are ordered by creation time with the
/// primary key as tiebreaker.
pub trait AuthStore
where
	Self: Send + Sync,
{
	/// Inserts a token record; fails with [`StoreError::Conflict`] if the token exists.
	fn put_token(&self, pair: KeyPair) -> StoreFuture<'_, ()>;

	/// Fetches a token record regardless of lifecycle.
	fn get_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<KeyPair>>;

	/// Lists active tokens owned by `name`.
	fn tokens_by_name<'a>(&'a self, name: &'a UserName) -> StoreFuture<'a, Vec<KeyPair>>;

	/// Lists active tokens in creation order.
	fn list_tokens(&self, page: Page) -> StoreFuture<'_, Vec<KeyPair>>;

	/// Moves a token to `lifecycle`; returns `false` if the token does not exist.
	fn set_token_lifecycle<'a>(
		&'a self,
		token: &'a str,
		lifecycle: Lifecycle,
	) -> StoreFuture<'a, bool>;

	/// Inserts a user; fails with [`StoreError::Conflict`] if the name is taken by any row,
	/// including a soft-deleted one.
	fn put_user(&self, user: User) -> StoreFuture<'_, ()>;

	/// Fetches a user regardless of lifecycle.
	fn get_user<'a>(&'a self, name: &'a UserName) -> StoreFuture<'a, Option<User>>;

	/// Applies `patch` to an active user; returns `false` if no active user matches.
	fn update_user<'a>(
		&'a self,
		patch: &'a UserPatch,
		now: OffsetDateTime,
	) -> StoreFuture<'a, bool>;

	/// Lists active users matching `filter` in creation order.
	fn list_users<'a>(&'a self, filter: &'a UserFilter, page: Page) -> StoreFuture<'a, Vec<User>>;

	/// Moves a user to `lifecycle`; returns `false` if the user does not exist.
	fn set_user_lifecycle<'a>(
		&'a self,
		name: &'a UserName,
		lifecycle: Lifecycle,
		now: OffsetDateTime,
	) -> StoreFuture<'a, bool>;

	/// Assigns `miner` to `user`, overwriting any previous owner.
	///
	/// Returns `true` when the mapping was created and `false` when an existing mapping
	/// was overwritten (even with the same owner).
	fn upsert_miner<'a>(
		&'a self,
		miner: &'a MinerAddr,
		user: &'a UserName,
		now: OffsetDateTime,
	) -> StoreFuture<'a, bool>;

	/// Removes a mapping; returns whether it existed.
	fn delete_miner<'a>(&'a self, miner: &'a MinerAddr) -> StoreFuture<'a, bool>;

	/// Fetches a mapping.
	fn get_miner<'a>(&'a self, miner: &'a MinerAddr) -> StoreFuture<'a, Option<Miner>>;

	/// Lists the miners owned by `user`, ordered by address.
	fn list_miners<'a>(&'a self, user: &'a UserName) -> StoreFuture<'a, Vec<Miner>>;

	/// Inserts `limit` or, when a record with the same (user, scope) exists, replaces its
	/// quota in place. Returns the id of the authoritative record.
	fn upsert_rate_limit(&self, limit: UserRateLimit) -> StoreFuture<'_, RateLimitId>;

	/// Lists the records owned by `name`, optionally narrowed to one id.
	fn rate_limits<'a>(
		&'a self,
		name: &'a UserName,
		id: Option<&'a RateLimitId>,
	) -> StoreFuture<'a, Vec<UserRateLimit>>;

	/// Physically removes a record; returns whether it existed.
	fn delete_rate_limit<'a>(&'a self, id: &'a RateLimitId) -> StoreFuture<'a, bool>;

	/// Current schema version.
	fn version(&self) -> StoreFuture<'_, u64>;

	/// Upgrades the schema to [`SCHEMA_V1`]; a no-op at or above that version.
	///
	/// Version 0 kept a miner address on each user row. The upgrade moves those addresses
	/// into the miner mapping and bumps the version, all or nothing.
	fn migrate_to_v1(&self) -> StoreFuture<'_, ()>;
}

/// Kinds of records managed by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Entity {
	/// Token record.
	Token,
	/// User record.
	User,
	/// Miner mapping.
	Miner,
	/// Rate-limit record.
	RateLimit,
}
impl Entity {
	/// Returns a stable label suitable for messages and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Entity::Token => "token",
			Entity::User => "user",
			Entity::Miner => "miner",
			Entity::RateLimit => "rate_limit",
		}
	}
}
impl Display for Entity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(match self {
			Entity::Token => "Token",
			Entity::User => "User",
			Entity::Miner => "Miner",
			Entity::RateLimit => "Rate limit",
		})
	}
}

/// Error type produced by [`AuthStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// A uniqueness constraint rejected the write.
	#[error("{entity} `{key}` already exists.")]
	Conflict {
		/// Kind of the conflicting record.
		entity: Entity,
		/// Conflicting key.
		key: String,
	},
	/// Schema migration could not complete.
	#[error("Migration failure: {message}.")]
	Migration {
		/// Human-readable error payload.
		message: String,
	},
}
impl StoreError {
	/// Wraps an engine failure.
	pub fn backend(e: impl Display) -> Self {
		Self::Backend { message: e.to_string() }
	}

	/// Wraps an encode/decode failure.
	pub fn serialization(e: impl Display) -> Self {
		Self::Serialization { message: e.to_string() }
	}

	/// Builds a uniqueness conflict.
	pub fn conflict(entity: Entity, key: impl Display) -> Self {
		Self::Conflict { entity, key: key.to_string() }
	}
}

/// Ordering key shared by every backend for token lists.
pub(crate) fn token_order(a: &KeyPair, b: &KeyPair) -> std::cmp::Ordering {
	a.create_time.cmp(&b.create_time).then_with(|| a.token.cmp(&b.token))
}

/// Ordering key shared by every backend for user lists.
pub(crate) fn user_order(a: &User, b: &User) -> std::cmp::Ordering {
	a.create_time.cmp(&b.create_time).then_with(|| a.name.cmp(&b.name))
}
