//! Thread-safe in-memory [`AuthStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{
		KeyPair, Lifecycle, Miner, MinerAddr, Page, RateLimitId, User, UserFilter, UserName,
		UserPatch, UserRateLimit,
	},
	store::{self, AuthStore, Entity, SCHEMA_V1, StoreError, StoreFuture},
};

type StoreMap = Arc<RwLock<Tables>>;

#[derive(Debug, Default)]
struct Tables {
	tokens: HashMap<String, KeyPair>,
	users: HashMap<UserName, User>,
	// Version-0 layout: one miner address recorded on the user row. Ordered by user name so
	// migration resolves shared addresses the same way on every backend.
	legacy_miners: BTreeMap<UserName, MinerAddr>,
	miners: BTreeMap<MinerAddr, Miner>,
	rate_limits: HashMap<RateLimitId, UserRateLimit>,
	version: u64,
}

/// Thread-safe storage backend that keeps records in-process for tests and demos.
///
/// A single write lock covers every table, so each call is trivially atomic.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Records a miner address in the version-0 layout (on the user row) so
	/// [`AuthStore::migrate_to_v1`] has something to move.
	pub fn seed_legacy_miner(&self, user: &UserName, miner: MinerAddr) {
		self.0.write().legacy_miners.insert(user.clone(), miner);
	}

	fn put_token_now(map: StoreMap, pair: KeyPair) -> Result<(), StoreError> {
		let mut guard = map.write();

		if guard.tokens.contains_key(&pair.token) {
			return Err(StoreError::conflict(Entity::Token, "<token>"));
		}

		guard.tokens.insert(pair.token.clone(), pair);

		Ok(())
	}

	fn list_tokens_now(map: StoreMap, page: Page) -> Vec<KeyPair> {
		let guard = map.read();
		let mut active: Vec<_> = guard.tokens.values().filter(|p| p.is_active()).collect();

		active.sort_by(|a, b| store::token_order(a, b));

		page.apply(active.into_iter().cloned())
	}

	fn put_user_now(map: StoreMap, user: User) -> Result<(), StoreError> {
		let mut guard = map.write();

		if guard.users.contains_key(&user.name) {
			return Err(StoreError::conflict(Entity::User, &user.name));
		}

		guard.users.insert(user.name.clone(), user);

		Ok(())
	}

	fn list_users_now(map: StoreMap, filter: &UserFilter, page: Page) -> Vec<User> {
		let guard = map.read();
		let mut matching: Vec<_> = guard
			.users
			.values()
			.filter(|u| u.lifecycle.is_active() && filter.matches(u))
			.collect();

		matching.sort_by(|a, b| store::user_order(a, b));

		page.apply(matching.into_iter().cloned())
	}

	fn upsert_miner_now(
		map: StoreMap,
		miner: &MinerAddr,
		user: &UserName,
		now: OffsetDateTime,
	) -> bool {
		let mut guard = map.write();

		match guard.miners.get_mut(miner) {
			Some(existing) => {
				existing.reassign(user.clone(), now);

				false
			},
			None => {
				guard.miners.insert(miner.clone(), Miner::new(miner.clone(), user.clone(), now));

				true
			},
		}
	}

	fn upsert_rate_limit_now(map: StoreMap, limit: UserRateLimit) -> RateLimitId {
		let mut guard = map.write();

		if let Some(existing) = guard.rate_limits.values_mut().find(|r| r.same_scope(&limit)) {
			existing.quota = limit.quota;

			return existing.id.clone();
		}

		let id = limit.id.clone();

		guard.rate_limits.insert(id.clone(), limit);

		id
	}

	fn migrate_now(map: StoreMap) {
		let mut guard = map.write();

		if guard.version >= SCHEMA_V1 {
			return;
		}

		let now = OffsetDateTime::now_utc();
		let legacy = std::mem::take(&mut guard.legacy_miners);

		for (user, miner) in legacy {
			guard.miners.entry(miner.clone()).or_insert_with(|| Miner::new(miner, user, now));
		}

		guard.version = SCHEMA_V1;
	}
}
impl AuthStore for MemoryStore {
	fn put_token(&self, pair: KeyPair) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::put_token_now(map, pair) })
	}

	fn get_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<KeyPair>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().tokens.get(token).cloned()) })
	}

	fn tokens_by_name<'a>(&'a self, name: &'a UserName) -> StoreFuture<'a, Vec<KeyPair>> {
		let map = self.0.clone();

		Box::pin(async move {
			let guard = map.read();
			let mut owned: Vec<_> =
				guard.tokens.values().filter(|p| p.is_active() && &p.name == name).cloned().collect();

			owned.sort_by(store::token_order);

			Ok(owned)
		})
	}

	fn list_tokens(&self, page: Page) -> StoreFuture<'_, Vec<KeyPair>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::list_tokens_now(map, page)) })
	}

	fn set_token_lifecycle<'a>(
		&'a self,
		token: &'a str,
		lifecycle: Lifecycle,
	) -> StoreFuture<'a, bool> {
		let map = self.0.clone();

		Box::pin(async move {
			Ok(map.write().tokens.get_mut(token).map(|pair| pair.lifecycle = lifecycle).is_some())
		})
	}

	fn put_user(&self, user: User) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::put_user_now(map, user) })
	}

	fn get_user<'a>(&'a self, name: &'a UserName) -> StoreFuture<'a, Option<User>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().users.get(name).cloned()) })
	}

	fn update_user<'a>(
		&'a self,
		patch: &'a UserPatch,
		now: OffsetDateTime,
	) -> StoreFuture<'a, bool> {
		let map = self.0.clone();

		Box::pin(async move {
			let mut guard = map.write();

			match guard.users.get_mut(&patch.name).filter(|u| u.lifecycle.is_active()) {
				Some(user) => {
					user.apply(patch, now);

					Ok(true)
				},
				None => Ok(false),
			}
		})
	}

	fn list_users<'a>(&'a self, filter: &'a UserFilter, page: Page) -> StoreFuture<'a, Vec<User>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::list_users_now(map, filter, page)) })
	}

	fn set_user_lifecycle<'a>(
		&'a self,
		name: &'a UserName,
		lifecycle: Lifecycle,
		now: OffsetDateTime,
	) -> StoreFuture<'a, bool> {
		let map = self.0.clone();

		Box::pin(async move {
			let mut guard = map.write();

			match guard.users.get_mut(name) {
				Some(user) => {
					user.lifecycle = lifecycle;
					user.update_time = now;

					Ok(true)
				},
				None => Ok(false),
			}
		})
	}

	fn upsert_miner<'a>(
		&'a self,
		miner: &'a MinerAddr,
		user: &'a UserName,
		now: OffsetDateTime,
	) -> StoreFuture<'a, bool> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::upsert_miner_now(map, miner, user, now)) })
	}

	fn delete_miner<'a>(&'a self, miner: &'a MinerAddr) -> StoreFuture<'a, bool> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().miners.remove(miner).is_some()) })
	}

	fn get_miner<'a>(&'a self, miner: &'a MinerAddr) -> StoreFuture<'a, Option<Miner>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().miners.get(miner).cloned()) })
	}

	fn list_miners<'a>(&'a self, user: &'a UserName) -> StoreFuture<'a, Vec<Miner>> {
		let map = self.0.clone();

		Box::pin(async move {
			Ok(map.read().miners.values().filter(|m| &m.user == user).cloned().collect())
		})
	}

	fn upsert_rate_limit(&self, limit: UserRateLimit) -> StoreFuture<'_, RateLimitId> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::upsert_rate_limit_now(map, limit)) })
	}

	fn rate_limits<'a>(
		&'a self,
		name: &'a UserName,
		id: Option<&'a RateLimitId>,
	) -> StoreFuture<'a, Vec<UserRateLimit>> {
		let map = self.0.clone();

		Box::pin(async move {
			let guard = map.read();
			let mut owned: Vec<_> = guard
				.rate_limits
				.values()
				.filter(|r| &r.name == name && id.is_none_or(|id| &r.id == id))
				.cloned()
				.collect();

			owned.sort_by(|a, b| a.scope_key().cmp(b.scope_key()));

			Ok(owned)
		})
	}

	fn delete_rate_limit<'a>(&'a self, id: &'a RateLimitId) -> StoreFuture<'a, bool> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().rate_limits.remove(id).is_some()) })
	}

	fn version(&self) -> StoreFuture<'_, u64> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().version) })
	}

	fn migrate_to_v1(&self) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			Self::migrate_now(map);

			Ok(())
		})
	}
}
