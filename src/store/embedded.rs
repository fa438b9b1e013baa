//! Embedded key-value [`AuthStore`] backend on fjall.
//!
//! Records live as JSON values in one keyspace per entity. Writes that must check before
//! they write take the store's writer lock and land through a single atomic batch; reads
//! never lock.
//!
//! Every call runs to completion on the polling thread: futures returned here never yield,
//! and each write ends with a synchronous `persist(SyncAll)` so an `Ok` means durable.
//! The crate is runtime-agnostic and does not offload that fsync itself; services with
//! heavy write traffic should run on a multi-threaded runtime or wrap calls in their
//! runtime's blocking pool.

// std
use std::path::Path;
// crates.io
use fjall::{Database, Keyspace, KeyspaceCreateOptions, PersistMode};
// self
use crate::{
	_prelude::*,
	auth::{
		KeyPair, Lifecycle, Miner, MinerAddr, Page, RateLimitId, User, UserFilter, UserName,
		UserPatch, UserRateLimit,
	},
	store::{self, AuthStore, Entity, SCHEMA_V1, StoreError, StoreFuture},
};

const KEY_VERSION: &str = "version";

/// User row as persisted; version-0 databases carry one miner address inline.
#[derive(Serialize, Deserialize)]
struct StoredUser {
	#[serde(flatten)]
	user: User,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	miner: Option<String>,
}

/// fjall-backed store; cheap to clone.
#[derive(Clone)]
pub struct FjallStore {
	db: Arc<Database>,
	tokens: Keyspace,
	users: Keyspace,
	miners: Keyspace,
	rate_limits: Keyspace,
	// `name \0 api` -> rate-limit id.
	scopes: Keyspace,
	meta: Keyspace,
	writer: Arc<Mutex<()>>,
}
impl FjallStore {
	/// Opens (creating if missing) the database rooted at `path`.
	pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
		let db = Database::builder(path.as_ref()).open()?;

		Self::with_database(Arc::new(db))
	}

	/// Opens the store's keyspaces inside an existing database.
	pub fn with_database(db: Arc<Database>) -> Result<Self, StoreError> {
		Ok(Self {
			tokens: db.keyspace("tokens", KeyspaceCreateOptions::default)?,
			users: db.keyspace("users", KeyspaceCreateOptions::default)?,
			miners: db.keyspace("miners", KeyspaceCreateOptions::default)?,
			rate_limits: db.keyspace("rate_limits", KeyspaceCreateOptions::default)?,
			scopes: db.keyspace("rate_limit_scopes", KeyspaceCreateOptions::default)?,
			meta: db.keyspace("meta", KeyspaceCreateOptions::default)?,
			writer: Arc::new(Mutex::new(())),
			db,
		})
	}

	fn persist(&self) -> Result<(), StoreError> {
		self.db.persist(PersistMode::SyncAll)?;

		Ok(())
	}

	fn read<T>(&self, keyspace: &Keyspace, key: impl AsRef<[u8]>) -> Result<Option<T>, StoreError>
	where
		T: for<'de> Deserialize<'de>,
	{
		keyspace.get(key)?.map(|bytes| decode(&bytes)).transpose()
	}

	fn scan<T>(&self, keyspace: &Keyspace) -> Result<Vec<T>, StoreError>
	where
		T: for<'de> Deserialize<'de>,
	{
		let mut values = Vec::new();

		for item in keyspace.iter() {
			values.push(decode(&item.value()?)?);
		}

		Ok(values)
	}

	fn stored_user(&self, name: &UserName) -> Result<Option<StoredUser>, StoreError> {
		self.read(&self.users, name.as_bytes())
	}

	fn write_user(&self, stored: &StoredUser) -> Result<(), StoreError> {
		self.users.insert(stored.user.name.as_bytes(), encode(stored)?)?;

		self.persist()
	}

	fn put_token_now(&self, pair: &KeyPair) -> Result<(), StoreError> {
		let _writer = self.writer.lock();

		if self.tokens.get(pair.token.as_bytes())?.is_some() {
			return Err(StoreError::conflict(Entity::Token, "<token>"));
		}

		self.tokens.insert(pair.token.as_bytes(), encode(pair)?)?;

		self.persist()
	}

	fn set_token_lifecycle_now(&self, token: &str, lifecycle: Lifecycle) -> Result<bool, StoreError> {
		let _writer = self.writer.lock();
		let Some(mut pair) = self.read::<KeyPair>(&self.tokens, token)? else {
			return Ok(false);
		};

		pair.lifecycle = lifecycle;
		self.tokens.insert(token.as_bytes(), encode(&pair)?)?;
		self.persist()?;

		Ok(true)
	}

	fn put_user_now(&self, user: User) -> Result<(), StoreError> {
		let _writer = self.writer.lock();

		if self.users.get(user.name.as_bytes())?.is_some() {
			return Err(StoreError::conflict(Entity::User, &user.name));
		}

		self.write_user(&StoredUser { user, miner: None })
	}

	fn update_user_now(&self, patch: &UserPatch, now: OffsetDateTime) -> Result<bool, StoreError> {
		let _writer = self.writer.lock();
		let Some(mut stored) =
			self.stored_user(&patch.name)?.filter(|s| s.user.lifecycle.is_active())
		else {
			return Ok(false);
		};

		stored.user.apply(patch, now);
		self.write_user(&stored)?;

		Ok(true)
	}

	fn set_user_lifecycle_now(
		&self,
		name: &UserName,
		lifecycle: Lifecycle,
		now: OffsetDateTime,
	) -> Result<bool, StoreError> {
		let _writer = self.writer.lock();
		let Some(mut stored) = self.stored_user(name)? else {
			return Ok(false);
		};

		stored.user.lifecycle = lifecycle;
		stored.user.update_time = now;
		self.write_user(&stored)?;

		Ok(true)
	}

	fn upsert_miner_now(
		&self,
		miner: &MinerAddr,
		user: &UserName,
		now: OffsetDateTime,
	) -> Result<bool, StoreError> {
		let _writer = self.writer.lock();
		let (mapping, created) = match self.read::<Miner>(&self.miners, miner.as_bytes())? {
			Some(mut existing) => {
				existing.reassign(user.clone(), now);

				(existing, false)
			},
			None => (Miner::new(miner.clone(), user.clone(), now), true),
		};

		self.miners.insert(miner.as_bytes(), encode(&mapping)?)?;
		self.persist()?;

		Ok(created)
	}

	fn delete_miner_now(&self, miner: &MinerAddr) -> Result<bool, StoreError> {
		let _writer = self.writer.lock();

		if self.miners.get(miner.as_bytes())?.is_none() {
			return Ok(false);
		}

		self.miners.remove(miner.as_bytes())?;
		self.persist()?;

		Ok(true)
	}

	fn upsert_rate_limit_now(&self, limit: UserRateLimit) -> Result<RateLimitId, StoreError> {
		let _writer = self.writer.lock();
		let scope = scope_key(&limit);
		let mut record = limit;

		if let Some(id) = self.scopes.get(&scope)? {
			let id = String::from_utf8(id.to_vec()).map_err(StoreError::serialization)?;

			if let Some(existing) = self.read::<UserRateLimit>(&self.rate_limits, &id)? {
				record = UserRateLimit { quota: record.quota, ..existing };
			}
		}

		let mut batch = self.db.batch();

		batch.insert(&self.rate_limits, record.id.as_bytes(), encode(&record)?);
		batch.insert(&self.scopes, scope.as_slice(), record.id.as_bytes());
		batch.commit()?;
		self.persist()?;

		Ok(record.id)
	}

	fn delete_rate_limit_now(&self, id: &RateLimitId) -> Result<bool, StoreError> {
		let _writer = self.writer.lock();
		let Some(record) = self.read::<UserRateLimit>(&self.rate_limits, id.as_bytes())? else {
			return Ok(false);
		};
		let mut batch = self.db.batch();

		batch.remove(&self.rate_limits, id.as_bytes());
		batch.remove(&self.scopes, scope_key(&record));
		batch.commit()?;
		self.persist()?;

		Ok(true)
	}

	fn version_now(&self) -> Result<u64, StoreError> {
		match self.meta.get(KEY_VERSION)? {
			Some(bytes) => {
				let raw = <[u8; 8]>::try_from(&*bytes).map_err(StoreError::serialization)?;

				Ok(u64::from_be_bytes(raw))
			},
			None => Ok(0),
		}
	}

	fn migrate_now(&self) -> Result<(), StoreError> {
		let _writer = self.writer.lock();

		if self.version_now().map_err(migration)? >= SCHEMA_V1 {
			return Ok(());
		}

		let now = OffsetDateTime::now_utc();
		let mut batch = self.db.batch();
		// Users scan in name order; the first claimant of an address keeps it.
		let mut claimed = HashSet::new();

		for stored in self.scan::<StoredUser>(&self.users).map_err(migration)? {
			let Some(address) = stored.miner.as_deref().filter(|m| !m.is_empty()) else {
				continue;
			};
			let miner = MinerAddr::new(address).map_err(migration)?;

			if claimed.insert(miner.clone())
				&& self.miners.get(miner.as_bytes()).map_err(migration)?.is_none()
			{
				let mapping = Miner::new(miner.clone(), stored.user.name.clone(), now);

				batch.insert(&self.miners, miner.as_bytes(), encode(&mapping).map_err(migration)?);
			}

			let cleared = StoredUser { user: stored.user, miner: None };

			batch.insert(
				&self.users,
				cleared.user.name.as_bytes(),
				encode(&cleared).map_err(migration)?,
			);
		}

		batch.insert(&self.meta, KEY_VERSION, SCHEMA_V1.to_be_bytes().to_vec());
		batch.commit().map_err(migration)?;

		self.persist().map_err(migration)
	}
}
impl Debug for FjallStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FjallStore").finish_non_exhaustive()
	}
}
impl AuthStore for FjallStore {
	fn put_token(&self, pair: KeyPair) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.put_token_now(&pair) })
	}

	fn get_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<KeyPair>> {
		Box::pin(async move { self.read(&self.tokens, token) })
	}

	fn tokens_by_name<'a>(&'a self, name: &'a UserName) -> StoreFuture<'a, Vec<KeyPair>> {
		Box::pin(async move {
			let mut owned = self
				.scan::<KeyPair>(&self.tokens)?
				.into_iter()
				.filter(|p| p.is_active() && &p.name == name)
				.collect::<Vec<_>>();

			owned.sort_by(store::token_order);

			Ok(owned)
		})
	}

	fn list_tokens(&self, page: Page) -> StoreFuture<'_, Vec<KeyPair>> {
		Box::pin(async move {
			let mut active = self
				.scan::<KeyPair>(&self.tokens)?
				.into_iter()
				.filter(KeyPair::is_active)
				.collect::<Vec<_>>();

			active.sort_by(store::token_order);

			Ok(page.apply(active))
		})
	}

	fn set_token_lifecycle<'a>(
		&'a self,
		token: &'a str,
		lifecycle: Lifecycle,
	) -> StoreFuture<'a, bool> {
		Box::pin(async move { self.set_token_lifecycle_now(token, lifecycle) })
	}

	fn put_user(&self, user: User) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.put_user_now(user) })
	}

	fn get_user<'a>(&'a self, name: &'a UserName) -> StoreFuture<'a, Option<User>> {
		Box::pin(async move { Ok(self.stored_user(name)?.map(|s| s.user)) })
	}

	fn update_user<'a>(
		&'a self,
		patch: &'a UserPatch,
		now: OffsetDateTime,
	) -> StoreFuture<'a, bool> {
		Box::pin(async move { self.update_user_now(patch, now) })
	}

	fn list_users<'a>(&'a self, filter: &'a UserFilter, page: Page) -> StoreFuture<'a, Vec<User>> {
		Box::pin(async move {
			let mut matching = self
				.scan::<StoredUser>(&self.users)?
				.into_iter()
				.map(|s| s.user)
				.filter(|u| u.lifecycle.is_active() && filter.matches(u))
				.collect::<Vec<_>>();

			matching.sort_by(store::user_order);

			Ok(page.apply(matching))
		})
	}

	fn set_user_lifecycle<'a>(
		&'a self,
		name: &'a UserName,
		lifecycle: Lifecycle,
		now: OffsetDateTime,
	) -> StoreFuture<'a, bool> {
		Box::pin(async move { self.set_user_lifecycle_now(name, lifecycle, now) })
	}

	fn upsert_miner<'a>(
		&'a self,
		miner: &'a MinerAddr,
		user: &'a UserName,
		now: OffsetDateTime,
	) -> StoreFuture<'a, bool> {
		Box::pin(async move { self.upsert_miner_now(miner, user, now) })
	}

	fn delete_miner<'a>(&'a self, miner: &'a MinerAddr) -> StoreFuture<'a, bool> {
		Box::pin(async move { self.delete_miner_now(miner) })
	}

	fn get_miner<'a>(&'a self, miner: &'a MinerAddr) -> StoreFuture<'a, Option<Miner>> {
		Box::pin(async move { self.read(&self.miners, miner.as_bytes()) })
	}

	fn list_miners<'a>(&'a self, user: &'a UserName) -> StoreFuture<'a, Vec<Miner>> {
		// Keys iterate in byte order, which is address order.
		Box::pin(async move {
			Ok(self
				.scan::<Miner>(&self.miners)?
				.into_iter()
				.filter(|m| &m.user == user)
				.collect())
		})
	}

	fn upsert_rate_limit(&self, limit: UserRateLimit) -> StoreFuture<'_, RateLimitId> {
		Box::pin(async move { self.upsert_rate_limit_now(limit) })
	}

	fn rate_limits<'a>(
		&'a self,
		name: &'a UserName,
		id: Option<&'a RateLimitId>,
	) -> StoreFuture<'a, Vec<UserRateLimit>> {
		Box::pin(async move {
			let mut owned = self
				.scan::<UserRateLimit>(&self.rate_limits)?
				.into_iter()
				.filter(|r| &r.name == name && id.is_none_or(|id| &r.id == id))
				.collect::<Vec<_>>();

			owned.sort_by(|a, b| a.scope_key().cmp(b.scope_key()));

			Ok(owned)
		})
	}

	fn delete_rate_limit<'a>(&'a self, id: &'a RateLimitId) -> StoreFuture<'a, bool> {
		Box::pin(async move { self.delete_rate_limit_now(id) })
	}

	fn version(&self) -> StoreFuture<'_, u64> {
		Box::pin(async move { self.version_now() })
	}

	fn migrate_to_v1(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.migrate_now() })
	}
}

impl From<fjall::Error> for StoreError {
	fn from(e: fjall::Error) -> Self {
		Self::backend(e)
	}
}

fn encode<T>(value: &T) -> Result<Vec<u8>, StoreError>
where
	T: Serialize,
{
	serde_json::to_vec(value).map_err(StoreError::serialization)
}

fn decode<T>(bytes: &[u8]) -> Result<T, StoreError>
where
	T: for<'de> Deserialize<'de>,
{
	serde_json::from_slice(bytes).map_err(StoreError::serialization)
}

fn scope_key(limit: &UserRateLimit) -> Vec<u8> {
	let mut key = limit.name.as_bytes().to_vec();

	key.push(0);
	key.extend_from_slice(limit.scope_key().as_bytes());

	key
}

fn migration(e: impl Display) -> StoreError {
	StoreError::Migration { message: e.to_string() }
}
