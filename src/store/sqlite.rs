//! Relational [`AuthStore`] backend on SQLite via `sqlx`.
//!
//! Uniqueness is enforced by primary keys and `UNIQUE` constraints, and upserts use
//! `INSERT .. ON CONFLICT .. RETURNING` so each call is a single atomic statement.

// crates.io
use sqlx::{
	Row, SqlitePool,
	sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow},
};
// self
use crate::{
	_prelude::*,
	auth::{
		KeyCode, KeyPair, Lifecycle, Miner, MinerAddr, Page, Perm, RateLimitId, RequestQuota,
		SourceType, TokenSecret, User, UserFilter, UserId, UserName, UserPatch, UserRateLimit,
		UserState,
	},
	store::{AuthStore, Entity, SCHEMA_V1, StoreError, StoreFuture},
};

const SCHEMA: &[&str] = &[
	"CREATE TABLE IF NOT EXISTS tokens (
		token TEXT PRIMARY KEY NOT NULL,
		name TEXT NOT NULL,
		perm TEXT NOT NULL,
		secret TEXT NOT NULL,
		extra TEXT NOT NULL DEFAULT '',
		create_time INTEGER NOT NULL,
		is_deleted INTEGER NOT NULL DEFAULT 0
	)",
	"CREATE INDEX IF NOT EXISTS tokens_name ON tokens (name)",
	"CREATE TABLE IF NOT EXISTS users (
		name TEXT PRIMARY KEY NOT NULL,
		id TEXT NOT NULL UNIQUE,
		comment TEXT NOT NULL DEFAULT '',
		stype INTEGER NOT NULL DEFAULT 0,
		state INTEGER NOT NULL DEFAULT 1,
		key_code INTEGER NOT NULL DEFAULT 0,
		create_time INTEGER NOT NULL,
		update_time INTEGER NOT NULL,
		is_deleted INTEGER NOT NULL DEFAULT 0,
		miner TEXT
	)",
	"CREATE TABLE IF NOT EXISTS miners (
		miner TEXT PRIMARY KEY NOT NULL,
		owner TEXT NOT NULL,
		create_time INTEGER NOT NULL,
		update_time INTEGER NOT NULL,
		revision INTEGER NOT NULL DEFAULT 0
	)",
	"CREATE INDEX IF NOT EXISTS miners_owner ON miners (owner)",
	"CREATE TABLE IF NOT EXISTS rate_limits (
		id TEXT PRIMARY KEY NOT NULL,
		name TEXT NOT NULL,
		api TEXT NOT NULL DEFAULT '',
		cap INTEGER NOT NULL,
		window_secs INTEGER NOT NULL,
		UNIQUE (name, api)
	)",
	"CREATE TABLE IF NOT EXISTS store_version (
		id INTEGER PRIMARY KEY CHECK (id = 0),
		version INTEGER NOT NULL
	)",
	"INSERT OR IGNORE INTO store_version (id, version) VALUES (0, 0)",
];

/// SQLite-backed store sharing one connection pool.
#[derive(Clone, Debug)]
pub struct SqliteStore {
	pool: SqlitePool,
}
impl SqliteStore {
	/// Opens (creating if missing) the database at `url` and ensures the schema exists.
	pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
		let options = SqliteConnectOptions::from_str(url)?
			.create_if_missing(true)
			.journal_mode(SqliteJournalMode::Wal);
		let pool = SqlitePoolOptions::new()
			.max_connections(max_connections.max(1))
			.connect_with(options)
			.await?;

		Self::with_pool(pool).await
	}

	/// Wraps an existing pool and ensures the schema exists.
	pub async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
		for statement in SCHEMA {
			sqlx::query(statement).execute(&pool).await?;
		}

		Ok(Self { pool })
	}

	/// Underlying pool, for operators running ad-hoc maintenance.
	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	async fn migrate(&self) -> Result<(), StoreError> {
		let mut tx = self.pool.begin().await.map_err(migration)?;
		let version: i64 = sqlx::query("SELECT version FROM store_version WHERE id = 0")
			.fetch_one(&mut *tx)
			.await
			.and_then(|row| row.try_get("version"))
			.map_err(migration)?;

		if version as u64 >= SCHEMA_V1 {
			return Ok(());
		}

		let now = nanos(OffsetDateTime::now_utc())?;

		sqlx::query(
			"INSERT INTO miners (miner, owner, create_time, update_time, revision)
			SELECT miner, name, ?, ?, 0 FROM users WHERE miner IS NOT NULL AND miner != ''
			ORDER BY name
			ON CONFLICT (miner) DO NOTHING",
		)
		.bind(now)
		.bind(now)
		.execute(&mut *tx)
		.await
		.map_err(migration)?;
		sqlx::query("UPDATE users SET miner = NULL WHERE miner IS NOT NULL")
			.execute(&mut *tx)
			.await
			.map_err(migration)?;
		sqlx::query("UPDATE store_version SET version = ? WHERE id = 0")
			.bind(SCHEMA_V1 as i64)
			.execute(&mut *tx)
			.await
			.map_err(migration)?;

		tx.commit().await.map_err(migration)
	}
}
impl AuthStore for SqliteStore {
	fn put_token(&self, pair: KeyPair) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			sqlx::query(
				"INSERT INTO tokens (token, name, perm, secret, extra, create_time, is_deleted)
				VALUES (?, ?, ?, ?, ?, ?, ?)",
			)
			.bind(&pair.token)
			.bind(pair.name.as_ref())
			.bind(pair.perm.as_str())
			.bind(pair.secret.expose())
			.bind(&pair.extra)
			.bind(nanos(pair.create_time)?)
			.bind(pair.lifecycle.as_flag())
			.execute(&self.pool)
			.await
			.map_err(|e| unique_or_backend(e, Entity::Token, "<token>"))?;

			Ok(())
		})
	}

	fn get_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<KeyPair>> {
		Box::pin(async move {
			sqlx::query("SELECT * FROM tokens WHERE token = ?")
				.bind(token)
				.fetch_optional(&self.pool)
				.await?
				.as_ref()
				.map(token_from_row)
				.transpose()
		})
	}

	fn tokens_by_name<'a>(&'a self, name: &'a UserName) -> StoreFuture<'a, Vec<KeyPair>> {
		Box::pin(async move {
			sqlx::query(
				"SELECT * FROM tokens WHERE name = ? AND is_deleted = 0 ORDER BY create_time, token",
			)
			.bind(name.as_ref())
			.fetch_all(&self.pool)
			.await?
			.iter()
			.map(token_from_row)
			.collect()
		})
	}

	fn list_tokens(&self, page: Page) -> StoreFuture<'_, Vec<KeyPair>> {
		Box::pin(async move {
			sqlx::query(
				"SELECT * FROM tokens WHERE is_deleted = 0 ORDER BY create_time, token
				LIMIT ? OFFSET ?",
			)
			.bind(page.limit as i64)
			.bind(page.sql_offset())
			.fetch_all(&self.pool)
			.await?
			.iter()
			.map(token_from_row)
			.collect()
		})
	}

	fn set_token_lifecycle<'a>(
		&'a self,
		token: &'a str,
		lifecycle: Lifecycle,
	) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let result = sqlx::query("UPDATE tokens SET is_deleted = ? WHERE token = ?")
				.bind(lifecycle.as_flag())
				.bind(token)
				.execute(&self.pool)
				.await?;

			Ok(result.rows_affected() > 0)
		})
	}

	fn put_user(&self, user: User) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			sqlx::query(
				"INSERT INTO users
				(name, id, comment, stype, state, key_code, create_time, update_time, is_deleted)
				VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
			)
			.bind(user.name.as_ref())
			.bind(user.id.as_ref())
			.bind(&user.comment)
			.bind(user.source_type.0)
			.bind(user.state.as_code())
			.bind(user.key_code.0)
			.bind(nanos(user.create_time)?)
			.bind(nanos(user.update_time)?)
			.bind(user.lifecycle.as_flag())
			.execute(&self.pool)
			.await
			.map_err(|e| unique_or_backend(e, Entity::User, &user.name))?;

			Ok(())
		})
	}

	fn get_user<'a>(&'a self, name: &'a UserName) -> StoreFuture<'a, Option<User>> {
		Box::pin(async move {
			sqlx::query("SELECT * FROM users WHERE name = ?")
				.bind(name.as_ref())
				.fetch_optional(&self.pool)
				.await?
				.as_ref()
				.map(user_from_row)
				.transpose()
		})
	}

	fn update_user<'a>(
		&'a self,
		patch: &'a UserPatch,
		now: OffsetDateTime,
	) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let result = sqlx::query(
				"UPDATE users SET
					comment = COALESCE(?, comment),
					stype = COALESCE(?, stype),
					state = COALESCE(?, state),
					key_code = COALESCE(?, key_code),
					update_time = ?
				WHERE name = ? AND is_deleted = 0",
			)
			.bind(patch.comment.as_deref())
			.bind(patch.source_type.map(|s| s.0))
			.bind(patch.state.map(UserState::as_code))
			.bind(patch.key_code.map(|k| k.0))
			.bind(nanos(now)?)
			.bind(patch.name.as_ref())
			.execute(&self.pool)
			.await?;

			Ok(result.rows_affected() > 0)
		})
	}

	fn list_users<'a>(&'a self, filter: &'a UserFilter, page: Page) -> StoreFuture<'a, Vec<User>> {
		let state = filter.state.map(UserState::as_code);
		let source_type = filter.source_type.map(|s| s.0);
		let key_code = filter.key_code.map(|k| k.0);

		Box::pin(async move {
			sqlx::query(
				"SELECT * FROM users WHERE is_deleted = 0
					AND (? IS NULL OR state = ?)
					AND (? IS NULL OR stype = ?)
					AND (? IS NULL OR key_code = ?)
				ORDER BY create_time, name
				LIMIT ? OFFSET ?",
			)
			.bind(state)
			.bind(state)
			.bind(source_type)
			.bind(source_type)
			.bind(key_code)
			.bind(key_code)
			.bind(page.limit as i64)
			.bind(page.sql_offset())
			.fetch_all(&self.pool)
			.await?
			.iter()
			.map(user_from_row)
			.collect()
		})
	}

	fn set_user_lifecycle<'a>(
		&'a self,
		name: &'a UserName,
		lifecycle: Lifecycle,
		now: OffsetDateTime,
	) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let result =
				sqlx::query("UPDATE users SET is_deleted = ?, update_time = ? WHERE name = ?")
					.bind(lifecycle.as_flag())
					.bind(nanos(now)?)
					.bind(name.as_ref())
					.execute(&self.pool)
					.await?;

			Ok(result.rows_affected() > 0)
		})
	}

	fn upsert_miner<'a>(
		&'a self,
		miner: &'a MinerAddr,
		user: &'a UserName,
		now: OffsetDateTime,
	) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			// `revision` stays 0 only on the insert path.
			let revision: i64 = sqlx::query(
				"INSERT INTO miners (miner, owner, create_time, update_time, revision)
				VALUES (?, ?, ?, ?, 0)
				ON CONFLICT (miner) DO UPDATE SET
					owner = excluded.owner,
					update_time = excluded.update_time,
					revision = miners.revision + 1
				RETURNING revision",
			)
			.bind(miner.as_ref())
			.bind(user.as_ref())
			.bind(nanos(now)?)
			.bind(nanos(now)?)
			.fetch_one(&self.pool)
			.await?
			.try_get("revision")?;

			Ok(revision == 0)
		})
	}

	fn delete_miner<'a>(&'a self, miner: &'a MinerAddr) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let result = sqlx::query("DELETE FROM miners WHERE miner = ?")
				.bind(miner.as_ref())
				.execute(&self.pool)
				.await?;

			Ok(result.rows_affected() > 0)
		})
	}

	fn get_miner<'a>(&'a self, miner: &'a MinerAddr) -> StoreFuture<'a, Option<Miner>> {
		Box::pin(async move {
			sqlx::query("SELECT * FROM miners WHERE miner = ?")
				.bind(miner.as_ref())
				.fetch_optional(&self.pool)
				.await?
				.as_ref()
				.map(miner_from_row)
				.transpose()
		})
	}

	fn list_miners<'a>(&'a self, user: &'a UserName) -> StoreFuture<'a, Vec<Miner>> {
		Box::pin(async move {
			sqlx::query("SELECT * FROM miners WHERE owner = ? ORDER BY miner")
				.bind(user.as_ref())
				.fetch_all(&self.pool)
				.await?
				.iter()
				.map(miner_from_row)
				.collect()
		})
	}

	fn upsert_rate_limit(&self, limit: UserRateLimit) -> StoreFuture<'_, RateLimitId> {
		Box::pin(async move {
			let cap = i64::try_from(limit.quota.cap()).map_err(StoreError::serialization)?;
			let id: String = sqlx::query(
				"INSERT INTO rate_limits (id, name, api, cap, window_secs) VALUES (?, ?, ?, ?, ?)
				ON CONFLICT (name, api) DO UPDATE SET
					cap = excluded.cap,
					window_secs = excluded.window_secs
				RETURNING id",
			)
			.bind(limit.id.as_ref())
			.bind(limit.name.as_ref())
			.bind(limit.scope_key())
			.bind(cap)
			.bind(limit.quota.window().whole_seconds())
			.fetch_one(&self.pool)
			.await?
			.try_get("id")?;

			RateLimitId::new(id).map_err(StoreError::serialization)
		})
	}

	fn rate_limits<'a>(
		&'a self,
		name: &'a UserName,
		id: Option<&'a RateLimitId>,
	) -> StoreFuture<'a, Vec<UserRateLimit>> {
		let id = id.map(|id| id.to_string());

		Box::pin(async move {
			sqlx::query(
				"SELECT * FROM rate_limits WHERE name = ? AND (? IS NULL OR id = ?) ORDER BY api",
			)
			.bind(name.as_ref())
			.bind(id.as_deref())
			.bind(id.as_deref())
			.fetch_all(&self.pool)
			.await?
			.iter()
			.map(rate_limit_from_row)
			.collect()
		})
	}

	fn delete_rate_limit<'a>(&'a self, id: &'a RateLimitId) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let result = sqlx::query("DELETE FROM rate_limits WHERE id = ?")
				.bind(id.as_ref())
				.execute(&self.pool)
				.await?;

			Ok(result.rows_affected() > 0)
		})
	}

	fn version(&self) -> StoreFuture<'_, u64> {
		Box::pin(async move {
			let version: i64 = sqlx::query("SELECT version FROM store_version WHERE id = 0")
				.fetch_one(&self.pool)
				.await?
				.try_get("version")?;

			Ok(version.max(0) as u64)
		})
	}

	fn migrate_to_v1(&self) -> StoreFuture<'_, ()> {
		Box::pin(self.migrate())
	}
}

impl From<sqlx::Error> for StoreError {
	fn from(e: sqlx::Error) -> Self {
		match e {
			sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => Self::serialization(e),
			e => Self::backend(e),
		}
	}
}

fn unique_or_backend(e: sqlx::Error, entity: Entity, key: impl Display) -> StoreError {
	match &e {
		sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::conflict(entity, key),
		_ => e.into(),
	}
}

fn migration(e: sqlx::Error) -> StoreError {
	StoreError::Migration { message: e.to_string() }
}

fn nanos(at: OffsetDateTime) -> Result<i64, StoreError> {
	i64::try_from(at.unix_timestamp_nanos()).map_err(StoreError::serialization)
}

fn instant(row: &SqliteRow, column: &str) -> Result<OffsetDateTime, StoreError> {
	let nanos: i64 = row.try_get(column)?;

	OffsetDateTime::from_unix_timestamp_nanos(nanos.into()).map_err(StoreError::serialization)
}

fn token_from_row(row: &SqliteRow) -> Result<KeyPair, StoreError> {
	let perm: String = row.try_get("perm")?;

	Ok(KeyPair {
		token: row.try_get("token")?,
		name: UserName::new(row.try_get::<String, _>("name")?)
			.map_err(StoreError::serialization)?,
		perm: Perm::from_str(&perm).map_err(StoreError::serialization)?,
		secret: TokenSecret::new(row.try_get::<String, _>("secret")?),
		extra: row.try_get("extra")?,
		create_time: instant(row, "create_time")?,
		lifecycle: Lifecycle::from_flag(row.try_get("is_deleted")?),
	})
}

fn user_from_row(row: &SqliteRow) -> Result<User, StoreError> {
	Ok(User {
		id: UserId::new(row.try_get::<String, _>("id")?).map_err(StoreError::serialization)?,
		name: UserName::new(row.try_get::<String, _>("name")?)
			.map_err(StoreError::serialization)?,
		comment: row.try_get("comment")?,
		source_type: SourceType(row.try_get("stype")?),
		state: UserState::from_code(row.try_get("state")?),
		key_code: KeyCode(row.try_get("key_code")?),
		create_time: instant(row, "create_time")?,
		update_time: instant(row, "update_time")?,
		lifecycle: Lifecycle::from_flag(row.try_get("is_deleted")?),
	})
}

fn miner_from_row(row: &SqliteRow) -> Result<Miner, StoreError> {
	Ok(Miner {
		miner: MinerAddr::new(row.try_get::<String, _>("miner")?)
			.map_err(StoreError::serialization)?,
		user: UserName::new(row.try_get::<String, _>("owner")?)
			.map_err(StoreError::serialization)?,
		create_time: instant(row, "create_time")?,
		update_time: instant(row, "update_time")?,
	})
}

fn rate_limit_from_row(row: &SqliteRow) -> Result<UserRateLimit, StoreError> {
	let api: String = row.try_get("api")?;
	let cap: i64 = row.try_get("cap")?;
	let window_secs: i64 = row.try_get("window_secs")?;

	Ok(UserRateLimit {
		id: RateLimitId::new(row.try_get::<String, _>("id")?)
			.map_err(StoreError::serialization)?,
		name: UserName::new(row.try_get::<String, _>("name")?)
			.map_err(StoreError::serialization)?,
		api: (!api.is_empty()).then_some(api),
		quota: RequestQuota::new(
			u64::try_from(cap).map_err(StoreError::serialization)?,
			Duration::seconds(window_secs),
		)
		.map_err(StoreError::serialization)?,
	})
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use tempfile::TempDir;
	// self
	use super::*;
	use crate::{auth::NewUser, store::conformance};

	async fn open(dir: &TempDir, file: &str) -> SqliteStore {
		let url = format!("sqlite://{}", dir.path().join(file).display());

		SqliteStore::connect(&url, 4).await.expect("SQLite store should open.")
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn conformance_suite_passes() {
		let dir = TempDir::new().expect("Temp dir should be created.");
		let counter = AtomicUsize::new(0);

		conformance::run_all(|| {
			let file = format!("auth-{}.db", counter.fetch_add(1, Ordering::SeqCst));
			let dir = &dir;

			async move { Arc::new(open(dir, &file).await) }
		})
		.await;
	}

	#[tokio::test]
	async fn migration_moves_legacy_miner_column() {
		let dir = TempDir::new().expect("Temp dir should be created.");
		let store = open(&dir, "legacy.db").await;

		sqlx::query(
			"INSERT INTO users (name, id, create_time, update_time, miner)
			VALUES ('legacy', 'u-1', 0, 0, 'f01000'), ('plain', 'u-2', 0, 0, NULL)",
		)
		.execute(store.pool())
		.await
		.expect("Legacy rows should insert.");

		store.migrate_to_v1().await.expect("Migration should succeed.");
		store.migrate_to_v1().await.expect("Repeated migration should succeed.");

		let miner = MinerAddr::new("f01000").expect("Miner fixture should be valid.");
		let mapping = store
			.get_miner(&miner)
			.await
			.expect("Lookup should succeed.")
			.expect("Legacy miner should be mapped.");
		let leftover: i64 = sqlx::query("SELECT COUNT(*) AS n FROM users WHERE miner IS NOT NULL")
			.fetch_one(store.pool())
			.await
			.expect("Count should succeed.")
			.try_get("n")
			.expect("Count column should decode.");

		assert_eq!(mapping.user.as_ref(), "legacy");
		assert_eq!(leftover, 0);
		assert_eq!(store.version().await.expect("Version should be readable."), SCHEMA_V1);
	}

	#[tokio::test]
	async fn shared_legacy_miner_goes_to_the_first_name() {
		let dir = TempDir::new().expect("Temp dir should be created.");
		let store = open(&dir, "shared.db").await;

		sqlx::query(
			"INSERT INTO users (name, id, create_time, update_time, miner)
			VALUES ('bob', 'u-1', 0, 0, 'f01000'), ('alice', 'u-2', 0, 0, 'f01000'),
			('carol', 'u-3', 0, 0, 'f01000')",
		)
		.execute(store.pool())
		.await
		.expect("Legacy rows should insert.");

		store.migrate_to_v1().await.expect("Migration should succeed.");

		let miner = MinerAddr::new("f01000").expect("Miner fixture should be valid.");
		let mapping = store
			.get_miner(&miner)
			.await
			.expect("Lookup should succeed.")
			.expect("Shared legacy miner should be mapped.");

		assert_eq!(mapping.user.as_ref(), "alice");
	}

	#[tokio::test]
	async fn timestamps_beyond_the_nanosecond_range_are_rejected() {
		let dir = TempDir::new().expect("Temp dir should be created.");
		let store = open(&dir, "range.db").await;
		let name = UserName::new("alice").expect("User fixture should be valid.");
		let far = time::macros::datetime!(2300-01-01 00:00 UTC);

		assert!(nanos(time::macros::datetime!(2025-01-01 00:00 UTC)).is_ok());
		assert!(matches!(nanos(far), Err(StoreError::Serialization { .. })));
		assert!(matches!(
			store.put_user(User::from_new(NewUser::new(name.clone()), far)).await,
			Err(StoreError::Serialization { .. })
		));
		assert_eq!(store.get_user(&name).await.expect("Lookup should succeed."), None);
	}

	#[tokio::test]
	async fn records_survive_reopen() {
		let dir = TempDir::new().expect("Temp dir should be created.");
		let name = UserName::new("alice").expect("User fixture should be valid.");

		{
			let store = open(&dir, "reopen.db").await;

			let user = User::from_new(NewUser::new(name.clone()), OffsetDateTime::now_utc());

			store.put_user(user).await.expect("Insert should succeed.");
			store.migrate_to_v1().await.expect("Migration should succeed.");
			store.pool().close().await;
		}

		let store = open(&dir, "reopen.db").await;

		assert!(store.get_user(&name).await.expect("Lookup should succeed.").is_some());
		assert_eq!(store.version().await.expect("Version should be readable."), SCHEMA_V1);
	}
}
