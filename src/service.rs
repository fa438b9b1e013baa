//! Service facade composing token, user, miner, and rate-limit operations.
//!
//! [`OAuthService`] holds only the immutable signing secret and a handle to the store;
//! it never locks, so any number of callers may share one instance. Every operation
//! runs inside an [`obs::observe`](crate::obs::observe) span.

mod miner;
mod rate_limit;
mod token;
mod user;

// self
use crate::{
	_prelude::*,
	auth::SecretStore,
	error::ConfigError,
	obs::{self, Component},
	store::AuthStore,
};

/// Token and identity service over a pluggable [`AuthStore`].
#[derive(Clone)]
pub struct OAuthService {
	secret: SecretStore,
	store: Arc<dyn AuthStore>,
}
impl OAuthService {
	/// Wraps `store` without touching the schema.
	///
	/// Use [`OAuthService::init`] at process start so the schema is upgraded first.
	pub fn new(secret: SecretStore, store: Arc<dyn AuthStore>) -> Self {
		Self { secret, store }
	}

	/// Upgrades the schema and returns the service; a failed migration is fatal.
	pub async fn init(secret: SecretStore, store: Arc<dyn AuthStore>) -> Result<Self> {
		obs::observe(Component::Store, "migrate_to_v1", async {
			store.migrate_to_v1().await.map_err(|source| ConfigError::Migration { source })?;

			Ok(())
		})
		.await?;

		Ok(Self::new(secret, store))
	}

	/// Store handle backing this service.
	pub fn store(&self) -> &Arc<dyn AuthStore> {
		&self.store
	}
}
impl Debug for OAuthService {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthService")
			.field("secret", &self.secret)
			.field("store", &"<dyn AuthStore>")
			.finish()
	}
}
