//! Miner ownership registry.

// self
use crate::{
	_prelude::*,
	auth::{Miner, MinerAddr, UserName},
	obs::{self, Component},
	service::OAuthService,
	store::Entity,
};

const C: Component = Component::Miner;

impl OAuthService {
	/// Assigns `miner` to `user`, replacing any previous owner.
	///
	/// Returns `true` if the mapping was created and `false` if an existing one was
	/// overwritten. The owner must be an active user.
	pub async fn upsert_miner(&self, miner: &MinerAddr, user: &UserName) -> Result<bool> {
		obs::observe(C, "upsert_miner", async move {
			if !self.store.get_user(user).await?.is_some_and(|u| u.lifecycle.is_active()) {
				return Err(Error::not_found(Entity::User, user));
			}

			Ok(self.store.upsert_miner(miner, user, OffsetDateTime::now_utc()).await?)
		})
		.await
	}

	/// Removes a mapping and reports whether one existed.
	pub async fn del_miner(&self, miner: &MinerAddr) -> Result<bool> {
		obs::observe(C, "del_miner", async move { Ok(self.store.delete_miner(miner).await?) }).await
	}

	/// Returns `true` if `miner` is assigned.
	pub async fn has_miner(&self, miner: &MinerAddr) -> Result<bool> {
		obs::observe(C, "has_miner", async move { Ok(self.store.get_miner(miner).await?.is_some()) })
			.await
	}

	/// Lists the miners owned by `user`, ordered by address.
	pub async fn list_miners(&self, user: &UserName) -> Result<Vec<Miner>> {
		obs::observe(C, "list_miners", async move { Ok(self.store.list_miners(user).await?) }).await
	}
}
