//! Rate-limit record registry.

// self
use crate::{
	_prelude::*,
	auth::{RateLimitId, UserName, UserRateLimit},
	obs::{self, Component},
	service::OAuthService,
	store::Entity,
};

const C: Component = Component::RateLimit;

impl OAuthService {
	/// Stores `limit`, or replaces the quota of the record already covering the same
	/// (user, scope). Returns the id of the authoritative record.
	pub async fn upsert_user_rate_limit(&self, limit: UserRateLimit) -> Result<RateLimitId> {
		obs::observe(C, "upsert_user_rate_limit", async move {
			Ok(self.store.upsert_rate_limit(limit).await?)
		})
		.await
	}

	/// Lists the records owned by `name`, optionally narrowed to one id.
	pub async fn get_user_rate_limits(
		&self,
		name: &UserName,
		id: Option<&RateLimitId>,
	) -> Result<Vec<UserRateLimit>> {
		obs::observe(C, "get_user_rate_limits", async move {
			Ok(self.store.rate_limits(name, id).await?)
		})
		.await
	}

	/// Removes a record; fails with [`Error::NotFound`] if the id is unknown.
	pub async fn del_user_rate_limit(&self, id: &RateLimitId) -> Result<()> {
		obs::observe(C, "del_user_rate_limit", async move {
			if !self.store.delete_rate_limit(id).await? {
				return Err(Error::not_found(Entity::RateLimit, id));
			}

			Ok(())
		})
		.await
	}
}
