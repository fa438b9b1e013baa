//! User directory operations.

// self
use crate::{
	_prelude::*,
	auth::{Lifecycle, MinerAddr, NewUser, Page, User, UserFilter, UserName, UserPatch},
	obs::{self, Component},
	service::OAuthService,
	store::Entity,
};

const C: Component = Component::User;

impl OAuthService {
	/// Creates a user; fails with [`Error::AlreadyExists`] if any row holds the name,
	/// including a soft-deleted one.
	pub async fn create_user(&self, new: NewUser) -> Result<User> {
		obs::observe(C, "create_user", async move {
			let user = User::from_new(new, OffsetDateTime::now_utc());

			self.store.put_user(user.clone()).await?;

			Ok(user)
		})
		.await
	}

	/// Applies the fields set in `patch` to an active user.
	pub async fn update_user(&self, patch: &UserPatch) -> Result<()> {
		obs::observe(C, "update_user", async move {
			if !self.store.update_user(patch, OffsetDateTime::now_utc()).await? {
				return Err(Error::not_found(Entity::User, &patch.name));
			}

			Ok(())
		})
		.await
	}

	/// Returns an active user.
	pub async fn get_user(&self, name: &UserName) -> Result<User> {
		obs::observe(C, "get_user", async move {
			self.store
				.get_user(name)
				.await?
				.filter(|u| u.lifecycle.is_active())
				.ok_or_else(|| Error::not_found(Entity::User, name))
		})
		.await
	}

	/// Returns the stored user row, deleted or not.
	pub async fn get_user_record(&self, name: &UserName) -> Result<User> {
		obs::observe(C, "get_user_record", async move {
			self.store.get_user(name).await?.ok_or_else(|| Error::not_found(Entity::User, name))
		})
		.await
	}

	/// Returns `true` if an active user holds `name`.
	pub async fn has_user(&self, name: &UserName) -> Result<bool> {
		obs::observe(C, "has_user", async move {
			Ok(self.store.get_user(name).await?.is_some_and(|u| u.lifecycle.is_active()))
		})
		.await
	}

	/// Lists active users matching `filter` in creation order.
	pub async fn list_users(&self, filter: &UserFilter, page: Page) -> Result<Vec<User>> {
		obs::observe(C, "list_users", async move { Ok(self.store.list_users(filter, page).await?) })
			.await
	}

	/// Soft-deletes a user; unknown or already deleted users are left as they are.
	pub async fn delete_user(&self, name: &UserName) -> Result<()> {
		obs::observe(C, "delete_user", async move {
			self.store.set_user_lifecycle(name, Lifecycle::Deleted, OffsetDateTime::now_utc()).await?;

			Ok(())
		})
		.await
	}

	/// Restores a soft-deleted user; fails with [`Error::NotFound`] if no row holds `name`.
	pub async fn recover_user(&self, name: &UserName) -> Result<()> {
		obs::observe(C, "recover_user", async move {
			if !self
				.store
				.set_user_lifecycle(name, Lifecycle::Active, OffsetDateTime::now_utc())
				.await?
			{
				return Err(Error::not_found(Entity::User, name));
			}

			Ok(())
		})
		.await
	}

	/// Resolves the active owner of `miner`.
	pub async fn get_user_by_miner(&self, miner: &MinerAddr) -> Result<User> {
		obs::observe(C, "get_user_by_miner", async move {
			let mapping = self
				.store
				.get_miner(miner)
				.await?
				.ok_or_else(|| Error::not_found(Entity::Miner, miner))?;

			self.store
				.get_user(&mapping.user)
				.await?
				.filter(|u| u.lifecycle.is_active())
				.ok_or_else(|| Error::not_found(Entity::User, &mapping.user))
		})
		.await
	}
}
