//! Token issuance, verification, revocation, and lookups.

// self
use crate::{
	_prelude::*,
	auth::{self, JwtPayload, KeyPair, Lifecycle, Page, TokenInfo, UserName},
	obs::{self, Component},
	service::OAuthService,
	store::{Entity, StoreError},
};

const C: Component = Component::Token;
// Token strings are credentials; errors never echo them.
const REDACTED: &str = "<token>";

impl OAuthService {
	/// Signs `payload`, records the token, and returns it.
	///
	/// Signing is deterministic, so issuing an identical payload twice fails with
	/// [`Error::AlreadyExists`] on the second call.
	pub async fn generate_token(&self, payload: JwtPayload) -> Result<String> {
		obs::observe(C, "generate_token", async move {
			let token = auth::encode(&payload, &self.secret)
				.map_err(|e| Error::Storage(StoreError::serialization(e)))?;
			let pair = KeyPair::issue(token.clone(), &payload, OffsetDateTime::now_utc());

			self.store.put_token(pair).await?;

			Ok(token)
		})
		.await
	}

	/// Checks `token` and returns the claims it carries.
	///
	/// A bad signature or shape fails with [`Error::VerificationFailed`]. A well-signed
	/// token that was never recorded, or has been removed, fails with
	/// [`Error::NonRegisteredToken`] either way.
	pub async fn verify(&self, token: &str) -> Result<JwtPayload> {
		obs::observe(C, "verify", async move {
			let payload =
				auth::decode(token, &self.secret).map_err(|_| Error::VerificationFailed)?;

			match self.store.get_token(token).await? {
				Some(pair) if pair.is_active() => Ok(payload),
				_ => Err(Error::NonRegisteredToken),
			}
		})
		.await
	}

	/// Revokes `token`; already revoked or unknown tokens are left as they are.
	pub async fn remove_token(&self, token: &str) -> Result<()> {
		obs::observe(C, "remove_token", async move {
			self.store.set_token_lifecycle(token, Lifecycle::Deleted).await?;

			Ok(())
		})
		.await
	}

	/// Restores a revoked token; fails with [`Error::NotFound`] if it was never issued.
	pub async fn recover_token(&self, token: &str) -> Result<()> {
		obs::observe(C, "recover_token", async move {
			if !self.store.set_token_lifecycle(token, Lifecycle::Active).await? {
				return Err(Error::not_found(Entity::Token, REDACTED));
			}

			Ok(())
		})
		.await
	}

	/// Returns the public view of an active token.
	pub async fn get_token(&self, token: &str) -> Result<TokenInfo> {
		obs::observe(C, "get_token", async move {
			self.store
				.get_token(token)
				.await?
				.filter(KeyPair::is_active)
				.map(TokenInfo::from)
				.ok_or_else(|| Error::not_found(Entity::Token, REDACTED))
		})
		.await
	}

	/// Returns the full stored record, revoked or not.
	pub async fn get_token_record(&self, token: &str) -> Result<KeyPair> {
		obs::observe(C, "get_token_record", async move {
			self.store.get_token(token).await?.ok_or_else(|| Error::not_found(Entity::Token, REDACTED))
		})
		.await
	}

	/// Lists the active tokens held by `name`; empty when it holds none.
	pub async fn get_token_by_name(&self, name: &UserName) -> Result<Vec<TokenInfo>> {
		obs::observe(C, "get_token_by_name", async move {
			Ok(self.store.tokens_by_name(name).await?.into_iter().map(TokenInfo::from).collect())
		})
		.await
	}

	/// Lists active tokens in issue order.
	pub async fn tokens(&self, page: Page) -> Result<Vec<TokenInfo>> {
		obs::observe(C, "tokens", async move {
			Ok(self.store.list_tokens(page).await?.into_iter().map(TokenInfo::from).collect())
		})
		.await
	}
}
