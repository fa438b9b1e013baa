//! Wire-level request and response types for the request adapter.
//!
//! No HTTP framework is linked; an adapter deserializes one of these requests, calls the
//! matching [`OAuthService`] operation, and turns the outcome into a [`Reply`].

// self
use crate::{
	_prelude::*,
	auth::{
		JwtPayload, MinerAddr, Page, Perm, RateLimitId, RequestQuota, TokenInfo, UserFilter,
		UserName, UserRateLimit,
	},
	error::{ErrorBody, ValidationError},
	service::OAuthService,
};

/// Body of `Verify`, `RemoveToken`, and `RecoverToken`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
	/// Signed token string.
	#[serde(default)]
	pub token: String,
}
impl TokenRequest {
	/// Returns the token, rejecting an absent or blank value.
	pub fn token(&self) -> Result<&str, ValidationError> {
		match self.token.trim() {
			"" => Err(ValidationError::MissingField { field: "token" }),
			token => Ok(token),
		}
	}
}

/// Claims returned by a successful `Verify`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
	/// Owning identity.
	pub name: UserName,
	/// Permission scope.
	pub perm: Perm,
	/// Free-form payload.
	pub extra: String,
}
impl From<JwtPayload> for VerifyResponse {
	fn from(payload: JwtPayload) -> Self {
		Self { name: payload.name, perm: payload.perm, extra: payload.extra }
	}
}

/// Body of `GenerateToken`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateTokenRequest {
	/// Owning identity.
	pub name: UserName,
	/// Permission scope.
	pub perm: Perm,
	/// Free-form payload.
	#[serde(default)]
	pub extra: String,
}
impl From<GenerateTokenRequest> for JwtPayload {
	fn from(request: GenerateTokenRequest) -> Self {
		JwtPayload::new(request.name, request.perm, request.extra)
	}
}

/// Result of `GenerateToken`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateTokenResponse {
	/// Newly issued token.
	pub token: String,
}

/// Body of `GetToken`; exactly one of `token` or `name` must be non-empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTokenRequest {
	/// Token to look up.
	#[serde(default)]
	pub token: Option<String>,
	/// Owner whose tokens to list.
	#[serde(default)]
	pub name: Option<String>,
}
impl GetTokenRequest {
	/// Resolves which lookup the caller asked for.
	pub fn lookup(&self) -> Result<TokenLookup, ValidationError> {
		let token = self.token.as_deref().filter(|t| !t.is_empty());
		let name = self.name.as_deref().filter(|n| !n.is_empty());

		match (token, name) {
			(Some(token), None) => Ok(TokenLookup::Token(token.to_owned())),
			(None, Some(name)) => Ok(TokenLookup::Name(UserName::new(name)?)),
			_ => Err(ValidationError::ExactlyOne { first: "token", second: "name" }),
		}
	}
}

/// Lookup selected by a [`GetTokenRequest`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenLookup {
	/// Single token by value.
	Token(String),
	/// Every active token of one owner.
	Name(UserName),
}

/// Result of `GetToken`: one record for a token lookup, a list for a name lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GetTokenResponse {
	/// Token lookup.
	One(TokenInfo),
	/// Owner lookup.
	Many(Vec<TokenInfo>),
}

/// Pagination parameters accepted in either skip/limit or page-index/page-size form.
///
/// When `page_index` is present it wins over `skip`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
	/// Rows to skip.
	#[serde(default)]
	pub skip: Option<i64>,
	/// Maximum rows to return.
	#[serde(default)]
	pub limit: Option<i64>,
	/// One-based page number.
	#[serde(default)]
	pub page_index: Option<i64>,
	/// Rows per page when `page_index` is used.
	#[serde(default)]
	pub page_size: Option<i64>,
}
impl PageRequest {
	/// Normalizes the parameters into clamped bounds.
	pub fn page(&self) -> Page {
		match self.page_index {
			Some(index) => Page::from_index(index, self.page_size.or(self.limit).unwrap_or_default()),
			None => Page::new(self.skip.unwrap_or_default(), self.limit.unwrap_or_default()),
		}
	}
}

/// Body of `ListUsers`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListUsersRequest {
	/// Pagination.
	#[serde(flatten)]
	pub page: PageRequest,
	/// Optional filters, combined with AND.
	#[serde(flatten)]
	pub filter: UserFilter,
}

/// Body of every operation keyed by a user name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNameRequest {
	/// Target user.
	pub name: UserName,
}

/// Body of `GetUserByMiner`, `HasMiner`, and `DelMiner`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerRequest {
	/// Miner address.
	pub miner: MinerAddr,
}

/// Body of `UpsertMiner`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertMinerRequest {
	/// Miner address.
	pub miner: MinerAddr,
	/// New owner.
	pub user: UserName,
}

/// Result of `UpsertMiner`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertMinerResponse {
	/// `true` when the mapping did not exist before.
	pub created: bool,
}

/// Result of `DelMiner`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelMinerResponse {
	/// `true` when a mapping was removed.
	pub existed: bool,
}

/// Body of `UpsertUserRateLimit`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertRateLimitRequest {
	/// Owning user.
	pub name: UserName,
	/// API scope; absent or empty means global.
	#[serde(default)]
	pub api: Option<String>,
	/// Requests allowed per window.
	pub cap: u64,
	/// Window length in seconds.
	pub window: i64,
}
impl UpsertRateLimitRequest {
	/// Validates the quota and builds a fresh record.
	pub fn into_record(self) -> Result<UserRateLimit, ValidationError> {
		let quota = RequestQuota::new(self.cap, Duration::seconds(self.window))?;

		Ok(UserRateLimit::new(self.name, self.api, quota))
	}
}

/// Body of `GetUserRateLimits`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRateLimitsRequest {
	/// Owning user.
	pub name: UserName,
	/// Optional id narrowing the result.
	#[serde(default)]
	pub id: Option<RateLimitId>,
}

/// Body of `DelUserRateLimit` and result of `UpsertUserRateLimit`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitIdBody {
	/// Record id.
	pub id: RateLimitId,
}

/// Status and JSON body an adapter should answer with.
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
	/// HTTP status code.
	pub status: u16,
	/// JSON body; `None` for mutating operations with nothing to return.
	pub body: Option<serde_json::Value>,
}
impl Reply {
	/// Maps an operation outcome to `200` + payload, or the error's status + [`ErrorBody`].
	pub fn from_result<T>(result: Result<T>) -> Self
	where
		T: Serialize,
	{
		match result {
			Ok(value) => match serde_json::to_value(value) {
				Ok(serde_json::Value::Null) => Self { status: 200, body: None },
				Ok(body) => Self { status: 200, body: Some(body) },
				Err(e) => Self::error(&Error::Storage(crate::store::StoreError::serialization(e))),
			},
			Err(e) => Self::error(&e),
		}
	}

	fn error(e: &Error) -> Self {
		Self { status: e.status_code(), body: serde_json::to_value(ErrorBody::from(e)).ok() }
	}
}

impl OAuthService {
	/// Serves a `Verify` request.
	pub async fn handle_verify(&self, request: &TokenRequest) -> Result<VerifyResponse> {
		self.verify(request.token()?).await.map(VerifyResponse::from)
	}

	/// Serves a `RemoveToken` request.
	pub async fn handle_remove_token(&self, request: &TokenRequest) -> Result<()> {
		self.remove_token(request.token()?).await
	}

	/// Serves a `RecoverToken` request.
	pub async fn handle_recover_token(&self, request: &TokenRequest) -> Result<()> {
		self.recover_token(request.token()?).await
	}

	/// Serves a `GetToken` request in either of its two forms.
	pub async fn lookup_token(&self, request: &GetTokenRequest) -> Result<GetTokenResponse> {
		match request.lookup()? {
			TokenLookup::Token(token) => self.get_token(&token).await.map(GetTokenResponse::One),
			TokenLookup::Name(name) => self.get_token_by_name(&name).await.map(GetTokenResponse::Many),
		}
	}
}
