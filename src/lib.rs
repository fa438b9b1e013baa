//! Token and identity service for miner fleets: HMAC-signed access tokens, soft-deletable
//! users, miner ownership, and rate-limit records over pluggable relational or embedded
//! key-value stores.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod obs;
pub mod service;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test`
	//! crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{JwtPayload, Perm, SecretStore, UserName},
		service::OAuthService,
		store::{AuthStore, MemoryStore},
	};

	/// Builds a service backed by a fresh in-memory store and a random signing secret.
	pub fn build_memory_service() -> (OAuthService, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn AuthStore> = store_backend.clone();
		let service = OAuthService::new(SecretStore::random(), store);

		(service, store_backend)
	}

	/// Parses a user name fixture.
	pub fn user_name(value: &str) -> UserName {
		UserName::new(value).expect("User name fixture should be valid.")
	}

	/// Builds a token payload fixture.
	pub fn payload(name: &str, perm: Perm, ext: &str) -> JwtPayload {
		JwtPayload::new(user_name(name), perm, ext)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, HashSet},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::{Error, Result};
}

#[cfg(test)] use {color_eyre as _, tempfile as _};
