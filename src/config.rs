//! Process configuration: signing secret and storage backend selection.
//!
//! ```json
//! { "secret_hex": "7f3a...", "store": { "backend": "sqlite", "url": "sqlite://auth.db" } }
//! ```

// std
use std::path::PathBuf;
// self
use crate::{
	_prelude::*,
	auth::SecretStore,
	error::ConfigError,
	service::OAuthService,
	store::{AuthStore, MemoryStore},
};

/// Top-level service configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
	/// Hex-encoded signing secret.
	pub secret_hex: String,
	/// Storage backend.
	#[serde(default)]
	pub store: StoreConfig,
}
impl ServiceConfig {
	/// Builds the service and upgrades its schema; fails rather than serve an
	/// unmigrated store.
	pub async fn open(&self) -> Result<OAuthService> {
		let secret = SecretStore::from_hex(&self.secret_hex)?;
		let store = self.store.open().await?;

		OAuthService::init(secret, store).await
	}
}
impl FromStr for ServiceConfig {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let de = &mut serde_json::Deserializer::from_str(s);

		Ok(serde_path_to_error::deserialize(de)?)
	}
}

/// Storage backend selection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
	/// Process-local store; contents vanish on exit.
	#[default]
	Memory,
	/// SQLite database.
	Sqlite {
		/// Connection URL, e.g. `sqlite://auth.db`.
		url: String,
		/// Pool size.
		#[serde(default = "default_max_connections")]
		max_connections: u32,
	},
	/// fjall database directory.
	Fjall {
		/// Directory holding the database files.
		path: PathBuf,
	},
}
impl StoreConfig {
	/// Label used in messages.
	pub const fn as_str(&self) -> &'static str {
		match self {
			StoreConfig::Memory => "memory",
			StoreConfig::Sqlite { .. } => "sqlite",
			StoreConfig::Fjall { .. } => "fjall",
		}
	}

	/// Opens the selected backend.
	pub async fn open(&self) -> Result<Arc<dyn AuthStore>> {
		match self {
			StoreConfig::Memory => Ok(Arc::new(MemoryStore::default())),
			#[cfg(feature = "sqlite")]
			StoreConfig::Sqlite { url, max_connections } => {
				Ok(Arc::new(crate::store::SqliteStore::connect(url, *max_connections).await?))
			},
			#[cfg(feature = "fjall")]
			StoreConfig::Fjall { path } => Ok(Arc::new(crate::store::FjallStore::open(path)?)),
			#[allow(unreachable_patterns)]
			other => Err(ConfigError::BackendDisabled { backend: other.as_str() }.into()),
		}
	}
}

fn default_max_connections() -> u32 {
	8
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parses_every_backend() {
		let sqlite: ServiceConfig = r#"{"secret_hex":"00ff","store":{"backend":"sqlite","url":"sqlite://a.db"}}"#
			.parse()
			.expect("SQLite config should parse.");
		let fjall: ServiceConfig =
			r#"{"secret_hex":"00ff","store":{"backend":"fjall","path":"/var/lib/auth"}}"#
				.parse()
				.expect("fjall config should parse.");
		let memory: ServiceConfig =
			r#"{"secret_hex":"00ff"}"#.parse().expect("Memory config should parse.");

		assert_eq!(
			sqlite.store,
			StoreConfig::Sqlite { url: "sqlite://a.db".into(), max_connections: 8 }
		);
		assert_eq!(fjall.store, StoreConfig::Fjall { path: "/var/lib/auth".into() });
		assert_eq!(memory.store, StoreConfig::Memory);
	}

	#[test]
	fn malformed_config_reports_the_path() {
		let error = r#"{"secret_hex":"00ff","store":{"backend":"sqlite"}}"#
			.parse::<ServiceConfig>()
			.expect_err("Missing url should be rejected.");

		assert!(matches!(error, ConfigError::Malformed(_)));
		assert!(error.to_string().contains("store"));
	}

	#[tokio::test]
	async fn open_rejects_bad_secrets() {
		let empty = ServiceConfig { secret_hex: String::new(), store: StoreConfig::Memory };
		let not_hex = ServiceConfig { secret_hex: "zz".into(), store: StoreConfig::Memory };

		assert!(matches!(empty.open().await, Err(Error::Config(ConfigError::EmptySecret))));
		assert!(matches!(
			not_hex.open().await,
			Err(Error::Config(ConfigError::InvalidSecretHex(_)))
		));
	}

	#[tokio::test]
	async fn open_migrates_the_store() {
		let secret = SecretStore::random();
		let config = ServiceConfig { secret_hex: secret.to_hex(), store: StoreConfig::Memory };
		let service = config.open().await.expect("Service should open.");

		assert_eq!(
			service.store().version().await.expect("Version should be readable."),
			crate::store::SCHEMA_V1
		);
	}
}
