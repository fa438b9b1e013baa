//! Signing key holder and redacting wrappers for secret material.

// crates.io
use hmac::{Hmac, Mac};
use sha2::Sha256;
// self
use crate::{_prelude::*, error::ConfigError};

type HmacSha256 = Hmac<Sha256>;

/// Redacted wrapper for per-token secret material, kept out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Generates 32 random bytes, hex encoded.
	pub fn random() -> Self {
		Self(hex::encode(rand::random::<[u8; 32]>()))
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Process signing secret, keyed once into an HMAC-SHA-256 instance.
///
/// The key is immutable after construction; each service instance owns its own store so
/// independently keyed instances can coexist in one process.
#[derive(Clone)]
pub struct SecretStore {
	key: Arc<[u8]>,
	mac: HmacSha256,
}
impl SecretStore {
	/// Keys the store with raw secret bytes.
	pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, ConfigError> {
		let secret = secret.as_ref();

		if secret.is_empty() {
			return Err(ConfigError::EmptySecret);
		}

		let mac = HmacSha256::new_from_slice(secret).map_err(|_| ConfigError::InvalidKeyLength)?;

		Ok(Self { key: Arc::from(secret), mac })
	}

	/// Keys the store with a hex-encoded secret.
	pub fn from_hex(secret: &str) -> Result<Self, ConfigError> {
		Self::new(hex::decode(secret.trim())?)
	}

	/// Generates a random 32-byte secret.
	pub fn random() -> Self {
		let secret = rand::random::<[u8; 32]>();
		let mac = HmacSha256::new_from_slice(&secret)
			.unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));

		Self { key: Arc::from(secret.as_slice()), mac }
	}

	/// Exports the secret as hex so operators can persist it in configuration.
	pub fn to_hex(&self) -> String {
		hex::encode(&self.key)
	}

	/// Computes the MAC over `message`.
	pub fn sign(&self, message: &[u8]) -> Vec<u8> {
		let mut mac = self.mac.clone();

		mac.update(message);

		mac.finalize().into_bytes().to_vec()
	}

	/// Checks `signature` against `message` in constant time.
	pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
		let mut mac = self.mac.clone();

		mac.update(message);

		mac.verify_slice(signature).is_ok()
	}
}
impl Debug for SecretStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("SecretStore").field(&"<redacted>").finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = TokenSecret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
		assert_eq!(format!("{:?}", SecretStore::random()), "SecretStore(\"<redacted>\")");
	}

	#[test]
	fn empty_and_malformed_secrets_are_rejected() {
		assert!(matches!(SecretStore::new(b""), Err(ConfigError::EmptySecret)));
		assert!(matches!(SecretStore::from_hex("zz"), Err(ConfigError::InvalidSecretHex(_))));
	}

	#[test]
	fn hex_export_round_trips_the_key() {
		let store = SecretStore::random();
		let reloaded =
			SecretStore::from_hex(&store.to_hex()).expect("Exported secret should reload.");
		let signature = store.sign(b"payload");

		assert!(reloaded.verify(b"payload", &signature));
		assert_eq!(store.to_hex().len(), 64);
	}

	#[test]
	fn verification_rejects_other_keys_and_messages() {
		let a = SecretStore::new(b"key-a").expect("Fixture secret should be valid.");
		let b = SecretStore::new(b"key-b").expect("Fixture secret should be valid.");
		let signature = a.sign(b"message");

		assert!(a.verify(b"message", &signature));
		assert!(!a.verify(b"other", &signature));
		assert!(!b.verify(b"message", &signature));
	}

	#[test]
	fn random_token_secrets_differ() {
		assert_ne!(TokenSecret::random(), TokenSecret::random());
		assert_eq!(TokenSecret::random().expose().len(), 64);
	}
}
