//! Service-level error types shared across the token engine, directories, and stores.

// self
use crate::{
	_prelude::*,
	auth::IdentifierError,
	store::{Entity, StoreError},
};

/// Service-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical service error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Malformed or missing request fields; never retried.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Storage-layer failure not otherwise classified.
	#[error("{0}")]
	Storage(#[source] StoreError),

	/// The token was never issued or has been revoked.
	///
	/// Both cases share this variant so callers cannot probe revocation state.
	#[error("Token is not registered.")]
	NonRegisteredToken,
	/// The token is malformed or its signature does not match.
	#[error("Token verification failed.")]
	VerificationFailed,
	/// Referenced entity is absent.
	#[error("{entity} `{key}` was not found.")]
	NotFound {
		/// Kind of the missing entity.
		entity: Entity,
		/// Lookup key used by the caller.
		key: String,
	},
	/// Uniqueness violation on create.
	#[error("{entity} `{key}` already exists.")]
	AlreadyExists {
		/// Kind of the conflicting entity.
		entity: Entity,
		/// Conflicting key.
		key: String,
	},
}
impl Error {
	/// Builds a [`Error::NotFound`] for the provided entity + key.
	pub fn not_found(entity: Entity, key: impl Display) -> Self {
		Self::NotFound { entity, key: key.to_string() }
	}

	/// Returns `true` for authentication failures (unregistered or invalid token).
	pub fn is_unauthorized(&self) -> bool {
		matches!(self, Self::NonRegisteredToken | Self::VerificationFailed)
	}

	/// HTTP status the request adapter should answer with.
	pub fn status_code(&self) -> u16 {
		if self.is_unauthorized() { 401 } else { 400 }
	}
}
impl From<StoreError> for Error {
	fn from(e: StoreError) -> Self {
		match e {
			StoreError::Conflict { entity, key } => Self::AlreadyExists { entity, key },
			e => Self::Storage(e),
		}
	}
}
impl From<IdentifierError> for Error {
	fn from(e: IdentifierError) -> Self {
		Self::Validation(e.into())
	}
}

/// Request validation failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
	/// An identifier failed validation.
	#[error(transparent)]
	Identifier(#[from] IdentifierError),
	/// Permission label is not one of the supported scopes.
	#[error("Unknown permission `{label}`.")]
	UnknownPerm {
		/// Offending label.
		label: String,
	},
	/// A required field was empty.
	#[error("Field `{field}` is required.")]
	MissingField {
		/// Field name as seen on the wire.
		field: &'static str,
	},
	/// A lookup accepted exactly one of two fields but received none or both.
	#[error("Exactly one of `{first}` or `{second}` must be provided.")]
	ExactlyOne {
		/// First field name.
		first: &'static str,
		/// Second field name.
		second: &'static str,
	},
	/// Rate-limit window must be a positive whole number of seconds.
	#[error("Rate limit window must be a positive whole number of seconds.")]
	InvalidWindow,
}

/// Configuration and bootstrap failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// The signing secret is empty.
	#[error("Signing secret cannot be empty.")]
	EmptySecret,
	/// The signing secret is not valid hex.
	#[error("Signing secret is not valid hex.")]
	InvalidSecretHex(#[from] hex::FromHexError),
	/// The MAC rejected the key material.
	#[error("Signing secret has an invalid length.")]
	InvalidKeyLength,
	/// The configured backend was not compiled into this build.
	#[error("Store backend `{backend}` is not enabled in this build.")]
	BackendDisabled {
		/// Backend label from the configuration.
		backend: &'static str,
	},
	/// Schema migration did not complete; the service must not start.
	#[error("Schema migration failed.")]
	Migration {
		/// Underlying store failure.
		#[source]
		source: StoreError,
	},
	/// The configuration document does not match the expected shape.
	#[error("Configuration is invalid at `{}`.", .0.path())]
	Malformed(#[from] serde_path_to_error::Error<serde_json::Error>),
}

/// JSON body returned alongside 4xx statuses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	/// Human-readable error message.
	pub error: String,
}
impl From<&Error> for ErrorBody {
	fn from(e: &Error) -> Self {
		Self { error: e.to_string() }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_service_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let service_error: Error = store_error.clone().into();

		assert!(matches!(service_error, Error::Storage(_)));
		assert!(service_error.to_string().contains("database unreachable"));

		let source = StdError::source(&service_error)
			.expect("Service error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn conflicts_surface_as_already_exists() {
		let error: Error = StoreError::Conflict { entity: Entity::User, key: "alice".into() }.into();

		assert!(matches!(error, Error::AlreadyExists { entity: Entity::User, .. }));
		assert_eq!(error.status_code(), 400);
	}

	#[test]
	fn authentication_failures_map_to_401() {
		assert_eq!(Error::NonRegisteredToken.status_code(), 401);
		assert_eq!(Error::VerificationFailed.status_code(), 401);
		assert_eq!(Error::not_found(Entity::Token, "t").status_code(), 400);
		assert_eq!(
			Error::from(ValidationError::MissingField { field: "token" }).status_code(),
			400
		);
	}

	#[test]
	fn error_body_serializes_message() {
		let body = ErrorBody::from(&Error::NonRegisteredToken);
		let json = serde_json::to_string(&body).expect("Error body should serialize to JSON.");

		assert_eq!(json, r#"{"error":"Token is not registered."}"#);
	}
}
