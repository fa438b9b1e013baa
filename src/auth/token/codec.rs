//! Compact three-segment token codec (`header.claims.signature`, HS256).
//!
//! Segments are emitted as unpadded base64url. Decoding is lenient about padding and
//! alphabet because tokens minted by other tooling in the fleet are not always
//! normalized; the signature is always checked before the claims are parsed.

// crates.io
use base64::{
	Engine as _,
	engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD},
};
// self
use crate::{
	_prelude::*,
	auth::{JwtPayload, SecretStore},
};

const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;
const ALGORITHM: &str = "HS256";

/// Failures raised while encoding or decoding tokens.
#[derive(Debug, ThisError)]
pub enum CodecError {
	/// The token does not have exactly three dot-separated segments.
	#[error("Token is not made of three segments.")]
	Malformed,
	/// A segment is not valid base64.
	#[error("Token segment is not valid base64.")]
	Base64(#[from] base64::DecodeError),
	/// The signature does not match the signing input.
	#[error("Token signature does not match.")]
	SignatureMismatch,
	/// The header names an algorithm other than HS256.
	#[error("Token uses unsupported algorithm `{alg}`.")]
	UnsupportedAlgorithm {
		/// Algorithm named by the header.
		alg: String,
	},
	/// The header or claims segment is not the expected JSON.
	#[error("Token JSON is invalid at `{}`.", .0.path())]
	Json(#[from] serde_path_to_error::Error<serde_json::Error>),
	/// Claims could not be serialized.
	#[error("Token claims could not be serialized.")]
	Serialize(#[source] serde_json::Error),
}

#[derive(Deserialize)]
struct Header {
	alg: String,
}

/// Signs `payload` and returns the compact token string.
pub fn encode(payload: &JwtPayload, secret: &SecretStore) -> Result<String, CodecError> {
	let claims = serde_json::to_vec(payload).map_err(CodecError::Serialize)?;
	let mut token = format!(
		"{}.{}",
		URL_SAFE_NO_PAD.encode(HEADER_JSON),
		URL_SAFE_NO_PAD.encode(claims)
	);
	let signature = secret.sign(token.as_bytes());

	token.push('.');
	token.push_str(&URL_SAFE_NO_PAD.encode(signature));

	Ok(token)
}

/// Verifies the signature of `token` and returns its claims.
pub fn decode(token: &str, secret: &SecretStore) -> Result<JwtPayload, CodecError> {
	let (signing_input, signature) = token.rsplit_once('.').ok_or(CodecError::Malformed)?;
	let (header, claims) = signing_input.split_once('.').ok_or(CodecError::Malformed)?;

	if claims.contains('.') {
		return Err(CodecError::Malformed);
	}
	if !secret.verify(signing_input.as_bytes(), &decode_segment(signature)?) {
		return Err(CodecError::SignatureMismatch);
	}

	let header: Header = parse_json(&decode_segment(header)?)?;

	if header.alg != ALGORITHM {
		return Err(CodecError::UnsupportedAlgorithm { alg: header.alg });
	}

	parse_json(&decode_segment(claims)?)
}

/// Decodes one base64 segment, accepting padded or unpadded input in either the url-safe
/// or the standard alphabet.
pub fn decode_segment(segment: impl AsRef<[u8]>) -> Result<Vec<u8>, base64::DecodeError> {
	let segment = segment.as_ref();
	let trimmed = segment.strip_suffix(b"==").or_else(|| segment.strip_suffix(b"=")).unwrap_or(segment);

	URL_SAFE_NO_PAD.decode(trimmed).or_else(|_| STANDARD_NO_PAD.decode(trimmed))
}

fn parse_json<T>(bytes: &[u8]) -> Result<T, CodecError>
where
	T: for<'de> Deserialize<'de>,
{
	let de = &mut serde_json::Deserializer::from_slice(bytes);

	Ok(serde_path_to_error::deserialize(de)?)
}
