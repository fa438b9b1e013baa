//! Token claims, wire codec, persisted records, and secret material.

pub mod claims;
pub mod codec;
pub mod record;
pub mod secret;
