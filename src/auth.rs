//! Identity domain: identifiers, permission scopes, token records, users, miners, and
//! rate-limit records.

pub mod id;
pub mod lifecycle;
pub mod miner;
pub mod page;
pub mod perm;
pub mod rate_limit;
pub mod token;
pub mod user;

pub use id::*;
pub use lifecycle::*;
pub use miner::*;
pub use page::*;
pub use perm::*;
pub use rate_limit::*;
pub use token::{claims::*, codec::*, record::*, secret::*};
pub use user::*;
