//! Miner ownership mapping.

// self
use crate::{
	_prelude::*,
	auth::{MinerAddr, UserName},
};

/// Maps a miner address to its single owning user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Miner {
	/// Miner address.
	pub miner: MinerAddr,
	/// Owning user.
	pub user: UserName,
	/// Instant the mapping was first created.
	#[serde(with = "time::serde::rfc3339")]
	pub create_time: OffsetDateTime,
	/// Instant of the last reassignment.
	#[serde(with = "time::serde::rfc3339")]
	pub update_time: OffsetDateTime,
}
impl Miner {
	/// Creates a fresh mapping.
	pub fn new(miner: MinerAddr, user: UserName, now: OffsetDateTime) -> Self {
		Self { miner, user, create_time: now, update_time: now }
	}

	/// Reassigns the miner (last writer wins).
	pub fn reassign(&mut self, user: UserName, now: OffsetDateTime) {
		self.user = user;
		self.update_time = now;
	}
}
