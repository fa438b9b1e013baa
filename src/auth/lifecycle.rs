//! Soft-delete lifecycle shared by token and user records.

// self
use crate::_prelude::*;

/// Lifecycle state of a soft-deletable record.
///
/// Deleted records keep every field for audit and can transition back to
/// [`Lifecycle::Active`]; read paths that serve live traffic only see active rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
	/// Record is live.
	#[default]
	Active,
	/// Record is soft-deleted.
	Deleted,
}
impl Lifecycle {
	/// Returns `true` for [`Lifecycle::Active`].
	pub const fn is_active(self) -> bool {
		matches!(self, Lifecycle::Active)
	}

	/// Returns `true` for [`Lifecycle::Deleted`].
	pub const fn is_deleted(self) -> bool {
		matches!(self, Lifecycle::Deleted)
	}

	/// Relational column encoding (`is_deleted`).
	pub const fn as_flag(self) -> i64 {
		match self {
			Lifecycle::Active => 0,
			Lifecycle::Deleted => 1,
		}
	}

	/// Decodes the relational `is_deleted` column; any non-zero value means deleted.
	pub const fn from_flag(flag: i64) -> Self {
		if flag == 0 { Lifecycle::Active } else { Lifecycle::Deleted }
	}
}
