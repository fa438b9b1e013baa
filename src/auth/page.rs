//! Pagination bounds for list operations.

// self
use crate::_prelude::*;

/// Clamped `skip`/`limit` window applied to list operations.
///
/// Lists are ordered by creation time (ties broken by key) so consecutive pages are
/// disjoint and stable while the underlying set is unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
	/// Number of rows skipped.
	pub skip: u64,
	/// Maximum number of rows returned.
	pub limit: u64,
}
impl Page {
	/// Limit applied when the caller passes zero or a negative value.
	pub const DEFAULT_LIMIT: u64 = 20;
	/// Upper bound for any single page.
	pub const MAX_LIMIT: u64 = 1000;

	/// Builds a page from raw request values: negative `skip` becomes `0`, non-positive
	/// `limit` becomes [`Page::DEFAULT_LIMIT`], and `limit` is capped at [`Page::MAX_LIMIT`].
	pub fn new(skip: i64, limit: i64) -> Self {
		let skip = skip.max(0) as u64;
		let limit = if limit <= 0 { Self::DEFAULT_LIMIT } else { (limit as u64).min(Self::MAX_LIMIT) };

		Self { skip, limit }
	}

	/// Largest offset any backend accepts; SQL offsets are signed 64-bit.
	pub const MAX_SKIP: u64 = i64::MAX as u64;

	/// Builds a page from the page-index/page-size request form; `index` is 1-based.
	pub fn from_index(index: i64, size: i64) -> Self {
		let limit = Self::new(0, size).limit;
		let index = index.max(1) as u64;

		Self { skip: (index - 1).saturating_mul(limit).min(Self::MAX_SKIP), limit }
	}

	/// Offset as a signed SQL bind value, saturating at [`Page::MAX_SKIP`].
	pub fn sql_offset(self) -> i64 {
		i64::try_from(self.skip).unwrap_or(i64::MAX)
	}

	/// Applies the window to an already-ordered iterator.
	pub fn apply<T>(self, items: impl IntoIterator<Item = T>) -> Vec<T> {
		items
			.into_iter()
			.skip(usize::try_from(self.skip).unwrap_or(usize::MAX))
			.take(usize::try_from(self.limit).unwrap_or(usize::MAX))
			.collect()
	}
}
impl Default for Page {
	fn default() -> Self {
		Self { skip: 0, limit: Self::DEFAULT_LIMIT }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn raw_values_are_clamped() {
		assert_eq!(Page::new(-5, 10), Page { skip: 0, limit: 10 });
		assert_eq!(Page::new(3, 0), Page { skip: 3, limit: Page::DEFAULT_LIMIT });
		assert_eq!(Page::new(3, -1), Page { skip: 3, limit: Page::DEFAULT_LIMIT });
		assert_eq!(Page::new(0, 50_000), Page { skip: 0, limit: Page::MAX_LIMIT });
	}

	#[test]
	fn page_index_is_one_based() {
		assert_eq!(Page::from_index(1, 10), Page { skip: 0, limit: 10 });
		assert_eq!(Page::from_index(3, 10), Page { skip: 20, limit: 10 });
		assert_eq!(Page::from_index(0, 10), Page { skip: 0, limit: 10 });
		assert_eq!(Page::from_index(2, 0), Page { skip: Page::DEFAULT_LIMIT, limit: Page::DEFAULT_LIMIT });
	}

	#[test]
	fn far_pages_stay_in_signed_range() {
		let far = Page::from_index(i64::MAX, 10);

		assert_eq!(far, Page { skip: Page::MAX_SKIP, limit: 10 });
		assert_eq!(far.sql_offset(), i64::MAX);
		assert_eq!(Page { skip: u64::MAX, limit: 10 }.sql_offset(), i64::MAX);
		assert!(far.apply(0..10).is_empty());
	}

	#[test]
	fn apply_slices_in_order() {
		let page = Page::new(2, 3);

		assert_eq!(page.apply(0..10), vec![2, 3, 4]);
		assert!(Page::new(20, 3).apply(0..10).is_empty());
	}
}
