//! The spatial index seam, the block ranges it returns, and the planning
//! applied to them before any data is read.

pub mod mem;
pub mod merge;
pub mod planner;

use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use anyhow::Result;

use crate::sel::{BoundingBox, Dim, Group};

/// An inclusive, contiguous run of record indices in on-disk order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct BlockRange {
	pub start: u64,
	pub end: u64,
}

impl BlockRange {
	pub fn new(start: u64, end: u64) -> Self {
		debug_assert!(start <= end, "BlockRange {start}..={end} is inverted");
		Self {
			start,
			end,
		}
	}

	/// The number of records covered, both ends included
	pub fn len(&self) -> u64 {
		self.end - self.start + 1
	}

	/// The signed distance from this block's start to another block's end
	pub fn start_gap_to(&self, other: &BlockRange) -> i64 {
		self.start as i64 - other.end as i64
	}

	/// The signed number of records between the end of this block and the
	/// start of the next one
	pub fn gap_before(&self, next: &BlockRange) -> i64 {
		next.start as i64 - self.end as i64
	}
}

impl Default for BlockRange {
	fn default() -> Self {
		Self {
			start: 0,
			end: 0,
		}
	}
}

/// A first-level block, optionally narrowed to finer sub-ranges by the
/// index. Sub-ranges are keyed by their start record.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Block {
	pub range: BlockRange,
	pub subranges: BTreeMap<u64, BlockRange>,
}

impl Block {
	pub fn new(range: BlockRange) -> Self {
		Self {
			range,
			subranges: BTreeMap::new(),
		}
	}

	pub fn with_subranges(range: BlockRange, subranges: impl IntoIterator<Item = BlockRange>) -> Self {
		Self {
			range,
			subranges: subranges.into_iter().map(|r| (r.start, r)).collect(),
		}
	}

	/// The ranges this block contributes to a read: its sub-ranges when the
	/// index narrowed it, otherwise the whole block
	pub fn selected(&self) -> Vec<BlockRange> {
		if self.subranges.is_empty() {
			vec![self.range]
		} else {
			self.subranges.values().copied().collect()
		}
	}

	/// The number of records this block contributes to a read
	pub fn selected_len(&self) -> u64 {
		self.selected().iter().map(BlockRange::len).sum()
	}
}

/// Blocks keyed by their start record.
pub type BlockMap = BTreeMap<u64, Block>;

/// The answer to one index query.
#[derive(Clone, Debug, PartialEq)]
pub enum BlockQueryResult {
	/// An ordered sequence of matching ranges
	Ranges(Vec<BlockRange>),
	/// First-level blocks keyed by start, possibly with sub-ranges
	Blocks(BlockMap),
}

/// A client to an externally built spatial index.
///
/// All calls block the caller. Failures are returned to the caller and
/// never retried.
pub trait IndexClient {
	/// The finest matching ranges inside the box
	fn query_by_xyz(&self, key: &str, bbox: &BoundingBox) -> Result<Vec<BlockRange>>;

	/// The first-level blocks inside the box, each narrowed to the sub-ranges
	/// which also match
	fn query_by_block_xyz(&self, key: &str, bbox: &BoundingBox) -> Result<BlockMap>;

	/// The first-level blocks inside the box, without sub-ranges
	fn query_by_only_block_xyz(&self, key: &str, bbox: &BoundingBox) -> Result<BlockMap>;

	/// The ranges of a single-dimension min-max index overlapping `[lower, upper]`
	fn query_min_max_data(&self, key: &str, lower: f64, upper: f64) -> Result<Vec<BlockRange>>;
}

impl<T: IndexClient + ?Sized> IndexClient for &T {
	fn query_by_xyz(&self, key: &str, bbox: &BoundingBox) -> Result<Vec<BlockRange>> {
		(**self).query_by_xyz(key, bbox)
	}

	fn query_by_block_xyz(&self, key: &str, bbox: &BoundingBox) -> Result<BlockMap> {
		(**self).query_by_block_xyz(key, bbox)
	}

	fn query_by_only_block_xyz(&self, key: &str, bbox: &BoundingBox) -> Result<BlockMap> {
		(**self).query_by_only_block_xyz(key, bbox)
	}

	fn query_min_max_data(&self, key: &str, lower: f64, upper: f64) -> Result<Vec<BlockRange>> {
		(**self).query_min_max_data(key, lower, upper)
	}
}

type KeyFn = dyn Fn(u64, &str, Group, Option<Dim>) -> String + Send + Sync;

/// Builds the index key for a group of one species at one iteration.
#[derive(Clone)]
pub struct KeyFormat(Arc<KeyFn>);

impl KeyFormat {
	pub fn new<F>(f: F) -> Self
	where
		F: Fn(u64, &str, Group, Option<Dim>) -> String + Send + Sync + 'static,
	{
		Self(Arc::new(f))
	}

	pub fn key(&self, iteration: u64, species: &str, group: Group, dim: Option<Dim>) -> String {
		(self.0)(iteration, species, group, dim)
	}
}

impl Default for KeyFormat {
	fn default() -> Self {
		Self::new(default_key)
	}
}

impl Debug for KeyFormat {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str("KeyFormat")
	}
}

/// `/data/{iteration}/particles/{species}/{group}/` followed by the
/// dimension, when one is given
pub fn default_key(iteration: u64, species: &str, group: Group, dim: Option<Dim>) -> String {
	let dim = dim.map_or("", |d| d.as_str());
	format!("/data/{iteration}/particles/{species}/{group}/{dim}")
}

/// The key prefix for one species at one iteration.
#[derive(Debug, Clone)]
pub struct IndexKeyBase {
	inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
	iteration: u64,
	species: String,
	format: KeyFormat,
}

impl IndexKeyBase {
	pub fn new(iteration: u64, species: &str, format: KeyFormat) -> Self {
		Self {
			inner: Arc::new(Inner {
				iteration,
				species: species.to_string(),
				format,
			}),
		}
	}

	/// The key of a bounding-box index over a whole group
	pub fn new_group_key(&self, group: Group) -> String {
		self.inner.format.key(self.inner.iteration, &self.inner.species, group, None)
	}

	/// The key of a min-max index over one dimension of a group
	pub fn new_dim_key(&self, group: Group, dim: Option<Dim>) -> String {
		self.inner.format.key(self.inner.iteration, &self.inner.species, group, dim)
	}
}
