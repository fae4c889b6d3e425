//! An in-memory [`IndexClient`].
//!
//! Blocks and their bounds are registered ahead of time, the way an
//! external indexing tool would have written them, and are answered with
//! linear scans. Building the bounds from particle data is left to the
//! caller.

use ahash::HashMap;
use anyhow::Result;

use crate::err::Error;
use crate::idx::{Block, BlockMap, BlockRange, IndexClient};
use crate::sel::BoundingBox;

/// One first-level block of a bounding-box index, optionally carrying
/// finer sub-ranges with their own bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexedBlock {
	pub range: BlockRange,
	pub bbox: BoundingBox,
	pub subranges: Vec<(BlockRange, BoundingBox)>,
}

impl IndexedBlock {
	pub fn new(range: BlockRange, bbox: BoundingBox) -> Self {
		Self {
			range,
			bbox,
			subranges: Vec::new(),
		}
	}

	pub fn with_subrange(mut self, range: BlockRange, bbox: BoundingBox) -> Self {
		self.subranges.push((range, bbox));
		self
	}

	fn matching_subranges<'a>(&'a self, bbox: &'a BoundingBox) -> impl Iterator<Item = BlockRange> + 'a {
		self.subranges.iter().filter(|(_, b)| b.intersects(bbox)).map(|(r, _)| *r)
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct MinMax {
	range: BlockRange,
	min: f64,
	max: f64,
}

#[derive(Clone, Debug, Default)]
pub struct MemIndex {
	trees: HashMap<String, Vec<IndexedBlock>>,
	min_max: HashMap<String, Vec<MinMax>>,
}

impl MemIndex {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a block of the bounding-box index under `key`
	pub fn insert_block(&mut self, key: impl Into<String>, block: IndexedBlock) {
		let blocks = self.trees.entry(key.into()).or_default();
		let pos = blocks.partition_point(|b| b.range.start < block.range.start);
		blocks.insert(pos, block);
	}

	/// Register the value bounds of a range in the min-max index under `key`
	pub fn insert_min_max(&mut self, key: impl Into<String>, range: BlockRange, min: f64, max: f64) {
		let entries = self.min_max.entry(key.into()).or_default();
		let pos = entries.partition_point(|e| e.range.start < range.start);
		entries.insert(
			pos,
			MinMax {
				range,
				min,
				max,
			},
		);
	}

	fn blocks(&self, key: &str) -> Result<&[IndexedBlock]> {
		match self.trees.get(key) {
			Some(v) => Ok(v),
			None => Err(anyhow::Error::new(Error::Index(format!("No bounding-box index under '{key}'")))),
		}
	}
}

impl IndexClient for MemIndex {
	fn query_by_xyz(&self, key: &str, bbox: &BoundingBox) -> Result<Vec<BlockRange>> {
		let mut out = Vec::new();
		for b in self.blocks(key)?.iter().filter(|b| b.bbox.intersects(bbox)) {
			if b.subranges.is_empty() {
				out.push(b.range);
			} else {
				out.extend(b.matching_subranges(bbox));
			}
		}
		out.sort_unstable();
		Ok(out)
	}

	fn query_by_block_xyz(&self, key: &str, bbox: &BoundingBox) -> Result<BlockMap> {
		let mut out = BlockMap::new();
		for b in self.blocks(key)?.iter().filter(|b| b.bbox.intersects(bbox)) {
			if b.subranges.is_empty() {
				out.insert(b.range.start, Block::new(b.range));
				continue;
			}
			let block = Block::with_subranges(b.range, b.matching_subranges(bbox));
			// The block bounds overlap, but none of its finer ranges do
			if !block.subranges.is_empty() {
				out.insert(b.range.start, block);
			}
		}
		Ok(out)
	}

	fn query_by_only_block_xyz(&self, key: &str, bbox: &BoundingBox) -> Result<BlockMap> {
		Ok(self
			.blocks(key)?
			.iter()
			.filter(|b| b.bbox.intersects(bbox))
			.map(|b| (b.range.start, Block::new(b.range)))
			.collect())
	}

	fn query_min_max_data(&self, key: &str, lower: f64, upper: f64) -> Result<Vec<BlockRange>> {
		let Some(entries) = self.min_max.get(key) else {
			return Err(anyhow::Error::new(Error::Index(format!("No min-max index under '{key}'"))));
		};
		Ok(entries.iter().filter(|e| e.min <= upper && lower <= e.max).map(|e| e.range).collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn cube(lo: f64, hi: f64) -> BoundingBox {
		BoundingBox::new([lo; 3], [hi; 3])
	}

	fn index() -> MemIndex {
		let mut idx = MemIndex::new();
		idx.insert_block(
			"k",
			IndexedBlock::new(BlockRange::new(100, 199), cube(5.0, 10.0))
				.with_subrange(BlockRange::new(100, 149), cube(5.0, 6.0))
				.with_subrange(BlockRange::new(150, 199), cube(9.0, 10.0)),
		);
		idx.insert_block("k", IndexedBlock::new(BlockRange::new(0, 99), cube(0.0, 4.0)));
		idx
	}

	#[test]
	fn finest_ranges() {
		let idx = index();
		let r = idx.query_by_xyz("k", &cube(3.0, 5.5)).unwrap();
		assert_eq!(r, vec![BlockRange::new(0, 99), BlockRange::new(100, 149)]);
		assert!(idx.query_by_xyz("k", &cube(20.0, 30.0)).unwrap().is_empty());
	}

	#[test]
	fn blocks_with_subranges() {
		let idx = index();
		let m = idx.query_by_block_xyz("k", &cube(9.5, 20.0)).unwrap();
		assert_eq!(m.len(), 1);
		assert_eq!(m[&100].selected(), vec![BlockRange::new(150, 199)]);
		// Inside the block bounds, between both sub-ranges
		assert!(idx.query_by_block_xyz("k", &cube(7.0, 8.0)).unwrap().is_empty());
		let m = idx.query_by_only_block_xyz("k", &cube(7.0, 8.0)).unwrap();
		assert_eq!(m[&100], Block::new(BlockRange::new(100, 199)));
	}

	#[test]
	fn min_max_overlap_is_closed() {
		let mut idx = MemIndex::new();
		idx.insert_min_max("z", BlockRange::new(10, 19), 1.0, 2.0);
		idx.insert_min_max("z", BlockRange::new(0, 9), 0.0, 1.0);
		assert_eq!(idx.query_min_max_data("z", 1.0, 1.0).unwrap(), vec![
			BlockRange::new(0, 9),
			BlockRange::new(10, 19)
		]);
		assert_eq!(idx.query_min_max_data("z", f64::NEG_INFINITY, 0.5).unwrap(), vec![BlockRange::new(0, 9)]);
	}

	#[test]
	fn unknown_key() {
		let err = index().query_by_xyz("other", &cube(0.0, 1.0)).unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Index(_))));
	}
}
