//! The read strategy planner.
//!
//! Given candidate blocks sorted by start, the planner decides which
//! neighbouring blocks are read together in one contiguous physical read,
//! bridging the unused records between them, and which are read apart.
//! Reading apart costs one more read; reading together costs the bridged
//! records. The planner recursively splits a range at its widest gap while
//! the linear cost model says a split is cheaper, or while either half is
//! longer than the longest allowed read.

use anyhow::Result;

use crate::cnf::{PLANNER_COST_B, PLANNER_COST_K, PLANNER_MAX_LEVEL, PLANNER_MAX_READ_LENGTH};
use crate::idx::{Block, BlockMap, BlockRange};

const TARGET: &str = "pmdquery::core::idx::planner";

/// A linear estimate of the cost of a read, `gap * k + b`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CostModel {
	/// The cost per record
	pub k: f64,
	/// The fixed cost of issuing one read
	pub b: f64,
}

impl CostModel {
	pub fn new(k: f64, b: f64) -> Self {
		Self {
			k,
			b,
		}
	}

	pub fn cost(&self, gap: i64) -> f64 {
		gap as f64 * self.k + self.b
	}
}

impl Default for CostModel {
	fn default() -> Self {
		Self::new(*PLANNER_COST_K, *PLANNER_COST_B)
	}
}

/// The parameters of one planning call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlannerOptions {
	/// The deepest recursion level before a range is emitted as is
	pub max_level: u32,
	/// The longest span, in records, of any single grouped read
	pub max_read_length: u64,
	pub cost: CostModel,
}

impl Default for PlannerOptions {
	fn default() -> Self {
		Self {
			max_level: *PLANNER_MAX_LEVEL,
			max_read_length: *PLANNER_MAX_READ_LENGTH,
			cost: CostModel::default(),
		}
	}
}

impl PlannerOptions {
	pub fn with_max_level(mut self, max_level: u32) -> Self {
		self.max_level = max_level;
		self
	}

	pub fn with_max_read_length(mut self, max_read_length: u64) -> Self {
		self.max_read_length = max_read_length;
		self
	}

	pub fn with_cost(mut self, cost: CostModel) -> Self {
		self.cost = cost;
		self
	}
}

/// One physical read, spanning the blocks `lo..=hi` of the sorted list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReadGroup {
	pub lo: usize,
	pub hi: usize,
}

/// An ordered partition of a sorted block list into read groups.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReadStrategy(Vec<ReadGroup>);

impl ReadStrategy {
	pub fn groups(&self) -> &[ReadGroup] {
		&self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &ReadGroup> {
		self.0.iter()
	}
}

impl From<Vec<ReadGroup>> for ReadStrategy {
	fn from(v: Vec<ReadGroup>) -> Self {
		Self(v)
	}
}

/// Plan the reads of `sorted`, which must be ordered ascending by start.
pub fn find_optimal_strategy(sorted: &[BlockRange], opts: &PlannerOptions) -> ReadStrategy {
	if sorted.is_empty() {
		return ReadStrategy::default();
	}
	let groups = plan_range(sorted, 0, sorted.len() - 1, 0, opts);
	debug!(target: TARGET, blocks = sorted.len(), groups = groups.len(), "Planned grouped reads");
	ReadStrategy(groups)
}

fn plan_range(
	sorted: &[BlockRange],
	lo: usize,
	hi: usize,
	level: u32,
	opts: &PlannerOptions,
) -> Vec<ReadGroup> {
	// A single block has no gap to split at
	if level > opts.max_level || lo == hi {
		return vec![emit(lo, hi, level)];
	}
	let (left_end, right_start) = widest_gap(sorted, lo, hi);
	let left = &sorted[left_end];
	let right = &sorted[right_start];
	let split_is_cheaper = opts.cost.cost(left.start_gap_to(right)) < 0.0;
	let left_too_long = left.end.saturating_sub(sorted[lo].start) > opts.max_read_length;
	let right_too_long = sorted[hi].end.saturating_sub(right.start) > opts.max_read_length;
	if split_is_cheaper || left_too_long || right_too_long {
		let mut groups = plan_range(sorted, lo, left_end, level + 1, opts);
		groups.extend(plan_range(sorted, right_start, hi, level + 1, opts));
		groups
	} else {
		vec![emit(lo, hi, level)]
	}
}

fn emit(lo: usize, hi: usize, level: u32) -> ReadGroup {
	trace!(target: TARGET, lo, hi, level, "Emitting read group");
	ReadGroup {
		lo,
		hi,
	}
}

/// The adjacent pair in `lo..=hi` with the widest positive gap. The first
/// such pair wins a tie, and the first pair of the range is used when no gap
/// is positive.
fn widest_gap(sorted: &[BlockRange], lo: usize, hi: usize) -> (usize, usize) {
	let mut widest = lo;
	let mut max_gap = 0;
	for i in lo..hi {
		let gap = sorted[i].gap_before(&sorted[i + 1]);
		if gap > max_gap {
			max_gap = gap;
			widest = i;
		}
	}
	(widest, widest + 1)
}

/// Collapse the planned groups into one block per group.
///
/// Each group block spans from its first block's start to its last block's
/// end, and lists every originally selected range inside it as a sub-range,
/// so the bridged records are read but discarded.
pub fn group_blocks(sorted: &[Block], strategy: &ReadStrategy) -> Result<BlockMap> {
	let mut grouped = BlockMap::new();
	for g in strategy.iter() {
		let (Some(first), Some(last)) = (sorted.get(g.lo), sorted.get(g.hi)) else {
			fail!("group_blocks: group {}..={} outside {} blocks", g.lo, g.hi, sorted.len());
		};
		let span = BlockRange::new(first.range.start, last.range.end);
		let block = Block::with_subranges(span, sorted[g.lo..=g.hi].iter().flat_map(Block::selected));
		grouped.insert(span.start, block);
	}
	Ok(grouped)
}
