use std::collections::BTreeSet;

use anyhow::Result;

use crate::idx::{Block, BlockMap, BlockQueryResult, BlockRange};

/// The blocks surviving intersection across every queried group. Still a
/// coarse superset of the exact matches.
#[derive(Clone, Debug, PartialEq)]
pub enum Candidates {
	Ranges(BTreeSet<BlockRange>),
	Blocks(BlockMap),
}

impl Candidates {
	pub fn is_empty(&self) -> bool {
		match self {
			Self::Ranges(r) => r.is_empty(),
			Self::Blocks(b) => b.is_empty(),
		}
	}

	/// The number of candidate blocks
	pub fn len(&self) -> usize {
		match self {
			Self::Ranges(r) => r.len(),
			Self::Blocks(b) => b.len(),
		}
	}

	/// The number of records a read of every candidate visits
	pub fn record_count(&self) -> u64 {
		match self {
			Self::Ranges(r) => r.iter().map(BlockRange::len).sum(),
			Self::Blocks(b) => b.values().map(Block::selected_len).sum(),
		}
	}
}

impl From<Candidates> for BlockQueryResult {
	fn from(c: Candidates) -> Self {
		match c {
			Candidates::Ranges(r) => Self::Ranges(r.into_iter().collect()),
			Candidates::Blocks(b) => Self::Blocks(b),
		}
	}
}

/// Intersect the results of one index query per group.
///
/// Flat results intersect as `(start, end)` tuples. Block results keep the
/// blocks whose start is present in every result and, inside those, the
/// sub-ranges present in every result which narrowed that block. A block
/// left with no common sub-range is dropped.
pub fn intersect(results: Vec<BlockQueryResult>) -> Result<Candidates> {
	let mut results = results.into_iter();
	let Some(first) = results.next() else {
		return Ok(Candidates::Ranges(BTreeSet::new()));
	};
	match first {
		BlockQueryResult::Ranges(first) => {
			let mut set: BTreeSet<BlockRange> = first.into_iter().collect();
			for r in results {
				let BlockQueryResult::Ranges(other) = r else {
					fail!("intersect: block map mixed with flat ranges");
				};
				let other: BTreeSet<BlockRange> = other.into_iter().collect();
				set.retain(|b| other.contains(b));
			}
			Ok(Candidates::Ranges(set))
		}
		BlockQueryResult::Blocks(mut map) => {
			for r in results {
				let BlockQueryResult::Blocks(other) = r else {
					fail!("intersect: flat ranges mixed with a block map");
				};
				map.retain(|start, block| match other.get(start) {
					Some(o) => narrow(block, o),
					None => false,
				});
			}
			Ok(Candidates::Blocks(map))
		}
	}
}

/// Narrow a block to the sub-ranges it shares with another answer for the
/// same block. Returns false when nothing is left.
fn narrow(block: &mut Block, other: &Block) -> bool {
	match (block.subranges.is_empty(), other.subranges.is_empty()) {
		(_, true) => true,
		(true, false) => {
			block.subranges.clone_from(&other.subranges);
			true
		}
		(false, false) => {
			block.subranges.retain(|k, _| other.subranges.contains_key(k));
			!block.subranges.is_empty()
		}
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	fn ranges(v: &[(u64, u64)]) -> BlockQueryResult {
		BlockQueryResult::Ranges(v.iter().map(|(s, e)| BlockRange::new(*s, *e)).collect())
	}

	fn blocks(v: &[(u64, u64, &[(u64, u64)])]) -> BlockQueryResult {
		BlockQueryResult::Blocks(
			v.iter()
				.map(|(s, e, subs)| {
					let block = Block::with_subranges(
						BlockRange::new(*s, *e),
						subs.iter().map(|(a, b)| BlockRange::new(*a, *b)),
					);
					(*s, block)
				})
				.collect(),
		)
	}

	#[test]
	fn single_group_passes_through() {
		let c = intersect(vec![ranges(&[(0, 9), (20, 29)])]).unwrap();
		assert_eq!(c.len(), 2);
		assert_eq!(c.record_count(), 20);
	}

	#[test]
	fn flat_intersection_matches_whole_tuples() {
		let c = intersect(vec![ranges(&[(0, 9), (20, 29), (40, 49)]), ranges(&[(20, 29), (40, 48)])])
			.unwrap();
		assert_eq!(c, Candidates::Ranges([BlockRange::new(20, 29)].into_iter().collect()));
	}

	#[test]
	fn empty_intersection() {
		let c = intersect(vec![ranges(&[(0, 9)]), ranges(&[(10, 19)])]).unwrap();
		assert!(c.is_empty());
	}

	#[test]
	fn mixed_results_are_rejected() {
		assert!(intersect(vec![ranges(&[(0, 9)]), blocks(&[(0, 9, &[])])]).is_err());
	}

	#[test]
	fn block_intersection_narrows_subranges() {
		let a = blocks(&[(0, 99, &[(0, 9), (50, 59)]), (100, 199, &[(100, 109)]), (200, 299, &[])]);
		let b = blocks(&[(0, 99, &[(50, 59), (70, 79)]), (100, 199, &[(150, 159)]), (200, 299, &[(210, 219)])]);
		let Candidates::Blocks(map) = intersect(vec![a, b]).unwrap() else {
			panic!("expected blocks");
		};
		assert_eq!(map.len(), 2);
		assert_eq!(map[&0].selected(), vec![BlockRange::new(50, 59)]);
		assert_eq!(map[&200].selected(), vec![BlockRange::new(210, 219)]);
	}

	#[rstest]
	#[case(&[(0, 9), (10, 19), (20, 29)], &[(10, 19), (20, 29)], &[(20, 29), (30, 39)])]
	#[case(&[(0, 9)], &[], &[(0, 9)])]
	#[case(&[(1, 2), (3, 4), (5, 6)], &[(5, 6), (1, 2)], &[(1, 2), (5, 6), (3, 4)])]
	fn intersection_is_commutative_and_associative(
		#[case] a: &[(u64, u64)],
		#[case] b: &[(u64, u64)],
		#[case] c: &[(u64, u64)],
	) {
		let ab = intersect(vec![ranges(a), ranges(b)]).unwrap();
		let ba = intersect(vec![ranges(b), ranges(a)]).unwrap();
		assert_eq!(ab, ba);
		let left = intersect(vec![ab.into(), ranges(c)]).unwrap();
		let bc = intersect(vec![ranges(b), ranges(c)]).unwrap();
		let right = intersect(vec![ranges(a), bc.into()]).unwrap();
		assert_eq!(left, right);
		assert_eq!(left, intersect(vec![ranges(a), ranges(b), ranges(c)]).unwrap());
	}

	#[test]
	fn block_intersection_is_commutative() {
		let a = blocks(&[(0, 99, &[(0, 9), (50, 59)]), (100, 199, &[])]);
		let b = blocks(&[(0, 99, &[(50, 59)]), (100, 199, &[(120, 129)]), (300, 399, &[])]);
		assert_eq!(
			intersect(vec![a.clone(), b.clone()]).unwrap(),
			intersect(vec![b, a]).unwrap()
		);
	}
}
