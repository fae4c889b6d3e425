use std::fmt::{self, Display, Formatter};

use crate::cnf::DEFAULT_PARTICLE_MASS;
use crate::idx::planner::PlannerOptions;

/// How the candidate records of a range selection are located and read.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ReadStrategyMode {
	/// Read every record and filter in memory
	#[default]
	Unindexed,
	/// Query the finest matching ranges of each group and read them one chunk
	/// at a time
	Indexed,
	/// Query first-level blocks narrowed to their matching sub-ranges, and
	/// read each block once
	DirectBlock,
	/// Query first-level blocks only, and read each block once
	FirstLevelBlock,
	/// Query first-level blocks only, and merge neighbouring blocks into
	/// fewer, larger reads
	DirectBlockGrouped(PlannerOptions),
	/// Query a per-dimension min-max index for every selection attribute
	SecondaryIndexed,
}

impl ReadStrategyMode {
	/// Grouped reads with the planner defaults
	pub fn grouped() -> Self {
		Self::DirectBlockGrouped(PlannerOptions::default())
	}

	pub fn name(&self) -> &'static str {
		match self {
			Self::Unindexed => "unindexed",
			Self::Indexed => "indexed",
			Self::DirectBlock => "direct block",
			Self::FirstLevelBlock => "first level block",
			Self::DirectBlockGrouped(_) => "direct block grouped",
			Self::SecondaryIndexed => "secondary indexed",
		}
	}

	/// Does this mode consult an index client?
	pub fn is_indexed(&self) -> bool {
		!matches!(self, Self::Unindexed)
	}
}

impl Display for ReadStrategyMode {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Options controlling how one particle query is executed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Options {
	pub mode: ReadStrategyMode,
	/// The particle mass used to convert momentum bounds into stored units
	pub mass: f64,
}

impl Default for Options {
	fn default() -> Self {
		Self {
			mode: ReadStrategyMode::default(),
			mass: *DEFAULT_PARTICLE_MASS,
		}
	}
}

impl Options {
	pub fn new() -> Self {
		Self::default()
	}

	/// Specify the read mode, with support for chaining
	pub fn with_mode(mut self, mode: ReadStrategyMode) -> Self {
		self.mode = mode;
		self
	}

	/// Specify the particle mass, with support for chaining
	pub fn with_mass(mut self, mass: f64) -> Self {
		self.mass = mass;
		self
	}
}
