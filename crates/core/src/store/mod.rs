//! The backing-store seam.
//!
//! A [`Series`] is an opened, readable particle dataset laid out the openPMD
//! way: iterations, each holding species, each holding records, each holding
//! either one scalar component or named vector components. Reads are
//! synchronous and every failure is returned to the caller.

pub mod mem;

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use anyhow::{Result, bail};

use crate::err::Error;
use crate::idx::BlockRange;
use crate::sel::Attribute;
use crate::val::Values;

/// The location of one record component.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ComponentPath {
	pub iteration: u64,
	pub species: String,
	pub record: String,
	/// The component name, or `None` for a scalar record
	pub component: Option<String>,
}

impl ComponentPath {
	pub fn new(iteration: u64, species: &str, record: &str, component: Option<&str>) -> Self {
		Self {
			iteration,
			species: species.to_string(),
			record: record.to_string(),
			component: component.map(str::to_string),
		}
	}

	/// The component an attribute is stored under
	pub fn of(iteration: u64, species: &str, attribute: &Attribute) -> Self {
		Self::new(iteration, species, attribute.record(), attribute.component())
	}
}

impl Display for ComponentPath {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "/data/{}/particles/{}/{}", self.iteration, self.species, self.record)?;
		if let Some(c) = &self.component {
			write!(f, "/{c}")?;
		}
		Ok(())
	}
}

/// An inclusive, strided slice of a record component.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Chunk {
	pub start: u64,
	pub end: u64,
	pub stride: u64,
}

impl Chunk {
	pub fn new(start: u64, end: u64, stride: u64) -> Self {
		Self {
			start,
			end,
			stride,
		}
	}

	/// Every record from the first to `len - 1`, or `None` when `len` is zero
	pub fn whole(len: u64) -> Option<Self> {
		len.checked_sub(1).map(|end| Self::new(0, end, 1))
	}

	/// The number of records the chunk yields
	pub fn len(&self) -> u64 {
		(self.end - self.start) / self.stride + 1
	}

	/// Check that the chunk describes a readable slice of `available` records
	pub fn validate(&self, available: u64) -> Result<()> {
		if self.stride == 0 || self.start > self.end || self.end >= available {
			bail!(Error::InvalidChunk {
				start: self.start,
				end: self.end,
				stride: self.stride,
			});
		}
		Ok(())
	}
}

impl From<BlockRange> for Chunk {
	fn from(r: BlockRange) -> Self {
		Self::new(r.start, r.end, 1)
	}
}

/// The metadata of one record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordMeta {
	pub name: String,
	/// The component names, empty for a scalar record
	pub components: Vec<String>,
	/// Is the stored data summed over a whole macroparticle?
	pub macro_weighted: bool,
	/// The power of the weighting the stored data is scaled by
	pub weighting_power: f64,
}

impl RecordMeta {
	pub fn is_scalar(&self) -> bool {
		self.components.is_empty()
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ComponentInfo {
	/// The number of records in the component
	pub len: u64,
}

/// An opened particle dataset.
pub trait Series {
	/// The available iterations, ascending
	fn iterations(&self) -> Vec<u64>;

	/// The simulation time of an iteration
	fn time(&self, iteration: u64) -> Result<f64>;

	/// The openPMD extensions the series declares
	fn extensions(&self) -> Vec<String>;

	/// The particle species of an iteration
	fn species(&self, iteration: u64) -> Result<Vec<String>>;

	/// Every record of a species
	fn records(&self, iteration: u64, species: &str) -> Result<Vec<RecordMeta>>;

	/// One record of a species
	fn record(&self, iteration: u64, species: &str, record: &str) -> Result<RecordMeta>;

	fn info(&self, path: &ComponentPath) -> Result<ComponentInfo>;

	/// Read a strided slice of a component. Constant components are
	/// expanded to the length of the chunk.
	fn load(&self, path: &ComponentPath, chunk: Chunk) -> Result<Values>;

	/// Release any buffers held for completed reads
	fn flush(&self) -> Result<()>;
}

impl<T: Series + ?Sized> Series for Arc<T> {
	fn iterations(&self) -> Vec<u64> {
		(**self).iterations()
	}

	fn time(&self, iteration: u64) -> Result<f64> {
		(**self).time(iteration)
	}

	fn extensions(&self) -> Vec<String> {
		(**self).extensions()
	}

	fn species(&self, iteration: u64) -> Result<Vec<String>> {
		(**self).species(iteration)
	}

	fn records(&self, iteration: u64, species: &str) -> Result<Vec<RecordMeta>> {
		(**self).records(iteration, species)
	}

	fn record(&self, iteration: u64, species: &str, record: &str) -> Result<RecordMeta> {
		(**self).record(iteration, species, record)
	}

	fn info(&self, path: &ComponentPath) -> Result<ComponentInfo> {
		(**self).info(path)
	}

	fn load(&self, path: &ComponentPath, chunk: Chunk) -> Result<Values> {
		(**self).load(path, chunk)
	}

	fn flush(&self) -> Result<()> {
		(**self).flush()
	}
}
