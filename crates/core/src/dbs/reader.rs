//! The chunked data reader.
//!
//! Reads one attribute over a set of extents, keeps the selected pieces of
//! each extent, applies the unit corrections to every piece on its own, and
//! concatenates the results in extent order. Auxiliary components used by
//! the corrections (weighting, position offsets, mass) are read over exactly
//! the same extents.

use std::ops::Range;

use anyhow::Result;

use crate::cnf::{MACRO_WEIGHTED_EXTENSION, SPEED_OF_LIGHT};
use crate::err::Error;
use crate::idx::planner::{ReadStrategy, group_blocks};
use crate::idx::{Block, BlockMap};
use crate::sel::Attribute;
use crate::store::{Chunk, ComponentPath, Series};
use crate::val::{Kind, Values};

/// The component reads and corrections needed for one attribute
#[derive(Debug)]
struct ReadPlan {
	path: ComponentPath,
	kind: Kind,
	/// Multiply by `weighting ^ -power`
	weighting_power: Option<f64>,
	/// Add the position offset stored here
	offset: Option<ComponentPath>,
	/// Normalise by `1 / (mass * c)` with the mass stored here
	mass: Option<ComponentPath>,
}

/// Auxiliary columns loaded over the same extent as the data
#[derive(Debug)]
struct Corrections {
	weighting: Option<Vec<f64>>,
	offset: Option<Vec<f64>>,
	mass: Option<Vec<f64>>,
}

pub struct ChunkedDataReader<'a> {
	series: &'a dyn Series,
	iteration: u64,
	species: &'a str,
	/// Does the series declare the macro-weighting extension?
	macro_weighting: bool,
}

impl<'a> ChunkedDataReader<'a> {
	pub fn new(series: &'a dyn Series, iteration: u64, species: &'a str) -> Self {
		let macro_weighting = series.extensions().iter().any(|e| e == MACRO_WEIGHTED_EXTENSION);
		Self {
			series,
			iteration,
			species,
			macro_weighting,
		}
	}

	fn path(&self, record: &str, component: Option<&str>) -> ComponentPath {
		ComponentPath::new(self.iteration, self.species, record, component)
	}

	fn plan(&self, attribute: &Attribute) -> Result<ReadPlan> {
		let path = ComponentPath::of(self.iteration, self.species, attribute);
		let kind = attribute.kind();
		let mut plan = ReadPlan {
			path,
			kind,
			weighting_power: None,
			offset: None,
			mass: None,
		};
		// Integer records are never corrected
		if kind == Kind::U64 {
			return Ok(plan);
		}
		if self.macro_weighting && !attribute.is_weighting() {
			let meta = self.series.record(self.iteration, self.species, attribute.record())?;
			if meta.macro_weighted && meta.weighting_power != 0.0 {
				plan.weighting_power = Some(meta.weighting_power);
			}
		}
		if let Some(dim) = attribute.position_dim() {
			plan.offset = Some(self.path("positionOffset", Some(dim.as_str())));
		} else if attribute.is_momentum() {
			plan.mass = Some(self.path("mass", None));
		}
		Ok(plan)
	}

	fn load(&self, path: &ComponentPath, chunk: Chunk) -> Result<Values> {
		let v = self.series.load(path, chunk)?;
		self.series.flush()?;
		Ok(v)
	}

	/// Load an auxiliary component aligned with `len` data values
	fn load_aux(&self, path: &ComponentPath, chunk: Chunk, len: usize) -> Result<Vec<f64>> {
		let v = match self.load(path, chunk)? {
			Values::F64(v) => v,
			other => other.to_f64_vec(),
		};
		if v.len() != len {
			return Err(anyhow::Error::new(Error::LengthMismatch {
				name: path.to_string(),
				expected: len,
				found: v.len(),
			}));
		}
		Ok(v)
	}

	/// Load every auxiliary component the plan needs over one extent
	fn load_corrections(&self, plan: &ReadPlan, chunk: Chunk, len: usize) -> Result<Corrections> {
		let weighting = match plan.weighting_power {
			Some(_) => Some(self.load_aux(&self.path("weighting", None), chunk, len)?),
			None => None,
		};
		let offset = match &plan.offset {
			Some(path) => Some(self.load_aux(path, chunk, len)?),
			None => None,
		};
		let mass = match &plan.mass {
			Some(path) => Some(self.load_aux(path, chunk, len)?),
			None => None,
		};
		Ok(Corrections {
			weighting,
			offset,
			mass,
		})
	}

	/// Correct one selected piece. `at` locates the piece in the extent the
	/// corrections were loaded over.
	fn correct(&self, plan: &ReadPlan, aux: &Corrections, at: Range<usize>, data: &mut [f64]) {
		// De-weighting comes before any offset or normalisation
		if let (Some(power), Some(w)) = (plan.weighting_power, &aux.weighting) {
			for (x, w) in data.iter_mut().zip(&w[at.clone()]) {
				*x *= w.powf(-power);
			}
		}
		if let Some(offset) = &aux.offset {
			for (x, o) in data.iter_mut().zip(&offset[at.clone()]) {
				*x += o;
			}
		}
		if let Some(mass) = &aux.mass {
			let mass = &mass[at];
			if mass.iter().all(|m| *m != 0.0) {
				for (x, m) in data.iter_mut().zip(mass) {
					*x *= 1.0 / (m * SPEED_OF_LIGHT);
				}
			}
		}
	}

	/// Read one contiguous extent, keep only the given pieces of it and
	/// correct each piece on its own. Without pieces the whole extent is kept.
	fn read_extent(&self, plan: &ReadPlan, chunk: Chunk, pieces: Option<&[Range<usize>]>) -> Result<Values> {
		let data = self.load(&plan.path, chunk)?;
		let aux = match data.kind() {
			Kind::F64 => Some(self.load_corrections(plan, chunk, data.len())?),
			Kind::U64 => None,
		};
		let whole = [0..data.len()];
		let pieces = pieces.unwrap_or(&whole);
		let capacity = pieces.iter().map(|at| at.len()).sum();
		let mut out = Values::with_capacity(plan.kind, capacity);
		for at in pieces {
			let mut piece = data.slice(at.start, at.len())?;
			if let (Some(aux), Some(v)) = (&aux, piece.as_f64_mut()) {
				self.correct(plan, aux, at.clone(), v);
			}
			out.append(piece)?;
		}
		Ok(out)
	}

	/// Read every record of an attribute
	#[instrument(
		level = "trace",
		target = "pmdquery::core::dbs::reader",
		skip(self),
		fields(attribute = %attribute)
	)]
	pub fn read_full(&self, attribute: &Attribute) -> Result<Values> {
		let plan = self.plan(attribute)?;
		let info = self.series.info(&plan.path)?;
		match Chunk::whole(info.len) {
			Some(chunk) => self.read_extent(&plan, chunk, None),
			None => Ok(Values::empty(plan.kind)),
		}
	}

	/// Read each chunk independently and concatenate them in list order
	#[instrument(
		level = "trace",
		target = "pmdquery::core::dbs::reader",
		skip(self, chunks),
		fields(attribute = %attribute, chunks = chunks.len())
	)]
	pub fn read_chunks(&self, attribute: &Attribute, chunks: &[Chunk]) -> Result<Values> {
		let plan = self.plan(attribute)?;
		let mut out = Values::empty(plan.kind);
		for chunk in chunks {
			out.append(self.read_extent(&plan, *chunk, None)?)?;
		}
		Ok(out)
	}

	/// Read each block once, keeping only its sub-ranges when it has any.
	/// Corrections are decided per selected sub-range, never over the
	/// unselected records around it.
	#[instrument(
		level = "trace",
		target = "pmdquery::core::dbs::reader",
		skip(self, blocks),
		fields(attribute = %attribute, blocks = blocks.len())
	)]
	pub fn read_blocks(&self, attribute: &Attribute, blocks: &BlockMap) -> Result<Values> {
		let plan = self.plan(attribute)?;
		let capacity = blocks.values().map(Block::selected_len).sum::<u64>();
		let mut out = Values::with_capacity(plan.kind, capacity as usize);
		for block in blocks.values() {
			let chunk = Chunk::from(block.range);
			if block.subranges.is_empty() {
				out.append(self.read_extent(&plan, chunk, None)?)?;
				continue;
			}
			let mut pieces = Vec::with_capacity(block.subranges.len());
			for r in block.subranges.values() {
				let Some(offset) = r.start.checked_sub(block.range.start) else {
					fail!("Sub-range {}..={} starts before block {}", r.start, r.end, block.range.start);
				};
				let offset = offset as usize;
				pieces.push(offset..offset + r.len() as usize);
			}
			out.append(self.read_extent(&plan, chunk, Some(&pieces))?)?;
		}
		Ok(out)
	}

	/// Merge the planned groups of sorted blocks into single reads, then
	/// slice each read back down to the originally selected ranges
	#[instrument(
		level = "trace",
		target = "pmdquery::core::dbs::reader",
		skip(self, sorted, strategy),
		fields(attribute = %attribute, groups = strategy.len())
	)]
	pub fn read_grouped(&self, attribute: &Attribute, sorted: &[Block], strategy: &ReadStrategy) -> Result<Values> {
		let grouped = group_blocks(sorted, strategy)?;
		self.read_blocks(attribute, &grouped)
	}
}

#[cfg(test)]
mod tests {
	use test_log::test;

	use super::*;
	use crate::idx::BlockRange;
	use crate::idx::planner::{CostModel, PlannerOptions, find_optimal_strategy};
	use crate::store::mem::MemSeries;

	const MASS: f64 = 2.0e-30;
	const N: u64 = 100;

	fn series(extension: bool) -> MemSeries {
		let idx: Vec<f64> = (0..N).map(|i| i as f64).collect();
		let s = MemSeries::new()
			.with_iteration(10, 0.0)
			.with_component(10, "e", "position", Some("x"), idx.clone())
			.with_constant(10, "e", "positionOffset", Some("x"), 0.5, N)
			.with_component(10, "e", "momentum", Some("x"), idx.clone())
			.with_record_meta(10, "e", "momentum", true, 1.0)
			.with_constant(10, "e", "mass", None, MASS, N)
			.with_constant(10, "e", "weighting", None, 4.0, N)
			.with_record_meta(10, "e", "weighting", true, 1.0)
			.with_component(10, "e", "id", None, (0..N).collect::<Vec<u64>>());
		if extension {
			s.with_extension("ED-PIC")
		} else {
			s
		}
	}

	fn attr(name: &str) -> Attribute {
		Attribute::parse(name)
	}

	#[test]
	fn chunks_are_concatenated_with_offsets() {
		let s = series(false);
		let r = ChunkedDataReader::new(&s, 10, "e");
		let v = r.read_chunks(&attr("x"), &[Chunk::new(10, 12, 1), Chunk::new(0, 4, 2)]).unwrap();
		assert_eq!(v, Values::from(vec![10.5, 11.5, 12.5, 0.5, 2.5, 4.5]));
		// Each chunk reads the data and the offset
		assert_eq!(s.loads(), 4);
	}

	#[test]
	fn momentum_is_normalised() {
		let s = series(false);
		let r = ChunkedDataReader::new(&s, 10, "e");
		let v = r.read_chunks(&attr("ux"), &[Chunk::new(3, 3, 1)]).unwrap();
		let expected = 3.0 / (MASS * SPEED_OF_LIGHT);
		assert!((v.get_f64(0).unwrap() - expected).abs() < expected * 1e-12);
	}

	#[test]
	fn massless_momentum_is_raw() {
		let s = series(false).with_constant(10, "e", "mass", None, 0.0, N);
		let r = ChunkedDataReader::new(&s, 10, "e");
		let v = r.read_chunks(&attr("ux"), &[Chunk::new(3, 4, 1)]).unwrap();
		assert_eq!(v, Values::from(vec![3.0, 4.0]));
	}

	#[test]
	fn macro_weighted_records_are_deweighted() {
		let s = series(true);
		let r = ChunkedDataReader::new(&s, 10, "e");
		let v = r.read_chunks(&attr("ux"), &[Chunk::new(8, 8, 1)]).unwrap();
		let expected = 8.0 / 4.0 / (MASS * SPEED_OF_LIGHT);
		assert!((v.get_f64(0).unwrap() - expected).abs() < expected * 1e-12);
		// Weighting is never corrected, even when flagged
		let w = r.read_chunks(&attr("w"), &[Chunk::new(0, 1, 1)]).unwrap();
		assert_eq!(w, Values::from(vec![4.0, 4.0]));
		// Position is not flagged
		let x = r.read_chunks(&attr("x"), &[Chunk::new(8, 8, 1)]).unwrap();
		assert_eq!(x, Values::from(vec![8.5]));
	}

	#[test]
	fn ids_are_never_corrected() {
		let s = series(true);
		let r = ChunkedDataReader::new(&s, 10, "e");
		let v = r.read_full(&attr("id")).unwrap();
		assert_eq!(v.len(), N as usize);
		assert_eq!(v.as_u64().unwrap()[42], 42);
		assert_eq!(s.loads(), 1);
	}

	#[test]
	fn blocks_are_sliced_to_subranges() {
		let s = series(false);
		let r = ChunkedDataReader::new(&s, 10, "e");
		let mut blocks = BlockMap::new();
		blocks.insert(
			0,
			Block::with_subranges(BlockRange::new(0, 19), [BlockRange::new(2, 3), BlockRange::new(10, 10)]),
		);
		blocks.insert(50, Block::new(BlockRange::new(50, 52)));
		let v = r.read_blocks(&attr("x"), &blocks).unwrap();
		assert_eq!(v, Values::from(vec![2.5, 3.5, 10.5, 50.5, 51.5, 52.5]));
		let outside = BlockMap::from([(10, Block::with_subranges(BlockRange::new(10, 19), [BlockRange::new(5, 6)]))]);
		assert!(r.read_blocks(&attr("x"), &outside).is_err());
	}

	#[test]
	fn grouped_reads_match_block_reads() {
		let s = series(false);
		let r = ChunkedDataReader::new(&s, 10, "e");
		let sorted = vec![
			Block::new(BlockRange::new(0, 4)),
			Block::with_subranges(BlockRange::new(10, 19), [BlockRange::new(12, 13)]),
			Block::new(BlockRange::new(30, 31)),
			Block::new(BlockRange::new(90, 99)),
		];
		let blocks: BlockMap = sorted.iter().map(|b| (b.range.start, b.clone())).collect();
		let direct = r.read_blocks(&attr("ux"), &blocks).unwrap();
		let ranges: Vec<BlockRange> = sorted.iter().map(|b| b.range).collect();
		let opts = PlannerOptions::default().with_cost(CostModel::new(1e-3, 0.05));
		let strategy = find_optimal_strategy(&ranges, &opts);
		assert!(strategy.len() < sorted.len());
		let grouped = r.read_grouped(&attr("ux"), &sorted, &strategy).unwrap();
		let expected: u64 = sorted.iter().map(Block::selected_len).sum();
		assert_eq!(grouped.len() as u64, expected);
		assert_eq!(grouped, direct);
	}

	#[test]
	fn massless_gap_records_do_not_change_corrections() {
		let mut mass = vec![MASS; 12];
		mass[5] = 0.0;
		let s = MemSeries::new()
			.with_component(1, "e", "momentum", Some("x"), (0..12).map(|i| i as f64).collect::<Vec<_>>())
			.with_component(1, "e", "mass", None, mass);
		let r = ChunkedDataReader::new(&s, 1, "e");
		let sorted = vec![Block::new(BlockRange::new(0, 3)), Block::new(BlockRange::new(8, 11))];
		let blocks: BlockMap = sorted.iter().map(|b| (b.range.start, b.clone())).collect();
		let direct = r.read_blocks(&attr("ux"), &blocks).unwrap();
		let ranges: Vec<BlockRange> = sorted.iter().map(|b| b.range).collect();
		let opts = PlannerOptions::default().with_cost(CostModel::new(1e-3, 0.05));
		let strategy = find_optimal_strategy(&ranges, &opts);
		assert_eq!(strategy.len(), 1);
		let grouped = r.read_grouped(&attr("ux"), &sorted, &strategy).unwrap();
		assert_eq!(grouped, direct);
		let expected = 9.0 / (MASS * SPEED_OF_LIGHT);
		assert!((grouped.get_f64(5).unwrap() - expected).abs() < expected * 1e-12);
		// A massless record in the selection leaves its sub-range raw
		let touching = BlockMap::from([(0, Block::with_subranges(BlockRange::new(0, 11), [
			BlockRange::new(1, 2),
			BlockRange::new(4, 6),
		]))]);
		let v = r.read_blocks(&attr("ux"), &touching).unwrap();
		assert_eq!(&v.as_f64().unwrap()[2..], &[4.0, 5.0, 6.0]);
		assert!(v.get_f64(0).unwrap() > 1e20);
	}

	#[test]
	fn missing_offsets_fail() {
		let s = MemSeries::new().with_component(1, "e", "position", Some("y"), vec![1.0]);
		let r = ChunkedDataReader::new(&s, 1, "e");
		let err = r.read_full(&attr("y")).unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ComponentNotFound(_))));
	}
}
