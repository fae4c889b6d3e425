//! The particle query entry point.
//!
//! A query is validated against the series up front, before any read.
//! Range selections are then answered through the configured
//! [`ReadStrategyMode`]: the envelope is compiled into index queries, the
//! per-group answers are intersected into a coarse candidate set, the
//! candidates are read with unit corrections applied, and the result is
//! filtered down to the exact matches.

use std::collections::BTreeSet;

use ahash::{HashMap, HashSet};
use anyhow::{Result, bail};

use crate::dbs::filter::{FineFilter, apply_mask};
use crate::dbs::options::{Options, ReadStrategyMode};
use crate::dbs::reader::ChunkedDataReader;
use crate::err::Error;
use crate::idx::merge::{Candidates, intersect};
use crate::idx::planner::{ReadStrategy, find_optimal_strategy};
use crate::idx::{Block, BlockMap, BlockQueryResult, BlockRange, IndexClient, IndexKeyBase, KeyFormat};
use crate::sel::{Attribute, Envelope, Selection, compile_attributes, compile_envelope, quantity_name};
use crate::store::{Chunk, Series};
use crate::val::Values;

const TARGET: &str = "pmdquery::core::dbs::executor";

fn join<T: ToString>(items: impl IntoIterator<Item = T>) -> String {
	items.into_iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

/// Which output of the series a query reads.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Locator {
	/// The first available iteration
	#[default]
	First,
	/// The iteration whose time is nearest
	Time(f64),
	Iteration(u64),
}

impl Locator {
	/// Build a locator from an optional time and an optional iteration, of
	/// which at most one may be given
	pub fn from_parts(time: Option<f64>, iteration: Option<u64>) -> Result<Self> {
		match (time, iteration) {
			(Some(_), Some(_)) => bail!(Error::TimeAndIteration),
			(Some(t), None) => Ok(Self::Time(t)),
			(None, Some(i)) => Ok(Self::Iteration(i)),
			(None, None) => Ok(Self::First),
		}
	}
}

/// A request for particle quantities.
#[derive(Clone, Debug, Default)]
pub struct ParticleQuery {
	/// The quantities to return, in order
	pub var_list: Vec<String>,
	/// The species to read, which may be omitted when there is only one
	pub species: Option<String>,
	pub locator: Locator,
	pub selection: Option<Selection>,
	pub options: Options,
}

impl ParticleQuery {
	pub fn new<S: Into<String>>(var_list: impl IntoIterator<Item = S>) -> Self {
		Self {
			var_list: var_list.into_iter().map(Into::into).collect(),
			..Default::default()
		}
	}

	pub fn with_species(mut self, species: impl Into<String>) -> Self {
		self.species = Some(species.into());
		self
	}

	pub fn at(mut self, locator: Locator) -> Self {
		self.locator = locator;
		self
	}

	pub fn with_selection(mut self, selection: impl Into<Selection>) -> Self {
		self.selection = Some(selection.into());
		self
	}

	pub fn with_options(mut self, options: Options) -> Self {
		self.options = options;
		self
	}

	pub fn with_mode(mut self, mode: ReadStrategyMode) -> Self {
		self.options.mode = mode;
		self
	}
}

/// The answer to a [`ParticleQuery`], one buffer per requested quantity.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleData {
	iteration: u64,
	names: Vec<String>,
	values: Vec<Values>,
}

impl ParticleData {
	/// The iteration the data was read from
	pub fn iteration(&self) -> u64 {
		self.iteration
	}

	pub fn names(&self) -> &[String] {
		&self.names
	}

	pub fn get(&self, name: &str) -> Option<&Values> {
		self.names.iter().position(|n| n == name).map(|i| &self.values[i])
	}

	/// The buffers in the order of the requested quantities
	pub fn values(&self) -> &[Values] {
		&self.values
	}

	pub fn into_values(self) -> Vec<Values> {
		self.values
	}

	/// The number of particles returned
	pub fn len(&self) -> usize {
		self.values.iter().map(Values::len).max().unwrap_or(0)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Values)> {
		self.names.iter().map(String::as_str).zip(self.values.iter())
	}
}

/// The extents a range selection reads
enum Extents {
	All,
	Chunks(Vec<Chunk>),
	Blocks(BlockMap),
	Grouped(Vec<Block>, ReadStrategy),
}

impl Extents {
	fn read(&self, reader: &ChunkedDataReader, attribute: &Attribute) -> Result<Values> {
		match self {
			Self::All => reader.read_full(attribute),
			Self::Chunks(chunks) => reader.read_chunks(attribute, chunks),
			Self::Blocks(blocks) => reader.read_blocks(attribute, blocks),
			Self::Grouped(sorted, strategy) => reader.read_grouped(attribute, sorted, strategy),
		}
	}
}

/// An opened series of particle outputs, optionally with a spatial index.
pub struct TimeSeries {
	series: Box<dyn Series>,
	index: Option<Box<dyn IndexClient>>,
	key_format: KeyFormat,
	iterations: Vec<u64>,
	times: Vec<f64>,
	extensions: Vec<String>,
	species: Vec<String>,
	/// The quantities available for each species
	quantities: HashMap<String, Vec<String>>,
}

impl TimeSeries {
	/// Capture the layout of a series. Species and quantities are taken
	/// from the first iteration.
	pub fn new(series: impl Series + 'static) -> Result<Self> {
		let iterations = series.iterations();
		let times = iterations.iter().map(|it| series.time(*it)).collect::<Result<Vec<_>>>()?;
		let mut species = Vec::new();
		let mut quantities = HashMap::default();
		if let Some(first) = iterations.first() {
			species = series.species(*first)?;
			for sp in &species {
				let mut names = Vec::new();
				for r in series.records(*first, sp)? {
					if r.is_scalar() {
						names.extend(quantity_name(&r.name, None));
					} else {
						names.extend(r.components.iter().filter_map(|c| quantity_name(&r.name, Some(c))));
					}
				}
				quantities.insert(sp.clone(), names);
			}
		}
		debug!(target: TARGET, iterations = iterations.len(), species = %join(&species), "Opened time series");
		Ok(Self {
			extensions: series.extensions(),
			series: Box::new(series),
			index: None,
			key_format: KeyFormat::default(),
			iterations,
			times,
			species,
			quantities,
		})
	}

	/// Attach the spatial index used by the indexed read modes
	pub fn with_index(mut self, index: impl IndexClient + 'static) -> Self {
		self.index = Some(Box::new(index));
		self
	}

	/// Replace the function building index keys
	pub fn with_key_format(mut self, key_format: KeyFormat) -> Self {
		self.key_format = key_format;
		self
	}

	pub fn iterations(&self) -> &[u64] {
		&self.iterations
	}

	pub fn times(&self) -> &[f64] {
		&self.times
	}

	pub fn extensions(&self) -> &[String] {
		&self.extensions
	}

	pub fn species(&self) -> &[String] {
		&self.species
	}

	pub fn quantities(&self, species: &str) -> Option<&[String]> {
		self.quantities.get(species).map(Vec::as_slice)
	}

	/// Find the iteration a locator points at
	pub fn resolve(&self, locator: &Locator) -> Result<u64> {
		let Some(first) = self.iterations.first() else {
			bail!(Error::NoParticleData);
		};
		match *locator {
			Locator::First => Ok(*first),
			Locator::Iteration(it) => {
				if self.iterations.contains(&it) {
					Ok(it)
				} else {
					bail!(Error::IterationNotFound {
						value: it,
						available: join(&self.iterations),
					})
				}
			}
			Locator::Time(t) => {
				let mut nearest = 0;
				for (i, time) in self.times.iter().enumerate() {
					if (time - t).abs() < (self.times[nearest] - t).abs() {
						nearest = i;
					}
				}
				Ok(self.iterations[nearest])
			}
		}
	}

	fn resolve_species<'a>(&'a self, species: Option<&'a str>) -> Result<&'a str> {
		if self.species.is_empty() {
			bail!(Error::NoParticleData);
		}
		let species = match species {
			None if self.species.len() == 1 => Some(self.species[0].as_str()),
			s => s,
		};
		match species {
			Some(s) if self.species.iter().any(|x| x == s) => Ok(s),
			s => bail!(Error::SpeciesNotFound {
				value: s.unwrap_or_default().to_string(),
				available: join(&self.species),
			}),
		}
	}

	fn validate(&self, species: &str, query: &ParticleQuery) -> Result<()> {
		let available = self.quantities(species).unwrap_or_default();
		let has = |name: &str| available.iter().any(|q| q == name);
		if query.var_list.is_empty() || !query.var_list.iter().all(|v| has(v.as_str())) {
			bail!(Error::InvalidVarList {
				species: species.to_string(),
				available: join(available),
			});
		}
		let valid = match &query.selection {
			None => true,
			Some(Selection::Range(e)) => e.names().all(has),
			Some(Selection::Tracked(_)) => has("id"),
		};
		if !valid {
			bail!(Error::InvalidSelection {
				available: join(available),
			});
		}
		Ok(())
	}

	/// Read the requested quantities of one species at one iteration,
	/// keeping only the selected particles
	pub fn get_particle(&self, query: &ParticleQuery) -> Result<ParticleData> {
		let species = self.resolve_species(query.species.as_deref())?;
		self.validate(species, query)?;
		let iteration = self.resolve(&query.locator)?;
		self.read_at(query, species, iteration)
	}

	/// Run one query at every iteration in turn, ignoring its locator, and
	/// collect the results in iteration order
	pub fn iterate(&self, query: &ParticleQuery) -> Result<Vec<ParticleData>> {
		let species = self.resolve_species(query.species.as_deref())?;
		self.validate(species, query)?;
		debug!(target: TARGET, iterations = self.iterations.len(), species, "Iterating over the series");
		self.iterations.iter().map(|it| self.read_at(query, species, *it)).collect()
	}

	fn read_at(&self, query: &ParticleQuery, species: &str, iteration: u64) -> Result<ParticleData> {
		let vars: Vec<Attribute> = query.var_list.iter().map(|v| Attribute::parse(v)).collect();
		let reader = ChunkedDataReader::new(self.series.as_ref(), iteration, species);
		let values = match &query.selection {
			Some(Selection::Range(e)) if !e.is_empty() => {
				self.read_selected(&reader, iteration, species, &vars, e, &query.options)?
			}
			Some(Selection::Tracked(ids)) => read_tracked(&reader, &vars, ids)?,
			_ => vars.iter().map(|a| reader.read_full(a)).collect::<Result<Vec<_>>>()?,
		};
		Ok(ParticleData {
			iteration,
			names: query.var_list.clone(),
			values,
		})
	}

	fn read_selected(
		&self,
		reader: &ChunkedDataReader,
		iteration: u64,
		species: &str,
		vars: &[Attribute],
		envelope: &Envelope,
		opts: &Options,
	) -> Result<Vec<Values>> {
		debug!(target: TARGET, mode = %opts.mode, species, iteration, "Executing range selection");
		let extents = if opts.mode.is_indexed() {
			let Some(index) = self.index.as_deref() else {
				bail!(Error::NoIndex(opts.mode.name()));
			};
			let ikb = IndexKeyBase::new(iteration, species, self.key_format.clone());
			let candidates = candidates(index, &ikb, envelope, opts)?;
			debug!(
				target: TARGET,
				candidates = candidates.len(),
				records = candidates.record_count(),
				"Intersected index candidates"
			);
			if candidates.is_empty() {
				return Ok(vars.iter().map(|a| Values::empty(a.kind())).collect());
			}
			plan_extents(candidates, opts.mode)
		} else {
			Extents::All
		};
		// Every requested quantity, then every selection attribute not requested
		let mut names: Vec<&str> = Vec::new();
		for name in vars.iter().map(Attribute::name).chain(envelope.names()) {
			if !names.contains(&name) {
				names.push(name);
			}
		}
		let mut buffers = HashMap::default();
		for name in names {
			let values = extents.read(reader, &Attribute::parse(name))?;
			buffers.insert(name.to_string(), values);
		}
		let coarse = buffers.values().map(Values::len).max().unwrap_or(0);
		let mask = FineFilter::new(envelope).mask(&buffers, coarse)?;
		debug!(
			target: TARGET,
			coarse,
			matches = mask.iter().filter(|m| **m).count(),
			"Filtered coarse records"
		);
		vars.iter()
			.map(|a| match buffers.get(a.name()) {
				Some(v) => apply_mask(&mask, v),
				None => fail!("No buffer was read for '{}'", a.name()),
			})
			.collect()
	}
}

/// Query the index once per record group, or once per attribute for the
/// min-max index, and intersect the answers
fn candidates(
	index: &dyn IndexClient,
	ikb: &IndexKeyBase,
	envelope: &Envelope,
	opts: &Options,
) -> Result<Candidates> {
	let mut results = Vec::new();
	if let ReadStrategyMode::SecondaryIndexed = opts.mode {
		for a in compile_attributes(envelope, opts.mass)? {
			let key = ikb.new_dim_key(a.group, a.dim);
			trace!(target: TARGET, key = %key, lower = a.lower, upper = a.upper, "Querying min-max index");
			results.push(BlockQueryResult::Ranges(index.query_min_max_data(&key, a.lower, a.upper)?));
		}
		return intersect(results);
	}
	for g in compile_envelope(envelope, opts.mass)? {
		let key = ikb.new_group_key(g.group);
		trace!(target: TARGET, key = %key, bbox = ?g.bbox, "Querying bounding-box index");
		let result = match opts.mode {
			ReadStrategyMode::Indexed => BlockQueryResult::Ranges(index.query_by_xyz(&key, &g.bbox)?),
			ReadStrategyMode::DirectBlock => BlockQueryResult::Blocks(index.query_by_block_xyz(&key, &g.bbox)?),
			ReadStrategyMode::FirstLevelBlock | ReadStrategyMode::DirectBlockGrouped(_) => {
				BlockQueryResult::Blocks(index.query_by_only_block_xyz(&key, &g.bbox)?)
			}
			mode => fail!("The {mode} mode does not query a bounding-box index"),
		};
		results.push(result);
	}
	intersect(results)
}

fn plan_extents(candidates: Candidates, mode: ReadStrategyMode) -> Extents {
	match (candidates, mode) {
		(Candidates::Ranges(set), _) => Extents::Chunks(chunks(set)),
		(Candidates::Blocks(map), ReadStrategyMode::DirectBlockGrouped(planner)) => {
			let sorted: Vec<Block> = map.into_values().collect();
			let ranges: Vec<BlockRange> = sorted.iter().map(|b| b.range).collect();
			let strategy = find_optimal_strategy(&ranges, &planner);
			Extents::Grouped(sorted, strategy)
		}
		(Candidates::Blocks(map), _) => Extents::Blocks(map),
	}
}

fn chunks(set: BTreeSet<BlockRange>) -> Vec<Chunk> {
	set.into_iter().map(Chunk::from).collect()
}

/// Keep the particles whose id is tracked, reading every quantity in full
fn read_tracked(reader: &ChunkedDataReader, vars: &[Attribute], ids: &HashSet<u64>) -> Result<Vec<Values>> {
	let id = reader.read_full(&Attribute::parse("id"))?;
	let Some(id) = id.as_u64() else {
		fail!("Particle ids were not read as unsigned integers");
	};
	let mask: Vec<bool> = id.iter().map(|i| ids.contains(i)).collect();
	debug!(target: TARGET, tracked = ids.len(), matches = mask.iter().filter(|m| **m).count(), "Selected tracked particles");
	vars.iter().map(|a| apply_mask(&mask, &reader.read_full(a)?)).collect()
}
