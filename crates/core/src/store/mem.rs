//! An in-memory [`Series`], built in code or loaded from a JSON snapshot.
//!
//! A snapshot has the shape
//!
//! ```json
//! {
//!   "extensions": ["ED-PIC"],
//!   "iterations": {
//!     "100": {
//!       "time": 1.3e-14,
//!       "particles": {
//!         "electrons": {
//!           "position": { "components": { "x": [0.1, 0.2], "y": [0.0, 0.5] } },
//!           "positionOffset": { "components": { "x": { "value": 0.0, "shape": 2 } } },
//!           "momentum": { "macroWeighted": 1, "weightingPower": 1.0, "components": { "x": [1.0, 2.0] } },
//!           "weighting": { "components": [1.0, 2.0] }
//!         }
//!       }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::err::Error;
use crate::store::{Chunk, ComponentInfo, ComponentPath, RecordMeta, Series};
use crate::val::{Kind, Values};

const TARGET: &str = "pmdquery::core::store::mem";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum Component {
	Constant {
		value: f64,
		shape: u64,
	},
	Data(Values),
}

impl Component {
	fn len(&self) -> u64 {
		match self {
			Self::Constant {
				shape,
				..
			} => *shape,
			Self::Data(v) => v.len() as u64,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum Components {
	Scalar(Component),
	Vector(BTreeMap<String, Component>),
}

impl Default for Components {
	fn default() -> Self {
		Self::Vector(BTreeMap::new())
	}
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Record {
	#[serde(default, rename = "macroWeighted")]
	macro_weighted: u32,
	#[serde(default, rename = "weightingPower")]
	weighting_power: f64,
	#[serde(default)]
	components: Components,
}

impl Record {
	fn meta(&self, name: &str) -> RecordMeta {
		RecordMeta {
			name: name.to_string(),
			components: match &self.components {
				Components::Scalar(_) => Vec::new(),
				Components::Vector(m) => m.keys().cloned().collect(),
			},
			macro_weighted: self.macro_weighted == 1,
			weighting_power: self.weighting_power,
		}
	}
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Iteration {
	#[serde(default)]
	time: f64,
	#[serde(default)]
	particles: BTreeMap<String, BTreeMap<String, Record>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MemSeries {
	#[serde(default)]
	extensions: Vec<String>,
	#[serde(default)]
	iterations: BTreeMap<u64, Iteration>,
	/// The number of component reads served so far
	#[serde(skip)]
	loads: AtomicU64,
}

fn join<T: ToString>(items: impl IntoIterator<Item = T>) -> String {
	items.into_iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

impl MemSeries {
	pub fn new() -> Self {
		Self::default()
	}

	/// Load a series from a JSON snapshot file
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		debug!(target: TARGET, path = %path.display(), "Opening series snapshot");
		let s = std::fs::read_to_string(path).map_err(Error::from)?;
		Self::from_json(&s)
	}

	/// Decode a JSON snapshot. Every component of a species must hold the
	/// same number of records.
	pub fn from_json(s: &str) -> Result<Self> {
		let series: Self = serde_json::from_str(s).map_err(Error::from)?;
		series.check()?;
		Ok(series)
	}

	pub fn to_json(&self) -> Result<String> {
		Ok(serde_json::to_string(self).map_err(Error::from)?)
	}

	pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
		self.extensions.push(extension.into());
		self
	}

	pub fn with_iteration(mut self, iteration: u64, time: f64) -> Self {
		self.iterations.entry(iteration).or_default().time = time;
		self
	}

	/// Store the values of a component, replacing any previous ones
	pub fn with_component(
		mut self,
		iteration: u64,
		species: &str,
		record: &str,
		component: Option<&str>,
		values: impl Into<Values>,
	) -> Self {
		self.insert(iteration, species, record, component, Component::Data(values.into()));
		self
	}

	/// Store a component holding `len` copies of one value
	pub fn with_constant(
		mut self,
		iteration: u64,
		species: &str,
		record: &str,
		component: Option<&str>,
		value: f64,
		len: u64,
	) -> Self {
		let c = Component::Constant {
			value,
			shape: len,
		};
		self.insert(iteration, species, record, component, c);
		self
	}

	pub fn with_record_meta(
		mut self,
		iteration: u64,
		species: &str,
		record: &str,
		macro_weighted: bool,
		weighting_power: f64,
	) -> Self {
		let r = self.record_mut(iteration, species, record);
		r.macro_weighted = u32::from(macro_weighted);
		r.weighting_power = weighting_power;
		self
	}

	/// The number of component reads served so far
	pub fn loads(&self) -> u64 {
		self.loads.load(Ordering::Relaxed)
	}

	fn record_mut(&mut self, iteration: u64, species: &str, record: &str) -> &mut Record {
		self.iterations
			.entry(iteration)
			.or_default()
			.particles
			.entry(species.to_string())
			.or_default()
			.entry(record.to_string())
			.or_default()
	}

	fn insert(&mut self, iteration: u64, species: &str, record: &str, component: Option<&str>, c: Component) {
		let r = self.record_mut(iteration, species, record);
		match (component, &mut r.components) {
			(None, components) => *components = Components::Scalar(c),
			(Some(name), Components::Vector(m)) => {
				m.insert(name.to_string(), c);
			}
			(Some(name), components) => {
				*components = Components::Vector(BTreeMap::from([(name.to_string(), c)]))
			}
		}
	}

	fn check(&self) -> Result<()> {
		for (it, iteration) in &self.iterations {
			for (species, records) in &iteration.particles {
				let mut lens = records.iter().flat_map(|(name, r)| {
					let components: Vec<(Option<&str>, &Component)> = match &r.components {
						Components::Scalar(c) => vec![(None, c)],
						Components::Vector(m) => m.iter().map(|(k, c)| (Some(k.as_str()), c)).collect(),
					};
					components.into_iter().map(move |(component, c)| (name, component, c.len()))
				});
				let Some((_, _, expected)) = lens.next() else {
					continue;
				};
				if let Some((name, component, len)) = lens.find(|(_, _, len)| *len != expected) {
					let path = ComponentPath::new(*it, species, name, component);
					bail!(Error::Store(format!("{path} holds {len} records, but its species holds {expected}")));
				}
			}
		}
		Ok(())
	}

	fn iteration(&self, iteration: u64) -> Result<&Iteration> {
		match self.iterations.get(&iteration) {
			Some(v) => Ok(v),
			None => Err(anyhow::Error::new(Error::IterationNotFound {
				value: iteration,
				available: join(self.iterations.keys()),
			})),
		}
	}

	fn species_records(&self, iteration: u64, species: &str) -> Result<&BTreeMap<String, Record>> {
		let it = self.iteration(iteration)?;
		match it.particles.get(species) {
			Some(v) => Ok(v),
			None => Err(anyhow::Error::new(Error::SpeciesNotFound {
				value: species.to_string(),
				available: join(it.particles.keys()),
			})),
		}
	}

	fn component(&self, path: &ComponentPath) -> Result<&Component> {
		let records = self.species_records(path.iteration, &path.species)?;
		let component = match (records.get(&path.record).map(|r| &r.components), &path.component) {
			(Some(Components::Scalar(c)), None) => Some(c),
			(Some(Components::Vector(m)), Some(name)) => m.get(name),
			_ => None,
		};
		match component {
			Some(c) => Ok(c),
			None => Err(anyhow::Error::new(Error::ComponentNotFound(path.to_string()))),
		}
	}
}

fn strided<T: Copy>(v: &[T], chunk: Chunk) -> Vec<T> {
	v[chunk.start as usize..=chunk.end as usize].iter().step_by(chunk.stride as usize).copied().collect()
}

impl Series for MemSeries {
	fn iterations(&self) -> Vec<u64> {
		self.iterations.keys().copied().collect()
	}

	fn time(&self, iteration: u64) -> Result<f64> {
		Ok(self.iteration(iteration)?.time)
	}

	fn extensions(&self) -> Vec<String> {
		self.extensions.clone()
	}

	fn species(&self, iteration: u64) -> Result<Vec<String>> {
		Ok(self.iteration(iteration)?.particles.keys().cloned().collect())
	}

	fn records(&self, iteration: u64, species: &str) -> Result<Vec<RecordMeta>> {
		let records = self.species_records(iteration, species)?;
		Ok(records.iter().map(|(name, r)| r.meta(name)).collect())
	}

	fn record(&self, iteration: u64, species: &str, record: &str) -> Result<RecordMeta> {
		let records = self.species_records(iteration, species)?;
		match records.get(record) {
			Some(r) => Ok(r.meta(record)),
			None => Err(anyhow::Error::new(Error::ComponentNotFound(
				ComponentPath::new(iteration, species, record, None).to_string(),
			))),
		}
	}

	fn info(&self, path: &ComponentPath) -> Result<ComponentInfo> {
		let c = self.component(path)?;
		Ok(ComponentInfo {
			len: c.len(),
		})
	}

	fn load(&self, path: &ComponentPath, chunk: Chunk) -> Result<Values> {
		let c = self.component(path)?;
		chunk.validate(c.len())?;
		self.loads.fetch_add(1, Ordering::Relaxed);
		let kind = Kind::of_record(&path.record);
		Ok(match c {
			Component::Constant {
				value,
				..
			} => Values::filled(kind, *value, chunk.len() as usize),
			Component::Data(Values::F64(v)) => Values::F64(strided(v, chunk)).cast(kind),
			Component::Data(Values::U64(v)) => Values::U64(strided(v, chunk)).cast(kind),
		})
	}

	fn flush(&self) -> Result<()> {
		Ok(())
	}
}
