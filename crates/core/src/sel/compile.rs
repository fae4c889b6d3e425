use std::collections::BTreeMap;

use anyhow::{Result, bail};

use crate::cnf::SPEED_OF_LIGHT;
use crate::err::Error;
use crate::sel::{Attribute, Dim, Envelope, Group, Interval};

/// An axis-aligned box in the raw key space of one index group.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
	pub min: [f64; 3],
	pub max: [f64; 3],
}

impl Default for BoundingBox {
	fn default() -> Self {
		Self {
			min: [f64::NEG_INFINITY; 3],
			max: [f64::INFINITY; 3],
		}
	}
}

impl BoundingBox {
	pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
		Self {
			min,
			max,
		}
	}

	/// Do the two closed boxes share any point?
	pub fn intersects(&self, other: &BoundingBox) -> bool {
		(0..3).all(|d| self.min[d] <= other.max[d] && other.min[d] <= self.max[d])
	}

	fn constrain(&mut self, axis: usize, lower: f64, upper: f64) {
		self.min[axis] = lower;
		self.max[axis] = upper;
	}
}

/// The box to query for one physical record group.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupBox {
	pub group: Group,
	pub bbox: BoundingBox,
}

/// Convert a physical momentum bound into the raw stored momentum units,
/// which differ by the normalisation constant `1 / (mass * c)`
pub fn raw_momentum_bound(value: f64, mass: f64) -> f64 {
	if mass == 0.0 {
		return value;
	}
	let norm = 1.0 / (mass * SPEED_OF_LIGHT);
	value / norm
}

/// The raw index range for one selection attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeRange {
	pub attribute: Attribute,
	pub group: Group,
	pub dim: Option<Dim>,
	pub lower: f64,
	pub upper: f64,
}

fn resolve(name: &str) -> Result<(Attribute, Group, Option<Dim>)> {
	let attribute = Attribute::parse(name);
	let Some((group, dim)) = attribute.group() else {
		bail!(Error::UnsupportedAttribute(name.to_string()));
	};
	Ok((attribute, group, dim))
}

fn raw_bounds(group: Group, interval: &Interval, mass: f64) -> (f64, f64) {
	match group {
		Group::Momentum => {
			(raw_momentum_bound(interval.min(), mass), raw_momentum_bound(interval.max(), mass))
		}
		_ => (interval.min(), interval.max()),
	}
}

/// Build one bounding box per physical record group named by the envelope.
///
/// Dimensions the envelope does not constrain span the whole axis. The
/// weighting group has a single axis, stored in the `x` slot.
pub fn compile_envelope(envelope: &Envelope, mass: f64) -> Result<Vec<GroupBox>> {
	let mut boxes: BTreeMap<Group, BoundingBox> = BTreeMap::new();
	for (name, interval) in envelope.iter() {
		let (_, group, dim) = resolve(name)?;
		let (lower, upper) = raw_bounds(group, interval, mass);
		let axis = match dim {
			Some(Dim::X) | None => 0,
			Some(Dim::Y) => 1,
			Some(Dim::Z) => 2,
		};
		boxes.entry(group).or_default().constrain(axis, lower, upper);
	}
	Ok(boxes
		.into_iter()
		.map(|(group, bbox)| GroupBox {
			group,
			bbox,
		})
		.collect())
}

/// Build one raw range per selection attribute, for per-dimension indexes
pub fn compile_attributes(envelope: &Envelope, mass: f64) -> Result<Vec<AttributeRange>> {
	envelope
		.iter()
		.map(|(name, interval)| {
			let (attribute, group, dim) = resolve(name)?;
			let (lower, upper) = raw_bounds(group, interval, mass);
			Ok(AttributeRange {
				attribute,
				group,
				dim,
				lower,
				upper,
			})
		})
		.collect()
}
