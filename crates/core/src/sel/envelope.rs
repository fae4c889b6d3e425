use std::collections::BTreeMap;

use ahash::HashSet;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A numeric range over one attribute. A missing or infinite side is
/// unbounded. Both sides are exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "(Option<f64>, Option<f64>)", into = "(Option<f64>, Option<f64>)")]
pub struct Interval {
	lower: Option<f64>,
	upper: Option<f64>,
}

impl Interval {
	pub fn new(lower: Option<f64>, upper: Option<f64>) -> Self {
		Self {
			lower: lower.filter(|v| *v != f64::NEG_INFINITY),
			upper: upper.filter(|v| *v != f64::INFINITY),
		}
	}

	pub fn between(lower: f64, upper: f64) -> Self {
		Self::new(Some(lower), Some(upper))
	}

	pub fn unbounded() -> Self {
		Self::default()
	}

	pub fn lower(&self) -> Option<f64> {
		self.lower
	}

	pub fn upper(&self) -> Option<f64> {
		self.upper
	}

	/// The lower side, with an unbounded side as negative infinity
	pub fn min(&self) -> f64 {
		self.lower.unwrap_or(f64::NEG_INFINITY)
	}

	/// The upper side, with an unbounded side as positive infinity
	pub fn max(&self) -> f64 {
		self.upper.unwrap_or(f64::INFINITY)
	}

	pub fn contains(&self, v: f64) -> bool {
		self.lower.is_none_or(|l| v > l) && self.upper.is_none_or(|u| v < u)
	}
}

impl From<(Option<f64>, Option<f64>)> for Interval {
	fn from((lower, upper): (Option<f64>, Option<f64>)) -> Self {
		Self::new(lower, upper)
	}
}

impl From<Interval> for (Option<f64>, Option<f64>) {
	fn from(i: Interval) -> Self {
		(i.lower, i.upper)
	}
}

/// A selection predicate: a range per attribute name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Envelope(BTreeMap<String, Interval>);

impl Envelope {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add a range, with support for chaining
	pub fn with(mut self, name: impl Into<String>, interval: Interval) -> Self {
		self.0.insert(name.into(), interval);
		self
	}

	/// Parse an envelope from its JSON form, `{"z": [lower, upper], ..}`
	/// with `null` for an unbounded side
	pub fn from_json(s: &str) -> Result<Self> {
		Ok(serde_json::from_str(s).map_err(crate::err::Error::from)?)
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn get(&self, name: &str) -> Option<&Interval> {
		self.0.get(name)
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.0.keys().map(String::as_str)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Interval)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v))
	}
}

impl<S: Into<String>> FromIterator<(S, Interval)> for Envelope {
	fn from_iter<T: IntoIterator<Item = (S, Interval)>>(iter: T) -> Self {
		Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
	}
}

/// How the particles to return are chosen.
#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
	/// Particles whose attributes fall inside every range
	Range(Envelope),
	/// Particles whose `id` is in the set
	Tracked(HashSet<u64>),
}

impl Selection {
	pub fn tracked(ids: impl IntoIterator<Item = u64>) -> Self {
		Self::Tracked(ids.into_iter().collect())
	}
}

impl From<Envelope> for Selection {
	fn from(e: Envelope) -> Self {
		Self::Range(e)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn infinite_sides_are_unbounded() {
		let i = Interval::new(Some(f64::NEG_INFINITY), Some(f64::INFINITY));
		assert_eq!(i, Interval::unbounded());
		assert_eq!(i.min(), f64::NEG_INFINITY);
		assert_eq!(i.max(), f64::INFINITY);
		assert!(i.contains(0.0));
	}

	#[test]
	fn bounds_are_exclusive() {
		let i = Interval::between(1.0, 2.0);
		assert!(!i.contains(1.0));
		assert!(!i.contains(2.0));
		assert!(i.contains(1.5));
	}

	#[test]
	fn parses_json() {
		let e = Envelope::from_json(r#"{"z": [null, 4.5], "ux": [-1.0, 1.0]}"#).unwrap();
		assert_eq!(e.len(), 2);
		assert_eq!(e.get("z"), Some(&Interval::new(None, Some(4.5))));
		assert_eq!(e.get("ux"), Some(&Interval::between(-1.0, 1.0)));
		assert!(Envelope::from_json(r#"{"z": 3}"#).is_err());
	}
}
