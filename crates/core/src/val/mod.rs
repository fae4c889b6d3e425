use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::err::Error;

/// The element type a record component is read as.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
	F64,
	U64,
}

/// A contiguous numeric buffer read from one record component.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Values {
	U64(Vec<u64>),
	F64(Vec<f64>),
}

impl Kind {
	/// Particle ids are stored as unsigned integers, every other record as floats
	pub fn of_record(record: &str) -> Self {
		match record {
			"id" => Self::U64,
			_ => Self::F64,
		}
	}
}

impl Default for Values {
	fn default() -> Self {
		Self::F64(Vec::new())
	}
}

impl From<Vec<f64>> for Values {
	fn from(v: Vec<f64>) -> Self {
		Self::F64(v)
	}
}

impl From<Vec<u64>> for Values {
	fn from(v: Vec<u64>) -> Self {
		Self::U64(v)
	}
}

impl Values {
	pub fn empty(kind: Kind) -> Self {
		Self::with_capacity(kind, 0)
	}

	pub fn with_capacity(kind: Kind, capacity: usize) -> Self {
		match kind {
			Kind::F64 => Self::F64(Vec::with_capacity(capacity)),
			Kind::U64 => Self::U64(Vec::with_capacity(capacity)),
		}
	}

	/// A buffer holding `len` copies of `value`
	pub fn filled(kind: Kind, value: f64, len: usize) -> Self {
		match kind {
			Kind::F64 => Self::F64(vec![value; len]),
			Kind::U64 => Self::U64(vec![value as u64; len]),
		}
	}

	pub fn kind(&self) -> Kind {
		match self {
			Self::F64(_) => Kind::F64,
			Self::U64(_) => Kind::U64,
		}
	}

	pub fn len(&self) -> usize {
		match self {
			Self::F64(v) => v.len(),
			Self::U64(v) => v.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Read one element, widened to a float
	pub fn get_f64(&self, i: usize) -> Option<f64> {
		match self {
			Self::F64(v) => v.get(i).copied(),
			Self::U64(v) => v.get(i).map(|x| *x as f64),
		}
	}

	pub fn as_f64(&self) -> Option<&[f64]> {
		match self {
			Self::F64(v) => Some(v),
			Self::U64(_) => None,
		}
	}

	pub fn as_f64_mut(&mut self) -> Option<&mut Vec<f64>> {
		match self {
			Self::F64(v) => Some(v),
			Self::U64(_) => None,
		}
	}

	pub fn as_u64(&self) -> Option<&[u64]> {
		match self {
			Self::U64(v) => Some(v),
			Self::F64(_) => None,
		}
	}

	/// Copy out every element, widened to a float
	pub fn to_f64_vec(&self) -> Vec<f64> {
		match self {
			Self::F64(v) => v.clone(),
			Self::U64(v) => v.iter().map(|x| *x as f64).collect(),
		}
	}

	/// Convert into a buffer of the given kind, truncating floats
	pub fn cast(self, kind: Kind) -> Values {
		match (self, kind) {
			(Self::F64(v), Kind::U64) => Self::U64(v.into_iter().map(|x| x as u64).collect()),
			(Self::U64(v), Kind::F64) => Self::F64(v.into_iter().map(|x| x as f64).collect()),
			(v, _) => v,
		}
	}

	/// Copy out `len` elements starting at `offset`
	pub fn slice(&self, offset: usize, len: usize) -> Result<Values> {
		let Some(end) = offset.checked_add(len).filter(|end| *end <= self.len()) else {
			fail!("Values::slice {offset}+{len} is out of bounds for {} values", self.len());
		};
		Ok(match self {
			Self::F64(v) => Self::F64(v[offset..end].to_vec()),
			Self::U64(v) => Self::U64(v[offset..end].to_vec()),
		})
	}

	/// Move every element of `other` onto the end of this buffer
	pub fn append(&mut self, other: Values) -> Result<()> {
		match (self, other) {
			(Self::F64(a), Self::F64(mut b)) => a.append(&mut b),
			(Self::U64(a), Self::U64(mut b)) => a.append(&mut b),
			(a, b) => fail!("Values::append of {:?} onto {:?}", b.kind(), a.kind()),
		}
		Ok(())
	}

	/// Keep only the elements whose position is set in the mask
	pub fn select(&self, mask: &[bool]) -> Result<Values> {
		if mask.len() != self.len() {
			return Err(anyhow::Error::new(Error::LengthMismatch {
				name: "selection mask".to_string(),
				expected: self.len(),
				found: mask.len(),
			}));
		}
		Ok(match self {
			Self::F64(v) => Self::F64(keep(v, mask)),
			Self::U64(v) => Self::U64(keep(v, mask)),
		})
	}
}

fn keep<T: Copy>(v: &[T], mask: &[bool]) -> Vec<T> {
	v.iter().zip(mask).filter(|(_, m)| **m).map(|(x, _)| *x).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn slice_and_append() {
		let mut a = Values::from(vec![1.0, 2.0, 3.0, 4.0]);
		let b = a.slice(1, 2).unwrap();
		assert_eq!(b, Values::from(vec![2.0, 3.0]));
		assert!(a.slice(3, 2).is_err());
		a.append(b).unwrap();
		assert_eq!(a.len(), 6);
		assert!(a.append(Values::from(vec![1u64])).is_err());
	}

	#[test]
	fn select_requires_aligned_mask() {
		let v = Values::from(vec![10u64, 20, 30]);
		assert_eq!(v.select(&[true, false, true]).unwrap(), Values::from(vec![10u64, 30]));
		let err = v.select(&[true]).unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::LengthMismatch { .. })));
	}

	#[test]
	fn cast_between_kinds() {
		assert_eq!(Values::from(vec![1u64, 2]).cast(Kind::F64), Values::from(vec![1.0, 2.0]));
		assert_eq!(Values::from(vec![3.0, 4.0]).cast(Kind::U64), Values::from(vec![3u64, 4]));
		assert_eq!(Kind::of_record("id"), Kind::U64);
		assert_eq!(Kind::of_record("position"), Kind::F64);
	}

	#[test]
	fn unsigned_values_widen() {
		let v = Values::from(vec![7u64]);
		assert_eq!(v.get_f64(0), Some(7.0));
		assert_eq!(v.to_f64_vec(), vec![7.0]);
		assert!(v.as_f64().is_none());
	}
}
