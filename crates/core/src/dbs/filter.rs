use ahash::HashMap;
use anyhow::Result;

use crate::err::Error;
use crate::sel::Envelope;
use crate::val::Values;

/// Exact filtering of a coarse read against the selection envelope.
///
/// Every bounded side is tested strictly, so records lying on a boundary
/// are excluded. Unbounded sides never exclude anything.
pub struct FineFilter<'a> {
	envelope: &'a Envelope,
}

impl<'a> FineFilter<'a> {
	pub fn new(envelope: &'a Envelope) -> Self {
		Self {
			envelope,
		}
	}

	/// Build the mask over `len` coarse records from the corrected buffers
	/// of every selection attribute
	pub fn mask(&self, buffers: &HashMap<String, Values>, len: usize) -> Result<Vec<bool>> {
		let mut mask = vec![true; len];
		for (name, interval) in self.envelope.iter() {
			if interval.lower().is_none() && interval.upper().is_none() {
				continue;
			}
			let Some(values) = buffers.get(name) else {
				fail!("FineFilter: no buffer was read for '{name}'");
			};
			match values.len() {
				// A record-wide constant applies to every record
				1 => {
					if !values.get_f64(0).is_some_and(|v| interval.contains(v)) {
						mask.fill(false);
					}
				}
				n if n == len => {
					for (i, keep) in mask.iter_mut().enumerate() {
						*keep = *keep && values.get_f64(i).is_some_and(|v| interval.contains(v));
					}
				}
				n => {
					return Err(anyhow::Error::new(Error::LengthMismatch {
						name: name.to_string(),
						expected: len,
						found: n,
					}));
				}
			}
		}
		Ok(mask)
	}
}

/// Apply a mask to one buffer. Record-wide constants of length one are
/// returned as they are, unless the mask itself covers a single record.
pub fn apply_mask(mask: &[bool], values: &Values) -> Result<Values> {
	if values.len() == 1 && mask.len() != 1 {
		return Ok(values.clone());
	}
	values.select(mask)
}
