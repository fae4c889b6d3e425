use std::fmt;
use std::io::Error as IoError;

use serde_json::Error as JsonError;
use thiserror::Error;

/// An error originating from a particle query.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
	/// The query encountered unreachable logic
	#[error("The query encountered unreachable logic: {0}")]
	Unreachable(String),

	/// A selection attribute can not be mapped onto an indexed record group
	#[error(
		"The attribute '{0}' is not supported here. Expected one of x, y, z, ux, uy, uz, w or a position/momentum/weighting record path"
	)]
	UnsupportedAttribute(String),

	/// The series holds no particle species
	#[error("No particle data in this time series")]
	NoParticleData,

	/// The requested species is missing or ambiguous
	#[error("The species '{value}' is missing or erroneous. The available species are: {available}")]
	SpeciesNotFound {
		value: String,
		available: String,
	},

	/// The requested variable list is empty or names unknown components
	#[error(
		"The variable list is missing or erroneous. The available quantities for species '{species}' are: {available}"
	)]
	InvalidVarList {
		species: String,
		available: String,
	},

	/// A selection key names an unknown component
	#[error("The selection is erroneous. The available quantities are: {available}")]
	InvalidSelection {
		available: String,
	},

	/// Both a time and an iteration were requested
	#[error("Please pass either a time or an iteration, but not both")]
	TimeAndIteration,

	/// The requested iteration is not part of the series
	#[error("The requested iteration '{value}' is not available. The available iterations are: {available}")]
	IterationNotFound {
		value: u64,
		available: String,
	},

	/// A record component could not be resolved in the backing store
	#[error("The record component '{0}' does not exist")]
	ComponentNotFound(String),

	/// An indexed read mode was requested without an index client
	#[error("The read mode '{0}' requires an index client, but none was configured")]
	NoIndex(&'static str),

	/// Two buffers which must align element by element did not
	#[error("Expected {expected} values for '{name}', but found {found}")]
	LengthMismatch {
		name: String,
		expected: usize,
		found: usize,
	},

	/// A chunk descriptor does not describe a readable range
	#[error("Invalid chunk {start}..{end} with stride {stride}")]
	InvalidChunk {
		start: u64,
		end: u64,
		stride: u64,
	},

	/// There was a problem with the backing store
	#[error("There was a problem with the backing store: {0}")]
	Store(String),

	/// There was a problem with the spatial index
	#[error("There was a problem with the spatial index: {0}")]
	Index(String),

	/// There was an error reading a file
	#[error("I/O error: {0}")]
	Io(#[from] IoError),

	/// There was an error decoding a JSON document
	#[error("JSON error: {0}")]
	Json(#[from] JsonError),
}

impl Error {
	#[track_caller]
	pub fn unreachable<T: fmt::Display>(message: T) -> Error {
		let location = std::panic::Location::caller();
		let message = format!("{}:{}: {}", location.file(), location.line(), message);
		Error::Unreachable(message)
	}

	/// Check if this error was raised while validating the query, before any I/O
	pub fn is_validation_error(&self) -> bool {
		matches!(
			self,
			Error::UnsupportedAttribute(_)
				| Error::NoParticleData
				| Error::SpeciesNotFound { .. }
				| Error::InvalidVarList { .. }
				| Error::InvalidSelection { .. }
				| Error::TimeAndIteration
				| Error::IterationNotFound { .. }
		)
	}
}
