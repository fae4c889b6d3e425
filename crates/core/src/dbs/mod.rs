//! Query execution: options, the chunked reader, exact filtering and the
//! [`TimeSeries`] entry point.

mod executor;
mod filter;
mod options;
mod reader;

pub use executor::{Locator, ParticleData, ParticleQuery, TimeSeries};
pub use filter::{FineFilter, apply_mask};
pub use options::{Options, ReadStrategyMode};
pub use reader::ChunkedDataReader;
