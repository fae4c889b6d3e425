//! # pmdquery core
//!
//! Index-accelerated particle selection over columnar openPMD series.
//!
//! A selection envelope over particle attributes is compiled into bounding
//! boxes, answered by an external spatial index as candidate record blocks,
//! intersected across attribute groups, optionally grouped into fewer
//! physical reads, read back with unit corrections applied and finally
//! filtered down to the exact matches.
//!
//! The spatial index and the file-format reader are external collaborators,
//! reached through the [`idx::IndexClient`] and [`store::Series`] traits.
//! In-memory implementations of both live in [`idx::mem`] and [`store::mem`].

#[macro_use]
extern crate tracing;

#[macro_use]
mod mac;

pub mod cnf;
pub mod dbs;
pub mod err;
pub mod idx;
pub mod sel;
pub mod store;
pub mod val;

pub use dbs::{Locator, Options, ParticleData, ParticleQuery, ReadStrategyMode, TimeSeries};
pub use err::Error;
pub use sel::{Envelope, Selection};
pub use val::Values;
