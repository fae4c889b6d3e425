//! Particle selections and their compilation into index queries.

mod attr;
mod compile;
mod envelope;

pub use attr::{Attribute, Dim, Group, quantity_name};
pub use compile::{
	AttributeRange, BoundingBox, GroupBox, compile_attributes, compile_envelope, raw_momentum_bound,
};
pub use envelope::{Envelope, Interval, Selection};
