#![allow(dead_code)]

use pmdquery_core::idx::mem::{IndexedBlock, MemIndex};
use pmdquery_core::idx::{BlockRange, KeyFormat};
use pmdquery_core::sel::{BoundingBox, Dim, Group};
use pmdquery_core::store::mem::MemSeries;

pub const ITERATION: u64 = 500;
pub const SPECIES: &str = "electrons";
/// Records in the species
pub const N: u64 = 2000;
/// Records per first-level index block
pub const BLOCK: u64 = 100;
/// Records per index sub-range
pub const SUB: u64 = 25;

type Column = fn(u64) -> f64;

pub fn x(i: u64) -> f64 {
	((i * 37) % 100) as f64 / 100.0 - 0.5
}

pub fn y(i: u64) -> f64 {
	((i * 53) % 100) as f64 / 100.0
}

/// Sorted along the storage order, so that the index is selective in z
pub fn z(i: u64) -> f64 {
	i as f64 * 1e-3
}

pub fn ux_raw(i: u64) -> f64 {
	((i * 17) % 41) as f64 * 1e-23
}

pub fn uy_raw(i: u64) -> f64 {
	-(((i * 7) % 13) as f64) * 1e-23
}

pub fn uz_raw(i: u64) -> f64 {
	((i * 29) % 31) as f64 * 1e-23
}

/// Heavier in the second half of the species
pub fn w(i: u64) -> f64 {
	1.0 + (i % 3) as f64 + (i / 1000) as f64 * 10.0
}

fn zero(_: u64) -> f64 {
	0.0
}

fn column(f: Column) -> Vec<f64> {
	(0..N).map(f).collect()
}

pub fn series() -> MemSeries {
	let mut s = MemSeries::new().with_iteration(ITERATION, 3.2e-14);
	for (dim, f) in [("x", x as Column), ("y", y), ("z", z)] {
		s = s
			.with_component(ITERATION, SPECIES, "position", Some(dim), column(f))
			.with_constant(ITERATION, SPECIES, "positionOffset", Some(dim), 0.0, N);
	}
	for (dim, f) in [("x", ux_raw as Column), ("y", uy_raw), ("z", uz_raw)] {
		s = s.with_component(ITERATION, SPECIES, "momentum", Some(dim), column(f));
	}
	s.with_component(ITERATION, SPECIES, "weighting", None, column(w))
		.with_constant(ITERATION, SPECIES, "mass", None, 9.109_382_91e-31, N)
		.with_constant(ITERATION, SPECIES, "charge", None, -1.602_176_634e-19, N)
		.with_component(ITERATION, SPECIES, "id", None, (0..N).map(|i| 1000 + i).collect::<Vec<u64>>())
}

fn bounds(range: BlockRange, dims: &[Column; 3]) -> BoundingBox {
	let mut bbox = BoundingBox::new([f64::INFINITY; 3], [f64::NEG_INFINITY; 3]);
	for i in range.start..=range.end {
		for (d, f) in dims.iter().enumerate() {
			bbox.min[d] = bbox.min[d].min(f(i));
			bbox.max[d] = bbox.max[d].max(f(i));
		}
	}
	bbox
}

fn groups() -> [(Group, [Column; 3]); 3] {
	[
		(Group::Position, [x, y, z]),
		(Group::Momentum, [ux_raw, uy_raw, uz_raw]),
		(Group::Weighting, [w, zero, zero]),
	]
}

/// An index over the raw stored values of [`series`], with keys built by
/// `format`
pub fn index_with(format: &KeyFormat) -> MemIndex {
	let mut index = MemIndex::new();
	for (group, dims) in groups() {
		let key = format.key(ITERATION, SPECIES, group, None);
		let axes: &[Option<Dim>] = match group {
			Group::Weighting => &[None],
			_ => &[Some(Dim::X), Some(Dim::Y), Some(Dim::Z)],
		};
		for start in (0..N).step_by(BLOCK as usize) {
			let range = BlockRange::new(start, (start + BLOCK).min(N) - 1);
			let mut block = IndexedBlock::new(range, bounds(range, &dims));
			for s in (range.start..=range.end).step_by(SUB as usize) {
				let sub = BlockRange::new(s, (s + SUB - 1).min(range.end));
				let b = bounds(sub, &dims);
				block = block.with_subrange(sub, b);
				for (axis, dim) in axes.iter().enumerate() {
					let key = format.key(ITERATION, SPECIES, group, *dim);
					index.insert_min_max(key, sub, b.min[axis], b.max[axis]);
				}
			}
			index.insert_block(key.clone(), block);
		}
	}
	index
}

pub fn index() -> MemIndex {
	index_with(&KeyFormat::default())
}
