use std::fmt::{self, Display, Formatter};

use crate::val::Kind;

/// A spatial or momentum axis.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Dim {
	X,
	Y,
	Z,
}

impl Dim {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::X => "x",
			Self::Y => "y",
			Self::Z => "z",
		}
	}

	fn parse(s: &str) -> Option<Self> {
		match s {
			"x" => Some(Self::X),
			"y" => Some(Self::Y),
			"z" => Some(Self::Z),
			_ => None,
		}
	}
}

impl Display for Dim {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A physical record group answered by one spatial index key.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Group {
	Position,
	Momentum,
	Weighting,
}

impl Group {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Position => "position",
			Self::Momentum => "momentum",
			Self::Weighting => "weighting",
		}
	}
}

impl Display for Group {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A particle quantity as named by the caller, resolved to its openPMD
/// record and record component.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Attribute {
	name: String,
	record: String,
	component: Option<String>,
}

impl Attribute {
	/// Resolve a quantity name.
	///
	/// The short names `x`, `y`, `z`, `ux`, `uy`, `uz` and `w` map onto the
	/// position, momentum and weighting records. A `record/component` path
	/// addresses any record component, and any other name addresses a
	/// scalar record of that name.
	pub fn parse(name: &str) -> Self {
		let (record, component) = match name {
			"x" | "y" | "z" => ("position", Some(name)),
			"ux" => ("momentum", Some("x")),
			"uy" => ("momentum", Some("y")),
			"uz" => ("momentum", Some("z")),
			"w" => ("weighting", None),
			_ => match name.split_once('/') {
				Some((record, component)) => (record, Some(component)),
				None => (name, None),
			},
		};
		Self {
			name: name.to_string(),
			record: record.to_string(),
			component: component.map(str::to_string),
		}
	}

	/// The name this attribute was requested under
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn record(&self) -> &str {
		&self.record
	}

	pub fn component(&self) -> Option<&str> {
		self.component.as_deref()
	}

	/// The index group and axis this attribute is keyed under, if any
	pub fn group(&self) -> Option<(Group, Option<Dim>)> {
		let dim = self.component.as_deref().and_then(Dim::parse);
		match (self.record.as_str(), dim) {
			("position", Some(dim)) => Some((Group::Position, Some(dim))),
			("momentum", Some(dim)) => Some((Group::Momentum, Some(dim))),
			("weighting", None) => Some((Group::Weighting, None)),
			_ => None,
		}
	}

	/// The axis, when this attribute is a position component
	pub fn position_dim(&self) -> Option<Dim> {
		match self.group() {
			Some((Group::Position, dim)) => dim,
			_ => None,
		}
	}

	/// Is this a momentum component?
	pub fn is_momentum(&self) -> bool {
		matches!(self.group(), Some((Group::Momentum, _)))
	}

	pub fn is_weighting(&self) -> bool {
		self.record == "weighting"
	}

	/// Particle ids are read as unsigned integers, everything else as floats
	pub fn kind(&self) -> Kind {
		Kind::of_record(&self.record)
	}
}

/// The name a record component is offered under to callers, the inverse of
/// [`Attribute::parse`]. Position offsets are folded into positions and
/// have no name of their own.
pub fn quantity_name(record: &str, component: Option<&str>) -> Option<String> {
	let name = match (record, component) {
		("positionOffset", _) => return None,
		("position", Some(c @ ("x" | "y" | "z"))) => c.to_string(),
		("momentum", Some(c @ ("x" | "y" | "z"))) => format!("u{c}"),
		("weighting", None) => "w".to_string(),
		(record, Some(c)) => format!("{record}/{c}"),
		(record, None) => record.to_string(),
	};
	Some(name)
}

impl Display for Attribute {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str(&self.name)
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case("position", Some("y"), Some("y"))]
	#[case("momentum", Some("z"), Some("uz"))]
	#[case("weighting", None, Some("w"))]
	#[case("E", Some("x"), Some("E/x"))]
	#[case("charge", None, Some("charge"))]
	#[case("positionOffset", Some("x"), None)]
	fn quantity_names(#[case] record: &str, #[case] component: Option<&str>, #[case] expected: Option<&str>) {
		let name = quantity_name(record, component);
		assert_eq!(name.as_deref(), expected);
		if let Some(name) = name {
			let a = Attribute::parse(&name);
			assert_eq!((a.record(), a.component()), (record, component));
		}
	}

	#[rstest]
	#[case("x", "position", Some("x"), Some((Group::Position, Some(Dim::X))))]
	#[case("uz", "momentum", Some("z"), Some((Group::Momentum, Some(Dim::Z))))]
	#[case("w", "weighting", None, Some((Group::Weighting, None)))]
	#[case("momentum/y", "momentum", Some("y"), Some((Group::Momentum, Some(Dim::Y))))]
	#[case("E/r", "E", Some("r"), None)]
	#[case("id", "id", None, None)]
	#[case("momentum", "momentum", None, None)]
	fn parses_names(
		#[case] name: &str,
		#[case] record: &str,
		#[case] component: Option<&str>,
		#[case] group: Option<(Group, Option<Dim>)>,
	) {
		let a = Attribute::parse(name);
		assert_eq!(a.name(), name);
		assert_eq!(a.record(), record);
		assert_eq!(a.component(), component);
		assert_eq!(a.group(), group);
	}

	#[test]
	fn ids_are_unsigned() {
		assert_eq!(Attribute::parse("id").kind(), Kind::U64);
		assert_eq!(Attribute::parse("ux").kind(), Kind::F64);
	}
}
