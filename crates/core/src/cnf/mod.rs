use std::sync::LazyLock;

/// The speed of light in vacuum, in metres per second
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// The openPMD extension under which records may be macro-weighted
pub const MACRO_WEIGHTED_EXTENSION: &str = "ED-PIC";

/// The deepest recursion level the read strategy planner descends to before
/// emitting a range as a single read group (defaults to 3)
pub static PLANNER_MAX_LEVEL: LazyLock<u32> =
	lazy_env_parse!("PMDQUERY_PLANNER_MAX_LEVEL", u32, 3);

/// The longest span, in records, a single grouped read may cover before the
/// planner splits it (defaults to 100 million records)
pub static PLANNER_MAX_READ_LENGTH: LazyLock<u64> =
	lazy_env_parse!("PMDQUERY_PLANNER_MAX_READ_LENGTH", u64, 100_000_000);

/// The per-record slope of the read cost model
pub static PLANNER_COST_K: LazyLock<f64> =
	lazy_env_parse!("PMDQUERY_PLANNER_COST_K", f64, (3.7 / 3.4) * 10e-8);

/// The fixed per-read intercept of the read cost model
pub static PLANNER_COST_B: LazyLock<f64> = lazy_env_parse!("PMDQUERY_PLANNER_COST_B", f64, 0.06);

/// The particle mass used to convert momentum bounds into raw stored units
/// when the caller does not supply one (defaults to the electron mass, in kg)
pub static DEFAULT_PARTICLE_MASS: LazyLock<f64> =
	lazy_env_parse!("PMDQUERY_DEFAULT_PARTICLE_MASS", f64, 9.109_382_91e-31);
