pub type Float = f64;

pub const CS_2: Float = 1.0 / 3.0;

pub const CS_2_INV: Float = 3.0;

pub const CS_4_INV: Float = 9.0;

/// Depth of the halo layer required by a nearest-neighbour stencil.
pub const HALO_DEPTH: usize = 1;

pub(crate) const INDICATOR_EPSILON: Float = 1e-9;

// ---------------------------------------------------------------------- MATERIAL NUMBERS

pub type MaterialId = u8;

pub const NO_DYNAMICS: MaterialId = 0;

pub const BULK: MaterialId = 1;

pub const UPPER: MaterialId = 2;

pub const BOTTOM: MaterialId = 3;

pub const TOP: MaterialId = 4;

// ---------------------------------------------------------------- RAYLEIGH-TAYLOR DEFAULTS

pub const DEFAULT_NX: usize = 70;

pub const DEFAULT_NY: usize = 35;

pub const DEFAULT_NZ: usize = 70;

pub const DEFAULT_MAX_ITERATIONS: usize = 4000;

pub const DEFAULT_NOISE_AMPLITUDE: Float = 4e-2;

pub const DEFAULT_STAT_INTERVAL: usize = 10;

pub const DEFAULT_VTK_INTERVAL: usize = 50;

pub const DEFAULT_SEED: u64 = 0x5eed;
