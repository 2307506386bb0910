use crate::constants::*;
use crate::velocity_set::D;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DensityProfile {
    Constant(Float),
    /// `gradient · position + offset`
    Linear { gradient: [Float; D], offset: Float },
}

impl DensityProfile {
    /// # Examples
    /// ```
    /// # use lbtwophase::lattice::DensityProfile;
    /// let profile = DensityProfile::Linear { gradient: [0.0, -0.5, 0.0], offset: 2.0 };
    ///
    /// assert_eq!(profile.evaluate([3.0, 2.0, 1.0]), 1.0);
    /// assert_eq!(DensityProfile::Constant(0.98).evaluate([3.0, 2.0, 1.0]), 0.98);
    /// ```
    pub fn evaluate(&self, position: [Float; D]) -> Float {
        match self {
            DensityProfile::Constant(density) => *density,
            DensityProfile::Linear { gradient, offset } => {
                gradient
                    .iter()
                    .zip(position.iter())
                    .map(|(g_x, p_x)| g_x * p_x)
                    .sum::<Float>()
                    + offset
            }
        }
    }
}

// --------------------------------------------------------------------- STRUCT: PhaseInit

/// Initial state of one phase inside one material region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseInit {
    pub density: DensityProfile,
    pub velocity: [Float; D],
    pub noise: bool,
    pub external_force: [Float; D],
}

impl PhaseInit {
    pub fn empty() -> Self {
        PhaseInit {
            density: DensityProfile::Constant(0.0),
            velocity: [0.0; D],
            noise: false,
            external_force: [0.0; D],
        }
    }

    pub fn at_rest(density: DensityProfile) -> Self {
        PhaseInit {
            density,
            ..PhaseInit::empty()
        }
    }

    pub fn with_noise(self) -> Self {
        PhaseInit {
            noise: true,
            ..self
        }
    }

    pub fn with_external_force(self, external_force: [Float; D]) -> Self {
        PhaseInit {
            external_force,
            ..self
        }
    }

    /// Density at `position`; `sample` is the uniform `[0, 1)` draw of the voxel.
    pub fn get_density(&self, position: [Float; D], sample: Float, amplitude: Float) -> Float {
        let density = self.density.evaluate(position);
        if self.noise {
            density + sample * amplitude
        } else {
            density
        }
    }
}

// -------------------------------------------------------------------- STRUCT: RegionInit

#[derive(Debug, Clone, PartialEq)]
pub struct RegionInit {
    pub material: MaterialId,
    pub phases: [PhaseInit; 2],
}

impl RegionInit {
    pub fn new(material: MaterialId, phase_one: PhaseInit, phase_two: PhaseInit) -> Self {
        RegionInit {
            material,
            phases: [phase_one, phase_two],
        }
    }
}

/// Uniform `[0, 1)` sample tied to the global voxel index and the phase, so
/// the noise field does not depend on the decomposition.
///
/// # Examples
/// ```
/// # use lbtwophase::lattice::noise_sample;
/// let sample = noise_sample(7, 1234, 0);
///
/// assert_eq!(sample, noise_sample(7, 1234, 0));
/// assert_ne!(sample, noise_sample(7, 1235, 0));
/// assert!((0.0..1.0).contains(&sample));
/// ```
pub fn noise_sample(seed: u64, global_index: usize, phase: usize) -> Float {
    let stream = (global_index as u64).wrapping_mul(2).wrapping_add(phase as u64);
    let mut rng = StdRng::seed_from_u64(seed ^ stream.wrapping_mul(0x9e37_79b9_7f4a_7c15));
    rng.random::<Float>()
}
