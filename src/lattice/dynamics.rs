use crate::constants::*;
use crate::kernel;
use crate::velocity_set::{D, Populations, Q, Q_BAR};

/// Local collision rule of a voxel, resolved once from its material number.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Dynamics {
    #[default]
    NoDynamics,
    ForcedBgk {
        omega: Float,
    },
    BounceBack {
        density: Option<Float>,
    },
}

impl Dynamics {
    pub fn is_fluid(&self) -> bool {
        matches!(self, Dynamics::ForcedBgk { .. })
    }

    pub fn is_bounce_back(&self) -> bool {
        matches!(self, Dynamics::BounceBack { .. })
    }

    pub fn is_no_dynamics(&self) -> bool {
        matches!(self, Dynamics::NoDynamics)
    }

    pub fn get_omega(&self) -> Option<Float> {
        match *self {
            Dynamics::ForcedBgk { omega } => Some(omega),
            _ => None,
        }
    }

    /// Post-collision populations. `None` for voxels that are never updated.
    /// `velocity` is the velocity shared by both phases; the forced collision
    /// relaxes towards it shifted by half the body force.
    ///
    /// # Examples
    /// ```
    /// # use lbtwophase::lattice::Dynamics;
    /// let mut f = [0.0; 19];
    /// f[1] = 0.3;
    /// let bounce_back = Dynamics::BounceBack { density: Some(1.0) };
    ///
    /// let f_star = bounce_back.collide(&f, &[0.0; 3], &[0.0; 3]).unwrap();
    ///
    /// assert_eq!(f_star[2], 0.3);
    /// assert_eq!(f_star[1], 0.0);
    /// assert!(Dynamics::NoDynamics.collide(&f, &[0.0; 3], &[0.0; 3]).is_none());
    /// ```
    pub fn collide(
        &self,
        f: &Populations,
        velocity: &[Float; D],
        force: &[Float; D],
    ) -> Option<Populations> {
        match *self {
            Dynamics::NoDynamics => None,
            Dynamics::ForcedBgk { omega } => {
                let density = kernel::density(f);
                let velocity = kernel::forced_velocity(velocity, force);
                let f_eq = kernel::equilibrium(density, &velocity);
                let mut f_star = kernel::bgk_collision(f, &f_eq, omega);
                let source_term = kernel::momentum_source_term(density, &velocity, force, omega);
                (0..Q).for_each(|i| {
                    f_star[i] += source_term[i];
                });
                Some(f_star)
            }
            Dynamics::BounceBack { .. } => {
                let mut f_star = [0.0; Q];
                (0..Q).for_each(|i| {
                    f_star[i] = f[Q_BAR[i]];
                });
                Some(f_star)
            }
        }
    }

    /// Density seen by the other phase: the fictitious density of a wall, the
    /// zeroth moment otherwise.
    pub fn compute_density(&self, f: &Populations) -> Float {
        match *self {
            Dynamics::BounceBack {
                density: Some(density),
            } => density,
            _ => kernel::density(f),
        }
    }

    /// Velocity of the phase at a fluid voxel. A voxel without mass has no
    /// velocity.
    pub fn compute_velocity(
        &self,
        f: &Populations,
        velocity: &[Float; D],
        force: &[Float; D],
    ) -> [Float; D] {
        match *self {
            Dynamics::ForcedBgk { .. } if kernel::density(f) > 0.0 => {
                kernel::forced_velocity(velocity, force)
            }
            _ => [0.0; D],
        }
    }

    /// `(ω j, ω ρ)` of a fluid voxel, the share of this phase in the velocity
    /// common to both phases. Zero elsewhere.
    pub fn compute_weighted_moments(&self, f: &Populations) -> ([Float; D], Float) {
        match self.get_omega() {
            Some(omega) => {
                let j = kernel::momentum(f);
                (j.map(|j_x| omega * j_x), omega * kernel::density(f))
            }
            None => ([0.0; D], 0.0),
        }
    }
}
