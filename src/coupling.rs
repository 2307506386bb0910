use crate::constants::*;
use crate::lattice::{BlockLattice, Lattice, Neighbor};
use crate::velocity_set::{C, D, Q, W};
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CouplingMode {
    /// Only the first phase feels the second one.
    #[default]
    OneWay,
    Symmetric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionPotential {
    #[default]
    PsiEqualsRho,
}

impl InteractionPotential {
    pub fn compute(&self, density: Float) -> Float {
        match self {
            InteractionPotential::PsiEqualsRho => density,
        }
    }
}

// ---------------------------------------------------------------------- STRUCT: ShanChen

#[derive(Debug, Clone, PartialEq)]
pub struct ShanChen {
    g: Float,
    rho0: [Float; 2],
    potential: InteractionPotential,
    mode: CouplingMode,
}

impl ShanChen {
    pub fn new(
        g: Float,
        rho0: [Float; 2],
        potential: InteractionPotential,
        mode: CouplingMode,
    ) -> Self {
        ShanChen {
            g,
            rho0,
            potential,
            mode,
        }
    }
}

impl ShanChen {
    pub fn get_g(&self) -> Float {
        self.g
    }

    pub fn get_rho0(&self) -> &[Float; 2] {
        &self.rho0
    }

    pub fn get_mode(&self) -> CouplingMode {
        self.mode
    }

    /// Sets the velocity shared by both phases and the body force of the
    /// coupled phases from the populations left by the last exchange.
    /// Partitions are processed independently.
    pub fn execute(&self, lattice_one: &mut Lattice, lattice_two: &mut Lattice) {
        let ShanChen {
            g,
            rho0,
            potential,
            mode,
        } = *self;
        lattice_one
            .get_blocks_mut()
            .par_iter_mut()
            .zip(lattice_two.get_blocks_mut().par_iter_mut())
            .for_each(|(block_one, block_two)| {
                let velocity = compute_common_velocity(block_one, block_two);
                block_one.velocity.clone_from(&velocity);
                block_two.velocity = velocity;
                let densities_two = block_two.compute_densities();
                if mode == CouplingMode::Symmetric {
                    let densities_one = block_one.compute_densities();
                    block_two.apply_interaction_force(&densities_one, g, rho0[0], potential);
                }
                block_one.apply_interaction_force(&densities_two, g, rho0[1], potential);
            });
    }
}

/// $$ \mathbf{u} = \frac{\sum\_{\sigma} \omega\_{\sigma} \mathbf{j}\_{\sigma}}{\sum\_{\sigma} \omega\_{\sigma} \rho\_{\sigma}} $$
fn compute_common_velocity(
    block_one: &BlockLattice,
    block_two: &BlockLattice,
) -> Vec<[Float; D]> {
    (0..block_one.get_number_of_voxels())
        .into_par_iter()
        .map(|index| {
            let (j_one, rho_one) =
                block_one.dynamics[index].compute_weighted_moments(&block_one.f[index]);
            let (j_two, rho_two) =
                block_two.dynamics[index].compute_weighted_moments(&block_two.f[index]);
            let rho = rho_one + rho_two;
            if rho > 0.0 {
                std::array::from_fn(|x| (j_one[x] + j_two[x]) / rho)
            } else {
                [0.0; D]
            }
        })
        .collect()
}

impl BlockLattice {
    /// $$ \mathbf{F} = \mathbf{F}\_{\text{ext}} - G \sum\_{i} w\_{i}\psi\left(\rho'(\mathbf{x}+\mathbf{c}\_{i})\right)\mathbf{c}\_{i} $$
    fn apply_interaction_force(
        &mut self,
        partner_densities: &[Float],
        g: Float,
        partner_rho0: Float,
        potential: InteractionPotential,
    ) {
        let grid = self.grid;
        let dynamics = &self.dynamics;
        let external_force = &self.external_force;
        self.force
            .par_iter_mut()
            .enumerate()
            .filter(|(index, _)| grid.is_owned(*index) && dynamics[*index].is_fluid())
            .for_each(|(index, force)| {
                let position = grid.get_position(index);
                let own_psi = potential.compute(partner_densities[index] * partner_rho0);
                let mut interaction = [0.0; D];
                (0..Q).for_each(|i| {
                    let psi = match grid.get_neighbor(position, C[i]) {
                        Neighbor::Inside(neighbor) => {
                            potential.compute(partner_densities[neighbor] * partner_rho0)
                        }
                        Neighbor::Outside => own_psi,
                    };
                    (0..D).for_each(|x| {
                        interaction[x] += W[i] * psi * C[i][x] as Float;
                    });
                });
                (0..D).for_each(|x| {
                    force[x] = external_force[index][x] - g * interaction[x];
                });
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomposition::{CapacityPolicy, decompose};
    use crate::geometry::{Geometry, IndicatorCuboid, RenameRule};
    use crate::lattice::{DensityProfile, Dynamics, PhaseInit, RegionInit};
    use std::collections::BTreeMap;

    fn two_band_lattices(workers: usize) -> (Lattice, Lattice) {
        let n = [4, 8, 4];
        let periodic = [true, false, true];
        let mut geometry = Geometry::new(n, periodic);
        geometry.classify(&[
            RenameRule::everywhere(NO_DYNAMICS, BULK),
            RenameRule::inside(
                BULK,
                UPPER,
                IndicatorCuboid::new([6.0, 4.0, 6.0], [-1.0, 4.0, -1.0]),
            ),
        ]);
        let decomposition = decompose(n, periodic, workers, CapacityPolicy::Fail).unwrap();
        let dynamics = BTreeMap::from([
            (BULK, Dynamics::ForcedBgk { omega: 1.0 }),
            (UPPER, Dynamics::ForcedBgk { omega: 1.0 }),
        ]);
        let mut lattice_one = Lattice::new(0, &decomposition, &geometry, &dynamics);
        let mut lattice_two = Lattice::new(1, &decomposition, &geometry, &dynamics);
        let regions = [
            RegionInit::new(
                BULK,
                PhaseInit::empty(),
                PhaseInit::at_rest(DensityProfile::Constant(1.0)),
            ),
            RegionInit::new(
                UPPER,
                PhaseInit::at_rest(DensityProfile::Constant(1.0))
                    .with_external_force([0.0, -1e-3, 0.0]),
                PhaseInit::empty(),
            ),
        ];
        lattice_one.initialize(&regions, 0.0, 0);
        lattice_two.initialize(&regions, 0.0, 0);
        lattice_one.refresh_halo().unwrap();
        lattice_two.refresh_halo().unwrap();
        (lattice_one, lattice_two)
    }

    fn force_at(lattice: &Lattice, position: [usize; 3]) -> [Float; 3] {
        lattice
            .get_blocks()
            .iter()
            .flat_map(|block| {
                block
                    .get_owned_indices()
                    .into_iter()
                    .filter(|&index| block.get_global_position(index) == Some(position))
                    .map(|index| *block.get_force(index))
                    .collect::<Vec<[Float; 3]>>()
            })
            .next()
            .unwrap()
    }

    #[test]
    fn test_psi_equals_rho() {
        assert_eq!(InteractionPotential::PsiEqualsRho.compute(0.42), 0.42);
    }

    #[test]
    fn test_zero_strength_leaves_external_force() {
        let (mut lattice_one, mut lattice_two) = two_band_lattices(2);
        let coupling = ShanChen::new(
            0.0,
            [1.0, 1.0],
            InteractionPotential::PsiEqualsRho,
            CouplingMode::OneWay,
        );

        coupling.execute(&mut lattice_one, &mut lattice_two);

        assert_eq!(force_at(&lattice_one, [1, 4, 1]), [0.0, -1e-3, 0.0]);
        assert_eq!(force_at(&lattice_one, [1, 3, 1]), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_interface_pushes_phases_apart() {
        let (mut lattice_one, mut lattice_two) = two_band_lattices(1);
        let coupling = ShanChen::new(
            3.0,
            [1.0, 1.0],
            InteractionPotential::PsiEqualsRho,
            CouplingMode::OneWay,
        );

        coupling.execute(&mut lattice_one, &mut lattice_two);

        // Second phase fills y <= 3, so the first phase at y = 4 is pushed up.
        let force = force_at(&lattice_one, [2, 4, 2]);
        assert!((force[1] - (-1e-3 + 3.0 / 6.0)).abs() < 1e-12);
        assert!(force[0].abs() < 1e-15);
        assert!(force[2].abs() < 1e-15);
        // Far from the interface the partner density is uniform.
        let force = force_at(&lattice_one, [2, 6, 2]);
        assert!((force[1] + 1e-3).abs() < 1e-15);
    }

    #[test]
    fn test_outside_neighbors_use_own_potential() {
        let (mut lattice_one, mut lattice_two) = two_band_lattices(1);
        let coupling = ShanChen::new(
            3.0,
            [1.0, 1.0],
            InteractionPotential::PsiEqualsRho,
            CouplingMode::OneWay,
        );

        coupling.execute(&mut lattice_one, &mut lattice_two);

        // Uniform partner density below the interface, the wall included.
        let force = force_at(&lattice_one, [0, 0, 0]);
        assert!(force.iter().all(|f_x| f_x.abs() < 1e-15));
    }

    #[test]
    fn test_one_way_mode_leaves_second_phase_alone() {
        let (mut lattice_one, mut lattice_two) = two_band_lattices(2);
        let coupling = ShanChen::new(
            3.0,
            [1.0, 1.0],
            InteractionPotential::PsiEqualsRho,
            CouplingMode::OneWay,
        );

        coupling.execute(&mut lattice_one, &mut lattice_two);

        assert_eq!(force_at(&lattice_two, [1, 3, 1]), [0.0; 3]);
    }

    #[test]
    fn test_common_velocity_is_weighted_by_relaxation_and_density() {
        let n = [4, 4, 4];
        let periodic = [true; 3];
        let mut geometry = Geometry::new(n, periodic);
        geometry.classify(&[RenameRule::everywhere(NO_DYNAMICS, BULK)]);
        let decomposition = decompose(n, periodic, 2, CapacityPolicy::Fail).unwrap();
        let mut lattice_one = Lattice::new(
            0,
            &decomposition,
            &geometry,
            &BTreeMap::from([(BULK, Dynamics::ForcedBgk { omega: 1.0 })]),
        );
        let mut lattice_two = Lattice::new(
            1,
            &decomposition,
            &geometry,
            &BTreeMap::from([(BULK, Dynamics::ForcedBgk { omega: 0.5 })]),
        );
        let regions = [RegionInit::new(
            BULK,
            PhaseInit {
                velocity: [0.02, 0.0, 0.0],
                ..PhaseInit::at_rest(DensityProfile::Constant(1.0))
            },
            PhaseInit {
                velocity: [-0.01, 0.0, 0.0],
                ..PhaseInit::at_rest(DensityProfile::Constant(0.5))
            },
        )];
        lattice_one.initialize(&regions, 0.0, 0);
        lattice_two.initialize(&regions, 0.0, 0);
        let coupling = ShanChen::new(
            0.0,
            [1.0, 1.0],
            InteractionPotential::PsiEqualsRho,
            CouplingMode::OneWay,
        );

        coupling.execute(&mut lattice_one, &mut lattice_two);

        // (1.0 * 0.02 - 0.5 * 0.5 * 0.01) / (1.0 + 0.5 * 0.5)
        let expected = 0.0175 / 1.25;
        for lattice in [&lattice_one, &lattice_two] {
            for block in lattice.get_blocks() {
                for index in block.get_owned_indices() {
                    let velocity = block.get_velocity(index);
                    assert!((velocity[0] - expected).abs() < 1e-14);
                    assert!(velocity[1].abs() < 1e-15);
                    assert!(velocity[2].abs() < 1e-15);
                }
            }
        }
    }
}
