use super::dynamics::Dynamics;
use super::init::{RegionInit, noise_sample};
use crate::constants::*;
use crate::decomposition::{Partition, get_local_n};
use crate::geometry::Geometry;
use crate::kernel;
use crate::velocity_set::{C, D, Populations, Q, Q_BAR};
use rayon::prelude::*;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Neighbor {
    Inside(usize),
    Outside,
}

// --------------------------------------------------------------------- STRUCT: LocalGrid

/// Index arithmetic of a partition: `n` counts the halo layers along `axis`,
/// owned layers sit at `1..=layers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LocalGrid {
    n: [usize; 3],
    global_n: [usize; 3],
    periodic: [bool; 3],
    axis: usize,
    start: usize,
    layers: usize,
    has_lower: bool,
    has_upper: bool,
}

impl LocalGrid {
    pub(crate) fn new(global_n: [usize; 3], periodic: [bool; 3], partition: &Partition) -> Self {
        LocalGrid {
            n: get_local_n(&global_n, partition),
            global_n,
            periodic,
            axis: partition.get_axis(),
            start: partition.get_start(),
            layers: partition.get_number_of_layers(),
            has_lower: partition.get_lower_neighbor().is_some(),
            has_upper: partition.get_upper_neighbor().is_some(),
        }
    }

    pub(crate) fn get_number_of_voxels(&self) -> usize {
        self.n.iter().product()
    }

    pub(crate) fn get_layers(&self) -> usize {
        self.layers
    }

    pub(crate) fn get_index(&self, position: [usize; 3]) -> usize {
        position[0] + self.n[0] * (position[1] + self.n[1] * position[2])
    }

    pub(crate) fn get_position(&self, index: usize) -> [usize; 3] {
        let x = index % self.n[0];
        let y = (index / self.n[0]) % self.n[1];
        let z = index / (self.n[0] * self.n[1]);
        [x, y, z]
    }

    pub(crate) fn is_owned(&self, index: usize) -> bool {
        let layer = self.get_position(index)[self.axis];
        layer >= HALO_DEPTH && layer <= self.layers
    }

    fn is_next_to_halo(&self, index: usize) -> bool {
        let layer = self.get_position(index)[self.axis];
        layer == HALO_DEPTH || layer == self.layers
    }

    pub(crate) fn get_global_position(&self, index: usize) -> Option<[usize; 3]> {
        let mut position = self.get_position(index);
        let n_x = self.global_n[self.axis] as i64;
        let global = (self.start + position[self.axis]) as i64 - HALO_DEPTH as i64;
        position[self.axis] = if (0..n_x).contains(&global) {
            global as usize
        } else if self.periodic[self.axis] {
            global.rem_euclid(n_x) as usize
        } else {
            return None;
        };
        Some(position)
    }

    pub(crate) fn get_global_index(&self, position: [usize; 3]) -> usize {
        position[0] + self.global_n[0] * (position[1] + self.global_n[1] * position[2])
    }

    /// Voxel reached from an owned `position` along `offset`. Axes other than
    /// the split axis wrap in place; the split axis reaches into the halo when
    /// a neighbouring partition exists.
    pub(crate) fn get_neighbor(&self, position: [usize; 3], offset: [i32; 3]) -> Neighbor {
        let mut neighbor = [0; 3];
        for x in 0..3 {
            let p = position[x] as i64 + offset[x] as i64;
            neighbor[x] = if x == self.axis {
                if (p < HALO_DEPTH as i64 && !self.has_lower)
                    || (p > self.layers as i64 && !self.has_upper)
                {
                    return Neighbor::Outside;
                }
                p as usize
            } else if (0..self.n[x] as i64).contains(&p) {
                p as usize
            } else if self.periodic[x] {
                p.rem_euclid(self.n[x] as i64) as usize
            } else {
                return Neighbor::Outside;
            };
        }
        Neighbor::Inside(self.get_index(neighbor))
    }

    /// Indices of one layer across the split axis, in the same order on every
    /// partition.
    pub(crate) fn get_layer_indices(&self, layer: usize) -> Vec<usize> {
        let [a, b] = match self.axis {
            0 => [1, 2],
            1 => [0, 2],
            _ => [0, 1],
        };
        let mut indices = Vec::with_capacity(self.n[a] * self.n[b]);
        for v in 0..self.n[b] {
            for u in 0..self.n[a] {
                let mut position = [0; 3];
                position[self.axis] = layer;
                position[a] = u;
                position[b] = v;
                indices.push(self.get_index(position));
            }
        }
        indices
    }
}

// ------------------------------------------------------------------ STRUCT: BlockLattice

/// Populations of one phase on one partition, halo included.
#[derive(Debug, Clone)]
pub struct BlockLattice {
    pub(crate) rank: usize,
    pub(crate) lower: Option<usize>,
    pub(crate) upper: Option<usize>,
    pub(crate) grid: LocalGrid,
    pub(crate) materials: Vec<MaterialId>,
    pub(crate) dynamics: Vec<Dynamics>,
    pub(crate) f: Vec<Populations>,
    pub(crate) f_star: Vec<Populations>,
    /// Velocity shared by both phases, written by the coupling.
    pub(crate) velocity: Vec<[Float; D]>,
    pub(crate) external_force: Vec<[Float; D]>,
    pub(crate) force: Vec<[Float; D]>,
}

impl BlockLattice {
    pub fn new(
        partition: &Partition,
        geometry: &Geometry,
        dynamics: &BTreeMap<MaterialId, Dynamics>,
    ) -> Self {
        let grid = LocalGrid::new(*geometry.get_n(), *geometry.get_periodic(), partition);
        let num_voxels = grid.get_number_of_voxels();
        let materials = (0..num_voxels)
            .map(|index| match grid.get_global_position(index) {
                Some([x, y, z]) => geometry.get_material(x, y, z),
                None => NO_DYNAMICS,
            })
            .collect::<Vec<MaterialId>>();
        let dynamics = materials
            .iter()
            .map(|material| dynamics.get(material).copied().unwrap_or_default())
            .collect::<Vec<Dynamics>>();
        BlockLattice {
            rank: partition.get_rank(),
            lower: partition.get_lower_neighbor(),
            upper: partition.get_upper_neighbor(),
            grid,
            materials,
            dynamics,
            f: vec![[0.0; Q]; num_voxels],
            f_star: vec![[0.0; Q]; num_voxels],
            velocity: vec![[0.0; D]; num_voxels],
            external_force: vec![[0.0; D]; num_voxels],
            force: vec![[0.0; D]; num_voxels],
        }
    }
}

impl BlockLattice {
    pub fn get_rank(&self) -> usize {
        self.rank
    }

    pub fn get_number_of_voxels(&self) -> usize {
        self.grid.get_number_of_voxels()
    }

    pub fn get_owned_indices(&self) -> Vec<usize> {
        (0..self.get_number_of_voxels())
            .filter(|&index| self.grid.is_owned(index))
            .collect()
    }

    pub fn get_global_position(&self, index: usize) -> Option<[usize; 3]> {
        self.grid.get_global_position(index)
    }

    pub fn get_dynamics(&self, index: usize) -> &Dynamics {
        &self.dynamics[index]
    }

    pub fn get_f(&self, index: usize) -> &Populations {
        &self.f[index]
    }

    pub fn get_velocity(&self, index: usize) -> &[Float; D] {
        &self.velocity[index]
    }

    pub fn get_force(&self, index: usize) -> &[Float; D] {
        &self.force[index]
    }

    pub fn get_external_force(&self, index: usize) -> &[Float; D] {
        &self.external_force[index]
    }

    pub fn compute_density(&self, index: usize) -> Float {
        self.dynamics[index].compute_density(&self.f[index])
    }

    pub fn compute_velocity(&self, index: usize) -> [Float; D] {
        self.dynamics[index].compute_velocity(
            &self.f[index],
            &self.velocity[index],
            &self.force[index],
        )
    }

    /// Densities of every local voxel, halo included.
    pub(crate) fn compute_densities(&self) -> Vec<Float> {
        self.dynamics
            .par_iter()
            .zip(self.f.par_iter())
            .map(|(dynamics, f)| dynamics.compute_density(f))
            .collect()
    }

    /// Sum of densities and number of owned fluid voxels.
    pub(crate) fn compute_fluid_density_sum(&self) -> (Float, usize) {
        let grid = self.grid;
        self.dynamics
            .par_iter()
            .zip(self.f.par_iter())
            .enumerate()
            .filter(|(index, (dynamics, _))| grid.is_owned(*index) && dynamics.is_fluid())
            .map(|(_, (_, f))| (kernel::density(f), 1))
            .reduce(|| (0.0, 0), |a, b| (a.0 + b.0, a.1 + b.1))
    }

    pub(crate) fn compute_total_mass(&self) -> Float {
        let grid = self.grid;
        self.f
            .par_iter()
            .enumerate()
            .filter(|(index, _)| grid.is_owned(*index))
            .map(|(_, f)| kernel::density(f))
            .sum()
    }
}

impl BlockLattice {
    pub(crate) fn initialize(
        &mut self,
        phase: usize,
        regions: &[RegionInit],
        noise_amplitude: Float,
        seed: u64,
    ) {
        let grid = self.grid;
        let materials = &self.materials;
        self.f
            .par_iter_mut()
            .zip(self.f_star.par_iter_mut())
            .zip(self.velocity.par_iter_mut())
            .zip(
                self.external_force
                    .par_iter_mut()
                    .zip(self.force.par_iter_mut()),
            )
            .enumerate()
            .for_each(|(index, (((f, f_star), velocity), (external_force, force)))| {
                let region = regions
                    .iter()
                    .find(|region| region.material == materials[index]);
                let global_position = grid.get_global_position(index);
                match (region, global_position) {
                    (Some(region), Some(position)) if grid.is_owned(index) => {
                        let phase_init = &region.phases[phase];
                        let sample = if phase_init.noise {
                            noise_sample(seed, grid.get_global_index(position), phase)
                        } else {
                            0.0
                        };
                        let density = phase_init.get_density(
                            position.map(|p_x| p_x as Float),
                            sample,
                            noise_amplitude,
                        );
                        *f = kernel::equilibrium(density, &phase_init.velocity);
                        *velocity = phase_init.velocity;
                        *external_force = phase_init.external_force;
                    }
                    _ => {
                        *f = [0.0; Q];
                        *velocity = [0.0; D];
                        *external_force = [0.0; D];
                    }
                }
                *f_star = *f;
                *force = *external_force;
            });
    }

    pub(crate) fn collide(&mut self) {
        let grid = self.grid;
        let dynamics = &self.dynamics;
        let f = &self.f;
        let velocity = &self.velocity;
        let force = &self.force;
        self.f_star
            .par_iter_mut()
            .enumerate()
            .filter(|(index, _)| grid.is_owned(*index))
            .for_each(|(index, f_star)| {
                if let Some(post_collision) =
                    dynamics[index].collide(&f[index], &velocity[index], &force[index])
                {
                    *f_star = post_collision;
                }
            });
    }

    /// Pull streaming from owned sources. Sources in the halo are left for
    /// [`BlockLattice::stream_from_halo`].
    pub(crate) fn stream(&mut self) {
        self.pull(false);
    }

    pub(crate) fn stream_from_halo(&mut self) {
        self.pull(true);
    }

    fn pull(&mut self, from_halo: bool) {
        let grid = self.grid;
        let dynamics = &self.dynamics;
        let f_star = &self.f_star;
        self.f
            .par_iter_mut()
            .enumerate()
            .filter(|(index, _)| {
                grid.is_owned(*index)
                    && !dynamics[*index].is_no_dynamics()
                    && (!from_halo || grid.is_next_to_halo(*index))
            })
            .for_each(|(index, f)| {
                let position = grid.get_position(index);
                (0..Q).for_each(|i| {
                    let offset = [-C[i][0], -C[i][1], -C[i][2]];
                    match grid.get_neighbor(position, offset) {
                        Neighbor::Inside(source)
                            if !dynamics[source].is_no_dynamics()
                                && grid.is_owned(source) != from_halo =>
                        {
                            f[i] = f_star[source][i];
                        }
                        Neighbor::Inside(source) if !dynamics[source].is_no_dynamics() => {}
                        _ if !from_halo => {
                            f[i] = f_star[index][Q_BAR[i]];
                        }
                        _ => {}
                    }
                });
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomposition::{CapacityPolicy, decompose};
    use crate::geometry::RenameRule;
    use crate::lattice::init::{DensityProfile, PhaseInit};

    fn fluid_block(n: [usize; 3], periodic: [bool; 3]) -> BlockLattice {
        let mut geometry = Geometry::new(n, periodic);
        geometry.classify(&[RenameRule::everywhere(NO_DYNAMICS, BULK)]);
        let decomposition = decompose(n, periodic, 1, CapacityPolicy::Fail).unwrap();
        let dynamics = BTreeMap::from([(BULK, Dynamics::ForcedBgk { omega: 1.0 })]);
        BlockLattice::new(&decomposition.get_partitions()[0], &geometry, &dynamics)
    }

    #[test]
    fn test_local_grid_marks_halo_layers() {
        let block = fluid_block([6, 4, 3], [true, false, false]);
        let grid = block.grid;

        assert_eq!(grid.n, [8, 4, 3]);
        assert!(!grid.is_owned(grid.get_index([0, 1, 1])));
        assert!(grid.is_owned(grid.get_index([1, 1, 1])));
        assert!(grid.is_owned(grid.get_index([6, 1, 1])));
        assert!(!grid.is_owned(grid.get_index([7, 1, 1])));
        assert_eq!(block.get_owned_indices().len(), 72);
    }

    #[test]
    fn test_halo_maps_to_wrapped_global_position() {
        let block = fluid_block([6, 4, 3], [true, false, false]);
        let grid = block.grid;

        assert_eq!(grid.get_global_position(grid.get_index([0, 2, 1])), Some([5, 2, 1]));
        assert_eq!(grid.get_global_position(grid.get_index([7, 2, 1])), Some([0, 2, 1]));
        assert_eq!(grid.get_global_position(grid.get_index([3, 2, 1])), Some([2, 2, 1]));
    }

    #[test]
    fn test_neighbor_outside_non_periodic_boundary() {
        let block = fluid_block([6, 4, 3], [true, false, false]);
        let grid = block.grid;

        assert_eq!(grid.get_neighbor([3, 0, 1], [0, -1, 0]), Neighbor::Outside);
        assert_eq!(grid.get_neighbor([3, 3, 2], [0, 0, 1]), Neighbor::Outside);
        assert_eq!(
            grid.get_neighbor([1, 0, 1], [-1, 0, 0]),
            Neighbor::Inside(grid.get_index([0, 0, 1]))
        );
    }

    #[test]
    fn test_layer_indices_cover_one_layer() {
        let block = fluid_block([6, 4, 3], [true, false, false]);
        let indices = block.grid.get_layer_indices(6);

        assert_eq!(indices.len(), 12);
        assert!(indices.iter().all(|&index| block.grid.get_position(index)[0] == 6));
    }

    #[test]
    fn test_stream_keeps_mass_with_walls_and_reflection() {
        let mut block = fluid_block([4, 4, 4], [false, false, false]);
        let regions = [RegionInit::new(
            BULK,
            PhaseInit::at_rest(DensityProfile::Linear {
                gradient: [0.01, 0.02, -0.01],
                offset: 1.0,
            }),
            PhaseInit::empty(),
        )];
        block.initialize(0, &regions, 0.0, 0);
        let mass_before = block.compute_total_mass();

        block.collide();
        block.stream();
        block.stream_from_halo();

        assert!((block.compute_total_mass() - mass_before).abs() < 1e-12);
    }

    #[test]
    fn test_no_dynamics_voxel_is_left_untouched() {
        let n = [5, 3, 3];
        let mut geometry = Geometry::new(n, [false; 3]);
        geometry.classify(&[RenameRule::everywhere(NO_DYNAMICS, BULK)]);
        let decomposition = decompose(n, [false; 3], 1, CapacityPolicy::Fail).unwrap();
        let dynamics = BTreeMap::from([(BULK, Dynamics::ForcedBgk { omega: 1.0 })]);
        let mut block = BlockLattice::new(&decomposition.get_partitions()[0], &geometry, &dynamics);
        let index = block.grid.get_index([3, 1, 1]);
        block.dynamics[index] = Dynamics::NoDynamics;
        assert!(!block.get_dynamics(index).is_fluid());
        let regions = [RegionInit::new(
            BULK,
            PhaseInit::at_rest(DensityProfile::Constant(1.0)).with_external_force([0.0, -1e-3, 0.0]),
            PhaseInit::empty(),
        )];
        block.initialize(0, &regions, 0.0, 0);
        let f_before = block.f[index];

        for _ in 0..3 {
            block.collide();
            block.stream();
            block.stream_from_halo();
        }

        assert_eq!(block.f[index], f_before);
    }
}
