// ------------------------------------------------------------------------------- MODULES

mod block;
mod dynamics;
mod halo;
mod init;

// ------------------------------------------------------------------------------- IMPORTS

use crate::constants::*;
use crate::decomposition::Decomposition;
use crate::error::LbResult;
use crate::geometry::Geometry;
pub use block::BlockLattice;
pub(crate) use block::{LocalGrid, Neighbor};
pub use dynamics::Dynamics;
pub use halo::{HaloField, HaloMessage, HaloSide};
pub use init::{DensityProfile, PhaseInit, RegionInit, noise_sample};
use rayon::prelude::*;
use std::collections::BTreeMap;

// ----------------------------------------------------------------------- STRUCT: Lattice

/// All partitions of one phase.
#[derive(Debug, Clone)]
pub struct Lattice {
    phase: usize,
    blocks: Vec<BlockLattice>,
}

impl Lattice {
    pub fn new(
        phase: usize,
        decomposition: &Decomposition,
        geometry: &Geometry,
        dynamics: &BTreeMap<MaterialId, Dynamics>,
    ) -> Self {
        let blocks = decomposition
            .get_partitions()
            .par_iter()
            .map(|partition| BlockLattice::new(partition, geometry, dynamics))
            .collect::<Vec<BlockLattice>>();
        Lattice { phase, blocks }
    }
}

impl Lattice {
    pub fn get_phase(&self) -> usize {
        self.phase
    }

    pub fn get_blocks(&self) -> &[BlockLattice] {
        &self.blocks
    }

    pub(crate) fn get_blocks_mut(&mut self) -> &mut [BlockLattice] {
        &mut self.blocks
    }
}

impl Lattice {
    pub fn initialize(&mut self, regions: &[RegionInit], noise_amplitude: Float, seed: u64) {
        let phase = self.phase;
        self.blocks.par_iter_mut().for_each(|block| {
            block.initialize(phase, regions, noise_amplitude, seed);
        });
    }

    pub fn collide_and_stream(&mut self) {
        self.blocks.par_iter_mut().for_each(|block| {
            block.collide();
            block.stream();
        });
    }

    /// Completes streaming across partition boundaries, then refreshes the
    /// halo with post-stream populations for the coupling.
    pub fn communicate(&mut self) -> LbResult<()> {
        halo::exchange(&mut self.blocks, HaloField::PostCollision)?;
        self.blocks.par_iter_mut().for_each(|block| {
            block.stream_from_halo();
        });
        self.refresh_halo()
    }

    pub(crate) fn refresh_halo(&mut self) -> LbResult<()> {
        halo::exchange(&mut self.blocks, HaloField::PostStream)
    }

    /// Average density over owned fluid voxels.
    pub fn compute_average_density(&self) -> Float {
        let (sum, count) = self
            .blocks
            .par_iter()
            .map(|block| block.compute_fluid_density_sum())
            .reduce(|| (0.0, 0), |a, b| (a.0 + b.0, a.1 + b.1));
        if count == 0 { 0.0 } else { sum / count as Float }
    }

    pub fn compute_total_mass(&self) -> Float {
        self.blocks
            .iter()
            .map(|block| block.compute_total_mass())
            .sum()
    }
}
