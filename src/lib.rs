mod cli;
pub mod constants;
pub mod coupling;
pub mod decomposition;
pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod io;
pub mod kernel;
pub mod lattice;
pub mod simulation;
pub mod velocity_set;

pub use simulation::load;

pub mod prelude {
    pub use crate::constants::*;
    pub use crate::coupling::{CouplingMode, InteractionPotential, ShanChen};
    pub use crate::decomposition::{CapacityPolicy, Decomposition, Partition, decompose};
    pub use crate::error::{LbError, LbResult};
    pub use crate::geometry::{Geometry, IndicatorCuboid, RenameRule};
    pub use crate::io::{NullWriter, SnapshotWriter, VtkWriter};
    pub use crate::lattice::{DensityProfile, Dynamics, Lattice, PhaseInit, RegionInit};
    pub use crate::simulation::{Parameters, RunContext, RunSummary, Simulation, load};
}
