use crate::cli::{self, Mode};
use crate::constants::*;
use crate::coupling::{CouplingMode, InteractionPotential, ShanChen};
use crate::decomposition::{CapacityPolicy, Decomposition, decompose};
use crate::diagnostics::{Statistics, Timer};
use crate::error::{LbError, LbResult};
use crate::geometry::{Geometry, IndicatorCuboid, RenameRule};
use crate::io::{
    DEFAULT_CASE_NAME, FieldSnapshot, GeometrySnapshot, NullWriter, PhaseField, SnapshotWriter,
    VtkWriter,
};
use crate::lattice::{BlockLattice, DensityProfile, Dynamics, Lattice, PhaseInit, RegionInit};
use crate::velocity_set::{D, Populations, Q};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

// -------------------------------------------------------------------- STRUCT: Parameters

#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    pub n: [usize; 3],
    pub periodic: [bool; 3],
    pub max_iterations: usize,
    pub g: Float,
    pub rho0: [Float; 2],
    pub potential: InteractionPotential,
    pub coupling_mode: CouplingMode,
    pub noise_amplitude: Float,
    pub seed: u64,
    /// `0` disables the statistics output.
    pub stat_interval: usize,
    /// `0` disables the field snapshots.
    pub vtk_interval: usize,
    pub geometry_rules: Vec<RenameRule>,
    pub dynamics: [BTreeMap<MaterialId, Dynamics>; 2],
    pub initial_conditions: Vec<RegionInit>,
    pub capacity_policy: CapacityPolicy,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters::rayleigh_taylor([DEFAULT_NX, DEFAULT_NY, DEFAULT_NZ])
    }
}

impl Parameters {
    /// Heavy fluid over light fluid between two bounce-back walls, y pointing
    /// up, periodic along x and z.
    pub fn rayleigh_taylor(n: [usize; 3]) -> Self {
        let omega = [1.0, 1.0];
        let [nx, ny, nz] = n.map(|n_x| n_x as Float);
        let force = get_rayleigh_taylor_force(n[1]);
        let gravity = [0.0, -force, 0.0];

        let geometry_rules = vec![
            RenameRule::everywhere(NO_DYNAMICS, BULK),
            RenameRule::inside(
                BULK,
                UPPER,
                IndicatorCuboid::new([nx + 3.0, (n[1] / 2) as Float + 2.0, nz + 3.0], [
                    -2.0,
                    ny / 2.0,
                    -2.0,
                ]),
            ),
            RenameRule::inside(
                BULK,
                BOTTOM,
                IndicatorCuboid::new([nx + 3.0, 2.0, nz + 3.0], [-2.0; 3]),
            ),
            RenameRule::inside(
                UPPER,
                TOP,
                IndicatorCuboid::new([nx + 3.0, 2.0, nz + 3.0], [-2.0, ny - 1.0, -2.0]),
            ),
        ];

        let fluid = |omega: Float| Dynamics::ForcedBgk { omega };
        let wall = |density: Float| Dynamics::BounceBack {
            density: Some(density),
        };
        let dynamics = [
            BTreeMap::from([
                (BULK, fluid(omega[0])),
                (UPPER, fluid(omega[0])),
                (BOTTOM, wall(0.0)),
                (TOP, wall(1.0)),
            ]),
            BTreeMap::from([
                (BULK, fluid(omega[1])),
                (UPPER, fluid(omega[1])),
                (BOTTOM, wall(1.0)),
                (TOP, wall(0.0)),
            ]),
        ];

        let initial_conditions = vec![
            RegionInit::new(
                BULK,
                PhaseInit::at_rest(DensityProfile::Constant(0.0)).with_external_force(gravity),
                PhaseInit::at_rest(DensityProfile::Constant(
                    0.98 + force * ny / 2.0 * CS_2_INV,
                ))
                .with_noise(),
            ),
            RegionInit::new(
                UPPER,
                PhaseInit::at_rest(DensityProfile::Linear {
                    gradient: [0.0, -force * CS_2_INV, 0.0],
                    offset: 0.98 + force * ny * CS_2_INV,
                })
                .with_noise()
                .with_external_force(gravity),
                PhaseInit::at_rest(DensityProfile::Constant(0.0)),
            ),
        ];

        Parameters {
            n,
            periodic: [true, false, true],
            max_iterations: DEFAULT_MAX_ITERATIONS,
            g: 3.0,
            rho0: [1.0, 1.0],
            potential: InteractionPotential::PsiEqualsRho,
            coupling_mode: CouplingMode::OneWay,
            noise_amplitude: DEFAULT_NOISE_AMPLITUDE,
            seed: DEFAULT_SEED,
            stat_interval: DEFAULT_STAT_INTERVAL,
            vtk_interval: DEFAULT_VTK_INTERVAL,
            geometry_rules,
            dynamics,
            initial_conditions,
            capacity_policy: CapacityPolicy::Fail,
        }
    }

    pub fn validate(&self) -> LbResult<()> {
        if !(self.noise_amplitude >= 0.0 && self.noise_amplitude.is_finite()) {
            return Err(LbError::invalid_parameter(format!(
                "noise amplitude must be a non-negative number, got {}",
                self.noise_amplitude
            )));
        }
        for (phase, dynamics) in self.dynamics.iter().enumerate() {
            for (material, dynamics) in dynamics {
                match dynamics {
                    Dynamics::ForcedBgk { omega } if !(*omega > 0.0 && *omega < 2.0) => {
                        return Err(LbError::invalid_parameter(format!(
                            "phase {} material {material}: omega must lie in (0, 2), got {omega}",
                            phase + 1
                        )));
                    }
                    _ => {}
                }
            }
        }
        validate_bounce_back_pairing(&self.dynamics)
    }

    /// Materials that carry dynamics in at least one phase.
    pub fn get_referenced_materials(&self) -> Vec<MaterialId> {
        self.dynamics
            .iter()
            .flat_map(|dynamics| {
                dynamics
                    .iter()
                    .filter(|(_, dynamics)| !dynamics.is_no_dynamics())
                    .map(|(material, _)| *material)
            })
            .collect::<BTreeSet<MaterialId>>()
            .into_iter()
            .collect()
    }

    fn get_materials_where(&self, predicate: impl Fn(&Dynamics) -> bool) -> Vec<MaterialId> {
        self.dynamics
            .iter()
            .flat_map(|dynamics| {
                dynamics
                    .iter()
                    .filter(|(_, dynamics)| predicate(*dynamics))
                    .map(|(material, _)| *material)
                    .collect::<Vec<MaterialId>>()
            })
            .collect::<BTreeSet<MaterialId>>()
            .into_iter()
            .collect()
    }
}

/// Body force per unit mass driving the Rayleigh-Taylor case.
///
/// # Examples
/// ```
/// # use lbtwophase::simulation::get_rayleigh_taylor_force;
/// assert!((get_rayleigh_taylor_force(35) - 7.0 / 1225.0).abs() < 1e-15);
/// ```
pub fn get_rayleigh_taylor_force(ny: usize) -> Float {
    7.0 / ny as Float / ny as Float
}

/// A material that bounces back in one phase must bounce back in the other,
/// with a different fictitious density.
pub fn validate_bounce_back_pairing(dynamics: &[BTreeMap<MaterialId, Dynamics>; 2]) -> LbResult<()> {
    let materials = dynamics[0]
        .keys()
        .chain(dynamics[1].keys())
        .copied()
        .collect::<BTreeSet<MaterialId>>();
    for material in materials {
        let pair = [dynamics[0].get(&material), dynamics[1].get(&material)];
        if !pair.iter().any(|d| d.is_some_and(|d| d.is_bounce_back())) {
            continue;
        }
        let [first, second] = pair.map(|d| match d {
            Some(Dynamics::BounceBack { density }) => *density,
            _ => None,
        });
        let valid = match (first, second) {
            (Some(first), Some(second)) => first != second,
            _ => false,
        };
        if !valid {
            return Err(LbError::FictitiousDensityPairing {
                material,
                first,
                second,
            });
        }
    }
    Ok(())
}

// -------------------------------------------------------------------------- ENTRY POINT

/// Parses the command line, builds the global thread pool and runs the case
/// described by `parameters`.
pub fn load(mut parameters: Parameters) -> LbResult<()> {
    let config = cli::parse_matches(&cli::get_args())?;
    config.apply(&mut parameters);
    cli::init_global_pool(config.get_number_of_threads(), config.core_affinity)?;
    let context = RunContext::new(&config.output_dir, config.get_workers());

    let mut simulation = Simulation::new(parameters, &context)?;
    match config.mode {
        Mode::Run => {
            let summary = if config.no_output {
                simulation.run(&mut NullWriter)?
            } else {
                let mut writer = VtkWriter::new(context.get_output_dir(), DEFAULT_CASE_NAME)?;
                simulation.run(&mut writer)?
            };
            log::info!(
                "Finished {} iterations in {:.3}s ({:.3} MLUPs)",
                summary.iterations,
                summary.elapsed.as_secs_f64(),
                summary.mlups
            );
        }
        Mode::Geometry => {
            let mut writer = VtkWriter::new(context.get_output_dir(), DEFAULT_CASE_NAME)?;
            writer.write_geometry(&simulation.gather_geometry())?;
        }
    }
    Ok(())
}

// -------------------------------------------------------------------- STRUCT: RunContext

/// Process-level collaborators of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    output_dir: PathBuf,
    workers: usize,
}

impl RunContext {
    pub fn new<P: AsRef<Path>>(output_dir: P, workers: usize) -> Self {
        RunContext {
            output_dir: output_dir.as_ref().to_path_buf(),
            workers,
        }
    }

    pub fn get_output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn get_workers(&self) -> usize {
        self.workers
    }
}

// -------------------------------------------------------------------- STRUCT: RunSummary

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub iterations: usize,
    pub elapsed: Duration,
    pub mlups: Float,
    pub average_density: [Float; 2],
}

// -------------------------------------------------------------------- STRUCT: Simulation

#[derive(Debug)]
pub struct Simulation {
    parameters: Parameters,
    geometry: Geometry,
    decomposition: Decomposition,
    lattices: [Lattice; 2],
    coupling: ShanChen,
}

impl Simulation {
    pub fn new(parameters: Parameters, context: &RunContext) -> LbResult<Self> {
        parameters.validate()?;

        log::info!("Prepare Geometry ...");
        let mut geometry = Geometry::new(parameters.n, parameters.periodic);
        geometry.classify(&parameters.geometry_rules);
        let boundary = parameters.get_materials_where(Dynamics::is_bounce_back);
        let fluid = parameters.get_materials_where(Dynamics::is_fluid);
        let removed = geometry.inner_clean(&boundary, &fluid);
        if removed > 0 {
            log::info!("Removed {removed} boundary voxels without fluid neighbors");
        }
        geometry.check_for_errors(&parameters.get_referenced_materials())?;
        geometry.print();
        log::info!("Prepare Geometry ... OK");

        let decomposition = decompose(
            parameters.n,
            parameters.periodic,
            context.get_workers(),
            parameters.capacity_policy,
        )?;
        log::info!(
            "Decomposed the grid into {} partitions along axis {}",
            decomposition.get_number_of_partitions(),
            decomposition.get_axis()
        );

        log::info!("Prepare Lattice ...");
        let lattices = [0, 1].map(|phase| {
            Lattice::new(
                phase,
                &decomposition,
                &geometry,
                &parameters.dynamics[phase],
            )
        });
        let coupling = ShanChen::new(
            parameters.g,
            parameters.rho0,
            parameters.potential,
            parameters.coupling_mode,
        );
        for lattice in &lattices {
            log::debug!(
                "Phase {} spans {} partitions",
                lattice.get_phase(),
                lattice.get_blocks().len()
            );
        }
        log::info!(
            "Shan-Chen coupling: G = {}, rho0 = {:?}, {:?}",
            coupling.get_g(),
            coupling.get_rho0(),
            coupling.get_mode()
        );
        log::info!("Prepare Lattice ... OK");

        Ok(Simulation {
            parameters,
            geometry,
            decomposition,
            lattices,
            coupling,
        })
    }
}

impl Simulation {
    pub fn get_parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn get_geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn get_decomposition(&self) -> &Decomposition {
        &self.decomposition
    }

    pub fn get_lattice(&self, phase: usize) -> &Lattice {
        &self.lattices[phase]
    }

    pub fn get_coupling(&self) -> &ShanChen {
        &self.coupling
    }
}

impl Simulation {
    pub fn initialize(&mut self) {
        log::info!("Setting initial values ...");
        let Parameters {
            initial_conditions,
            noise_amplitude,
            seed,
            ..
        } = &self.parameters;
        self.lattices.iter_mut().for_each(|lattice| {
            lattice.initialize(initial_conditions, *noise_amplitude, *seed);
        });
        log::info!("Setting initial values ... OK");
    }

    /// One time step: initial values at iteration 0, collide-and-stream and
    /// halo exchange of both phases, then the coupling.
    pub fn advance(&mut self, iteration: usize) -> LbResult<()> {
        if iteration == 0 {
            self.initialize();
        }
        self.lattices
            .iter_mut()
            .for_each(|lattice| lattice.collide_and_stream());
        for lattice in self.lattices.iter_mut() {
            lattice.communicate()?;
        }
        let [lattice_one, lattice_two] = &mut self.lattices;
        self.coupling.execute(lattice_one, lattice_two);
        Ok(())
    }

    pub fn compute_statistics(&self, iteration: usize) -> Statistics {
        Statistics {
            iteration,
            average_density: [
                self.lattices[0].compute_average_density(),
                self.lattices[1].compute_average_density(),
            ],
        }
    }

    pub fn run(&mut self, writer: &mut dyn SnapshotWriter) -> LbResult<RunSummary> {
        let max_iterations = self.parameters.max_iterations;
        let stat_interval = self.parameters.stat_interval;
        let vtk_interval = self.parameters.vtk_interval;
        log::info!("starting simulation...");
        let mut timer = Timer::new(max_iterations, self.geometry.get_number_of_voxels());
        timer.start();

        for iteration in 0..max_iterations {
            self.advance(iteration)?;

            if iteration == 0 {
                writer.write_geometry(&self.gather_geometry())?;
            }
            if stat_interval > 0 && iteration > 0 && iteration % stat_interval == 0 {
                timer.update(iteration);
                timer.print_step();
                self.compute_statistics(iteration).print();
            }
            if vtk_interval > 0 && iteration % vtk_interval == 0 {
                log::info!("Writing VTK ...");
                writer.write_fields(iteration, &self.gather_fields())?;
                log::info!("Writing VTK ... OK");
            }
        }

        timer.update(max_iterations);
        timer.stop();
        timer.print_summary();
        writer.finish()?;
        Ok(RunSummary {
            iterations: max_iterations,
            elapsed: timer.get_elapsed(),
            mlups: timer.get_mlups(),
            average_density: self.compute_statistics(max_iterations).average_density,
        })
    }
}

impl Simulation {
    fn gather<T: Clone>(
        &self,
        phase: usize,
        empty: T,
        value: impl Fn(&BlockLattice, usize) -> T,
    ) -> Vec<T> {
        let mut values = vec![empty; self.geometry.get_number_of_voxels()];
        for block in self.lattices[phase].get_blocks() {
            for index in block.get_owned_indices() {
                if let Some([x, y, z]) = block.get_global_position(index) {
                    values[self.geometry.get_index(x, y, z)] = value(block, index);
                }
            }
        }
        values
    }

    pub fn gather_geometry(&self) -> GeometrySnapshot {
        let partitions = self.gather(0, 0, |block, _| block.get_rank());
        GeometrySnapshot {
            n: *self.geometry.get_n(),
            materials: self.geometry.get_materials().to_vec(),
            ranks: partitions.clone(),
            partitions,
        }
    }

    pub fn gather_phase_field(&self, phase: usize) -> PhaseField {
        PhaseField {
            density: self.gather(phase, 0.0, |block, index| block.compute_density(index)),
            velocity: self.gather(phase, [0.0; D], |block, index| {
                block.compute_velocity(index)
            }),
        }
    }

    pub fn gather_fields(&self) -> FieldSnapshot {
        FieldSnapshot {
            n: *self.geometry.get_n(),
            phases: [self.gather_phase_field(0), self.gather_phase_field(1)],
        }
    }

    /// Velocity shared by both phases, as set by the last coupling.
    pub fn gather_common_velocity(&self) -> Vec<[Float; D]> {
        self.gather(0, [0.0; D], |block, index| *block.get_velocity(index))
    }

    pub fn gather_forces(&self, phase: usize) -> Vec<[Float; D]> {
        self.gather(phase, [0.0; D], |block, index| *block.get_force(index))
    }

    pub fn gather_external_forces(&self, phase: usize) -> Vec<[Float; D]> {
        self.gather(phase, [0.0; D], |block, index| {
            *block.get_external_force(index)
        })
    }

    pub fn gather_populations(&self, phase: usize) -> Vec<Populations> {
        self.gather(phase, [0.0; Q], |block, index| *block.get_f(index))
    }

    pub fn compute_total_mass(&self, phase: usize) -> Float {
        self.lattices[phase].compute_total_mass()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_the_reference_case() {
        let parameters = Parameters::default();

        assert_eq!(parameters.n, [70, 35, 70]);
        assert_eq!(parameters.periodic, [true, false, true]);
        assert_eq!(parameters.max_iterations, 4000);
        assert_eq!(parameters.g, 3.0);
        assert_eq!(parameters.rho0, [1.0, 1.0]);
        assert_eq!(parameters.stat_interval, 10);
        assert_eq!(parameters.vtk_interval, 50);
        assert_eq!(parameters.coupling_mode, CouplingMode::OneWay);
        assert_eq!(
            parameters.dynamics[0].get(&BULK),
            Some(&Dynamics::ForcedBgk { omega: 1.0 })
        );
        assert!(parameters.validate().is_ok());
    }

    #[test]
    fn test_new_keeps_the_setup() {
        let context = RunContext::new("unused", 2);
        let simulation =
            Simulation::new(Parameters::rayleigh_taylor([4, 10, 4]), &context).unwrap();

        assert_eq!(simulation.get_parameters().n, [4, 10, 4]);
        assert_eq!(simulation.get_coupling().get_g(), 3.0);
        assert_eq!(simulation.get_coupling().get_rho0(), &[1.0, 1.0]);
        assert_eq!(simulation.get_coupling().get_mode(), CouplingMode::OneWay);
        for phase in 0..2 {
            let lattice = simulation.get_lattice(phase);
            assert_eq!(lattice.get_phase(), phase);
            assert_eq!(lattice.get_blocks().len(), 2);
        }
    }

    #[test]
    fn test_referenced_materials() {
        let parameters = Parameters::rayleigh_taylor([4, 10, 4]);

        assert_eq!(
            parameters.get_referenced_materials(),
            vec![BULK, UPPER, BOTTOM, TOP]
        );
        assert_eq!(
            parameters.get_materials_where(Dynamics::is_bounce_back),
            vec![BOTTOM, TOP]
        );
    }

    #[test]
    fn test_one_sided_bounce_back_is_rejected() {
        let mut parameters = Parameters::rayleigh_taylor([4, 10, 4]);
        parameters.dynamics[1].insert(TOP, Dynamics::ForcedBgk { omega: 1.0 });

        assert!(matches!(
            parameters.validate(),
            Err(LbError::FictitiousDensityPairing {
                material: TOP,
                first: Some(_),
                second: None
            })
        ));
    }

    #[test]
    fn test_equal_fictitious_densities_are_rejected() {
        let mut parameters = Parameters::rayleigh_taylor([4, 10, 4]);
        parameters.dynamics[1].insert(
            BOTTOM,
            Dynamics::BounceBack {
                density: Some(0.0),
            },
        );

        assert!(matches!(
            parameters.validate(),
            Err(LbError::FictitiousDensityPairing {
                material: BOTTOM,
                ..
            })
        ));
    }

    #[test]
    fn test_unstable_omega_is_rejected() {
        let mut parameters = Parameters::rayleigh_taylor([4, 10, 4]);
        parameters.dynamics[0].insert(BULK, Dynamics::ForcedBgk { omega: 2.5 });

        assert!(matches!(
            parameters.validate(),
            Err(LbError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_negative_noise_is_rejected() {
        let parameters = Parameters {
            noise_amplitude: -0.1,
            ..Parameters::rayleigh_taylor([4, 10, 4])
        };

        assert!(matches!(
            parameters.validate(),
            Err(LbError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_initial_densities_of_reference_case() {
        let parameters = Parameters {
            noise_amplitude: 0.0,
            ..Parameters::rayleigh_taylor([4, 35, 4])
        };
        let context = RunContext::new("unused", 2);
        let mut simulation = Simulation::new(parameters, &context).unwrap();
        simulation.initialize();

        let force = get_rayleigh_taylor_force(35);
        let phase_one = simulation.gather_phase_field(0);
        let phase_two = simulation.gather_phase_field(1);
        let geometry = simulation.get_geometry();
        let lower = geometry.get_index(1, 10, 2);
        let upper = geometry.get_index(1, 20, 2);
        assert_eq!(phase_one.density[lower], 0.0);
        assert!((phase_two.density[lower] - (0.98 + force * 17.5 * 3.0)).abs() < 1e-12);
        assert!((phase_one.density[upper] - (0.98 + force * 3.0 * 15.0)).abs() < 1e-12);
        assert_eq!(phase_two.density[upper], 0.0);
        // Walls report their fictitious densities.
        assert_eq!(phase_one.density[geometry.get_index(0, 0, 0)], 0.0);
        assert_eq!(phase_two.density[geometry.get_index(0, 0, 0)], 1.0);
        assert_eq!(phase_one.density[geometry.get_index(0, 34, 0)], 1.0);
        assert_eq!(phase_two.density[geometry.get_index(0, 34, 0)], 0.0);
        let external_forces = simulation.gather_external_forces(0);
        assert_eq!(external_forces[lower], [0.0, -force, 0.0]);
        assert_eq!(simulation.gather_external_forces(1)[upper], [0.0; 3]);
    }

    #[test]
    fn test_too_many_workers_is_a_setup_error() {
        let parameters = Parameters::rayleigh_taylor([4, 6, 4]);
        let context = RunContext::new("unused", 7);

        assert!(matches!(
            Simulation::new(parameters, &context),
            Err(LbError::Capacity { workers: 7, .. })
        ));
    }
}
