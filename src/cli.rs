use crate::constants::*;
use crate::decomposition::CapacityPolicy;
use crate::error::{LbError, LbResult};
use crate::io::DEFAULT_OUTPUT_DIR;
use crate::simulation::Parameters;
use clap::{Arg, ArgMatches, Command};
use core_affinity::{get_core_ids, set_for_current};
use std::num::{NonZero, NonZeroUsize};
use std::path::PathBuf;

#[derive(Debug)]
pub(crate) struct Config {
    pub(crate) mode: Mode,
    pub(crate) number_of_threads: NonZeroUsize,
    pub(crate) core_affinity: bool,
    pub(crate) workers: NonZeroUsize,
    pub(crate) shrink_workers: bool,
    pub(crate) write_data: Option<usize>,
    pub(crate) stat_interval: Option<usize>,
    pub(crate) max_iterations: Option<usize>,
    pub(crate) noise: Option<Float>,
    pub(crate) seed: Option<u64>,
    pub(crate) output_dir: PathBuf,
    pub(crate) no_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mode: Mode::Run,
            number_of_threads: NonZero::<usize>::MIN,
            core_affinity: false,
            workers: NonZero::<usize>::MIN,
            shrink_workers: false,
            write_data: None,
            stat_interval: None,
            max_iterations: None,
            noise: None,
            seed: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            no_output: false,
        }
    }
}

impl Config {
    pub(crate) fn get_number_of_threads(&self) -> usize {
        usize::from(self.number_of_threads)
    }

    pub(crate) fn get_workers(&self) -> usize {
        usize::from(self.workers)
    }

    /// Overrides the parameters with the values given on the command line.
    pub(crate) fn apply(&self, parameters: &mut Parameters) {
        if let Some(max_iterations) = self.max_iterations {
            parameters.max_iterations = max_iterations;
        }
        if let Some(frequency) = self.write_data {
            parameters.vtk_interval = frequency;
        }
        if let Some(frequency) = self.stat_interval {
            parameters.stat_interval = frequency;
        }
        if let Some(noise) = self.noise {
            parameters.noise_amplitude = noise;
        }
        if let Some(seed) = self.seed {
            parameters.seed = seed;
        }
        if self.shrink_workers {
            parameters.capacity_policy = CapacityPolicy::Shrink;
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Mode {
    Run,
    Geometry,
}

pub(crate) fn get_command() -> Command {
    clap::command!()
        .propagate_version(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("number_of_threads")
                .short('n')
                .long("num-threads")
                .value_name("NTHREADS")
                .help("The number of threads used (min = 1)")
                .value_parser(clap::value_parser!(NonZeroUsize))
                .default_value("1")
                .global(true),
        )
        .arg(
            Arg::new("core_affinity")
                .long("affinity")
                .help("Set the core affinity")
                .action(clap::ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("NWORKERS")
                .help("The number of partitions the grid is split into (min = 1)")
                .value_parser(clap::value_parser!(NonZeroUsize))
                .default_value("1")
                .global(true),
        )
        .arg(
            Arg::new("shrink_workers")
                .long("shrink-workers")
                .help("Use fewer partitions when the grid is too thin for the requested number")
                .action(clap::ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("output_dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("The directory the VTK files are written to")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value(DEFAULT_OUTPUT_DIR)
                .global(true),
        )
        .subcommand(
            Command::new("run")
                .about("Run the simulation")
                .arg(
                    Arg::new("write_data")
                        .long("write-data")
                        .value_name("FREQUENCY")
                        .help("The frequency which the VTK files are written (0 = never)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("stat_interval")
                        .long("stat-interval")
                        .value_name("FREQUENCY")
                        .help("The frequency which statistics are printed (0 = never)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("max_iterations")
                        .long("max-iterations")
                        .value_name("ITER")
                        .help("The number of iterations")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("noise")
                        .long("noise")
                        .value_name("AMPLITUDE")
                        .help("The amplitude of the initial density noise")
                        .value_parser(clap::value_parser!(Float)),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_name("SEED")
                        .help("The seed of the initial density noise")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("no_output")
                        .long("no-output")
                        .help("Do not write any VTK file")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("geometry")
                .about("Classify the voxels and write the annotated geometry only"),
        )
}

pub(crate) fn get_args() -> ArgMatches {
    get_command().get_matches()
}

pub(crate) fn parse_matches(matches: &ArgMatches) -> LbResult<Config> {
    let number_of_threads = get_required::<NonZeroUsize>(matches, "number_of_threads")?;
    let workers = get_required::<NonZeroUsize>(matches, "workers")?;
    let output_dir = get_required::<PathBuf>(matches, "output_dir")?;
    let core_affinity = matches.get_flag("core_affinity");
    let shrink_workers = matches.get_flag("shrink_workers");
    match matches.subcommand() {
        Some(("run", sub_m)) => Ok(Config {
            mode: Mode::Run,
            number_of_threads,
            core_affinity,
            workers,
            shrink_workers,
            write_data: sub_m.get_one::<usize>("write_data").copied(),
            stat_interval: sub_m.get_one::<usize>("stat_interval").copied(),
            max_iterations: sub_m.get_one::<usize>("max_iterations").copied(),
            noise: sub_m.get_one::<Float>("noise").copied(),
            seed: sub_m.get_one::<u64>("seed").copied(),
            output_dir,
            no_output: sub_m.get_flag("no_output"),
        }),
        Some(("geometry", _)) => Ok(Config {
            mode: Mode::Geometry,
            number_of_threads,
            core_affinity,
            workers,
            shrink_workers,
            output_dir,
            ..Default::default()
        }),
        _ => Err(LbError::invalid_parameter("a subcommand is required")),
    }
}

fn get_required<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> LbResult<T> {
    matches
        .get_one::<T>(id)
        .cloned()
        .ok_or_else(|| LbError::invalid_parameter(format!("missing value for {id}")))
}

pub(crate) fn init_global_pool(num_threads: usize, pin_all_cores: bool) -> LbResult<()> {
    if pin_all_cores {
        let cores = get_core_ids()
            .filter(|cores| !cores.is_empty())
            .ok_or_else(|| LbError::invalid_parameter("could not list the cores of the system"))?;
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .start_handler(move |idx| {
                let core = cores[idx % cores.len()];
                let _ = set_for_current(core);
            })
            .build_global()?;
    } else {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()?;
    };
    Ok(())
}
