use crate::constants::*;
use colored::*;
use std::time::{Duration, Instant};

// ------------------------------------------------------------------------- STRUCT: Timer

#[derive(Debug, Clone)]
pub struct Timer {
    max_iterations: usize,
    number_of_voxels: usize,
    start: Option<Instant>,
    last_update: Option<Instant>,
    iteration: usize,
    last_iteration: usize,
    step_mlups: Float,
    total: Option<Duration>,
}

impl Timer {
    pub fn new(max_iterations: usize, number_of_voxels: usize) -> Self {
        Timer {
            max_iterations,
            number_of_voxels,
            start: None,
            last_update: None,
            iteration: 0,
            last_iteration: 0,
            step_mlups: 0.0,
            total: None,
        }
    }
}

impl Timer {
    pub fn start(&mut self) {
        let now = Instant::now();
        self.start = Some(now);
        self.last_update = Some(now);
        self.iteration = 0;
        self.last_iteration = 0;
        self.total = None;
    }

    pub fn update(&mut self, iteration: usize) {
        let now = Instant::now();
        if let Some(last_update) = self.last_update {
            let seconds = now.duration_since(last_update).as_secs_f64();
            let iterations = iteration.saturating_sub(self.last_iteration);
            self.step_mlups = compute_mlups(self.number_of_voxels, iterations, seconds);
        }
        self.last_update = Some(now);
        self.last_iteration = iteration;
        self.iteration = iteration;
    }

    pub fn stop(&mut self) {
        self.total = Some(self.get_elapsed());
    }

    pub fn get_iteration(&self) -> usize {
        self.iteration
    }

    pub fn get_elapsed(&self) -> Duration {
        match (self.total, self.start) {
            (Some(total), _) => total,
            (None, Some(start)) => start.elapsed(),
            (None, None) => Duration::ZERO,
        }
    }

    pub fn get_estimated_remaining(&self) -> Duration {
        if self.iteration == 0 {
            return Duration::ZERO;
        }
        let remaining = self.max_iterations.saturating_sub(self.iteration);
        self.get_elapsed()
            .mul_f64(remaining as f64 / self.iteration as f64)
    }

    /// Million lattice updates per second since the start.
    pub fn get_mlups(&self) -> Float {
        compute_mlups(
            self.number_of_voxels,
            self.iteration,
            self.get_elapsed().as_secs_f64(),
        )
    }

    pub fn get_step_mlups(&self) -> Float {
        self.step_mlups
    }

    pub fn print_step(&self) {
        let progress = 100.0 * self.iteration as Float / self.max_iterations.max(1) as Float;
        println!(
            "{} {:>8} {} {:>6.2}% {} {:>9.3}s {} {:>9.3}s {} {:>8.3}",
            "step".cyan().bold(),
            self.iteration,
            "|".cyan(),
            progress,
            "| elapsed".cyan(),
            self.get_elapsed().as_secs_f64(),
            "| remaining".cyan(),
            self.get_estimated_remaining().as_secs_f64(),
            "| MLUPs".cyan(),
            self.get_step_mlups(),
        );
    }

    pub fn print_summary(&self) {
        println!();
        println!("{}", "Simulation summary".green().bold());
        println!("  {:<22} {}", "iterations:", self.iteration);
        println!("  {:<22} {}", "voxels:", self.number_of_voxels);
        println!(
            "  {:<22} {:.3}s",
            "measured time:",
            self.get_elapsed().as_secs_f64()
        );
        println!("  {:<22} {:.3}", "average MLUPs:", self.get_mlups());
        println!();
    }
}

fn compute_mlups(number_of_voxels: usize, iterations: usize, seconds: f64) -> Float {
    if seconds <= 0.0 {
        return 0.0;
    }
    number_of_voxels as Float * iterations as Float / seconds / 1e6
}

// -------------------------------------------------------------------- STRUCT: Statistics

/// Average density of both phases over their fluid voxels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Statistics {
    pub iteration: usize,
    pub average_density: [Float; 2],
}

impl Statistics {
    pub fn print(&self) {
        println!(
            "{}{:.8e}{}{:.8e}",
            "averageRhoFluidOne=".yellow(),
            self.average_density[0],
            "; averageRhoFluidTwo=".yellow(),
            self.average_density[1]
        );
    }
}
