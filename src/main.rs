use colored::*;
use lbtwophase::prelude::*;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = load(Parameters::default()) {
        eprintln!("{} {e}", "Error:".red().bold());
        std::process::exit(1);
    }
}
