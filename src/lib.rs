pub mod app_error;
pub mod cli;
pub mod config;
pub mod detach;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod output;
pub mod rundir;
pub mod runner;
pub mod status;
pub mod store;
pub mod version;
pub mod workspace;

pub fn run() -> i32 {
    match cli::run_cli() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{err}");
            err.code()
        }
    }
}
