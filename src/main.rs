//! churn-sim command line
//!
//! ```text
//! churn-sim create    wipe, run the failure scenario, back up
//! churn-sim compact   reopen with compaction and write linked records
//! churn-sim restore   copy the backups over the stores
//! churn-sim status    report whether stores exist and can be compacted
//! ```
//!
//! Stores live in `./churn-data`. Set `RUST_LOG` to change log verbosity
//! (default `info`).

use churn_sim::Actions;
use std::env;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DATA_DIR: &str = "churn-data";
const USAGE: &str = "usage: churn-sim <create|compact|restore|status>";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = match args.as_slice() {
        [command] => command.as_str(),
        _ => {
            eprintln!("{}", USAGE);
            return ExitCode::from(2);
        }
    };

    let mut actions = Actions::new(DATA_DIR);
    let result = match command {
        "create" => actions.create_test_databases().map(|stats| {
            info!(summary = %stats.summary(), "test databases created");
        }),
        "compact" => actions.compact_and_write(),
        "restore" => actions.restore_test_databases(),
        "status" => {
            println!("{}", actions.status());
            Ok(())
        }
        other => {
            eprintln!("unknown command: {}\n{}", other, USAGE);
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(command, error = %e, "command failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
