//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `tracker_core` linkage.
//! - Optionally open (and migrate) a database file given as first argument.

use std::process::ExitCode;
use tracker_core::db::migrations::current_user_version;
use tracker_core::db::open_db;

fn main() -> ExitCode {
    println!("tracker_core ping={}", tracker_core::ping());
    println!("tracker_core version={}", tracker_core::core_version());

    let Some(path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };

    match open_db(&path).and_then(|conn| current_user_version(&conn)) {
        Ok(version) => {
            println!("tracker_core schema_version={version}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("failed to open `{path}`: {err}");
            ExitCode::FAILURE
        }
    }
}
