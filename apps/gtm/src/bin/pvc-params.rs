use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use pvc_utils::loader::{default_config_toml, CONFIG_ENV};

/// Writes the default numerical parameter file. Point $PETPVC_CONFIG at it to use it.
#[derive(Debug, Parser)]
#[command(name = "pvc-params", version)]
struct Args {
    /// path to parameter file to write
    parameter_file: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let filename = args.parameter_file.with_extension("toml");
    let written = default_config_toml()
        .map_err(|e| e.to_string())
        .and_then(|s| fs::write(&filename, s).map_err(|e| e.to_string()));
    match written {
        Ok(()) => {
            println!("wrote default parameter file to {}", filename.display());
            println!("use it with {CONFIG_ENV}={}", filename.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("[Error]\tCannot write `{}`: {e}", filename.display());
            ExitCode::FAILURE
        }
    }
}
