//! Iterative Yang 部分容积校正.

use std::process::ExitCode;

use clap::Parser;
use log::info;
use pet_berry::consts::DEFAULT_ITERATIONS;
use pet_berry::yang::IterativeYang;
use pvc_utils::{init_logger, load_inputs, AtStage, Failure, PvcArgs, Stage, CITATION};

/// Performs iterative Yang partial volume correction.
#[derive(Debug, Parser)]
#[command(
    name = "pvc-iy",
    version,
    long_about = format!(
        "Performs iterative Yang partial volume correction.\n\n\
         Erlandsson, K., et al. (2012). A review of partial volume correction \
         techniques for emission tomography and their applications in neurology, \
         cardiology and oncology. Physics in Medicine and Biology, 57(21), R119.\n\n{CITATION}"
    )
)]
struct Cli {
    #[command(flatten)]
    pvc: PvcArgs,

    /// Number of iterations
    #[arg(short, long = "iter", default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,
}

fn run(cli: &Cli) -> Result<(), Failure> {
    let args = &cli.pvc;
    let inputs = load_inputs(args)?;

    info!("Running {} iterations", cli.iterations);
    let estimate = IterativeYang::new(inputs.psf)
        .iterations(cli.iterations)
        .verbose(args.debug)
        .config(inputs.config)
        .run(&inputs.pet, &inputs.masks)
        .at_file(Stage::Correct, &args.pet)?;

    info!("Writing {}", args.output.display());
    estimate.save(&args.output).at_file(Stage::Write, &args.output)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.pvc.debug);
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(f) => f.report(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iterations() {
        let base = ["pvc-iy", "pet.nii", "mask.nii", "out.nii", "-x", "6", "-y", "6", "-z", "6"];
        let cli = Cli::try_parse_from(base).unwrap();
        assert_eq!(cli.iterations, DEFAULT_ITERATIONS);

        let cli = Cli::try_parse_from(base.iter().chain(&["--iter", "3"])).unwrap();
        assert_eq!(cli.iterations, 3);

        assert!(Cli::try_parse_from(base.iter().chain(&["--iter", "-1"])).is_err());
    }
}
