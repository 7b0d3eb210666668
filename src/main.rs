//! autofan - NVIDIA GPU fan controller
//!
//! Drives GPU fan speed from the core and GDDR6 memory-junction
//! temperatures.

use autofan::cli::args::{generate_completions, Cli, Commands};
use autofan::commands::{run_loop, run_memtemp, run_status};
use autofan::error::{AppError, MemoryError, NvmlError};
use clap::Parser;
use env_logger::Env;

fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG still wins over --verbose
    logger_builder(Env::default(), cli.verbose).init();

    // Run the appropriate command
    let result = run(&cli);

    if let Err(e) = result {
        log::error!("{}", e);
        print_error(&e);
        std::process::exit(1);
    }
}

fn logger_builder<'a>(env: Env<'a>, verbose: bool) -> env_logger::Builder {
    let default_filter = if verbose { "debug" } else { "warn" };
    let mut builder = env_logger::Builder::from_env(env.default_filter_or(default_filter));
    builder.format_timestamp(None);
    builder
}

fn run(cli: &Cli) -> Result<(), AppError> {
    match &cli.command {
        Commands::Run(args) => run_loop(cli, args, cli.format),

        Commands::Status(args) => run_status(cli, args, cli.format),

        Commands::Memtemp(args) => run_memtemp(cli, args, cli.format),

        Commands::Completions { shell } => {
            generate_completions(*shell);
            Ok(())
        }
    }
}

fn print_error(err: &AppError) {
    eprintln!("Error: {}", err);

    // Print helpful hints for common errors
    match err {
        AppError::Nvml(NvmlError::LibraryNotFound) => {
            eprintln!();
            eprintln!("Hint: Make sure the NVIDIA driver is installed.");
            eprintln!("      On Linux, install the nvidia-utils package.");
        }
        AppError::Nvml(NvmlError::InsufficientPermissions(_))
        | AppError::Memory(MemoryError::PermissionDenied(_)) => {
            eprintln!();
            eprintln!("Hint: Try running with sudo or as root.");
        }
        AppError::Memory(MemoryError::MapFailed { .. }) => {
            eprintln!();
            eprintln!("Hint: The kernel may restrict /dev/mem to system RAM.");
            eprintln!("      Boot with iomem=relaxed to allow reading device registers.");
        }
        AppError::Memory(MemoryError::UnsupportedPlatform(_)) => {
            eprintln!();
            eprintln!("Hint: /dev/mem is missing; the kernel needs CONFIG_DEVMEM.");
        }
        AppError::Memory(MemoryError::ProbeUnavailable(_)) => {
            eprintln!();
            eprintln!("Hint: Pass --arch and --bar0 to locate the sensor by hand.");
        }
        AppError::Actuator(_) => {
            eprintln!();
            eprintln!("Hint: Try --actuator nvidia-settings, or --dry-run to test without fans.");
        }
        _ => {}
    }
}
