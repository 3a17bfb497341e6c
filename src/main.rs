//! pflash - Phoenix-RTOS flasher
//!
//! Flashes partitions of a phoenix-rtos-project build onto a board. Each
//! image is staged in target RAM with OpenOCD, then the plo bootloader is
//! told over its serial console to copy it into flash.
//!
//! Exit codes: 0 success, 1 usage or log setup, 2 missing prerequisite,
//! 3 configuration, 4 descriptor/plan/images, 5 handshake, 6 upload,
//! 7 copy, 8 serial I/O.

mod cli;
mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Commands, ProjectArgs};
use pflash_core::ProjectPaths;
use pflash_flash::FlashRequest;

fn project_root(args: &ProjectArgs) -> PathBuf {
    args.root.clone().unwrap_or_else(|| PathBuf::from("."))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("Failed to set up logging: {}", e);
        return ExitCode::FAILURE;
    }

    if cli.dry {
        log::info!("Dry run: the console and the probe will not be touched");
    }

    let result = match cli.command {
        Commands::FlashViaRamdisk {
            console,
            project,
            board,
            parts,
        } => {
            let request = FlashRequest {
                root: project_root(&project),
                project: project.project,
                board,
                partitions: parts,
                dry_run: cli.dry,
            };
            commands::run_flash(&request, &console)
                .map(|_| ())
                .map_err(|failure| failure.error)
        }
        Commands::Partitions { project } => {
            commands::run_partitions(ProjectPaths::new(project_root(&project), project.project))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
