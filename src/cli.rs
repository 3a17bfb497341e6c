//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pflash")]
#[command(author, version, about = "Phoenix-RTOS flasher", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log what would be done without touching the serial console or the probe
    #[arg(short, long, global = true)]
    pub dry: bool,

    /// Append a debug log to this file [default: ~/.config/pflash/log.txt]
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Project selection shared across commands
#[derive(clap::Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project name (e.g. aarch64a53-zynqmp-som)
    #[arg(short, long)]
    pub project: String,

    /// phoenix-rtos-project checkout root (defaults to the current directory)
    #[arg(short, long)]
    pub root: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Flash partitions by staging them in RAM and copying them with plo
    FlashViaRamdisk {
        /// Serial console device (e.g. /dev/ttyUSB0)
        #[arg(short, long)]
        console: String,

        #[command(flatten)]
        project: ProjectArgs,

        /// Board name, when the project is configured for several boards
        #[arg(short, long)]
        board: Option<String>,

        /// Partitions to flash
        #[arg(required = true)]
        parts: Vec<String>,
    },

    /// Show the partition table of a project
    Partitions {
        #[command(flatten)]
        project: ProjectArgs,
    },
}
