//! pflash-core - Core library for flashing Phoenix-RTOS targets via RAM disk
//!
//! This crate holds everything that does not touch hardware directly:
//!
//! - [`error`] - the error taxonomy shared by every pflash crate
//! - [`layout`] - board memory-layout descriptors (`nvm.yaml`) and the
//!   partition planner that turns them into [`FlashJob`]s
//! - [`config`] - board configuration entries and where to find them
//! - [`console`] - the serial console seam ([`Transport`], [`ConsolePort`])
//! - [`upload`] - the debug-probe seam ([`ImageUploader`])
//!
//! Hardware-facing crates (`pflash-plo`, `pflash-openocd`) implement or
//! consume the traits defined here, and `pflash-dummy` emulates them for
//! tests.

pub mod config;
pub mod console;
pub mod error;
pub mod layout;
pub mod number;
pub mod upload;

pub use config::{BoardConfig, ConfigStore, ConsoleConfig, ProbeConfig, RamdiskConfig};
pub use console::{ConsolePort, Transport};
pub use error::{Error, Result};
pub use layout::{BlockDevice, Descriptor, FlashJob, Partition, PartitionPlanner, ProjectPaths};
pub use upload::{ImageUploader, UploadRequest};
