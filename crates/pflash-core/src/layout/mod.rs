//! Board memory layouts
//!
//! A project's `nvm.yaml` describes its block devices and the partitions on
//! them. This module parses it, resolves partition sizes and plans the
//! flash jobs for a set of requested partitions:
//!
//! ```ignore
//! let planner = PartitionPlanner::new(ProjectPaths::new(root, "aarch64a53-zynqmp-som"));
//! let jobs = planner.plan_nonempty(&["plo", "kernel"])?;
//! ```

mod planner;
mod types;
mod yaml;

pub use planner::{PartitionPlanner, ProjectPaths};
pub use types::*;
pub use yaml::Descriptor;
