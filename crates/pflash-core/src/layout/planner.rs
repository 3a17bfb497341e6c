//! Partition planning
//!
//! Turns a set of requested partition names into [`FlashJob`]s using the
//! project's board descriptor.

use std::path::{Path, PathBuf};

use super::{Descriptor, FlashJob};
use crate::error::{Error, Result};

/// Location of a project inside a phoenix-rtos-project checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    root: PathBuf,
    project: String,
}

impl ProjectPaths {
    /// Project `project` under checkout `root`
    pub fn new(root: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            project: project.into(),
        }
    }

    /// Project name (e.g. `aarch64a53-zynqmp-som`)
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Checkout root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/_projects/<project>/nvm.yaml`
    pub fn descriptor_path(&self) -> PathBuf {
        self.root
            .join("_projects")
            .join(&self.project)
            .join("nvm.yaml")
    }

    /// `<root>/_boot/<project>`, where partition images are built
    pub fn image_dir(&self) -> PathBuf {
        self.root.join("_boot").join(&self.project)
    }
}

/// Resolves requested partition names into flash jobs
#[derive(Debug, Clone)]
pub struct PartitionPlanner {
    paths: ProjectPaths,
}

impl PartitionPlanner {
    /// Create a planner for the given project
    pub fn new(paths: ProjectPaths) -> Self {
        Self { paths }
    }

    /// Project locations used by this planner
    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    /// Load and resolve the project's descriptor
    pub fn descriptor(&self) -> Result<Descriptor> {
        Descriptor::from_yaml_file(self.paths.descriptor_path())
    }

    /// Plan jobs for the requested partitions
    ///
    /// Jobs come out device by device, ascending by offset within a device.
    /// Names missing from the descriptor are skipped with a warning, so the
    /// result may be empty; callers decide whether that is fatal.
    pub fn plan<S: AsRef<str>>(&self, requested: &[S]) -> Result<Vec<FlashJob>> {
        let descriptor = self.descriptor()?;
        Ok(self.plan_with(&descriptor, requested))
    }

    /// Plan jobs against an already loaded descriptor
    pub fn plan_with<S: AsRef<str>>(&self, descriptor: &Descriptor, requested: &[S]) -> Vec<FlashJob> {
        for name in requested {
            let name = name.as_ref();
            if !descriptor.partitions().any(|p| p.name == name) {
                log::warn!(
                    "Partition '{}' not found in {}",
                    name,
                    descriptor.path.display()
                );
            }
        }

        let image_dir = self.paths.image_dir();
        descriptor
            .partitions()
            .filter(|p| requested.iter().any(|r| r.as_ref() == p.name))
            .filter_map(|p| FlashJob::new(p.clone(), image_dir.join(&p.filename)))
            .collect()
    }

    /// Plan jobs and fail with [`Error::EmptyJobSet`] when nothing matches
    pub fn plan_nonempty<S: AsRef<str>>(&self, requested: &[S]) -> Result<Vec<FlashJob>> {
        let jobs = self.plan(requested)?;
        if jobs.is_empty() {
            return Err(Error::EmptyJobSet {
                requested: requested
                    .iter()
                    .map(|r| r.as_ref())
                    .collect::<Vec<_>>()
                    .join(", "),
                descriptor: self.paths.descriptor_path(),
            });
        }
        Ok(jobs)
    }
}
