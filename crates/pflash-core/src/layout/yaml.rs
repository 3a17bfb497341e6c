//! Board memory-layout descriptor parsing
//!
//! Parses `nvm.yaml` files of the form:
//!
//! ```yaml
//! flash0:
//!   size: 0x1000000
//!   block_size: 0x10000
//!   padding_byte: 0xff
//!   partitions:
//!     - name: plo
//!       offs: 0x0
//!       size: 0x20000
//!     - name: kernel
//!       offs: 0x20000
//!     - name: rootfs
//!       offs: 0x100000
//! ```
//!
//! Devices keep their order from the file. Within a device partitions are
//! sorted by offset and missing sizes are filled in from the next partition.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{BlockDevice, Partition};
use crate::error::{Error, Result};
use crate::number::{deserialize_number, deserialize_opt_number};

/// Device entry in the descriptor
#[derive(Debug, Deserialize)]
struct YamlDevice {
    #[serde(deserialize_with = "deserialize_number")]
    size: u64,
    #[serde(deserialize_with = "deserialize_number")]
    block_size: u64,
    #[serde(default = "default_padding_byte", deserialize_with = "deserialize_number")]
    padding_byte: u8,
    partitions: Vec<YamlPartition>,
}

/// Partition entry in the descriptor
#[derive(Debug, Deserialize)]
struct YamlPartition {
    name: String,
    #[serde(deserialize_with = "deserialize_number")]
    offs: u64,
    #[serde(default, deserialize_with = "deserialize_opt_number")]
    size: Option<u64>,
}

fn default_padding_byte() -> u8 {
    0xff
}

/// A parsed and resolved board memory-layout descriptor
#[derive(Debug, Clone)]
pub struct Descriptor {
    /// Where the descriptor was loaded from
    pub path: PathBuf,
    /// Block devices in file order
    pub devices: Vec<BlockDevice>,
}

impl Descriptor {
    /// Load a descriptor from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::DescriptorNotFound(path.to_path_buf()),
            _ => Error::descriptor(path, e.to_string()),
        })?;
        let descriptor = Self::from_yaml_str(&content, path)?;
        log::debug!(
            "Loaded {} device(s) from {}",
            descriptor.devices.len(),
            path.display()
        );
        Ok(descriptor)
    }

    /// Parse a descriptor from a YAML string; `path` is used in errors only
    pub fn from_yaml_str(content: &str, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let invalid = |reason: String| Error::descriptor(path, reason);

        let mapping: serde_yaml::Mapping =
            serde_yaml::from_str(content).map_err(|e| invalid(e.to_string()))?;

        let mut devices = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let name = key
                .as_str()
                .ok_or_else(|| invalid(format!("device name {:?} is not a string", key)))?
                .to_string();
            let entry: YamlDevice = serde_yaml::from_value(value)
                .map_err(|e| invalid(format!("device '{}': {}", name, e)))?;

            let mut seen = HashSet::new();
            let mut partitions = Vec::with_capacity(entry.partitions.len());
            for p in entry.partitions {
                if !seen.insert(p.name.clone()) {
                    return Err(invalid(format!(
                        "duplicate partition '{}' on device '{}'",
                        p.name, name
                    )));
                }
                partitions.push(Partition {
                    filename: Partition::image_filename(&name, &p.name),
                    name: p.name,
                    offset: p.offs,
                    size: p.size,
                    device: name.clone(),
                    block_size: entry.block_size,
                    device_size: entry.size,
                    padding_byte: entry.padding_byte,
                });
            }

            let mut device = BlockDevice {
                name,
                size: entry.size,
                block_size: entry.block_size,
                padding_byte: entry.padding_byte,
                partitions,
            };
            device.resolve_sizes().map_err(&invalid)?;

            for part in device.partitions.iter().filter(|p| !p.is_block_aligned()) {
                log::warn!(
                    "Partition '{}' at 0x{:x} is not aligned to the {} block size (0x{:x})",
                    part.name,
                    part.offset,
                    device.name,
                    device.block_size
                );
            }
            devices.push(device);
        }

        Ok(Self {
            path: path.to_path_buf(),
            devices,
        })
    }

    /// All partitions, device by device, ascending by offset
    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.devices.iter().flat_map(|d| d.partitions.iter())
    }

    /// Find a device by name
    pub fn find_device(&self, name: &str) -> Option<&BlockDevice> {
        self.devices.iter().find(|d| d.name == name)
    }
}
