//! Layout types
//!
//! Block devices, their partitions and the flash jobs built from them.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A named partition on a block device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Name of the partition
    pub name: String,
    /// File name of the image built for this partition
    pub filename: String,
    /// Offset from the start of the device
    pub offset: u64,
    /// Size in bytes, `None` until resolved from the neighbouring partition
    pub size: Option<u64>,
    /// Name of the owning block device (plo device alias)
    pub device: String,
    /// Erase block size of the owning device
    pub block_size: u64,
    /// Total size of the owning device
    pub device_size: u64,
    /// Value of erased/padding bytes on the device
    pub padding_byte: u8,
}

impl Partition {
    /// Image file name for partition `name` on `device`
    pub fn image_filename(device: &str, name: &str) -> String {
        format!("part_{}_{}.img", device, name)
    }

    /// End offset (exclusive), if the size is known
    pub fn end(&self) -> Option<u64> {
        self.size.map(|size| self.offset + size)
    }

    /// Check if the partition starts on an erase block boundary
    pub fn is_block_aligned(&self) -> bool {
        self.block_size == 0 || self.offset.is_multiple_of(self.block_size)
    }
}

/// A block device with its partitions, sorted by ascending offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    /// Device name as known to plo (e.g. `flash0`)
    pub name: String,
    /// Total size in bytes
    pub size: u64,
    /// Erase block size in bytes
    pub block_size: u64,
    /// Padding byte
    pub padding_byte: u8,
    /// Partitions, ascending by offset
    pub partitions: Vec<Partition>,
}

impl BlockDevice {
    /// Find a partition by name
    pub fn find_partition(&self, name: &str) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.name == name)
    }

    /// Sort partitions by offset and fill in every missing size
    ///
    /// A partition without a size extends up to the next partition, or up to
    /// the end of the device if it is the last one.
    pub(crate) fn resolve_sizes(&mut self) -> core::result::Result<(), String> {
        self.partitions.sort_by_key(|p| p.offset);

        let offsets: Vec<u64> = self.partitions.iter().map(|p| p.offset).collect();
        for (i, part) in self.partitions.iter_mut().enumerate() {
            let limit = offsets.get(i + 1).copied().unwrap_or(self.size);

            if part.offset >= self.size {
                return Err(format!(
                    "partition '{}' at 0x{:x} starts beyond end of {} (0x{:x})",
                    part.name, part.offset, self.name, self.size
                ));
            }

            let size = match part.size {
                Some(size) => size,
                None => limit - part.offset,
            };
            if size == 0 {
                return Err(format!("partition '{}' has zero size", part.name));
            }
            if part.offset.checked_add(size).is_none_or(|end| end > limit) {
                return Err(format!(
                    "partition '{}' (0x{:x} + 0x{:x}) overlaps the next partition or runs past the end of {}",
                    part.name, part.offset, size, self.name
                ));
            }
            part.size = Some(size);
        }
        Ok(())
    }
}

/// One resolved partition bound to its source image
///
/// Created by the [`PartitionPlanner`](super::PartitionPlanner), consumed
/// once per upload+copy cycle and never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashJob {
    partition: Partition,
    size: u64,
    image: PathBuf,
}

impl FlashJob {
    /// Bind a partition to its image; the partition size must be resolved
    pub fn new(partition: Partition, image: PathBuf) -> Option<Self> {
        let size = partition.size?;
        Some(Self {
            partition,
            size,
            image,
        })
    }

    /// Partition name
    pub fn name(&self) -> &str {
        &self.partition.name
    }

    /// Device alias understood by plo
    pub fn device(&self) -> &str {
        &self.partition.device
    }

    /// Offset within the device
    pub fn offset(&self) -> u64 {
        self.partition.offset
    }

    /// Partition size in bytes
    pub fn capacity(&self) -> u64 {
        self.size
    }

    /// Path of the image to flash
    pub fn image(&self) -> &Path {
        &self.image
    }

    /// The underlying partition
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Size of the image on disk, checked against the partition size
    pub fn image_len(&self) -> Result<u64> {
        let meta = fs::metadata(&self.image).map_err(|_| Error::ImageNotFound(self.image.clone()))?;
        if !meta.is_file() {
            return Err(Error::ImageNotFound(self.image.clone()));
        }
        let len = meta.len();
        if len > self.size {
            return Err(Error::ImageTooLarge {
                path: self.image.clone(),
                partition: self.partition.name.clone(),
                size: len,
                capacity: self.size,
            });
        }
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(name: &str, offset: u64, size: Option<u64>) -> Partition {
        Partition {
            name: name.to_string(),
            filename: Partition::image_filename("flash0", name),
            offset,
            size,
            device: "flash0".to_string(),
            block_size: 0x1000,
            device_size: 0x100000,
            padding_byte: 0xff,
        }
    }

    fn device(partitions: Vec<Partition>) -> BlockDevice {
        BlockDevice {
            name: "flash0".to_string(),
            size: 0x100000,
            block_size: 0x1000,
            padding_byte: 0xff,
            partitions,
        }
    }

    #[test]
    fn test_gap_rule() {
        let mut dev = device(vec![
            part("rootfs", 0x80000, None),
            part("plo", 0, Some(0x10000)),
            part("kernel", 0x20000, None),
        ]);
        dev.resolve_sizes().unwrap();

        let names: Vec<_> = dev.partitions.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["plo", "kernel", "rootfs"]);
        assert_eq!(dev.find_partition("plo").unwrap().size, Some(0x10000));
        assert_eq!(dev.find_partition("kernel").unwrap().size, Some(0x60000));
        assert_eq!(dev.find_partition("rootfs").unwrap().size, Some(0x80000));
    }

    #[test]
    fn test_overlap_rejected() {
        let mut dev = device(vec![part("a", 0, Some(0x3000)), part("b", 0x2000, None)]);
        assert!(dev.resolve_sizes().is_err());
    }

    #[test]
    fn test_offset_beyond_device_rejected() {
        let mut dev = device(vec![part("a", 0x100000, None)]);
        assert!(dev.resolve_sizes().is_err());
    }

    #[test]
    fn test_duplicate_offset_rejected() {
        let mut dev = device(vec![part("a", 0x1000, None), part("b", 0x1000, None)]);
        assert!(dev.resolve_sizes().is_err());
    }

    #[test]
    fn test_flash_job_requires_resolved_size() {
        assert!(FlashJob::new(part("a", 0, None), PathBuf::from("a.img")).is_none());
        let job = FlashJob::new(part("a", 0x1000, Some(0x2000)), PathBuf::from("a.img")).unwrap();
        assert_eq!(job.capacity(), 0x2000);
        assert_eq!(job.offset(), 0x1000);
        assert_eq!(job.device(), "flash0");
        assert!(job.partition().is_block_aligned());
    }

    #[test]
    fn test_image_len_checks() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("a.img");

        let job = FlashJob::new(part("a", 0, Some(16)), image.clone()).unwrap();
        assert!(matches!(job.image_len(), Err(Error::ImageNotFound(_))));

        fs::write(&image, [0u8; 8]).unwrap();
        assert_eq!(job.image_len().unwrap(), 8);

        fs::write(&image, [0u8; 17]).unwrap();
        assert!(matches!(job.image_len(), Err(Error::ImageTooLarge { size: 17, .. })));
    }
}
