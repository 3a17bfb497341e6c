//! Debug-probe upload seam
//!
//! Placing an image in target RAM is delegated to an [`ImageUploader`].
//! The only contract pflash relies on is the one captured by
//! [`UploadRequest`]: which probe configuration to use, which image to load,
//! at which RAM address, and how long the whole operation may take.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::BoardConfig;
use crate::error::Result;

/// Parameters of one image upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Probe target configuration file
    pub target_config: PathBuf,
    /// Probe board/interface configuration file
    pub board_config: PathBuf,
    /// Binary image to load
    pub image: PathBuf,
    /// RAM address the image is loaded at
    pub address: u64,
    /// Time limit for the whole upload
    pub timeout: Duration,
}

impl UploadRequest {
    /// Request to stage `image` at the board's RAM disk address
    pub fn for_board(config: &BoardConfig, image: &Path) -> Self {
        Self {
            target_config: config.probe.target_config.clone(),
            board_config: config.probe.board_config.clone(),
            image: image.to_path_buf(),
            address: config.ramdisk_flash.ramdisk_address,
            timeout: config.probe.upload_timeout(),
        }
    }
}

/// Something that can place a binary image into target RAM
pub trait ImageUploader {
    /// Human readable name of the tool behind this uploader
    fn name(&self) -> &str;

    /// Check that the tool can be used on this host
    fn check_available(&self) -> Result<()>;

    /// Upload one image, blocking until done
    ///
    /// In dry-run mode the uploader only logs what it would do.
    fn upload(&self, request: &UploadRequest, dry_run: bool) -> Result<()>;
}

impl<U: ImageUploader + ?Sized> ImageUploader for &U {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn check_available(&self) -> Result<()> {
        (**self).check_available()
    }

    fn upload(&self, request: &UploadRequest, dry_run: bool) -> Result<()> {
        (**self).upload(request, dry_run)
    }
}
