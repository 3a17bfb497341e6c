//! pflash-flash - Flash orchestration
//!
//! Ties the pieces together: the board configuration and partition plan
//! from `pflash-core`, the plo console from `pflash-plo` and an
//! [`ImageUploader`](pflash_core::ImageUploader) staging images in RAM.
//!
//! The target console and the uploader are passed in, so the same run can
//! drive real hardware or the in-memory target from `pflash-dummy`:
//!
//! ```ignore
//! let report = flash_via_ramdisk(
//!     &request,
//!     &ConfigStore::with_default_sources(),
//!     SerialConsole::new("/dev/ttyUSB0"),
//!     OpenOcd::new(),
//!     &mut NoProgress,
//! )?;
//! ```

pub mod progress;
pub mod ramdisk;
pub mod report;

pub use progress::{FlashProgress, NoProgress};
pub use ramdisk::{flash_via_ramdisk, FlashRequest};
pub use report::{CompletedJob, FlashFailure, FlashReport};
