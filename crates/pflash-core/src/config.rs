//! Board configuration
//!
//! Each board pflash knows about is described by one [`BoardConfig`] entry
//! in a JSON document:
//!
//! ```json
//! {
//!   "configuration": [
//!     {
//!       "name": "zynqmp-som",
//!       "project": "aarch64a53-zynqmp-som",
//!       "console": { "baudrate": 115200, "reboot_timeout_s": 10 },
//!       "probe": {
//!         "target_config": "target/xilinx_zynqmp.cfg",
//!         "board_config": "interface/ftdi/digilent-hs2.cfg",
//!         "upload_timeout_s": 60
//!       },
//!       "ramdisk_flash": { "ramdisk_address": "0x1000000" }
//!     }
//!   ]
//! }
//! ```
//!
//! Entries are looked up in the user's `~/.config/pflash/config.json` first
//! and in the configuration bundled with pflash second.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::number::deserialize_number;

/// Configuration shipped with pflash
const BUNDLED_CONFIG: &str = include_str!("../assets/config.json");

/// Serial console parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConsoleConfig {
    /// Baud rate of the bootloader console
    #[serde(deserialize_with = "deserialize_number")]
    pub baudrate: u32,
    /// How long to wait for plo after requesting a reboot
    #[serde(deserialize_with = "deserialize_number")]
    pub reboot_timeout_s: u64,
    /// How long to wait for any prompt after waking the console
    #[serde(
        default = "default_handshake_timeout_s",
        deserialize_with = "deserialize_number"
    )]
    pub handshake_timeout_s: u64,
}

impl ConsoleConfig {
    pub fn reboot_timeout(&self) -> Duration {
        Duration::from_secs(self.reboot_timeout_s)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_s)
    }
}

/// Debug probe (OpenOCD) parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProbeConfig {
    /// OpenOCD target configuration file
    pub target_config: PathBuf,
    /// OpenOCD board/interface configuration file
    pub board_config: PathBuf,
    /// Time limit for a single image upload
    #[serde(deserialize_with = "deserialize_number")]
    pub upload_timeout_s: u64,
}

impl ProbeConfig {
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_s)
    }
}

/// RAM disk flashing parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RamdiskConfig {
    /// Target RAM address images are staged at
    #[serde(deserialize_with = "deserialize_number")]
    pub ramdisk_address: u64,
    /// Time limit for plo to copy one image into flash
    #[serde(
        default = "default_copy_timeout_s",
        deserialize_with = "deserialize_number"
    )]
    pub copy_timeout_s: u64,
}

impl RamdiskConfig {
    pub fn copy_timeout(&self) -> Duration {
        Duration::from_secs(self.copy_timeout_s)
    }
}

fn default_handshake_timeout_s() -> u64 {
    2
}

fn default_copy_timeout_s() -> u64 {
    60
}

/// One board configuration entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BoardConfig {
    /// Board name
    pub name: String,
    /// phoenix-rtos-project project this board builds
    pub project: String,
    pub console: ConsoleConfig,
    pub probe: ProbeConfig,
    pub ramdisk_flash: RamdiskConfig,
}

/// Top-level configuration document
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    configuration: Vec<BoardConfig>,
}

/// A place configuration entries are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// JSON file on disk; skipped if it does not exist
    File(PathBuf),
    /// JSON text compiled into the binary
    Embedded {
        name: &'static str,
        content: &'static str,
    },
}

impl ConfigSource {
    fn name(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Embedded { name, .. } => (*name).to_string(),
        }
    }

    /// Load all entries; `Ok(None)` if the source does not exist
    fn load(&self) -> Result<Option<Vec<BoardConfig>>> {
        let content = match self {
            Self::File(path) => match fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => {
                    return Err(Error::ConfigInvalid {
                        source_name: self.name(),
                        reason: e.to_string(),
                    })
                }
            },
            Self::Embedded { content, .. } => (*content).to_string(),
        };

        let file: ConfigFile = serde_json::from_str(&content).map_err(|e| Error::ConfigInvalid {
            source_name: self.name(),
            reason: e.to_string(),
        })?;
        log::debug!(
            "Loaded {} configuration entries from {}",
            file.configuration.len(),
            self.name()
        );
        Ok(Some(file.configuration))
    }
}

/// Ordered list of configuration sources
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    sources: Vec<ConfigSource>,
}

impl ConfigStore {
    /// Store without any sources
    pub fn new() -> Self {
        Self::default()
    }

    /// User configuration followed by the bundled one
    pub fn with_default_sources() -> Self {
        let mut store = Self::new();
        if let Some(path) = Self::user_config_path() {
            store = store.with_file(path);
        }
        store.with_bundled()
    }

    /// `~/.config/pflash`, if a home directory is known
    pub fn user_dir() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".config").join("pflash"))
    }

    /// `~/.config/pflash/config.json`, if a home directory is known
    pub fn user_config_path() -> Option<PathBuf> {
        Self::user_dir().map(|dir| dir.join("config.json"))
    }

    /// Append a JSON file source
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(ConfigSource::File(path.into()));
        self
    }

    /// Append the configuration bundled with pflash
    pub fn with_bundled(mut self) -> Self {
        self.sources.push(ConfigSource::Embedded {
            name: "<bundled config.json>",
            content: BUNDLED_CONFIG,
        });
        self
    }

    /// Sources in lookup order
    pub fn sources(&self) -> &[ConfigSource] {
        &self.sources
    }

    /// Find the entry for `project`, optionally narrowed to board `board`
    ///
    /// Sources are searched in order and the first match wins.
    pub fn find(&self, project: &str, board: Option<&str>) -> Result<BoardConfig> {
        for source in &self.sources {
            let Some(entries) = source.load()? else {
                log::info!("Configuration file not found: {}", source.name());
                continue;
            };
            let found = entries
                .into_iter()
                .find(|e| e.project == project && board.is_none_or(|b| e.name == b));
            if let Some(entry) = found {
                log::debug!("Using configuration '{}' from {}", entry.name, source.name());
                return Ok(entry);
            }
        }

        let what = match board {
            Some(board) => format!("board '{}' of project '{}'", board, project),
            None => format!("project '{}'", project),
        };
        Err(Error::ConfigNotFound(format!(
            "no entry for {} in {}",
            what,
            self.sources
                .iter()
                .map(ConfigSource::name)
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}
