//! Server and client configuration.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Result of configuration loading with error type [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration failures.
#[derive(Debug)]
pub enum Error {
    IO(io::Error),
    Parse(toml::de::Error),
    /// The configured default volume is not in the volume table.
    UnknownDefaultVolume(String),
    /// The volume table is empty.
    NoVolumes,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IO(err) => write!(f, "cannot read configuration: {err}"),
            Error::Parse(err) => write!(f, "cannot parse configuration: {err}"),
            Error::UnknownDefaultVolume(name) => {
                write!(f, "default volume {name:?} is not in the volume table")
            }
            Error::NoVolumes => write!(f, "the volume table is empty"),
        }
    }
}

/// One exported volume: an ISOBUS name mapped onto a host directory.
#[derive(Debug, Clone, Deserialize)]
pub struct VolumeConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub removable: bool,
    #[serde(default)]
    pub writable: bool,
}

/// Server configuration: the volume table, the default volume and the
/// manufacturer-specific directory name used for tilde expansion.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub default_volume: String,
    #[serde(default = "default_manufacturer_dir")]
    pub manufacturer_dir: String,
    #[serde(rename = "volume")]
    pub volumes: Vec<VolumeConfig>,
}

fn default_manufacturer_dir() -> String {
    "mfs".to_owned()
}

impl ServerConfig {
    /// Loads and validates a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(Error::IO)?;
        Self::parse(&text)
    }

    /// Parses and validates a TOML configuration string.
    pub fn parse(text: &str) -> Result<Self> {
        let config: ServerConfig = toml::from_str(text).map_err(Error::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.volumes.is_empty() {
            return Err(Error::NoVolumes);
        }
        if !self.volumes.iter().any(|v| v.name.eq_ignore_ascii_case(&self.default_volume)) {
            return Err(Error::UnknownDefaultVolume(self.default_volume.clone()));
        }
        Ok(())
    }
}
