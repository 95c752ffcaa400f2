//! Volume table: named roots under which the server exposes host storage.

use std::path::PathBuf;

use crate::config::ServerConfig;
use crate::path::{self, IsobusPath};
use crate::protocol::{ErrorCode, VolumeStatus};
use crate::transport::Addr;

/// One exported volume and the clients currently using it.
pub struct Volume {
    pub name: String,
    pub host_path: PathBuf,
    pub removable: bool,
    pub writable: bool,
    users: Vec<Addr>,
}

impl Volume {
    /// Number of in-use references held by clients.
    pub fn refcount(&self) -> usize {
        self.users.len()
    }

    pub fn status(&self) -> VolumeStatus {
        if self.users.is_empty() {
            VolumeStatus::Present
        } else {
            VolumeStatus::InUse
        }
    }
}

/// The static table of volumes built from the server configuration.
pub struct VolumeTable {
    volumes: Vec<Volume>,
    default_volume: String,
    manufacturer_dir: String,
}

impl VolumeTable {
    pub fn new(config: &ServerConfig) -> Self {
        let volumes = config
            .volumes
            .iter()
            .map(|v| Volume {
                name: v.name.clone(),
                host_path: v.path.clone(),
                removable: v.removable,
                writable: v.writable,
                users: Vec::new(),
            })
            .collect();
        Self {
            volumes,
            default_volume: config.default_volume.clone(),
            manufacturer_dir: config.manufacturer_dir.clone(),
        }
    }

    /// Root of the default volume, used when a client has no current
    /// directory yet.
    pub fn default_root(&self) -> IsobusPath {
        IsobusPath::root(&self.default_volume)
    }

    /// Name of the manufacturer-specific directory for tilde expansion.
    pub fn manufacturer_dir(&self) -> &str {
        &self.manufacturer_dir
    }

    /// Looks a volume up by its ISOBUS name, case-insensitively.
    pub fn find(&self, name: &str) -> Option<&Volume> {
        self.volumes.iter().find(|v| v.name.eq_ignore_ascii_case(name))
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Volume> {
        self.volumes.iter_mut().find(|v| v.name.eq_ignore_ascii_case(name))
    }

    /// Translates a normalized path into a host path under its volume.
    pub fn resolve(&self, path: &IsobusPath) -> Result<PathBuf, ErrorCode> {
        let volume =
            self.find(path.volume()).ok_or(ErrorCode::InvalidGivenSourceName)?;
        path::to_host_path(&volume.host_path, path).map_err(|e| e.error_code())
    }

    /// Adds an in-use reference for a client. A client holds at most one
    /// reference per volume.
    pub fn add_user(&mut self, name: &str, client: Addr) -> Option<VolumeStatus> {
        let volume = self.find_mut(name)?;
        if !volume.users.contains(&client) {
            volume.users.push(client);
        }
        Some(volume.status())
    }

    /// Drops the in-use reference a client holds on a volume.
    pub fn release_user(&mut self, name: &str, client: Addr) -> Option<VolumeStatus> {
        let volume = self.find_mut(name)?;
        volume.users.retain(|&c| c != client);
        Some(volume.status())
    }

    /// Drops every reference held by a client. Called on eviction.
    pub fn release_all(&mut self, client: Addr) {
        for volume in &mut self.volumes {
            volume.users.retain(|&c| c != client);
        }
    }
}
