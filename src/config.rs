use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, SyncError};

/// Where persisted configuration lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    data_dir: PathBuf,
}

impl AppPaths {
    /// Uses `data_dir` when given, the platform data directory otherwise.
    pub fn resolve(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => ProjectDirs::from("com", "datasync", "datasync")
                .ok_or_else(|| SyncError::Config("unable to resolve data directory".to_string()))?
                .data_local_dir()
                .to_path_buf(),
        };
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn mappings_file(&self) -> PathBuf {
        self.data_dir.join("saved_mappings.json")
    }

    pub fn connections_file(&self) -> PathBuf {
        self.data_dir.join("connections.json")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub path: PathBuf,
    pub added_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    connections: BTreeMap<String, ConnectionProfile>,
}

/// Named database connections, stored as JSON.
#[derive(Debug, Clone)]
pub struct ConnectionRegistry {
    path: PathBuf,
}

impl ConnectionRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<RegistryFile> {
        if !self.path.exists() {
            return Ok(RegistryFile::default());
        }
        let data = fs::read_to_string(&self.path)?;
        if data.trim().is_empty() {
            return Ok(RegistryFile::default());
        }
        Ok(serde_json::from_str(&data)?)
    }

    fn store(&self, file: &RegistryFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(file)?)?;
        Ok(())
    }

    /// Connection names in sorted order.
    pub fn available_connections(&self) -> Result<Vec<String>> {
        Ok(self.load()?.connections.into_keys().collect())
    }

    pub fn get(&self, name: &str) -> Result<ConnectionProfile> {
        self.load()?
            .connections
            .remove(name)
            .ok_or_else(|| SyncError::Config(format!("unknown connection '{name}'")))
    }

    /// Registers `path` under `name`, replacing an existing entry.
    pub fn add(&self, name: &str, path: &Path) -> Result<ConnectionProfile> {
        if name.trim().is_empty() {
            return Err(SyncError::Config("connection name is required".to_string()));
        }
        let mut file = self.load()?;
        let profile = ConnectionProfile {
            path: path.to_path_buf(),
            added_at: chrono::Utc::now().to_rfc3339(),
        };
        file.connections.insert(name.to_string(), profile.clone());
        self.store(&file)?;
        info!(connection = name, path = %path.display(), "registered connection");
        Ok(profile)
    }

    /// Returns whether a connection was removed.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let mut file = self.load()?;
        if file.connections.remove(name).is_none() {
            return Ok(false);
        }
        self.store(&file)?;
        Ok(true)
    }
}
