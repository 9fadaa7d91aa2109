use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::RegistryError;

/// Durable metadata for one provider-side agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub name: String,
    pub instructions: String,
    #[serde(default)]
    pub role: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub external_id: Option<String>,
}

impl AgentRecord {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        role: impl Into<String>,
        external_id: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            role: role.into(),
            created_at: Utc::now(),
            external_id,
        }
    }

    /// Two records describe the same agent when the profile and provider identity agree.
    fn same_agent(&self, other: &AgentRecord) -> bool {
        self.instructions == other.instructions && self.external_id == other.external_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Inserted,
    Unchanged,
}

/// Name-keyed agent registry persisted as a single JSON document.
#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    records: BTreeMap<String, AgentRecord>,
}

impl Registry {
    pub const DEFAULT_FILE: &'static str = "agents_registry.json";

    /// Read the registry at `path`. A missing file is an empty registry; an unreadable one is an error.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No agent registry on disk; starting empty");
                return Ok(Self {
                    path,
                    records: BTreeMap::new(),
                });
            }
            Err(source) => return Err(RegistryError::Io { path, source }),
        };

        let records: BTreeMap<String, AgentRecord> = match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(source) => return Err(RegistryError::Corrupt { path, source }),
        };
        if let Some((key, record)) = records.iter().find(|(key, record)| **key != record.name) {
            return Err(RegistryError::KeyMismatch {
                key: key.clone(),
                name: record.name.clone(),
                path,
            });
        }

        info!(path = %path.display(), agents = records.len(), "Loaded agent registry");
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lookup(&self, name: &str) -> Option<&AgentRecord> {
        self.records.get(name)
    }

    pub fn records(&self) -> impl Iterator<Item = &AgentRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert `record` and persist immediately.
    pub fn register(&mut self, record: AgentRecord) -> Result<Registration, RegistryError> {
        if let Some(existing) = self.records.get(&record.name) {
            if existing.same_agent(&record) {
                return Ok(Registration::Unchanged);
            }
            return Err(RegistryError::DuplicateName { name: record.name });
        }

        let name = record.name.clone();
        self.records.insert(name.clone(), record);
        if let Err(err) = self.save() {
            // Keep memory consistent with disk.
            self.records.remove(&name);
            return Err(err);
        }

        info!(agent = %name, path = %self.path.display(), "Registered agent");
        Ok(Registration::Inserted)
    }

    /// Atomically replace the on-disk document: write a sibling temp file, then rename over it.
    pub fn save(&self) -> Result<(), RegistryError> {
        let data = serde_json::to_vec_pretty(&self.records)?;
        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source| RegistryError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = tmp.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut file = File::create(&tmp).map_err(io_err)?;
        file.write_all(&data).map_err(io_err)?;
        // Data must be durable before the rename publishes it.
        file.sync_all().map_err(io_err)?;
        drop(file);

        #[cfg(windows)]
        {
            match fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    let _ = fs::remove_file(&tmp);
                    return Err(io_err(e));
                }
            }
        }

        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}
