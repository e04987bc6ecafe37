//! # Component Registry
//!
//! Durable map from identifier to [`ComponentRecord`].
//!
//! Identifiers are immutable once assigned, so the registry only ever grows:
//! registering an id that already exists is an error, and nothing updates or
//! deletes records. The directory backend stores one JSON file per id, each
//! committed with an atomic rename, so a successful [`ComponentRegistry::register`]
//! is on disk before it returns and no call rewrites unrelated records.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::component::ComponentRecord;
use crate::errors::{EditError, EditResult};
use crate::store::write_atomic;

/// Backing storage for the registry
#[derive(Debug, Clone)]
pub enum RegistryStorage {
    /// In-memory only (tests, ephemeral sessions)
    Memory,

    /// One `<id>.json` file per record
    Directory(PathBuf),
}

#[derive(Debug)]
pub struct ComponentRegistry {
    storage: RegistryStorage,
    records: Mutex<BTreeMap<String, ComponentRecord>>,
}

impl ComponentRegistry {
    pub fn in_memory() -> Self {
        Self {
            storage: RegistryStorage::Memory,
            records: Mutex::new(BTreeMap::new()),
        }
    }

    /// Open (or create) a directory-backed registry, loading every record
    pub fn open(dir: impl Into<PathBuf>) -> EditResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let mut records = BTreeMap::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            let record: ComponentRecord = serde_json::from_str(&content)?;
            records.insert(record.id.clone(), record);
        }
        debug!(dir = %dir.display(), records = records.len(), "Loaded component registry");

        Ok(Self {
            storage: RegistryStorage::Directory(dir),
            records: Mutex::new(records),
        })
    }

    pub fn storage(&self) -> &RegistryStorage {
        &self.storage
    }

    /// Register a new identifier. Fails with `DuplicateIdentifier` if it exists.
    pub fn register(&self, record: ComponentRecord) -> EditResult<()> {
        self.register_all(vec![record])
    }

    /// Register a batch. Every id is checked before anything is written.
    pub fn register_all(&self, batch: Vec<ComponentRecord>) -> EditResult<()> {
        let mut records = self.lock();

        let mut seen = std::collections::HashSet::new();
        for record in &batch {
            validate_id(&record.id)?;
            if records.contains_key(&record.id)
                || !seen.insert(record.id.as_str())
                || self.exists_on_disk(&record.id)
            {
                return Err(EditError::DuplicateIdentifier(record.id.clone()));
            }
        }

        for record in batch {
            if let RegistryStorage::Directory(dir) = &self.storage {
                let json = serde_json::to_vec_pretty(&record)?;
                write_atomic(&record_path(dir, &record.id), &json)?;
            }
            info!(
                component_id = %record.id,
                document = %record.document,
                edit_kind = %record.edit_kind,
                "Registered component"
            );
            records.insert(record.id.clone(), record);
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> EditResult<ComponentRecord> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| EditError::ComponentNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Records living in `document`, ordered by id
    pub fn get_by_document(&self, document: &str) -> Vec<ComponentRecord> {
        self.lock()
            .values()
            .filter(|record| record.document == document)
            .cloned()
            .collect()
    }

    pub fn list(&self) -> BTreeMap<String, ComponentRecord> {
        self.lock().clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn exists_on_disk(&self, id: &str) -> bool {
        match &self.storage {
            RegistryStorage::Directory(dir) => record_path(dir, id).exists(),
            RegistryStorage::Memory => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, ComponentRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn record_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{}.json", id))
}

// Ids double as file names
fn validate_id(id: &str) -> EditResult<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(EditError::invalid_operation(format!(
            "identifier `{}` contains unsupported characters",
            id
        )))
    }
}
