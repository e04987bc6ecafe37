//! Content stores: where document bytes live.
//!
//! The edit engine only ever sees plain text. The site editor fetches the
//! current text through a [`ContentStore`] before a mutation and persists the
//! result afterwards.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::errors::{EditError, EditResult};

pub trait ContentStore: Send + Sync {
    /// Current text of a document
    fn read(&self, document: &str) -> EditResult<String>;

    /// Durably replace a document's text
    fn write(&self, document: &str, content: &str) -> EditResult<()>;

    /// Delete a document. Returns whether it existed.
    fn remove(&self, document: &str) -> EditResult<bool>;

    /// All stored document paths, sorted
    fn list_documents(&self) -> EditResult<Vec<String>>;

    fn exists(&self, document: &str) -> EditResult<bool> {
        Ok(self.list_documents()?.iter().any(|d| d == document))
    }

    /// Stored HTML pages, sorted
    fn list_pages(&self) -> EditResult<Vec<String>> {
        Ok(self
            .list_documents()?
            .into_iter()
            .filter(|d| is_page(d))
            .collect())
    }
}

pub fn is_page(document: &str) -> bool {
    let lower = document.to_ascii_lowercase();
    lower.ends_with(".html") || lower.ends_with(".htm")
}

/// Write a file via temp file + rename so readers never see partial contents
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> EditResult<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| EditError::Io(e.error))?;
    Ok(())
}

/// In-memory store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, document: impl Into<String>, content: impl Into<String>) -> Self {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(document.into(), content.into());
        self
    }
}

impl ContentStore for MemoryStore {
    fn read(&self, document: &str) -> EditResult<String> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(document)
            .cloned()
            .ok_or_else(|| EditError::DocumentNotFound(document.to_string()))
    }

    fn write(&self, document: &str, content: &str) -> EditResult<()> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(document.to_string(), content.to_string());
        Ok(())
    }

    fn remove(&self, document: &str) -> EditResult<bool> {
        Ok(self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(document)
            .is_some())
    }

    fn list_documents(&self) -> EditResult<Vec<String>> {
        Ok(self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }

    fn exists(&self, document: &str) -> EditResult<bool> {
        Ok(self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(document))
    }
}

/// Site directory on disk. Document keys are `/`-separated paths relative to the root.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
    /// Directory names never listed (state dir, VCS metadata)
    ignored: Vec<String>,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignored: vec![".git".to_string(), "node_modules".to_string()],
        }
    }

    pub fn ignoring(mut self, dir: impl Into<String>) -> Self {
        self.ignored.push(dir.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a document key, refusing anything that escapes the root
    pub fn path_for(&self, document: &str) -> EditResult<PathBuf> {
        let relative = Path::new(document);
        let safe = !document.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(EditError::invalid_operation(format!(
                "document path `{}` escapes the site root",
                document
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl ContentStore for DirectoryStore {
    fn read(&self, document: &str) -> EditResult<String> {
        let path = self.path_for(document)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(EditError::DocumentNotFound(document.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, document: &str, content: &str) -> EditResult<()> {
        let path = self.path_for(document)?;
        write_atomic(&path, content.as_bytes())
    }

    fn remove(&self, document: &str) -> EditResult<bool> {
        let path = self.path_for(document)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list_documents(&self) -> EditResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        let walker = WalkDir::new(&self.root).into_iter().filter_entry(|entry| {
            entry.depth() == 0
                || !entry
                    .file_name()
                    .to_str()
                    .map(|name| self.ignored.iter().any(|ignored| ignored == name))
                    .unwrap_or(false)
        });

        for entry in walker {
            let entry = entry.map_err(|e| {
                EditError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let key = relative
                .components()
                .filter_map(|c| c.as_os_str().to_str())
                .collect::<Vec<_>>()
                .join("/");
            let lower = key.to_ascii_lowercase();
            if is_page(&key) || lower.ends_with(".css") {
                documents.push(key);
            }
        }

        documents.sort();
        Ok(documents)
    }

    fn exists(&self, document: &str) -> EditResult<bool> {
        Ok(self.path_for(document)?.is_file())
    }
}
