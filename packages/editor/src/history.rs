//! # Edit History
//!
//! Append-only, versioned diff log.
//!
//! ## Design
//!
//! - Every committed mutation appends one [`DiffRecord`] with
//!   `version = current_version + 1`; versions start at 1 and have no gaps
//! - Records are never deleted; rollback only computes which diffs to replay
//! - Each diff knows its own inverse ([`DiffRecord::reversal`]), the history
//!   itself never touches documents
//! - The directory backend writes one `NNNNNN.json` file per version and
//!   moves it into place without replacing, so two writers can never claim
//!   the same version
//!
//! ## Example
//!
//! ```rust,ignore
//! let history = EditHistory::in_memory();
//! let version = history.record_diff("index.html", "ncd-0007", DiffKind::Text,
//!     Some("Welcome".into()), Some("Hello World".into()))?;
//!
//! for diff in history.plan_rollback(0)? {
//!     let reversal = diff.reversal()?;
//!     // replay reversal against the document diff.document
//! }
//! ```

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::errors::{EditError, EditResult};
use crate::mutations::Reversal;

/// What kind of value a diff captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiffKind {
    Text,
    Attribute,
    Style,
    AddClass,
    RemoveClass,
}

impl DiffKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffKind::Text => "text",
            DiffKind::Attribute => "attribute",
            DiffKind::Style => "style",
            DiffKind::AddClass => "addClass",
            DiffKind::RemoveClass => "removeClass",
        }
    }
}

impl std::fmt::Display for DiffKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One committed mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffRecord {
    pub version: u64,
    /// Document the mutation changed (the stylesheet for style diffs)
    pub document: String,
    pub component_id: String,
    pub edit_kind: DiffKind,
    /// Attribute, property or class name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Prior value; `None` when the attribute/property did not exist.
    /// Class diffs hold the whole `class` attribute.
    pub before: Option<String>,
    pub after: Option<String>,
    /// The style edit appended a new rule block
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub rule_created: bool,
    pub timestamp: DateTime<Utc>,
}

impl DiffRecord {
    /// The operation that undoes this diff
    pub fn reversal(&self) -> EditResult<Reversal> {
        let target = || {
            self.target.clone().ok_or_else(|| {
                EditError::invalid_operation(format!(
                    "diff v{} has no target and cannot be reversed",
                    self.version
                ))
            })
        };

        Ok(match self.edit_kind {
            DiffKind::Text => Reversal::SetText {
                text: self.before.clone().unwrap_or_default(),
            },
            DiffKind::Attribute => match &self.before {
                Some(value) => Reversal::SetAttribute {
                    attribute: target()?,
                    value: value.clone(),
                },
                None => Reversal::RemoveAttribute {
                    attribute: target()?,
                },
            },
            DiffKind::Style => match &self.before {
                Some(value) => Reversal::SetStyleProperty {
                    property: target()?,
                    value: value.clone(),
                },
                None => Reversal::RemoveStyleProperty {
                    property: target()?,
                    drop_empty_rule: self.rule_created,
                },
            },
            DiffKind::AddClass | DiffKind::RemoveClass => Reversal::RestoreClassList {
                value: self.before.clone(),
            },
        })
    }
}

/// A diff waiting for its version number
#[derive(Debug, Clone, PartialEq)]
pub struct DiffDraft {
    pub document: String,
    pub component_id: String,
    pub edit_kind: DiffKind,
    pub target: Option<String>,
    pub before: Option<String>,
    pub after: Option<String>,
    pub rule_created: bool,
}

impl DiffDraft {
    pub fn new(document: impl Into<String>, component_id: impl Into<String>, edit_kind: DiffKind) -> Self {
        Self {
            document: document.into(),
            component_id: component_id.into(),
            edit_kind,
            target: None,
            before: None,
            after: None,
            rule_created: false,
        }
    }

    pub fn target(mut self, target: Option<String>) -> Self {
        self.target = target;
        self
    }

    pub fn values(mut self, before: Option<String>, after: Option<String>) -> Self {
        self.before = before;
        self.after = after;
        self
    }

    pub fn rule_created(mut self, rule_created: bool) -> Self {
        self.rule_created = rule_created;
        self
    }

    fn commit(self, version: u64) -> DiffRecord {
        DiffRecord {
            version,
            document: self.document,
            component_id: self.component_id,
            edit_kind: self.edit_kind,
            target: self.target,
            before: self.before,
            after: self.after,
            rule_created: self.rule_created,
            timestamp: Utc::now(),
        }
    }
}

/// Backing storage for the history
#[derive(Debug, Clone)]
pub enum HistoryStorage {
    Memory,

    /// One `NNNNNN.json` file per version
    Directory(PathBuf),
}

#[derive(Debug)]
pub struct EditHistory {
    storage: HistoryStorage,
    records: Mutex<BTreeMap<u64, DiffRecord>>,
}

impl EditHistory {
    pub fn in_memory() -> Self {
        Self {
            storage: HistoryStorage::Memory,
            records: Mutex::new(BTreeMap::new()),
        }
    }

    /// Open (or create) a directory-backed history
    pub fn open(dir: impl Into<PathBuf>) -> EditResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let records = load_dir(&dir)?;
        debug!(dir = %dir.display(), versions = records.len(), "Loaded edit history");

        Ok(Self {
            storage: HistoryStorage::Directory(dir),
            records: Mutex::new(records),
        })
    }

    /// Highest committed version, 0 when empty
    pub fn current_version(&self) -> u64 {
        max_version(&self.lock())
    }

    /// Append a diff and return its version
    pub fn record_diff(
        &self,
        document: &str,
        component_id: &str,
        edit_kind: DiffKind,
        before: Option<String>,
        after: Option<String>,
    ) -> EditResult<u64> {
        let draft = DiffDraft::new(document, component_id, edit_kind).values(before, after);
        Ok(self.record(draft)?.version)
    }

    /// Append a fully described diff. Version assignment happens under the lock.
    pub fn record(&self, draft: DiffDraft) -> EditResult<DiffRecord> {
        let mut records = self.lock();

        let record = match &self.storage {
            HistoryStorage::Memory => draft.commit(max_version(&records) + 1),
            HistoryStorage::Directory(dir) => loop {
                let record = draft.clone().commit(max_version(&records) + 1);
                match write_exclusive(&version_path(dir, record.version), &record) {
                    Ok(()) => break record,
                    // Another writer claimed this version; catch up and retry
                    Err(EditError::Io(e)) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                        *records = load_dir(dir)?;
                    }
                    Err(e) => return Err(e),
                }
            },
        };

        info!(
            version = record.version,
            document = %record.document,
            component_id = %record.component_id,
            edit_kind = %record.edit_kind,
            "Recorded diff"
        );
        records.insert(record.version, record.clone());
        Ok(record)
    }

    pub fn get_diff(&self, version: u64) -> EditResult<DiffRecord> {
        self.lock()
            .get(&version)
            .cloned()
            .ok_or(EditError::DiffNotFound(version))
    }

    /// Up to `limit` most recent diffs, newest first
    pub fn list_recent(&self, limit: usize) -> Vec<DiffRecord> {
        self.lock().values().rev().take(limit).cloned().collect()
    }

    /// Every diff with `version > target`, newest first
    pub fn plan_rollback(&self, target: i64) -> EditResult<Vec<DiffRecord>> {
        let records = self.lock();
        let current = max_version(&records);
        if target < 0 || target as u64 > current {
            return Err(EditError::InvalidVersion {
                requested: target,
                current,
            });
        }

        let plan: Vec<DiffRecord> = records
            .range(target as u64 + 1..)
            .rev()
            .map(|(_, record)| record.clone())
            .collect();
        debug!(target_version = target, diffs = plan.len(), "Planned rollback");
        Ok(plan)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<u64, DiffRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn max_version(records: &BTreeMap<u64, DiffRecord>) -> u64 {
    records.keys().next_back().copied().unwrap_or(0)
}

fn version_path(dir: &Path, version: u64) -> PathBuf {
    dir.join(format!("{:06}.json", version))
}

// Staged beside the target; a failed write leaves no partial version file
fn write_exclusive(path: &Path, record: &DiffRecord) -> EditResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let json = serde_json::to_vec_pretty(record)?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(&json)?;
    file.as_file().sync_all()?;
    file.persist_noclobber(path).map_err(|e| EditError::Io(e.error))?;
    Ok(())
}

fn load_dir(dir: &Path) -> EditResult<BTreeMap<u64, DiffRecord>> {
    let mut records = BTreeMap::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_version_file = path.extension().and_then(|e| e.to_str()) == Some("json")
            && path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.parse::<u64>().is_ok())
                .unwrap_or(false);
        if !is_version_file {
            continue;
        }
        let record: DiffRecord = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        records.insert(record.version, record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn text(history: &EditHistory, before: &str, after: &str) -> u64 {
        history
            .record_diff(
                "index.html",
                "ncd-0007",
                DiffKind::Text,
                Some(before.into()),
                Some(after.into()),
            )
            .unwrap()
    }

    #[test]
    fn test_versions_are_monotonic() {
        let history = EditHistory::in_memory();
        assert_eq!(history.current_version(), 0);
        assert_eq!(text(&history, "Welcome", "Hello"), 1);
        assert_eq!(text(&history, "Hello", "Hi"), 2);
        assert_eq!(text(&history, "Hi", "Hey"), 3);
        assert_eq!(history.current_version(), 3);
    }

    #[test]
    fn test_list_recent_is_newest_first() {
        let history = EditHistory::in_memory();
        for i in 0..5 {
            text(&history, &i.to_string(), &(i + 1).to_string());
        }
        let versions: Vec<_> = history.list_recent(3).iter().map(|d| d.version).collect();
        assert_eq!(versions, vec![5, 4, 3]);
        assert_eq!(history.list_recent(50).len(), 5);
    }

    #[test]
    fn test_plan_rollback() {
        let history = EditHistory::in_memory();
        for _ in 0..4 {
            text(&history, "a", "b");
        }
        let plan: Vec<_> = history
            .plan_rollback(1)
            .unwrap()
            .iter()
            .map(|d| d.version)
            .collect();
        assert_eq!(plan, vec![4, 3, 2]);
        assert!(history.plan_rollback(4).unwrap().is_empty());
        assert_eq!(history.plan_rollback(0).unwrap().len(), 4);

        assert!(matches!(
            history.plan_rollback(-1),
            Err(EditError::InvalidVersion { requested: -1, current: 4 })
        ));
        assert!(matches!(
            history.plan_rollback(5),
            Err(EditError::InvalidVersion { requested: 5, .. })
        ));
    }

    #[test]
    fn test_get_diff() {
        let history = EditHistory::in_memory();
        text(&history, "Welcome", "Hello");
        assert_eq!(history.get_diff(1).unwrap().before.as_deref(), Some("Welcome"));
        assert!(matches!(history.get_diff(2), Err(EditError::DiffNotFound(2))));
    }

    #[test]
    fn test_reversals() {
        let history = EditHistory::in_memory();
        let attr = history
            .record(
                DiffDraft::new("index.html", "ncd-0001", DiffKind::Attribute)
                    .target(Some("title".into()))
                    .values(None, Some("Intro".into())),
            )
            .unwrap();
        assert_eq!(
            attr.reversal().unwrap(),
            Reversal::RemoveAttribute {
                attribute: "title".into()
            }
        );

        let style = history
            .record(
                DiffDraft::new("styles/main.css", "ncd-0001", DiffKind::Style)
                    .target(Some("color".into()))
                    .values(None, Some("red".into()))
                    .rule_created(true),
            )
            .unwrap();
        assert_eq!(
            style.reversal().unwrap(),
            Reversal::RemoveStyleProperty {
                property: "color".into(),
                drop_empty_rule: true
            }
        );

        let untargeted = history
            .record(
                DiffDraft::new("styles/main.css", "ncd-0001", DiffKind::Style)
                    .values(Some("red".into()), Some("blue".into())),
            )
            .unwrap();
        assert!(matches!(
            untargeted.reversal(),
            Err(EditError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_directory_history_persists_versions() {
        let dir = TempDir::new().unwrap();
        {
            let history = EditHistory::open(dir.path()).unwrap();
            text(&history, "Welcome", "Hello");
            text(&history, "Hello", "Hi");
        }
        assert!(dir.path().join("000001.json").exists());
        assert!(dir.path().join("000002.json").exists());

        let reopened = EditHistory::open(dir.path()).unwrap();
        assert_eq!(reopened.current_version(), 2);
        assert_eq!(text(&reopened, "Hi", "Hey"), 3);
    }

    #[test]
    fn test_directory_history_holds_only_complete_versions() {
        let dir = TempDir::new().unwrap();
        let history = EditHistory::open(dir.path()).unwrap();
        text(&history, "Welcome", "Hello");

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["000001.json"]);

        // A staging file abandoned mid-write is not mistaken for a version
        std::fs::write(dir.path().join(".tmpA1b2C3"), "{\"version\": 2, \"docu").unwrap();
        let reopened = EditHistory::open(dir.path()).unwrap();
        assert_eq!(reopened.current_version(), 1);
        assert_eq!(text(&reopened, "Hello", "Hi"), 2);
    }

    #[test]
    fn test_concurrent_writers_never_share_a_version() {
        let dir = TempDir::new().unwrap();
        let a = EditHistory::open(dir.path()).unwrap();
        let b = EditHistory::open(dir.path()).unwrap();

        assert_eq!(text(&a, "x", "y"), 1);
        // `b` still believes the log is empty
        assert_eq!(text(&b, "y", "z"), 2);
        assert_eq!(text(&a, "z", "w"), 3);
    }
}
