//! JSON file holding the activity archive.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::{ActivityRecord, Result, SyncError};

/// One entry of the archive
///
/// Entries written by this tool load as [`StoredActivity::Record`]. Anything
/// else in the array (a hand edit, a field another tool set to `null`) is
/// kept as [`StoredActivity::Foreign`] and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StoredActivity {
    Record(ActivityRecord),
    Foreign(Value),
}

impl StoredActivity {
    pub fn id(&self) -> Option<i64> {
        match self {
            StoredActivity::Record(record) => Some(record.id),
            StoredActivity::Foreign(value) => value.get("id").and_then(Value::as_i64),
        }
    }

    pub fn start_date_local(&self) -> Option<&str> {
        match self {
            StoredActivity::Record(record) => Some(&record.start_date_local),
            StoredActivity::Foreign(value) => value.get("start_date_local").and_then(Value::as_str),
        }
    }

    pub fn as_record(&self) -> Option<&ActivityRecord> {
        match self {
            StoredActivity::Record(record) => Some(record),
            StoredActivity::Foreign(_) => None,
        }
    }
}

impl From<ActivityRecord> for StoredActivity {
    fn from(record: ActivityRecord) -> Self {
        StoredActivity::Record(record)
    }
}

/// Local archive of activities, stored as one pretty-printed JSON array
#[derive(Debug, Clone)]
pub struct ActivityStore {
    path: PathBuf,
}

impl ActivityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the archive, treating a file that is not valid JSON as empty
    ///
    /// A missing file is an empty archive. Invalid JSON is logged at WARN and
    /// also yields an empty archive, which means the next save replaces it.
    /// Use [`ActivityStore::try_load`] to refuse instead. Valid JSON that is
    /// not an array still fails with [`SyncError::InvalidStore`].
    pub fn load(&self) -> Result<Vec<StoredActivity>> {
        match self.try_load() {
            Err(SyncError::CorruptStore { path, source }) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %source,
                    "Activities file is not valid JSON, treating it as empty; its contents will be replaced on save"
                );
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Load the archive, failing with [`SyncError::CorruptStore`] if the
    /// file exists but is not valid JSON
    ///
    /// Entries that do not fit [`ActivityRecord`] are kept as
    /// [`StoredActivity::Foreign`].
    pub fn try_load(&self) -> Result<Vec<StoredActivity>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No activities file yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(SyncError::io(&self.path, e)),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let document: Value =
            serde_json::from_str(&content).map_err(|source| SyncError::CorruptStore {
                path: self.path.clone(),
                source,
            })?;
        let Value::Array(entries) = document else {
            return Err(SyncError::InvalidStore {
                path: self.path.clone(),
                reason: format!("top-level value is {}", kind_of(&document)),
            });
        };

        let records: Vec<StoredActivity> = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| match serde_json::from_value::<ActivityRecord>(entry.clone()) {
                Ok(record) => StoredActivity::Record(record),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        index,
                        activity_id = ?entry.get("id").and_then(serde_json::Value::as_i64),
                        error = %e,
                        "Keeping unrecognized activity entry as-is"
                    );
                    StoredActivity::Foreign(entry)
                }
            })
            .collect();
        tracing::debug!(path = %self.path.display(), count = records.len(), "Loaded activities");
        Ok(records)
    }

    /// Overwrite the file with `records`, indented for reading by humans
    pub fn save(&self, records: &[StoredActivity]) -> Result<()> {
        let mut buf = Vec::with_capacity(records.len() * 512);
        let mut serializer = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        records.serialize(&mut serializer)?;

        fs::write(&self.path, buf).map_err(|e| SyncError::io(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), count = records.len(), "Saved activities");
        Ok(())
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Ids present in `records`, for constant-time membership checks
pub fn existing_ids(records: &[StoredActivity]) -> HashSet<i64> {
    records.iter().filter_map(StoredActivity::id).collect()
}

/// Order by `start_date_local` ascending.
///
/// Timestamps are fixed-width ISO 8601, so string order is time order.
/// Entries without a start date sort first. The sort is stable: records with
/// the same start keep their relative order.
pub fn sort_by_start_date(records: &mut [StoredActivity]) {
    records.sort_by(|a, b| a.start_date_local().cmp(&b.start_date_local()));
}
