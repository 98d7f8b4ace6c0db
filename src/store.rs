use crate::error::StoreError;
use crate::summary::SummaryOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use uuid::Uuid;

/// An uploaded dataset record
///
/// Pairs an owner's uploaded CSV file with its metadata and the cached
/// summary (or error marker). The backing file is exclusively owned by the
/// record: it is written once on upload, never mutated, and removed when the
/// record is evicted by retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    /// Unique record id, assigned at creation
    pub id: u64,

    /// Username of the uploading user
    pub owner: String,

    /// Location of the stored backing file (unique per record)
    pub file: PathBuf,

    /// Filename as uploaded, kept for display only
    pub original_filename: String,

    /// Upload timestamp, set once
    pub uploaded_at: DateTime<Utc>,

    /// Cached summary or error marker; `None` until first computed
    pub summary_json: Option<SummaryOutcome>,
}

/// Lightweight dataset projection returned by the history endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Dataset record id
    pub id: u64,

    /// Filename as uploaded
    pub original_filename: String,

    /// Stored backing-file reference
    pub file: String,

    /// Upload timestamp
    pub uploaded_at: DateTime<Utc>,

    /// Cached summary or error marker, if any
    pub summary_json: Option<SummaryOutcome>,
}

impl HistoryEntry {
    /// Project a full record into its history shape
    pub fn from_record(record: &Dataset) -> Self {
        Self {
            id: record.id,
            original_filename: record.original_filename.clone(),
            file: record.file.to_string_lossy().to_string(),
            uploaded_at: record.uploaded_at,
            summary_json: record.summary_json.clone(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    next_id: u64,
    datasets: Vec<Dataset>,
}

/// JSON-file backed dataset record store
///
/// Records live in a single JSON file guarded by a `RwLock`; every mutation
/// persists the whole file. This mirrors how user accounts are stored and is
/// plenty for the bounded per-owner history this service keeps.
pub struct DatasetStore {
    path: PathBuf,
    inner: RwLock<StoreData>,
}

impl DatasetStore {
    /// Open the record store, creating an empty one if the file is absent
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            StoreData {
                next_id: 1,
                datasets: Vec::new(),
            }
        };

        Ok(Self {
            path,
            inner: RwLock::new(data),
        })
    }

    fn persist(&self, data: &StoreData) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// Insert a new record for an already stored backing file
    pub fn insert(
        &self,
        owner: &str,
        file: PathBuf,
        original_filename: &str,
    ) -> Result<Dataset, StoreError> {
        let mut data = self.inner.write().unwrap();
        let record = Dataset {
            id: data.next_id,
            owner: owner.to_string(),
            file,
            original_filename: original_filename.to_string(),
            uploaded_at: Utc::now(),
            summary_json: None,
        };
        data.next_id += 1;
        data.datasets.push(record.clone());
        self.persist(&data)?;
        Ok(record)
    }

    /// Fetch a record only if it belongs to `owner`
    ///
    /// Nonexistence and ownership mismatch are indistinguishable to the
    /// caller, so one user cannot probe for another user's dataset ids.
    pub fn get_for_owner(&self, id: u64, owner: &str) -> Option<Dataset> {
        let data = self.inner.read().unwrap();
        data.datasets
            .iter()
            .find(|d| d.id == id && d.owner == owner)
            .cloned()
    }

    /// Attach a summary outcome to a record
    pub fn set_summary(&self, id: u64, outcome: SummaryOutcome) -> Result<(), StoreError> {
        let mut data = self.inner.write().unwrap();
        if let Some(record) = data.datasets.iter_mut().find(|d| d.id == id) {
            record.summary_json = Some(outcome);
            self.persist(&data)?;
        }
        Ok(())
    }

    /// All records for an owner, newest upload first
    pub fn list_for_owner(&self, owner: &str) -> Vec<Dataset> {
        let data = self.inner.read().unwrap();
        let mut records: Vec<Dataset> = data
            .datasets
            .iter()
            .filter(|d| d.owner == owner)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.uploaded_at
                .cmp(&a.uploaded_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        records
    }

    /// Delete a record; returns whether it existed
    pub fn delete(&self, id: u64) -> Result<bool, StoreError> {
        let mut data = self.inner.write().unwrap();
        let before = data.datasets.len();
        data.datasets.retain(|d| d.id != id);
        let removed = data.datasets.len() != before;
        if removed {
            self.persist(&data)?;
        }
        Ok(removed)
    }

    /// Number of live records for an owner
    pub fn count_for_owner(&self, owner: &str) -> usize {
        let data = self.inner.read().unwrap();
        data.datasets.iter().filter(|d| d.owner == owner).count()
    }
}

/// Persist an uploaded file under the owner's storage area
///
/// Files are stored as `<root>/datasets/<owner>/<uuid>.<ext>` so stored names
/// never collide regardless of what the user called the upload.
///
/// # Arguments
/// * `root` - Data directory root
/// * `owner` - Username the upload belongs to
/// * `original_filename` - Client-side filename, used only for its extension
/// * `bytes` - File contents
///
/// # Returns
/// * `std::io::Result<PathBuf>` - Location of the stored file
pub fn store_upload(
    root: &Path,
    owner: &str,
    original_filename: &str,
    bytes: &[u8],
) -> std::io::Result<PathBuf> {
    let ext = Path::new(original_filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("csv");
    let dir = root.join("datasets").join(owner);
    fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{}.{}", Uuid::new_v4().simple(), ext));
    fs::write(&path, bytes)?;
    Ok(path)
}
