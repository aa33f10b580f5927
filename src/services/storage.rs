use std::collections::{BTreeSet, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use thiserror::Error;
use crate::models::PoolRecord;

const SEEN_PREFIX: &str = "sent_pools_";
const SNAPSHOT_FILE: &str = "pools_snapshot.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes through a sibling temp file and renames it into place.
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("json.tmp");
    {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Per-day record of pool ids that were already announced.
pub struct SeenPoolStore {
    dir: PathBuf,
}

impl SeenPoolStore {
    pub fn new(base_dir: &str) -> Self {
        Self {
            dir: PathBuf::from(base_dir).join("sent"),
        }
    }

    pub fn path_for(&self, day: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}{}.json", SEEN_PREFIX, day.format("%Y-%m-%d")))
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    pub fn seen_today(&self) -> Result<HashSet<String>, StoreError> {
        self.seen_on(Self::today())
    }

    pub fn seen_on(&self, day: NaiveDate) -> Result<HashSet<String>, StoreError> {
        let path = self.path_for(day);
        if !path.exists() {
            return Ok(HashSet::new());
        }

        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(HashSet::new());
        }
        let ids: Vec<String> = serde_json::from_str(&content)?;
        Ok(ids.into_iter().collect())
    }

    pub fn add_seen<I>(&self, ids: I) -> Result<usize, StoreError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.add_seen_on(Self::today(), ids)
    }

    /// Unions `ids` into the day's file. Returns how many were new.
    pub fn add_seen_on<I>(&self, day: NaiveDate, ids: I) -> Result<usize, StoreError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let existing = match self.seen_on(day) {
            Ok(ids) => ids,
            Err(StoreError::Json(e)) => {
                let path = self.path_for(day);
                let aside = path.with_extension("json.corrupt");
                tracing::warn!(
                    "⚠️ Seen window {} unreadable ({}), moved to {}",
                    path.display(),
                    e,
                    aside.display()
                );
                fs::rename(&path, &aside)?;
                HashSet::new()
            }
            Err(e) => return Err(e),
        };
        let mut merged: BTreeSet<String> = existing.iter().cloned().collect();
        let before = merged.len();
        merged.extend(ids.into_iter().map(Into::into));
        let added = merged.len() - before;

        if added > 0 || !self.path_for(day).exists() {
            write_json_atomic(&self.path_for(day), &merged)?;
        }
        tracing::debug!("💾 Seen window {}: +{} ({} total)", day, added, merged.len());
        Ok(added)
    }

    pub fn reset_on(&self, day: NaiveDate) -> Result<(), StoreError> {
        write_json_atomic(&self.path_for(day), &Vec::<String>::new())
    }

    /// Deletes day files dated before `cutoff`. Returns the number removed.
    pub fn prune_before(&self, cutoff: NaiveDate) -> Result<usize, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(day) = name
                .to_str()
                .and_then(|n| n.strip_prefix(SEEN_PREFIX))
                .and_then(|n| n.strip_suffix(".json.corrupt").or_else(|| n.strip_suffix(".json")))
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            else {
                continue;
            };

            if day < cutoff {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Full list of pools from the last successful fetch.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(base_dir: &str) -> Self {
        Self {
            path: PathBuf::from(base_dir).join(SNAPSHOT_FILE),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn save(&self, pools: &[PoolRecord]) -> Result<(), StoreError> {
        write_json_atomic(&self.path, pools)?;
        tracing::info!("📦 Snapshot saved: {} ({} pools)", self.path.display(), pools.len());
        Ok(())
    }

    pub fn load(&self) -> Result<Vec<PoolRecord>, StoreError> {
        if !self.exists() {
            return Ok(vec![]);
        }
        let reader = BufReader::new(File::open(&self.path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
