use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog;
use crate::extract;
use crate::raw::{dedupe_by_code, RawRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramRow {
    pub program_id: String,
    pub program_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRow {
    pub param_key: String,
    pub param_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subgroup: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRow {
    pub program_id: String,
    pub param_key: String,
    pub value: Value,
}

/// One complete output of a build cycle. Immutable once built; a refresh
/// produces a whole replacement, never an in-place update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub built_at: DateTime<Utc>,
    pub programs: Vec<ProgramRow>,
    pub params: Vec<ParamRow>,
    pub values: Vec<ValueRow>,
}

impl Snapshot {
    /// Dedupe the raw feed and extract every record against the fixed
    /// catalog. Each surviving program gets exactly one value row per param.
    pub fn build(records: Vec<RawRecord>) -> Snapshot {
        let records = dedupe_by_code(records);

        let extracted: Vec<(ProgramRow, Vec<ValueRow>)> = records
            .par_iter()
            .filter_map(extract::extract_record)
            .collect();

        let mut programs = Vec::with_capacity(extracted.len());
        let mut values = Vec::with_capacity(extracted.len() * catalog::PARAMS.len());
        for (program, rows) in extracted {
            programs.push(program);
            values.extend(rows);
        }

        Snapshot {
            built_at: Utc::now(),
            programs,
            params: catalog::param_rows(),
            values,
        }
    }
}

// ── File store ──

pub const SNAPSHOT_FILE: &str = "compare-v2.json";

/// Persist the snapshot under `dir`. The document is written to a temp
/// file and renamed over the previous one, so a concurrent reader sees
/// either the old snapshot or the new one, never a partial file.
pub fn save(dir: &Path, snapshot: &Snapshot) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create snapshot dir {}", dir.display()))?;

    let path = dir.join(SNAPSHOT_FILE);
    let tmp = dir.join(format!("{SNAPSHOT_FILE}.tmp"));

    let json = serde_json::to_vec_pretty(snapshot).context("failed to serialize snapshot")?;
    fs::write(&tmp, json)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, &path)
        .with_context(|| format!("failed to replace {}", path.display()))?;

    Ok(path)
}

pub fn load(dir: &Path) -> Result<Snapshot> {
    let path = dir.join(SNAPSHOT_FILE);
    let bytes = fs::read(&path).with_context(|| {
        format!("no snapshot at {} (run `refresh` first)", path.display())
    })?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("snapshot at {} is not readable", path.display()))
}

// ── In-process cache ──

/// Latest snapshot shared across server handlers. Readers take a cheap
/// `Arc` clone; a refresh swaps the whole pointer under the lock so no
/// reader can observe a half-updated snapshot.
#[derive(Default)]
pub struct SnapshotCache {
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl SnapshotCache {
    pub fn get(&self) -> Option<Arc<Snapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn swap(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        snapshot
    }
}
