use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::geography::Geography;
use crate::series::{Category, GeographyResult};

const RECORD_FILE: &str = "mobility.json";
const STATES_DIR: &str = "US";

/// Persisted records under the output directory, one directory per geography.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Store { root: root.into() }
    }

    pub fn record_dir(&self, geo: &Geography) -> PathBuf {
        geo.record_dir(&self.root)
    }

    pub fn record_path(&self, geo: &Geography) -> PathBuf {
        self.record_dir(geo).join(RECORD_FILE)
    }

    pub fn page_path(&self, geo: &Geography, kind: &str, page: u32) -> PathBuf {
        self.record_dir(geo).join(format!("{kind}-{page}.svg"))
    }

    // ── Records ──

    /// Previously stored record, or `None` when this geography has never been saved.
    pub fn load(&self, geo: &Geography) -> Result<Option<GeographyResult>> {
        let path = self.record_path(geo);
        if !path.is_file() {
            info!("No prior data for {}", geo);
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let record = serde_json::from_str(&raw)
            .with_context(|| format!("Corrupt record {}", path.display()))?;
        Ok(Some(record))
    }

    /// Replace the stored record. Written to a sibling file first, then renamed over.
    pub fn save(&self, geo: &Geography, record: &GeographyResult) -> Result<PathBuf> {
        let path = self.record_path(geo);
        let dir = self.record_dir(geo);
        std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

        let json = serde_json::to_string_pretty(record)?;
        let partial = path.with_extension("json.part");
        std::fs::write(&partial, json).with_context(|| format!("Failed to write {}", partial.display()))?;
        std::fs::rename(&partial, &path).with_context(|| format!("Failed to replace {}", path.display()))?;
        debug!("Saved {}", path.display());
        Ok(path)
    }

    // ── Exports ──

    /// One `mobility-<chart>.csv` per chart with a `date,value` header.
    pub fn export_csv(&self, geo: &Geography, record: &GeographyResult) -> Result<Vec<PathBuf>> {
        let dir = self.record_dir(geo);
        std::fs::create_dir_all(&dir)?;

        let mut written = Vec::with_capacity(record.series.len());
        for (chart_type, series) in &record.series {
            let path = dir.join(format!("mobility-{}.csv", chart_type.slug()));
            let mut wtr = csv::Writer::from_path(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            if series.points.is_empty() {
                wtr.write_record(["date", "value"])?;
            }
            for point in &series.points {
                wtr.serialize(point)?;
            }
            wtr.flush()?;
            written.push(path);
        }
        Ok(written)
    }

    pub fn write_page_svg(&self, geo: &Geography, kind: &str, page: u32, svg: &str) -> Result<PathBuf> {
        let path = self.page_path(geo, kind, page);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&path, svg).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    // ── Overview ──

    /// Every stored record, countries first, each group sorted by key.
    pub fn list_records(&self, category: Option<Category>) -> Result<Vec<StoredRecord>> {
        let mut records = Vec::new();
        if !self.root.is_dir() {
            return Ok(records);
        }

        for dir in sorted_subdirs(&self.root)? {
            let Some(name) = file_name(&dir) else { continue };
            if let Some(record) = read_record(&dir)? {
                records.push(StoredRecord { key: name.clone(), record });
            }
            if name == STATES_DIR {
                for state_dir in sorted_subdirs(&dir)? {
                    let Some(abbrev) = file_name(&state_dir) else { continue };
                    if let Some(record) = read_record(&state_dir)? {
                        records.push(StoredRecord {
                            key: format!("{STATES_DIR}/{abbrev}"),
                            record,
                        });
                    }
                }
            }
        }

        records.retain(|r| category.map_or(true, |c| r.record.category == c));
        records.sort_by(|a, b| (a.record.category, &a.key).cmp(&(b.record.category, &b.key)));
        Ok(records)
    }
}

pub struct StoredRecord {
    /// `FR` or `US/NY`.
    pub key: String,
    pub record: GeographyResult,
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect::<Vec<_>>();
    dirs.sort();
    Ok(dirs)
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

fn read_record(dir: &Path) -> Result<Option<GeographyResult>> {
    let path = dir.join(RECORD_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&path)?;
    let record = serde_json::from_str(&raw).with_context(|| format!("Corrupt record {}", path.display()))?;
    Ok(Some(record))
}
