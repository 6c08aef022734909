//! Stage orchestration: extract → clean → merge, with the run manifest.
//!
//! Every stage aborts on the first error. Outputs already written by a failed
//! run stay on disk; only the manifest, written last, marks a complete run.

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::RAW_TABLES;
use crate::clean::{self, CLEANED_TABLES, CleanedTables};
use crate::extract::{ExtractionError, Extractor, SqliteWarehouse};
use crate::merge::{self, MERGED_VIEWS, MergedViews};
use crate::store::{CsvStore, Stage, StoreError};

/// File name of the completion manifest inside the merged directory.
pub const MANIFEST_FILE: &str = "_manifest.json";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Written after every merged view is saved; its presence marks a complete run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub completed_at: DateTime<Utc>,
    /// Row counts keyed by table file name, cleaned and merged.
    pub tables: BTreeMap<String, usize>,
}

impl RunManifest {
    fn new(cleaned: &CleanedTables, merged: &MergedViews) -> Self {
        let tables = cleaned
            .counts()
            .into_iter()
            .chain(merged.counts())
            .map(|(name, rows)| (name.to_string(), rows))
            .collect();
        Self {
            completed_at: Utc::now(),
            tables,
        }
    }
}

/// Row counts for one table file across the stages.
#[derive(Debug, Clone, PartialEq)]
pub struct TableStat {
    pub stage: Stage,
    pub name: &'static str,
    /// `None` when the file hasn't been written.
    pub rows: Option<usize>,
}

/// Pull every catalog table from the extractor into the raw stage.
/// Returns (table, row count) in extraction order.
pub fn extract_all(extractor: &impl Extractor, store: &CsvStore) -> Result<Vec<(String, usize)>> {
    clear_manifest(store)?;
    let mut counts = Vec::with_capacity(RAW_TABLES.len());
    for table in RAW_TABLES {
        let snapshot = extractor.extract(table)?;
        store.save_raw(table, &snapshot)?;
        log::info!("{table} saved locally ({} rows)", snapshot.rows.len());
        counts.push((table.to_string(), snapshot.rows.len()));
    }
    Ok(counts)
}

/// Open the SQLite warehouse and extract every catalog table.
pub fn extract(store: &CsvStore, warehouse: &Path) -> Result<Vec<(String, usize)>> {
    let source = SqliteWarehouse::open(warehouse)?;
    log::info!("Extracting from {}", warehouse.display());
    extract_all(&source, store)
}

/// Clean every raw table on a pool of `workers` threads.
pub fn clean(store: &CsvStore, workers: usize) -> Result<CleanedTables> {
    clear_manifest(store)?;
    let pool = build_pool(workers)?;
    let tables = pool.install(|| clean::clean_all(store))?;
    log::info!("Data cleaning completed");
    Ok(tables)
}

/// Merge the cleaned tables on disk and write the manifest.
pub fn merge(store: &CsvStore, workers: usize) -> Result<RunManifest> {
    clear_manifest(store)?;
    let tables = clean::load_cleaned(store)?;
    let pool = build_pool(workers)?;
    let views = pool.install(|| merge::merge_all(store, &tables))?;
    log::info!("All data merging completed");
    finish(store, &tables, &views)
}

/// Full run. Extraction is skipped when no warehouse is given, in which case
/// the raw stage must already hold the extracts.
pub fn run(store: &CsvStore, warehouse: Option<&Path>, workers: usize) -> Result<RunManifest> {
    clear_manifest(store)?;
    let pool = build_pool(workers)?;

    let pb = ProgressBar::new(3);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:20.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    match warehouse {
        Some(path) => {
            pb.set_message("Extracting...");
            extract(store, path)?;
        }
        None => log::info!("No warehouse configured, using existing raw tables"),
    }
    pb.inc(1);

    pb.set_message("Cleaning...");
    let tables = pool.install(|| clean::clean_all(store))?;
    pb.inc(1);

    pb.set_message("Merging...");
    let views = pool.install(|| merge::merge_all(store, &tables))?;
    pb.inc(1);

    let manifest = finish(store, &tables, &views)?;
    pb.finish_with_message("Done");
    Ok(manifest)
}

/// Row counts of every known table file in every stage.
pub fn table_stats(store: &CsvStore) -> Result<Vec<TableStat>> {
    let stages = [
        (Stage::Raw, RAW_TABLES),
        (Stage::Cleaned, CLEANED_TABLES),
        (Stage::Merged, MERGED_VIEWS),
    ];

    stages
        .into_iter()
        .flat_map(|(stage, names)| names.iter().map(move |name| (stage, *name)))
        .map(|(stage, name)| -> Result<TableStat> {
            Ok(TableStat {
                stage,
                name,
                rows: store.count_rows(stage, name)?,
            })
        })
        .collect()
}

/// The manifest of the last complete run, if any.
pub fn read_manifest(store: &CsvStore) -> Result<Option<RunManifest>> {
    let path = manifest_path(store);
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(Some(serde_json::from_str(&text)?))
}

fn finish(store: &CsvStore, tables: &CleanedTables, views: &MergedViews) -> Result<RunManifest> {
    let manifest = RunManifest::new(tables, views);
    store.ensure_dir(Stage::Merged)?;
    let path = manifest_path(store);
    let json = serde_json::to_string_pretty(&manifest)?;
    std::fs::write(&path, json).map_err(|source| StoreError::Io {
        path: path.clone(),
        source,
    })?;
    log::info!(
        "Run complete: {} final tracks, {} final artists, {} chart rows",
        views.final_tracks.len(),
        views.final_artists.len(),
        views.chart_tracks.len()
    );
    Ok(manifest)
}

fn clear_manifest(store: &CsvStore) -> Result<()> {
    let path = manifest_path(store);
    if path.exists() {
        std::fs::remove_file(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        log::debug!("Removed stale manifest {}", path.display());
    }
    Ok(())
}

fn manifest_path(store: &CsvStore) -> PathBuf {
    store.dir(Stage::Merged).join(MANIFEST_FILE)
}

fn build_pool(workers: usize) -> Result<rayon::ThreadPool> {
    Ok(rayon::ThreadPoolBuilder::new().num_threads(workers).build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Layout;
    use crate::merge::{CHART_TRACKS, FINAL_ARTISTS, FINAL_TRACKS};

    fn seeded_warehouse() -> SqliteWarehouse {
        let w = SqliteWarehouse::open_in_memory().unwrap();
        w.conn
            .execute_batch(
                "
                CREATE TABLE tracks (track_id TEXT, name TEXT, release_date TEXT);
                INSERT INTO tracks VALUES ('1', 'Song', '2001-02-03');
                INSERT INTO tracks VALUES ('1', 'Song', '2001-02-03');
                INSERT INTO tracks VALUES ('2', 'Other', 'unknown');
                INSERT INTO tracks VALUES ('3', 'Lost', '1999');

                CREATE TABLE artists (artist_id TEXT, name TEXT, popularity INTEGER, followers INTEGER);
                INSERT INTO artists VALUES ('10', 'A', 50, 100);
                INSERT INTO artists VALUES ('20', 'B', 60, 200);
                INSERT INTO artists VALUES ('11', 'A', 10, 5);

                CREATE TABLE tracks_artists_mapping (track_id TEXT, artist_id TEXT);
                INSERT INTO tracks_artists_mapping VALUES ('1', '10');
                INSERT INTO tracks_artists_mapping VALUES ('1', '20');
                INSERT INTO tracks_artists_mapping VALUES ('1', '20');
                INSERT INTO tracks_artists_mapping VALUES ('2', '20');

                CREATE TABLE audio_features (
                    track_id TEXT, key INTEGER, loudness REAL, mode INTEGER,
                    speechiness REAL, acousticness REAL, instrumentalness REAL,
                    liveness REAL, valence REAL, tempo REAL, time_signature INTEGER
                );
                INSERT INTO audio_features VALUES ('1', 5, -7.5, 1, 0.04, 0.2, 0.0, 0.9, 0.6, 120.0, 4);
                INSERT INTO audio_features VALUES ('2', 7, -3.0, 0, 0.1, 0.3, 0.5, 0.1, 0.2, 99.5, 3);
                INSERT INTO audio_features VALUES ('3', 7, -3.0, 0, 0.1, NULL, 0.5, 0.1, 0.2, 99.5, 3);

                CREATE TABLE chart_positions (track_id TEXT, chart_week TEXT);
                INSERT INTO chart_positions VALUES ('1', '2020-01-04');
                INSERT INTO chart_positions VALUES ('1', '2020-04-11');
                INSERT INTO chart_positions VALUES ('3', '2020-01-04');
                INSERT INTO chart_positions VALUES ('9', 'n/a');
                ",
            )
            .unwrap();
        w
    }

    fn tmp_store() -> (tempfile::TempDir, CsvStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path(), Layout::default());
        (dir, store)
    }

    fn read(store: &CsvStore, stage: Stage, name: &str) -> String {
        std::fs::read_to_string(store.path(stage, name)).unwrap()
    }

    #[test]
    fn end_to_end_from_warehouse() {
        let (_dir, store) = tmp_store();
        let extracted = extract_all(&seeded_warehouse(), &store).unwrap();
        let names: Vec<&str> = extracted.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, RAW_TABLES);

        let tables = clean(&store, 2).unwrap();
        assert_eq!(tables.tracks.len(), 3);
        assert_eq!(tables.artists.len(), 2);
        assert_eq!(tables.audio_features.len(), 2);
        assert_eq!(tables.mapping.len(), 3);
        assert!(read_manifest(&store).unwrap().is_none());

        let manifest = merge(&store, 2).unwrap();
        assert_eq!(manifest.tables[FINAL_TRACKS], 2);
        assert_eq!(manifest.tables[FINAL_ARTISTS], 3);
        assert_eq!(manifest.tables[CHART_TRACKS], 4);
        assert_eq!(manifest.tables["tracks_cleaned"], 3);
        assert_eq!(read_manifest(&store).unwrap(), Some(manifest));

        let final_tracks = read(&store, Stage::Merged, FINAL_TRACKS);
        let mut lines = final_tracks.lines();
        assert_eq!(
            lines.next(),
            Some(
                "track_id,track_name,release_date,release_year,key,loudness,mode,speechiness,\
                 acousticness,instrumentalness,liveness,valence,tempo,time_signature,artist_name"
            )
        );
        assert_eq!(
            lines.next(),
            Some("1,Song,2001-02-03,2001,5,-7.5,1,0.04,0.2,0,0.9,0.6,120,4,\"A, B\"")
        );
        assert_eq!(lines.next(), Some("2,Other,,,7,-3,0,0.1,0.3,0.5,0.1,0.2,99.5,3,B"));
        assert_eq!(lines.next(), None);

        let chart = read(&store, Stage::Merged, CHART_TRACKS);
        let rows: Vec<&str> = chart.lines().skip(1).collect();
        assert_eq!(rows.len(), 4);
        assert!(rows[1].starts_with("1,2020-04-11,2020,2,Song,"));
        assert_eq!(rows[2], format!("3,2020-01-04,2020,1{}", ",".repeat(14)));
        assert_eq!(rows[3], format!("9,,,{}", ",".repeat(14)));
    }

    #[test]
    fn run_without_warehouse_uses_existing_raw_tables() {
        let (_dir, store) = tmp_store();
        extract_all(&seeded_warehouse(), &store).unwrap();

        let manifest = run(&store, None, 1).unwrap();
        assert_eq!(manifest.tables[FINAL_TRACKS], 2);

        let stats = table_stats(&store).unwrap();
        assert_eq!(stats.len(), 13);
        assert!(stats.iter().all(|s| s.rows.is_some()));
        let artists = stats
            .iter()
            .find(|s| s.stage == Stage::Cleaned && s.name == "artists_cleaned")
            .unwrap();
        assert_eq!(artists.rows, Some(2));
    }

    #[test]
    fn failed_run_leaves_no_manifest() {
        let (_dir, store) = tmp_store();
        extract_all(&seeded_warehouse(), &store).unwrap();
        run(&store, None, 1).unwrap();
        assert!(read_manifest(&store).unwrap().is_some());

        std::fs::write(store.path(Stage::Raw, "tracks"), "track_id,release_date\n1,2001\n").unwrap();
        let err = run(&store, None, 1).unwrap_err();
        assert!(matches!(err, PipelineError::Store(StoreError::ColumnMissing { .. })));
        assert!(read_manifest(&store).unwrap().is_none());
    }

    #[test]
    fn stats_on_empty_layout() {
        let (_dir, store) = tmp_store();
        let stats = table_stats(&store).unwrap();
        assert!(stats.iter().all(|s| s.rows.is_none()));
        assert_eq!(stats.iter().filter(|s| s.stage == Stage::Merged).count(), 3);

        // Same names the stages report once they have run
        let cleaned: Vec<&str> = CleanedTables::default()
            .counts()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(cleaned, CLEANED_TABLES);
        let merged: Vec<&str> = MergedViews::default()
            .counts()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(merged, MERGED_VIEWS);
    }

    #[test]
    fn missing_warehouse_aborts_before_cleaning() {
        let (dir, store) = tmp_store();
        let err = run(&store, Some(&dir.path().join("missing.db")), 1).unwrap_err();
        assert!(matches!(err, PipelineError::Extraction(ExtractionError::NotFound(_))));
        assert!(!store.dir(Stage::Cleaned).exists());
    }
}
