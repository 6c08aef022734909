pub mod de;
pub mod row;

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::Layout;
use crate::extract::RawTable;
pub use row::{Schema, TableRow};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Table {table} is missing column `{column}`")]
    ColumnMissing { table: String, column: String },
    #[error("Invalid value in {table}: {source}")]
    InvalidValue {
        table: String,
        #[source]
        source: csv::Error,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Pipeline stage a table belongs to; each stage has its own directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Raw,
    Cleaned,
    Merged,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Raw, Stage::Cleaned, Stage::Merged];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Cleaned => "cleaned",
            Self::Merged => "merged",
        }
    }
}

/// Named tables persisted as comma-delimited files with a header row.
#[derive(Debug, Clone)]
pub struct CsvStore {
    root: PathBuf,
    layout: Layout,
}

impl CsvStore {
    pub fn new(root: impl Into<PathBuf>, layout: Layout) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }

    pub fn dir(&self, stage: Stage) -> PathBuf {
        let name = match stage {
            Stage::Raw => &self.layout.raw_dir,
            Stage::Cleaned => &self.layout.cleaned_dir,
            Stage::Merged => &self.layout.merged_dir,
        };
        self.root.join(name)
    }

    /// `<root>/<stage dir>/<name>.csv`
    pub fn path(&self, stage: Stage, name: &str) -> PathBuf {
        self.dir(stage).join(format!("{name}.csv"))
    }

    /// Load a typed table, failing if any required column is absent.
    pub fn load<T: Schema>(&self, stage: Stage, name: &str) -> Result<Vec<T>> {
        let path = self.path(stage, name);
        log::debug!("Loading {}", path.display());

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_path(&path)
            .map_err(|source| StoreError::Open {
                path: path.clone(),
                source,
            })?;

        let headers = reader
            .headers()
            .map_err(|source| StoreError::Open {
                path: path.clone(),
                source,
            })?
            .clone();

        for spellings in T::COLUMNS {
            let present = spellings
                .iter()
                .any(|col| headers.iter().any(|h| h == *col));
            if !present {
                return Err(StoreError::ColumnMissing {
                    table: name.to_string(),
                    column: spellings[0].to_string(),
                });
            }
        }

        reader
            .deserialize()
            .collect::<std::result::Result<Vec<T>, _>>()
            .map_err(|source| StoreError::InvalidValue {
                table: name.to_string(),
                source,
            })
    }

    /// Write a typed table, replacing any previous file.
    pub fn save<T: TableRow>(&self, stage: Stage, name: &str, rows: &[T]) -> Result<()> {
        let path = self.path(stage, name);
        self.write_records(&path, T::header(), rows.iter().map(TableRow::cells))?;
        log::debug!("Saved {} rows to {}", rows.len(), path.display());
        Ok(())
    }

    /// Write an untyped warehouse snapshot into the raw stage.
    pub fn save_raw(&self, name: &str, table: &RawTable) -> Result<()> {
        let path = self.path(Stage::Raw, name);
        let rows = table.rows.iter().map(|row| {
            row.iter()
                .map(|c| c.clone().unwrap_or_default())
                .collect::<Vec<_>>()
        });
        self.write_records(&path, table.columns.iter().map(String::as_str).collect(), rows)?;
        log::debug!("Saved {} rows to {}", table.rows.len(), path.display());
        Ok(())
    }

    /// Number of data rows in a table file, or `None` if the file doesn't exist.
    pub fn count_rows(&self, stage: Stage, name: &str) -> Result<Option<usize>> {
        let path = self.path(stage, name);
        if !path.exists() {
            return Ok(None);
        }
        let mut reader = csv::Reader::from_path(&path).map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;
        let mut count = 0;
        for record in reader.records() {
            record.map_err(|source| StoreError::InvalidValue {
                table: name.to_string(),
                source,
            })?;
            count += 1;
        }
        Ok(Some(count))
    }

    /// Create the stage directory if it doesn't exist yet.
    pub fn ensure_dir(&self, stage: Stage) -> Result<PathBuf> {
        let dir = self.dir(stage);
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    fn write_records<I>(&self, path: &Path, header: Vec<&str>, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let write_err = |source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut writer = csv::Writer::from_path(path).map_err(write_err)?;
        writer.write_record(&header).map_err(write_err)?;
        for row in rows {
            writer.write_record(&row).map_err(write_err)?;
        }
        writer.flush().map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawArtist, RawTrack, Track, TrackArtist};
    use chrono::NaiveDate;

    fn store() -> (tempfile::TempDir, CsvStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path(), Layout::default());
        (dir, store)
    }

    fn write_raw(store: &CsvStore, name: &str, contents: &str) {
        let dir = store.ensure_dir(Stage::Raw).unwrap();
        std::fs::write(dir.join(format!("{name}.csv")), contents).unwrap();
    }

    #[test]
    fn paths_follow_layout() {
        let store = CsvStore::new("/work", Layout::default());
        assert_eq!(store.path(Stage::Raw, "tracks"), PathBuf::from("/work/data/tracks.csv"));
        assert_eq!(
            store.path(Stage::Cleaned, "tracks_cleaned"),
            PathBuf::from("/work/cleaned_data/tracks_cleaned.csv")
        );
        assert_eq!(
            store.path(Stage::Merged, "final_tracks"),
            PathBuf::from("/work/merged_data/final_tracks.csv")
        );
    }

    #[test]
    fn missing_column_is_reported() {
        let (_dir, store) = store();
        write_raw(&store, "tracks_artists_mapping", "track_id,artist\n1,10\n");

        let err = store
            .load::<TrackArtist>(Stage::Raw, "tracks_artists_mapping")
            .unwrap_err();
        match err {
            StoreError::ColumnMissing { table, column } => {
                assert_eq!(table, "tracks_artists_mapping");
                assert_eq!(column, "artist_id");
            }
            other => panic!("expected ColumnMissing, got {other}"),
        }
    }

    #[test]
    fn padded_headers_are_read_by_their_trimmed_name() {
        let (_dir, store) = store();
        write_raw(&store, "tracks", "track_id, name , release_date\n1,Song,2001-02-03\n");

        let rows: Vec<RawTrack> = store.load(Stage::Raw, "tracks").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name.as_deref(), Some("Song"));
        assert_eq!(rows[0].release_date.as_deref(), Some("2001-02-03"));
    }

    #[test]
    fn header_only_resembling_a_column_is_missing() {
        let (_dir, store) = store();
        write_raw(&store, "tracks", "track_id,nam e,release_date\n1,Song,2001-02-03\n");

        let err = store.load::<RawTrack>(Stage::Raw, "tracks").unwrap_err();
        assert!(matches!(err, StoreError::ColumnMissing { ref column, .. } if column == "name"));
    }

    #[test]
    fn followers_beyond_i64_are_rejected() {
        let (_dir, store) = store();
        write_raw(&store, "artists", "artist_id,name,followers\na1,Alpha,1e20\n");
        let err = store.load::<RawArtist>(Stage::Raw, "artists").unwrap_err();
        assert!(matches!(err, StoreError::InvalidValue { .. }));

        write_raw(&store, "artists", "artist_id,name,followers\na1,Alpha,9.3e18\n");
        let err = store.load::<RawArtist>(Stage::Raw, "artists").unwrap_err();
        assert!(matches!(err, StoreError::InvalidValue { .. }));

        write_raw(&store, "artists", "artist_id,name,followers\na1,Alpha,4.5e15\n");
        let rows: Vec<RawArtist> = store.load(Stage::Raw, "artists").unwrap();
        assert_eq!(rows[0].followers, Some(4_500_000_000_000_000));
    }

    #[test]
    fn missing_file_fails_to_open() {
        let (_dir, store) = store();
        let err = store.load::<TrackArtist>(Stage::Raw, "nope").unwrap_err();
        assert!(matches!(err, StoreError::Open { .. }));
    }

    #[test]
    fn empty_cells_are_null_and_extra_columns_ignored() {
        let (_dir, store) = store();
        write_raw(
            &store,
            "artists",
            "artist_id,name,popularity,followers,genres\n\
             a1,Alpha,,1200.0,rock\n\
             a2,,55,NaN,\n",
        );

        let rows: Vec<RawArtist> = store.load(Stage::Raw, "artists").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name.as_deref(), Some("Alpha"));
        assert_eq!(rows[0].popularity, None);
        assert_eq!(rows[0].followers, Some(1200));
        assert_eq!(rows[1].name, None);
        assert_eq!(rows[1].popularity, Some(55));
        assert_eq!(rows[1].followers, None);
    }

    #[test]
    fn optional_column_may_be_absent() {
        let (_dir, store) = store();
        write_raw(&store, "artists", "artist_id,name,followers\na1,Alpha,7\n");

        let rows: Vec<RawArtist> = store.load(Stage::Raw, "artists").unwrap();
        assert_eq!(rows[0].popularity, None);
        assert_eq!(rows[0].followers, Some(7));
    }

    #[test]
    fn bad_number_is_invalid_value() {
        let (_dir, store) = store();
        write_raw(&store, "artists", "artist_id,name,followers\na1,Alpha,lots\n");

        let err = store.load::<RawArtist>(Stage::Raw, "artists").unwrap_err();
        assert!(matches!(err, StoreError::InvalidValue { .. }));
    }

    #[test]
    fn save_then_load_cleaned_table() {
        let (_dir, store) = store();
        let tracks = vec![
            Track {
                track_id: "t1".into(),
                track_name: Some("Ripple, Live".into()),
                release_date: NaiveDate::from_ymd_opt(1970, 11, 1),
                release_year: Some(1970),
            },
            Track {
                track_id: "t2".into(),
                track_name: None,
                release_date: None,
                release_year: None,
            },
        ];

        store.save(Stage::Cleaned, "tracks_cleaned", &tracks).unwrap();
        let text = std::fs::read_to_string(store.path(Stage::Cleaned, "tracks_cleaned")).unwrap();
        assert!(text.starts_with("track_id,track_name,release_date,release_year\n"));
        assert!(text.contains("t1,\"Ripple, Live\",1970-11-01,1970\n"));
        assert!(text.contains("t2,,,\n"));

        let loaded: Vec<Track> = store.load(Stage::Cleaned, "tracks_cleaned").unwrap();
        assert_eq!(loaded, tracks);
    }

    #[test]
    fn count_rows_of_missing_and_present_files() {
        let (_dir, store) = store();
        assert_eq!(store.count_rows(Stage::Raw, "tracks").unwrap(), None);

        write_raw(&store, "tracks", "track_id,name,release_date\n1,a,\n2,b,\n");
        assert_eq!(store.count_rows(Stage::Raw, "tracks").unwrap(), Some(2));
    }

    #[test]
    fn save_raw_writes_nulls_as_empty_cells() {
        let (_dir, store) = store();
        let table = RawTable {
            columns: vec!["track_id".into(), "artist_id".into()],
            rows: vec![vec![Some("1".into()), None]],
        };
        store.save_raw("tracks_artists_mapping", &table).unwrap();

        let text =
            std::fs::read_to_string(store.path(Stage::Raw, "tracks_artists_mapping")).unwrap();
        assert_eq!(text, "track_id,artist_id\n1,\n");
    }
}
