//! Per-entity normalization of the raw warehouse extracts.
//!
//! Each `clean_*` function is pure: it takes the raw rows and returns a new
//! cleaned table. The `*_table` runners wrap them with store load/save.

use chrono::Datelike;
use std::collections::HashSet;

use crate::dates::{parse_date, quarter};
use crate::models::{
    Artist, AudioFeature, ChartPosition, RawArtist, RawAudioFeature, RawChartPosition, RawTrack,
    Track, TrackArtist,
};
use crate::store::{CsvStore, Result, Stage};

pub const TRACKS_CLEANED: &str = "tracks_cleaned";
pub const ARTISTS_CLEANED: &str = "artists_cleaned";
pub const CHART_CLEANED: &str = "chart_performance_cleaned";
pub const AUDIO_FEATURES_CLEANED: &str = "audio_features_cleaned";
pub const MAPPING_CLEANED: &str = "mapping_cleaned";

/// Cleaned table names, in the order the cleaners report them.
pub const CLEANED_TABLES: &[&str] = &[
    TRACKS_CLEANED,
    ARTISTS_CLEANED,
    CHART_CLEANED,
    AUDIO_FEATURES_CLEANED,
    MAPPING_CLEANED,
];

/// Every cleaned table, loaded once per run and handed to the merger.
#[derive(Debug, Clone, Default)]
pub struct CleanedTables {
    pub tracks: Vec<Track>,
    pub artists: Vec<Artist>,
    pub chart_positions: Vec<ChartPosition>,
    pub audio_features: Vec<AudioFeature>,
    pub mapping: Vec<TrackArtist>,
}

impl CleanedTables {
    /// (file name, row count) for each cleaned table.
    pub fn counts(&self) -> Vec<(&'static str, usize)> {
        vec![
            (TRACKS_CLEANED, self.tracks.len()),
            (ARTISTS_CLEANED, self.artists.len()),
            (CHART_CLEANED, self.chart_positions.len()),
            (AUDIO_FEATURES_CLEANED, self.audio_features.len()),
            (MAPPING_CLEANED, self.mapping.len()),
        ]
    }
}

/// Drop exact duplicates, parse release dates and derive the release year.
/// Unparsable dates become null; the row is kept.
pub fn clean_tracks(raw: &[RawTrack]) -> Vec<Track> {
    let mut seen = HashSet::new();
    let mut coerced = 0usize;

    let tracks: Vec<Track> = raw
        .iter()
        .filter(|row| seen.insert(*row))
        .map(|row| {
            let release_date = row.release_date.as_deref().and_then(parse_date);
            if row.release_date.is_some() && release_date.is_none() {
                coerced += 1;
            }
            Track {
                track_id: row.track_id.clone(),
                track_name: row.name.clone(),
                release_date,
                release_year: release_date.map(|d| d.year()),
            }
        })
        .collect();

    if coerced > 0 {
        log::warn!("{coerced} unparsable release dates set to null");
    }
    tracks
}

/// Keep one row per artist name: the one with the most followers.
///
/// Rows are stably sorted by name ascending then followers descending (nulls
/// last in both), so ties on followers keep their original order and the
/// output is ordered by name.
pub fn clean_artists(raw: &[RawArtist]) -> Vec<Artist> {
    let mut sorted: Vec<Artist> = raw.iter().cloned().map(Artist::from).collect();
    sorted.sort_by(|a, b| {
        nulls_last(&a.artist_name, &b.artist_name, |x, y| x.cmp(y))
            .then_with(|| nulls_last(&a.followers, &b.followers, |x, y| y.cmp(x)))
    });

    let mut seen = HashSet::new();
    sorted
        .into_iter()
        .filter(|artist| seen.insert(artist.artist_name.clone()))
        .collect()
}

/// Parse chart weeks and derive the chart year and quarter.
pub fn clean_chart_performance(raw: &[RawChartPosition]) -> Vec<ChartPosition> {
    let mut coerced = 0usize;

    let positions: Vec<ChartPosition> = raw
        .iter()
        .map(|row| {
            let chart_week = row.chart_week.as_deref().and_then(parse_date);
            if row.chart_week.is_some() && chart_week.is_none() {
                coerced += 1;
            }
            ChartPosition {
                track_id: row.track_id.clone(),
                chart_week,
                chart_year: chart_week.map(|d| d.year()),
                quarter: chart_week.map(quarter),
            }
        })
        .collect();

    if coerced > 0 {
        log::warn!("{coerced} unparsable chart weeks set to null");
    }
    positions
}

/// Drop every row with a null in any column. No imputation.
pub fn clean_audio_features(raw: &[RawAudioFeature]) -> Vec<AudioFeature> {
    let features: Vec<AudioFeature> = raw.iter().filter_map(RawAudioFeature::complete).collect();
    let dropped = raw.len() - features.len();
    if dropped > 0 {
        log::info!("Dropped {dropped} incomplete audio feature rows");
    }
    features
}

/// Drop exact-duplicate (track_id, artist_id) pairs.
pub fn clean_mapping(raw: &[TrackArtist]) -> Vec<TrackArtist> {
    let mut seen = HashSet::new();
    raw.iter().filter(|pair| seen.insert(*pair)).cloned().collect()
}

/// Order two nullable values with nulls after every present value.
fn nulls_last<T>(
    a: &Option<T>,
    b: &Option<T>,
    cmp: impl Fn(&T, &T) -> std::cmp::Ordering,
) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Some(x), Some(y)) => cmp(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn tracks_table(store: &CsvStore) -> Result<Vec<Track>> {
    let raw: Vec<RawTrack> = store.load(Stage::Raw, "tracks")?;
    let cleaned = clean_tracks(&raw);
    store.save(Stage::Cleaned, TRACKS_CLEANED, &cleaned)?;
    log::info!("Tracks cleaned and saved ({} of {} rows)", cleaned.len(), raw.len());
    Ok(cleaned)
}

pub fn artists_table(store: &CsvStore) -> Result<Vec<Artist>> {
    let raw: Vec<RawArtist> = store.load(Stage::Raw, "artists")?;
    let cleaned = clean_artists(&raw);
    store.save(Stage::Cleaned, ARTISTS_CLEANED, &cleaned)?;
    log::info!("Artists cleaned and saved ({} of {} rows)", cleaned.len(), raw.len());
    Ok(cleaned)
}

pub fn chart_performance_table(store: &CsvStore) -> Result<Vec<ChartPosition>> {
    let raw: Vec<RawChartPosition> = store.load(Stage::Raw, "chart_positions")?;
    let cleaned = clean_chart_performance(&raw);
    store.save(Stage::Cleaned, CHART_CLEANED, &cleaned)?;
    log::info!("Chart performance cleaned and saved ({} rows)", cleaned.len());
    Ok(cleaned)
}

pub fn audio_features_table(store: &CsvStore) -> Result<Vec<AudioFeature>> {
    let raw: Vec<RawAudioFeature> = store.load(Stage::Raw, "audio_features")?;
    let cleaned = clean_audio_features(&raw);
    store.save(Stage::Cleaned, AUDIO_FEATURES_CLEANED, &cleaned)?;
    log::info!("Audio features cleaned and saved ({} of {} rows)", cleaned.len(), raw.len());
    Ok(cleaned)
}

pub fn mapping_table(store: &CsvStore) -> Result<Vec<TrackArtist>> {
    let raw: Vec<TrackArtist> = store.load(Stage::Raw, "tracks_artists_mapping")?;
    let cleaned = clean_mapping(&raw);
    store.save(Stage::Cleaned, MAPPING_CLEANED, &cleaned)?;
    log::info!("Mapping cleaned and saved ({} of {} rows)", cleaned.len(), raw.len());
    Ok(cleaned)
}

/// Run all five cleaners. They share no data, so they run on the current
/// rayon pool; every one finishes before the first error is returned.
pub fn clean_all(store: &CsvStore) -> Result<CleanedTables> {
    let ((tracks, artists), (chart_positions, (audio_features, mapping))) = rayon::join(
        || rayon::join(|| tracks_table(store), || artists_table(store)),
        || {
            rayon::join(
                || chart_performance_table(store),
                || rayon::join(|| audio_features_table(store), || mapping_table(store)),
            )
        },
    );

    Ok(CleanedTables {
        tracks: tracks?,
        artists: artists?,
        chart_positions: chart_positions?,
        audio_features: audio_features?,
        mapping: mapping?,
    })
}

/// Load the cleaned tables written by a previous `clean_all`.
pub fn load_cleaned(store: &CsvStore) -> Result<CleanedTables> {
    Ok(CleanedTables {
        tracks: store.load(Stage::Cleaned, TRACKS_CLEANED)?,
        artists: store.load(Stage::Cleaned, ARTISTS_CLEANED)?,
        chart_positions: store.load(Stage::Cleaned, CHART_CLEANED)?,
        audio_features: store.load(Stage::Cleaned, AUDIO_FEATURES_CLEANED)?,
        mapping: store.load(Stage::Cleaned, MAPPING_CLEANED)?,
    })
}
