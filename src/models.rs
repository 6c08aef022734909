//! Typed rows for every catalog table, raw and cleaned.
//!
//! Raw rows mirror the warehouse extracts. Renamed display-name columns accept
//! both spellings so a cleaned file can be fed back through its cleaner.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::store::de;
use crate::store::row::{Schema, TableRow, cell};

/// A track row as extracted from the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct RawTrack {
    pub track_id: String,
    #[serde(alias = "track_name", default, deserialize_with = "de::text_opt")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::text_opt")]
    pub release_date: Option<String>,
}

impl Schema for RawTrack {
    const COLUMNS: &'static [&'static [&'static str]] =
        &[&["track_id"], &["name", "track_name"], &["release_date"]];
}

/// A cleaned track.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Track {
    pub track_id: String,
    #[serde(default, deserialize_with = "de::text_opt")]
    pub track_name: Option<String>,
    #[serde(default, deserialize_with = "de::date_opt")]
    pub release_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "de::int_opt")]
    pub release_year: Option<i32>,
}

impl Schema for Track {
    const COLUMNS: &'static [&'static [&'static str]] = &[
        &["track_id"],
        &["track_name"],
        &["release_date"],
        &["release_year"],
    ];
}

impl TableRow for Track {
    fn header() -> Vec<&'static str> {
        vec!["track_id", "track_name", "release_date", "release_year"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.track_id.clone(),
            cell(&self.track_name),
            cell(&self.release_date),
            cell(&self.release_year),
        ]
    }
}

/// An artist row as extracted from the warehouse.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawArtist {
    pub artist_id: String,
    #[serde(alias = "artist_name", default, deserialize_with = "de::text_opt")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::int_opt")]
    pub popularity: Option<i64>,
    #[serde(default, deserialize_with = "de::int_opt")]
    pub followers: Option<u64>,
}

impl Schema for RawArtist {
    // popularity is carried when present but never required
    const COLUMNS: &'static [&'static [&'static str]] =
        &[&["artist_id"], &["name", "artist_name"], &["followers"]];
}

/// A cleaned artist; `artist_name` is unique across the table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Artist {
    pub artist_id: String,
    #[serde(default, deserialize_with = "de::text_opt")]
    pub artist_name: Option<String>,
    #[serde(default, deserialize_with = "de::int_opt")]
    pub popularity: Option<i64>,
    #[serde(default, deserialize_with = "de::int_opt")]
    pub followers: Option<u64>,
}

impl From<RawArtist> for Artist {
    fn from(raw: RawArtist) -> Self {
        Self {
            artist_id: raw.artist_id,
            artist_name: raw.name,
            popularity: raw.popularity,
            followers: raw.followers,
        }
    }
}

impl Schema for Artist {
    const COLUMNS: &'static [&'static [&'static str]] =
        &[&["artist_id"], &["artist_name"], &["followers"]];
}

impl TableRow for Artist {
    fn header() -> Vec<&'static str> {
        vec!["artist_id", "artist_name", "popularity", "followers"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.artist_id.clone(),
            cell(&self.artist_name),
            cell(&self.popularity),
            cell(&self.followers),
        ]
    }
}

/// A weekly chart entry as extracted from the warehouse.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawChartPosition {
    pub track_id: String,
    #[serde(default, deserialize_with = "de::text_opt")]
    pub chart_week: Option<String>,
}

impl Schema for RawChartPosition {
    const COLUMNS: &'static [&'static [&'static str]] = &[&["track_id"], &["chart_week"]];
}

/// A cleaned chart entry with its derived calendar parts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChartPosition {
    pub track_id: String,
    #[serde(default, deserialize_with = "de::date_opt")]
    pub chart_week: Option<NaiveDate>,
    #[serde(default, deserialize_with = "de::int_opt")]
    pub chart_year: Option<i32>,
    #[serde(default, deserialize_with = "de::int_opt")]
    pub quarter: Option<u32>,
}

impl Schema for ChartPosition {
    const COLUMNS: &'static [&'static [&'static str]] =
        &[&["track_id"], &["chart_week"], &["chart_year"], &["quarter"]];
}

impl TableRow for ChartPosition {
    fn header() -> Vec<&'static str> {
        vec!["track_id", "chart_week", "chart_year", "quarter"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.track_id.clone(),
            cell(&self.chart_week),
            cell(&self.chart_year),
            cell(&self.quarter),
        ]
    }
}

const AUDIO_COLUMNS: &[&[&str]] = &[
    &["track_id"],
    &["key"],
    &["loudness"],
    &["mode"],
    &["speechiness"],
    &["acousticness"],
    &["instrumentalness"],
    &["liveness"],
    &["valence"],
    &["tempo"],
    &["time_signature"],
];

/// Audio features as extracted; any field may be null.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawAudioFeature {
    #[serde(default, deserialize_with = "de::text_opt")]
    pub track_id: Option<String>,
    #[serde(default, deserialize_with = "de::int_opt")]
    pub key: Option<i32>,
    #[serde(default, deserialize_with = "de::float_opt")]
    pub loudness: Option<f64>,
    #[serde(default, deserialize_with = "de::int_opt")]
    pub mode: Option<i32>,
    #[serde(default, deserialize_with = "de::float_opt")]
    pub speechiness: Option<f64>,
    #[serde(default, deserialize_with = "de::float_opt")]
    pub acousticness: Option<f64>,
    #[serde(default, deserialize_with = "de::float_opt")]
    pub instrumentalness: Option<f64>,
    #[serde(default, deserialize_with = "de::float_opt")]
    pub liveness: Option<f64>,
    #[serde(default, deserialize_with = "de::float_opt")]
    pub valence: Option<f64>,
    #[serde(default, deserialize_with = "de::float_opt")]
    pub tempo: Option<f64>,
    #[serde(default, deserialize_with = "de::int_opt")]
    pub time_signature: Option<i32>,
}

impl Schema for RawAudioFeature {
    const COLUMNS: &'static [&'static [&'static str]] = AUDIO_COLUMNS;
}

impl RawAudioFeature {
    /// The complete feature row, or `None` if any field is null.
    pub fn complete(&self) -> Option<AudioFeature> {
        Some(AudioFeature {
            track_id: self.track_id.clone()?,
            key: self.key?,
            loudness: self.loudness?,
            mode: self.mode?,
            speechiness: self.speechiness?,
            acousticness: self.acousticness?,
            instrumentalness: self.instrumentalness?,
            liveness: self.liveness?,
            valence: self.valence?,
            tempo: self.tempo?,
            time_signature: self.time_signature?,
        })
    }
}

/// A complete audio feature row. Every field is required.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AudioFeature {
    pub track_id: String,
    #[serde(deserialize_with = "de::int")]
    pub key: i32,
    #[serde(deserialize_with = "de::float")]
    pub loudness: f64,
    #[serde(deserialize_with = "de::int")]
    pub mode: i32,
    #[serde(deserialize_with = "de::float")]
    pub speechiness: f64,
    #[serde(deserialize_with = "de::float")]
    pub acousticness: f64,
    #[serde(deserialize_with = "de::float")]
    pub instrumentalness: f64,
    #[serde(deserialize_with = "de::float")]
    pub liveness: f64,
    #[serde(deserialize_with = "de::float")]
    pub valence: f64,
    #[serde(deserialize_with = "de::float")]
    pub tempo: f64,
    #[serde(deserialize_with = "de::int")]
    pub time_signature: i32,
}

impl Schema for AudioFeature {
    const COLUMNS: &'static [&'static [&'static str]] = AUDIO_COLUMNS;
}

impl TableRow for AudioFeature {
    fn header() -> Vec<&'static str> {
        AUDIO_COLUMNS.iter().map(|spellings| spellings[0]).collect()
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.track_id.clone(),
            self.key.to_string(),
            self.loudness.to_string(),
            self.mode.to_string(),
            self.speechiness.to_string(),
            self.acousticness.to_string(),
            self.instrumentalness.to_string(),
            self.liveness.to_string(),
            self.valence.to_string(),
            self.tempo.to_string(),
            self.time_signature.to_string(),
        ]
    }
}

/// One track–artist association.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct TrackArtist {
    pub track_id: String,
    pub artist_id: String,
}

impl Schema for TrackArtist {
    const COLUMNS: &'static [&'static [&'static str]] = &[&["track_id"], &["artist_id"]];
}

impl TableRow for TrackArtist {
    fn header() -> Vec<&'static str> {
        vec!["track_id", "artist_id"]
    }

    fn cells(&self) -> Vec<String> {
        vec![self.track_id.clone(), self.artist_id.clone()]
    }
}
