//! Joins the cleaned tables into the three deliverable views.
//!
//! `final_tracks` and `final_artists` read only cleaned tables;
//! `chart_tracks` reads the in-memory `final_tracks` result.

pub mod join;

use std::collections::{HashMap, HashSet};

use crate::clean::CleanedTables;
use crate::models::{Artist, AudioFeature, ChartPosition, Track, TrackArtist};
use crate::store::row::{TableRow, attribute_cells, cell};
use crate::store::{CsvStore, Result, Stage};
use join::{Index, left_join};

pub const FINAL_TRACKS: &str = "final_tracks";
pub const FINAL_ARTISTS: &str = "final_artists";
pub const CHART_TRACKS: &str = "chart_tracks";

/// Merged view names, in the order they are built.
pub const MERGED_VIEWS: &[&str] = &[FINAL_TRACKS, FINAL_ARTISTS, CHART_TRACKS];

/// Separator between artist names in `FinalTrack::artist_name`.
pub const ARTIST_SEPARATOR: &str = ", ";

/// One row per track with complete audio features; all of the track's
/// artists collapsed into `artist_name`.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalTrack {
    pub track: Track,
    pub audio: AudioFeature,
    pub artist_name: String,
}

impl FinalTrack {
    pub fn track_id(&self) -> &str {
        &self.track.track_id
    }

    /// Individual artist names (empty when the track has none).
    pub fn artist_names(&self) -> Vec<&str> {
        if self.artist_name.is_empty() {
            Vec::new()
        } else {
            self.artist_name.split(ARTIST_SEPARATOR).collect()
        }
    }
}

impl TableRow for FinalTrack {
    fn header() -> Vec<&'static str> {
        let mut h = Track::header();
        h.extend(AudioFeature::attribute_header());
        h.push("artist_name");
        h
    }

    fn cells(&self) -> Vec<String> {
        let mut c = self.track.cells();
        c.extend(attribute_cells(Some(&self.audio)));
        c.push(self.artist_name.clone());
        c
    }
}

/// One row per (artist, track) pair; artists without tracks keep one row
/// with empty track columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalArtist {
    pub artist_id: String,
    pub artist_name: Option<String>,
    pub track_id: Option<String>,
    pub track: Option<Track>,
    pub audio: Option<AudioFeature>,
}

impl TableRow for FinalArtist {
    fn header() -> Vec<&'static str> {
        let mut h = vec!["artist_id", "artist_name", "track_id"];
        h.extend(Track::attribute_header());
        h.extend(AudioFeature::attribute_header());
        h
    }

    fn cells(&self) -> Vec<String> {
        let mut c = vec![
            self.artist_id.clone(),
            cell(&self.artist_name),
            cell(&self.track_id),
        ];
        c.extend(attribute_cells(self.track.as_ref()));
        c.extend(attribute_cells(self.audio.as_ref()));
        c
    }
}

/// A chart entry with the final track it refers to, if one survived.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartTrack {
    pub chart: ChartPosition,
    pub track: Option<FinalTrack>,
}

impl TableRow for ChartTrack {
    fn header() -> Vec<&'static str> {
        let mut h = ChartPosition::header();
        h.extend(FinalTrack::attribute_header());
        h
    }

    fn cells(&self) -> Vec<String> {
        let mut c = self.chart.cells();
        c.extend(attribute_cells(self.track.as_ref()));
        c
    }
}

/// Tracks ⟕ audio features ⟕ mapping ⟕ artists, collapsed to one row per track.
///
/// Rows without a complete audio-feature match are dropped. Fan-out rows are
/// then collapsed per track_id, keeping the first row's track and audio
/// values; only `artist_name` is aggregated across them.
pub fn merge_final_tracks(
    tracks: &[Track],
    audio_features: &[AudioFeature],
    mapping: &[TrackArtist],
    artists: &[Artist],
) -> Vec<FinalTrack> {
    let audio_by_track = Index::build(audio_features, |a| a.track_id.as_str());
    let mapping_by_track = Index::build(mapping, |m| m.track_id.as_str());
    let artists_by_id = Index::build(artists, |a| a.artist_id.as_str());

    let with_audio = left_join(tracks.iter(), &audio_by_track, |t| Some(t.track_id.as_str()));
    let with_mapping = left_join(with_audio, &mapping_by_track, |(t, _)| {
        Some(t.track_id.as_str())
    });
    let joined = left_join(with_mapping, &artists_by_id, |(_, m)| {
        m.map(|m| m.artist_id.as_str())
    });

    // Joined rows with no audio match carry nulls in every feature column
    let complete: Vec<(&Track, &AudioFeature, Option<&Artist>)> = joined
        .into_iter()
        .filter_map(|(((track, audio), _), artist)| audio.map(|a| (track, a, artist)))
        .collect();

    // Ordered, de-duplicated artist names per track across all fan-out rows
    let mut names: HashMap<&str, Vec<&str>> = HashMap::new();
    for &(track, _, artist) in &complete {
        let entry = names.entry(track.track_id.as_str()).or_default();
        if let Some(name) = artist.and_then(|a| a.artist_name.as_deref()) {
            if !entry.contains(&name) {
                entry.push(name);
            }
        }
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (track, audio, _) in complete {
        if !seen.insert(track.track_id.as_str()) {
            continue;
        }
        let artist_name = names
            .get(track.track_id.as_str())
            .map(|n| n.join(ARTIST_SEPARATOR))
            .unwrap_or_default();
        out.push(FinalTrack {
            track: track.clone(),
            audio: audio.clone(),
            artist_name,
        });
    }
    out
}

/// Artists ⟕ mapping ⟕ tracks ⟕ audio features. No de-duplication: one row
/// per reachable (artist, track) pair.
pub fn merge_final_artists(
    artists: &[Artist],
    mapping: &[TrackArtist],
    tracks: &[Track],
    audio_features: &[AudioFeature],
) -> Vec<FinalArtist> {
    let mapping_by_artist = Index::build(mapping, |m| m.artist_id.as_str());
    let tracks_by_id = Index::build(tracks, |t| t.track_id.as_str());
    let audio_by_track = Index::build(audio_features, |a| a.track_id.as_str());

    let with_mapping = left_join(artists.iter(), &mapping_by_artist, |a| {
        Some(a.artist_id.as_str())
    });
    let with_tracks = left_join(with_mapping, &tracks_by_id, |(_, m)| {
        m.map(|m| m.track_id.as_str())
    });
    let joined = left_join(with_tracks, &audio_by_track, |((_, m), _)| {
        m.map(|m| m.track_id.as_str())
    });

    joined
        .into_iter()
        .map(|(((artist, pair), track), audio)| FinalArtist {
            artist_id: artist.artist_id.clone(),
            artist_name: artist.artist_name.clone(),
            track_id: pair.map(|p| p.track_id.clone()),
            track: track.cloned(),
            audio: audio.cloned(),
        })
        .collect()
}

/// Chart positions ⟕ final tracks. Exactly one output row per chart row.
pub fn merge_chart_tracks(
    chart_positions: &[ChartPosition],
    final_tracks: &[FinalTrack],
) -> Vec<ChartTrack> {
    let tracks_by_id = Index::build(final_tracks, FinalTrack::track_id);

    left_join(chart_positions.iter(), &tracks_by_id, |c| {
        Some(c.track_id.as_str())
    })
    .into_iter()
    .map(|(chart, track)| ChartTrack {
        chart: chart.clone(),
        track: track.cloned(),
    })
    .collect()
}

/// The three merged views of one run.
#[derive(Debug, Clone, Default)]
pub struct MergedViews {
    pub final_tracks: Vec<FinalTrack>,
    pub final_artists: Vec<FinalArtist>,
    pub chart_tracks: Vec<ChartTrack>,
}

impl MergedViews {
    /// (file name, row count) for each merged view.
    pub fn counts(&self) -> Vec<(&'static str, usize)> {
        vec![
            (FINAL_TRACKS, self.final_tracks.len()),
            (FINAL_ARTISTS, self.final_artists.len()),
            (CHART_TRACKS, self.chart_tracks.len()),
        ]
    }
}

/// Build and save all three views. The two independent merges run on the
/// current rayon pool; `chart_tracks` waits for `final_tracks`.
pub fn merge_all(store: &CsvStore, tables: &CleanedTables) -> Result<MergedViews> {
    let (final_tracks, final_artists) = rayon::join(
        || {
            merge_final_tracks(
                &tables.tracks,
                &tables.audio_features,
                &tables.mapping,
                &tables.artists,
            )
        },
        || {
            merge_final_artists(
                &tables.artists,
                &tables.mapping,
                &tables.tracks,
                &tables.audio_features,
            )
        },
    );

    store.save(Stage::Merged, FINAL_TRACKS, &final_tracks)?;
    log::info!("Final tracks merged and saved ({} rows)", final_tracks.len());
    store.save(Stage::Merged, FINAL_ARTISTS, &final_artists)?;
    log::info!("Final artists merged and saved ({} rows)", final_artists.len());

    let chart_tracks = merge_chart_tracks(&tables.chart_positions, &final_tracks);
    store.save(Stage::Merged, CHART_TRACKS, &chart_tracks)?;
    log::info!("Chart tracks merged and saved ({} rows)", chart_tracks.len());

    Ok(MergedViews {
        final_tracks,
        final_artists,
        chart_tracks,
    })
}
