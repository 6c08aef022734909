pub mod clean;
pub mod config;
pub mod dates;
pub mod extract;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod store;

/// Warehouse tables pulled on every run, in extraction order.
pub const RAW_TABLES: &[&str] = &[
    "audio_features",
    "tracks",
    "artists",
    "tracks_artists_mapping",
    "chart_positions",
];

/// Application name for XDG paths
pub const APP_NAME: &str = "crossfade";
