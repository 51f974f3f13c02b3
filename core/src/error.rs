//! Error kinds for the deck miner, one enum per subsystem per §7 of the spec.
//!
//! Recovery policy (see spec §7):
//! - `CatalogLoadError` and `ConfigError` are fatal at startup.
//! - `ChartLoadError` is fatal for one song; the driver logs and skips it.
//! - `SimulationGuard` is recovered inline by the simulator, which returns a
//!   zero-score result instead of propagating.
//! - Malformed packed condition/effect/target ids are not represented as an
//!   `Error` variant at all: they are logged via `log::warn!` at the call
//!   site and treated as a no-op effect / `false` condition, matching the
//!   "never escalates" policy for `UnknownEncoding`.
//! - Mental reaching zero is normal control flow inside one play (see
//!   [`crate::simulator`]), not an error.

use thiserror::Error;

/// Fatal at process startup: the static data model could not be built.
#[derive(Error, Debug)]
pub enum CatalogLoadError {
    #[error("catalog file not found: {0}")]
    NotFound(String),
    #[error("malformed catalog record in {file}: {reason}")]
    Malformed { file: String, reason: String },
    #[error("duplicate series id {0} in catalog")]
    DuplicateSeriesId(i64),
    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal for one song; other songs continue (see spec §7).
#[derive(Error, Debug)]
pub enum ChartLoadError {
    #[error("chart file not found for music {music_id} difficulty {difficulty}")]
    NotFound { music_id: i64, difficulty: String },
    #[error("chart events are not strictly time-sorted at index {index}")]
    NotSorted { index: usize },
    #[error("malformed chart record: {0}")]
    Malformed(String),
    #[error("music id {0} not found in catalog")]
    UnknownMusic(i64),
}

/// Per-play guard: recovered inline by the simulator, surfaced here so
/// callers and tests can distinguish "normal zero-score" from an actual
/// bug in the caller's inputs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationGuard {
    #[error("chart has zero notes; returning a zero-score result")]
    EmptyChart,
    #[error("deck has no center card resolvable for this song")]
    NoCenterCard,
    #[error("internal state violation: {0}")]
    InvariantViolation(String),
}

/// Fatal at startup: invalid CLI arguments or config file values.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("config file not found: {0}")]
    NotFound(String),
    #[error("could not parse config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error for the dispatcher/optimizer stages, which may need to
/// report either a fatal catalog/config problem or an I/O failure writing
/// shard/output files.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Catalog(#[from] CatalogLoadError),
    #[error(transparent)]
    Chart(#[from] ChartLoadError),
    #[error("shard io error writing {path}: {source}")]
    ShardIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("shard serialization error: {0}")]
    ShardJson(#[from] serde_json::Error),
}
