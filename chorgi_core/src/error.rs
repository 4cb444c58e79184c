// Error types for the generation core.
//
// Three failure classes, matching the three stages a run can fail in:
// - Configuration: a bad or incompatible option set, rejected before any
//   generation work happens.
// - Generation: an algorithm cannot satisfy its contract (e.g. a cadence
//   forced onto a one-chord progression). Fails the stage, never degrades
//   silently.
// - Serialization: the MIDI file could not be written; carries the
//   attempted path so the caller can report it.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChorgiError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("generation error: {0}")]
    Generation(String),
    #[error("failed to write MIDI file {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ChorgiError>;
