//! Error taxonomy for loading, synthesis, background injection and digitization.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Processing stage in which a per-channel failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Synthesis,
    Background,
    Digitization,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Synthesis => "waveform synthesis",
            Stage::Background => "background injection",
            Stage::Digitization => "digitization",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path:?} line {line}: cannot parse {token:?}")]
    Parse {
        path: PathBuf,
        line: usize,
        token: String,
    },

    #[error("{path:?} line {line}: missing column {column}")]
    MissingColumn {
        path: PathBuf,
        line: usize,
        column: usize,
    },

    #[error("{path:?}: expected {expected} values, found {found}")]
    ShortFile {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("{table}: expected {expected} values, found {found}")]
    TableLength {
        table: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{stage}: channel {channel} offset {offset} outside analog buffer of length {len}")]
    OutOfRange {
        stage: Stage,
        channel: usize,
        offset: i64,
        len: usize,
    },

    #[error("digitization: channel {channel} has a zero calibration constant")]
    ZeroCalibration { channel: usize },

    #[error("background injection: channel {channel} has invalid expected photon count {mean}")]
    InvalidRate { channel: usize, mean: f64 },
}

pub type Result<T> = std::result::Result<T, SimError>;
