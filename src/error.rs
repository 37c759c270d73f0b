//! Everything that can go wrong while selecting and gridding records.

use std::path::PathBuf;

use hifitime::Epoch;
use thiserror::Error;

use crate::level::Level;

/// The axis a grid coordinate belongs to. Only used for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisKind {
    Time,
    Frequency,
    Configuration,
}

impl std::fmt::Display for AxisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AxisKind::Time => write!(f, "time"),
            AxisKind::Frequency => write!(f, "frequency"),
            AxisKind::Configuration => write!(f, "configuration"),
        }
    }
}

#[derive(Error, Debug)]
pub enum KronosError {
    #[error("unknown record level '{0}'; expected one of n1, n2, n3b, n3c, n3d, n3e")]
    UnknownLevel(String),

    /// An archive file whose byte length is not a whole number of records.
    /// Nothing is salvaged from a read that trips this; partial records are
    /// never silently dropped.
    #[error(
        "corrupt archive file {}: {file_len} bytes is not a multiple of the {record_len}-byte record length",
        .path.display()
    )]
    CorruptArchiveFile {
        path: PathBuf,
        file_len: usize,
        record_len: usize,
    },

    /// A requested configuration code that never occurs in the loaded
    /// records.
    #[error("configuration {requested} was never observed; available configurations are {observed:?}")]
    InvalidConfiguration { requested: u8, observed: Vec<u8> },

    #[error("level {level} has no column '{column}'")]
    ColumnNotFound { level: Level, column: String },

    /// A selected record carries a key that is absent from the axes the grid
    /// is being built against. The scatter refuses to guess rather than
    /// silently truncating.
    #[error("selected record carries {axis} key {key} which is absent from the grid axes")]
    AxisCardinalityMismatch { axis: AxisKind, key: i64 },

    #[error("grids cannot be concatenated: {reason}")]
    IncompatibleGrids { reason: String },

    /// The time spans of two grids relate in a way the concatenation cases
    /// do not cover.
    #[error(
        "unhandled time overlap between grids (receiver spans {receiver_start} to {receiver_end}, other spans {other_start} to {other_end})"
    )]
    UnexpectedOverlapTopology {
        receiver_start: Epoch,
        receiver_end: Epoch,
        other_start: Epoch,
        other_end: Epoch,
    },

    /// The n1 and n2 streams must hold one record each per measurement, in
    /// the same order. Disagreeing lengths mean the archive pair is
    /// inconsistent.
    #[error("reference streams disagree: {n1} n1 records but {n2} n2 records")]
    ReferenceLengthMismatch { n1: usize, n2: usize },

    /// File location needs a time range; a selection without one cannot be
    /// mapped to hourly archive files.
    #[error("a selection must carry a time range before archive files can be located")]
    UnboundedSelection,

    /// Levels that pack both direction-finding channels into one record can
    /// only be gridded against the fixed channel pair.
    #[error(
        "level {level} packs the direction-finding channel pair; the selected configurations must be exactly [11, 12] (got {observed:?})"
    )]
    ChannelPairRequired { level: Level, observed: Vec<u8> },

    /// A level without native selection keys was asked for a direct grid.
    #[error("level {0} has no native selection keys; grid it through the composite-label join")]
    JoinRequired(Level),

    #[error("unable to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
