//! Typed views of the raw archive records.
//!
//! One struct per level layout, decoded straight out of the packed file
//! bytes. Records are immutable once decoded; everything downstream reads
//! them through column extraction.

use byteorder::ByteOrder;

use crate::{error::KronosError, level::Level};

/// A raw receiver record. This level carries the integer selection keys:
/// `ti` (time index), `fi` (frequency index) and `ant` (antenna
/// configuration).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct N1Record {
    /// Hour tag of the file this record came from.
    pub ydh: u32,
    /// Index of the record within its file. `(ydh, num)` labels a record
    /// uniquely across the archive.
    pub num: u32,
    /// Packed time index; see [`crate::kronos::ti_to_epoch`].
    pub ti: u32,
    /// Packed frequency index; see [`crate::kronos::fi_to_khz`].
    pub fi: u32,
    /// Integration time \[ms\].
    pub dti: i16,
    /// Centisecond part of the timestamp.
    pub c: u8,
    /// Antenna selection: 0 to 3 without direction finding (Ex off, +X, -X,
    /// dipole), 11 and 12 for the +X/-X direction-finding channels.
    pub ant: u8,
    pub agc1: u8,
    pub agc2: u8,
    pub auto1: u8,
    pub auto2: u8,
    pub cross1: i16,
    pub cross2: i16,
}

impl N1Record {
    pub fn from_bytes<B: ByteOrder>(raw: &[u8]) -> N1Record {
        N1Record {
            ydh: B::read_u32(&raw[0..4]),
            num: B::read_u32(&raw[4..8]),
            ti: B::read_u32(&raw[8..12]),
            fi: B::read_u32(&raw[12..16]),
            dti: B::read_i16(&raw[16..18]),
            c: raw[18],
            ant: raw[19],
            agc1: raw[20],
            agc2: raw[21],
            auto1: raw[22],
            auto2: raw[23],
            cross1: B::read_i16(&raw[24..26]),
            cross2: B::read_i16(&raw[26..28]),
        }
    }
}

/// A calibrated record, parallel to [`N1Record`]: the archive writes one n2
/// record per n1 record, in the same order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct N2Record {
    pub ydh: u32,
    pub num: u32,
    /// Timestamp in decimal days, day 1 being 1997-01-01.
    pub t97: f64,
    /// Centre frequency \[kHz\].
    pub f: f32,
    /// Effective integration time \[ms\].
    pub dt: f32,
    /// Effective bandwidth \[kHz\].
    pub df: f32,
    /// Auto-correlation on the X antenna \[V^2/Hz\].
    pub auto_x: f32,
    /// Auto-correlation on the Z antenna \[V^2/Hz\].
    pub auto_z: f32,
    pub cross_r: f32,
    pub cross_i: f32,
    pub ant: i8,
}

impl N2Record {
    pub fn from_bytes<B: ByteOrder>(raw: &[u8]) -> N2Record {
        N2Record {
            ydh: B::read_u32(&raw[0..4]),
            num: B::read_u32(&raw[4..8]),
            t97: B::read_f64(&raw[8..16]),
            f: B::read_f32(&raw[16..20]),
            dt: B::read_f32(&raw[20..24]),
            df: B::read_f32(&raw[24..28]),
            auto_x: B::read_f32(&raw[28..32]),
            auto_z: B::read_f32(&raw[32..36]),
            cross_r: B::read_f32(&raw[36..40]),
            cross_i: B::read_f32(&raw[40..44]),
            ant: raw[44] as i8,
        }
    }
}

/// A direction-finding record holding both antenna channels. The two
/// elements of each pair field belong to the records labelled by
/// `(ydh, num[0])` and `(ydh, num[1])` in the reference stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct N3bRecord {
    pub ydh: u32,
    pub num: [u32; 2],
    /// Intensity \[V^2 m^-2 Hz^-1\].
    pub s: [f32; 2],
    /// Normalized linear polarization Q.
    pub q: [f32; 2],
    /// Normalized linear polarization U.
    pub u: [f32; 2],
    /// Normalized circular polarization V.
    pub v: [f32; 2],
    /// Source colatitude in the spacecraft frame.
    pub th: f32,
    /// Source azimuth in the spacecraft frame.
    pub ph: f32,
    /// Ratio of the two Azz values.
    pub zr: f32,
    pub snx: [f32; 2],
    pub snz: [f32; 2],
}

impl N3bRecord {
    pub fn from_bytes<B: ByteOrder>(raw: &[u8]) -> N3bRecord {
        N3bRecord {
            ydh: B::read_u32(&raw[0..4]),
            num: [B::read_u32(&raw[4..8]), B::read_u32(&raw[8..12])],
            s: [B::read_f32(&raw[12..16]), B::read_f32(&raw[16..20])],
            q: [B::read_f32(&raw[20..24]), B::read_f32(&raw[24..28])],
            u: [B::read_f32(&raw[28..32]), B::read_f32(&raw[32..36])],
            v: [B::read_f32(&raw[36..40]), B::read_f32(&raw[40..44])],
            th: B::read_f32(&raw[44..48]),
            ph: B::read_f32(&raw[48..52]),
            zr: B::read_f32(&raw[52..56]),
            snx: [B::read_f32(&raw[56..60]), B::read_f32(&raw[60..64])],
            snz: [B::read_f32(&raw[64..68]), B::read_f32(&raw[68..72])],
        }
    }
}

/// As [`N3bRecord`] with a different split between per-channel and shared
/// quantities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct N3cRecord {
    pub ydh: i32,
    pub num: [i32; 2],
    pub s: f32,
    pub q: f32,
    pub u: f32,
    pub v: [f32; 2],
    pub th: [f32; 2],
    pub ph: [f32; 2],
    pub zr: f32,
    pub snx: [f32; 2],
    pub snz: [f32; 2],
}

impl N3cRecord {
    pub fn from_bytes<B: ByteOrder>(raw: &[u8]) -> N3cRecord {
        N3cRecord {
            ydh: B::read_i32(&raw[0..4]),
            num: [B::read_i32(&raw[4..8]), B::read_i32(&raw[8..12])],
            s: B::read_f32(&raw[12..16]),
            q: B::read_f32(&raw[16..20]),
            u: B::read_f32(&raw[20..24]),
            v: [B::read_f32(&raw[24..28]), B::read_f32(&raw[28..32])],
            th: [B::read_f32(&raw[32..36]), B::read_f32(&raw[36..40])],
            ph: [B::read_f32(&raw[40..44]), B::read_f32(&raw[44..48])],
            zr: B::read_f32(&raw[48..52]),
            snx: [B::read_f32(&raw[52..56]), B::read_f32(&raw[56..60])],
            snz: [B::read_f32(&raw[60..64]), B::read_f32(&raw[64..68])],
        }
    }
}

/// The single-channel derived levels n3d and n3e share one all-scalar
/// layout; each record belongs to exactly one reference record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct N3ScalarRecord {
    pub ydh: i32,
    pub num: i32,
    pub s: f32,
    pub q: f32,
    pub u: f32,
    pub v: f32,
    pub th: f32,
    pub ph: f32,
    pub snx: f32,
    pub snz: f32,
}

impl N3ScalarRecord {
    pub fn from_bytes<B: ByteOrder>(raw: &[u8]) -> N3ScalarRecord {
        N3ScalarRecord {
            ydh: B::read_i32(&raw[0..4]),
            num: B::read_i32(&raw[4..8]),
            s: B::read_f32(&raw[8..12]),
            q: B::read_f32(&raw[12..16]),
            u: B::read_f32(&raw[16..20]),
            v: B::read_f32(&raw[20..24]),
            th: B::read_f32(&raw[24..28]),
            ph: B::read_f32(&raw[28..32]),
            snx: B::read_f32(&raw[32..36]),
            snz: B::read_f32(&raw[36..40]),
        }
    }
}

/// Byte-level decoding shared by the multi-file reader.
pub(crate) trait DecodeRecord: Sized {
    fn decode<B: ByteOrder>(raw: &[u8]) -> Self;
}

impl DecodeRecord for N1Record {
    fn decode<B: ByteOrder>(raw: &[u8]) -> Self {
        N1Record::from_bytes::<B>(raw)
    }
}

impl DecodeRecord for N2Record {
    fn decode<B: ByteOrder>(raw: &[u8]) -> Self {
        N2Record::from_bytes::<B>(raw)
    }
}

impl DecodeRecord for N3bRecord {
    fn decode<B: ByteOrder>(raw: &[u8]) -> Self {
        N3bRecord::from_bytes::<B>(raw)
    }
}

impl DecodeRecord for N3cRecord {
    fn decode<B: ByteOrder>(raw: &[u8]) -> Self {
        N3cRecord::from_bytes::<B>(raw)
    }
}

impl DecodeRecord for N3ScalarRecord {
    fn decode<B: ByteOrder>(raw: &[u8]) -> Self {
        N3ScalarRecord::from_bytes::<B>(raw)
    }
}

/// The records of one level, as returned by the reader.
#[derive(Debug, Clone)]
pub enum LevelData {
    N1(Vec<N1Record>),
    N2(Vec<N2Record>),
    N3b(Vec<N3bRecord>),
    N3c(Vec<N3cRecord>),
    N3d(Vec<N3ScalarRecord>),
    N3e(Vec<N3ScalarRecord>),
}

/// One column's values across a record sequence. Integer fields widen to
/// `i64` and floats to `f64` regardless of their encoded width; the
/// channel-pair fields of the composite levels keep both elements.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Int(Vec<i64>),
    IntPair(Vec<[i64; 2]>),
    Float(Vec<f64>),
    FloatPair(Vec<[f64; 2]>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Int(v) => v.len(),
            ColumnValues::IntPair(v) => v.len(),
            ColumnValues::Float(v) => v.len(),
            ColumnValues::FloatPair(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the column holds floating-point data. Grids track
    /// missing cells differently for the two kinds.
    pub fn is_float(&self) -> bool {
        matches!(self, ColumnValues::Float(_) | ColumnValues::FloatPair(_))
    }
}

impl LevelData {
    pub fn level(&self) -> Level {
        match self {
            LevelData::N1(_) => Level::N1,
            LevelData::N2(_) => Level::N2,
            LevelData::N3b(_) => Level::N3b,
            LevelData::N3c(_) => Level::N3c,
            LevelData::N3d(_) => Level::N3d,
            LevelData::N3e(_) => Level::N3e,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            LevelData::N1(v) => v.len(),
            LevelData::N2(v) => v.len(),
            LevelData::N3b(v) => v.len(),
            LevelData::N3c(v) => v.len(),
            LevelData::N3d(v) | LevelData::N3e(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extract one named column across all records.
    pub fn column(&self, name: &str) -> Result<ColumnValues, KronosError> {
        let values = match self {
            LevelData::N1(v) => n1_column(v, name),
            LevelData::N2(v) => n2_column(v, name),
            LevelData::N3b(v) => n3b_column(v, name),
            LevelData::N3c(v) => n3c_column(v, name),
            LevelData::N3d(v) | LevelData::N3e(v) => n3_scalar_column(v, name),
        };
        values.ok_or_else(|| KronosError::ColumnNotFound {
            level: self.level(),
            column: name.to_string(),
        })
    }
}

macro_rules! int_column {
    ($records:expr, $field:ident) => {
        Some(ColumnValues::Int(
            $records.iter().map(|r| i64::from(r.$field)).collect(),
        ))
    };
}

macro_rules! float_column {
    ($records:expr, $field:ident) => {
        Some(ColumnValues::Float(
            $records.iter().map(|r| f64::from(r.$field)).collect(),
        ))
    };
}

macro_rules! int_pair_column {
    ($records:expr, $field:ident) => {
        Some(ColumnValues::IntPair(
            $records
                .iter()
                .map(|r| [i64::from(r.$field[0]), i64::from(r.$field[1])])
                .collect(),
        ))
    };
}

macro_rules! float_pair_column {
    ($records:expr, $field:ident) => {
        Some(ColumnValues::FloatPair(
            $records
                .iter()
                .map(|r| [f64::from(r.$field[0]), f64::from(r.$field[1])])
                .collect(),
        ))
    };
}

pub(crate) fn n1_column(records: &[N1Record], name: &str) -> Option<ColumnValues> {
    match name {
        "ydh" => int_column!(records, ydh),
        "num" => int_column!(records, num),
        "ti" => int_column!(records, ti),
        "fi" => int_column!(records, fi),
        "dti" => int_column!(records, dti),
        "c" => int_column!(records, c),
        "ant" => int_column!(records, ant),
        "agc1" => int_column!(records, agc1),
        "agc2" => int_column!(records, agc2),
        "auto1" => int_column!(records, auto1),
        "auto2" => int_column!(records, auto2),
        "cross1" => int_column!(records, cross1),
        "cross2" => int_column!(records, cross2),
        _ => None,
    }
}

pub(crate) fn n2_column(records: &[N2Record], name: &str) -> Option<ColumnValues> {
    match name {
        "ydh" => int_column!(records, ydh),
        "num" => int_column!(records, num),
        "t97" => Some(ColumnValues::Float(records.iter().map(|r| r.t97).collect())),
        "f" => float_column!(records, f),
        "dt" => float_column!(records, dt),
        "df" => float_column!(records, df),
        "autoX" => float_column!(records, auto_x),
        "autoZ" => float_column!(records, auto_z),
        "crossR" => float_column!(records, cross_r),
        "crossI" => float_column!(records, cross_i),
        "ant" => int_column!(records, ant),
        _ => None,
    }
}

fn n3b_column(records: &[N3bRecord], name: &str) -> Option<ColumnValues> {
    match name {
        "ydh" => int_column!(records, ydh),
        "num" => int_pair_column!(records, num),
        "s" => float_pair_column!(records, s),
        "q" => float_pair_column!(records, q),
        "u" => float_pair_column!(records, u),
        "v" => float_pair_column!(records, v),
        "th" => float_column!(records, th),
        "ph" => float_column!(records, ph),
        "zr" => float_column!(records, zr),
        "snx" => float_pair_column!(records, snx),
        "snz" => float_pair_column!(records, snz),
        _ => None,
    }
}

fn n3c_column(records: &[N3cRecord], name: &str) -> Option<ColumnValues> {
    match name {
        "ydh" => int_column!(records, ydh),
        "num" => int_pair_column!(records, num),
        "s" => float_column!(records, s),
        "q" => float_column!(records, q),
        "u" => float_column!(records, u),
        "v" => float_pair_column!(records, v),
        "th" => float_pair_column!(records, th),
        "ph" => float_pair_column!(records, ph),
        "zr" => float_column!(records, zr),
        "snx" => float_pair_column!(records, snx),
        "snz" => float_pair_column!(records, snz),
        _ => None,
    }
}

fn n3_scalar_column(records: &[N3ScalarRecord], name: &str) -> Option<ColumnValues> {
    match name {
        "ydh" => int_column!(records, ydh),
        "num" => int_column!(records, num),
        "s" => float_column!(records, s),
        "q" => float_column!(records, q),
        "u" => float_column!(records, u),
        "v" => float_column!(records, v),
        "th" => float_column!(records, th),
        "ph" => float_column!(records, ph),
        "snx" => float_column!(records, snx),
        "snz" => float_column!(records, snz),
        _ => None,
    }
}
