//! The fixed record layouts of the archive levels.

use std::fmt;

use lazy_static::lazy_static;

use crate::error::KronosError;

/// The record levels the engine knows how to read.
///
/// `n1` holds the raw receiver telemetry with the integer selection keys,
/// `n2` the calibrated physical quantities, one record per `n1` record.
/// The `n3*` levels hold derived direction-finding results and carry no keys
/// of their own; they are tied back to the reference stream by the
/// `(ydh, num)` record label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    N1,
    N2,
    N3b,
    N3c,
    N3d,
    N3e,
}

impl Level {
    /// Parse a level name. Case-insensitive, so "N3B" works as well as
    /// "n3b".
    pub fn from_name(name: &str) -> Result<Level, KronosError> {
        match name.to_ascii_lowercase().as_str() {
            "n1" => Ok(Level::N1),
            "n2" => Ok(Level::N2),
            "n3b" => Ok(Level::N3b),
            "n3c" => Ok(Level::N3c),
            "n3d" => Ok(Level::N3d),
            "n3e" => Ok(Level::N3e),
            _ => Err(KronosError::UnknownLevel(name.to_string())),
        }
    }

    /// The level's name, as used in archive directory layouts.
    pub fn name(self) -> &'static str {
        match self {
            Level::N1 => "n1",
            Level::N2 => "n2",
            Level::N3b => "n3b",
            Level::N3c => "n3c",
            Level::N3d => "n3d",
            Level::N3e => "n3e",
        }
    }

    /// The fixed binary layout of this level's records.
    pub fn schema(self) -> &'static RecordSchema {
        match self {
            Level::N1 => &SCHEMAS.n1,
            Level::N2 => &SCHEMAS.n2,
            Level::N3b => &SCHEMAS.n3b,
            Level::N3c => &SCHEMAS.n3c,
            Level::N3d => &SCHEMAS.n3d,
            Level::N3e => &SCHEMAS.n3e,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Look up a level's record layout by name.
pub fn schema_for(name: &str) -> Result<&'static RecordSchema, KronosError> {
    Level::from_name(name).map(Level::schema)
}

/// The byte order of a level's records. This is declared per level, never
/// sniffed from file contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// The scalar types that appear in record layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    I8,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl FieldKind {
    /// Encoded width in bytes.
    pub fn width(self) -> usize {
        match self {
            FieldKind::U8 | FieldKind::I8 => 1,
            FieldKind::I16 => 2,
            FieldKind::U32 | FieldKind::I32 | FieldKind::F32 => 4,
            FieldKind::F64 => 8,
        }
    }
}

/// One field of a record layout. `count` is 1 for scalar fields and 2 for
/// the channel-pair fields of the composite levels; records are packed, so
/// a field's offset is the sum of the widths before it.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub count: usize,
}

/// The fixed binary layout of one level.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    pub level: Level,
    pub endianness: Endianness,
    pub fields: Vec<FieldDef>,
    /// Derived from the field list. Archive files must be an exact multiple
    /// of this many bytes.
    pub record_len: usize,
}

impl RecordSchema {
    fn new(level: Level, endianness: Endianness, fields: Vec<FieldDef>) -> RecordSchema {
        let record_len = fields.iter().map(|f| f.kind.width() * f.count).sum();
        RecordSchema {
            level,
            endianness,
            fields,
            record_len,
        }
    }

    /// Whether `name` is a field of this layout.
    pub fn has_column(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

fn field(name: &'static str, kind: FieldKind) -> FieldDef {
    FieldDef {
        name,
        kind,
        count: 1,
    }
}

fn pair(name: &'static str, kind: FieldKind) -> FieldDef {
    FieldDef {
        name,
        kind,
        count: 2,
    }
}

struct Schemas {
    n1: RecordSchema,
    n2: RecordSchema,
    n3b: RecordSchema,
    n3c: RecordSchema,
    n3d: RecordSchema,
    n3e: RecordSchema,
}

fn n3_scalar_fields() -> Vec<FieldDef> {
    vec![
        field("ydh", FieldKind::I32),
        field("num", FieldKind::I32),
        field("s", FieldKind::F32),
        field("q", FieldKind::F32),
        field("u", FieldKind::F32),
        field("v", FieldKind::F32),
        field("th", FieldKind::F32),
        field("ph", FieldKind::F32),
        field("snx", FieldKind::F32),
        field("snz", FieldKind::F32),
    ]
}

lazy_static! {
    static ref SCHEMAS: Schemas = Schemas {
        n1: RecordSchema::new(
            Level::N1,
            Endianness::Little,
            vec![
                field("ydh", FieldKind::U32),
                field("num", FieldKind::U32),
                field("ti", FieldKind::U32),
                field("fi", FieldKind::U32),
                field("dti", FieldKind::I16),
                field("c", FieldKind::U8),
                field("ant", FieldKind::U8),
                field("agc1", FieldKind::U8),
                field("agc2", FieldKind::U8),
                field("auto1", FieldKind::U8),
                field("auto2", FieldKind::U8),
                field("cross1", FieldKind::I16),
                field("cross2", FieldKind::I16),
            ],
        ),
        n2: RecordSchema::new(
            Level::N2,
            Endianness::Little,
            vec![
                field("ydh", FieldKind::U32),
                field("num", FieldKind::U32),
                field("t97", FieldKind::F64),
                field("f", FieldKind::F32),
                field("dt", FieldKind::F32),
                field("df", FieldKind::F32),
                field("autoX", FieldKind::F32),
                field("autoZ", FieldKind::F32),
                field("crossR", FieldKind::F32),
                field("crossI", FieldKind::F32),
                field("ant", FieldKind::I8),
            ],
        ),
        n3b: RecordSchema::new(
            Level::N3b,
            Endianness::Little,
            vec![
                field("ydh", FieldKind::U32),
                pair("num", FieldKind::U32),
                pair("s", FieldKind::F32),
                pair("q", FieldKind::F32),
                pair("u", FieldKind::F32),
                pair("v", FieldKind::F32),
                field("th", FieldKind::F32),
                field("ph", FieldKind::F32),
                field("zr", FieldKind::F32),
                pair("snx", FieldKind::F32),
                pair("snz", FieldKind::F32),
            ],
        ),
        n3c: RecordSchema::new(
            Level::N3c,
            Endianness::Little,
            vec![
                field("ydh", FieldKind::I32),
                pair("num", FieldKind::I32),
                field("s", FieldKind::F32),
                field("q", FieldKind::F32),
                field("u", FieldKind::F32),
                pair("v", FieldKind::F32),
                pair("th", FieldKind::F32),
                pair("ph", FieldKind::F32),
                field("zr", FieldKind::F32),
                pair("snx", FieldKind::F32),
                pair("snz", FieldKind::F32),
            ],
        ),
        n3d: RecordSchema::new(Level::N3d, Endianness::Little, n3_scalar_fields()),
        n3e: RecordSchema::new(Level::N3e, Endianness::Little, n3_scalar_fields()),
    };
}
