//! Reading packed archive files into typed records.

use std::path::{Path, PathBuf};

use byteorder::{BigEndian, LittleEndian};
use log::{debug, trace};
use rayon::prelude::*;

use crate::{
    error::KronosError,
    level::{Endianness, Level, RecordSchema},
    record::{DecodeRecord, LevelData},
    ReferenceStream,
};

/// Read one file whole and check that it holds an integral number of
/// records.
fn read_file_checked(path: &Path, schema: &RecordSchema) -> Result<Vec<u8>, KronosError> {
    let raw = std::fs::read(path).map_err(|source| KronosError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if raw.len() % schema.record_len != 0 {
        return Err(KronosError::CorruptArchiveFile {
            path: path.to_path_buf(),
            file_len: raw.len(),
            record_len: schema.record_len,
        });
    }
    trace!(
        "{}: {} {} records",
        path.display(),
        raw.len() / schema.record_len,
        schema.level
    );
    Ok(raw)
}

/// Read and decode every record of `level` from `paths`, in path order.
///
/// Files are read in parallel; an undersized or oversized file fails the
/// whole read rather than silently truncating.
pub(crate) fn read_records<R: DecodeRecord + Send>(
    paths: &[PathBuf],
    level: Level,
) -> Result<Vec<R>, KronosError> {
    let schema = level.schema();
    let chunks: Vec<Vec<u8>> = paths
        .par_iter()
        .map(|path| read_file_checked(path, schema))
        .collect::<Result<_, _>>()?;
    let raw = chunks.concat();

    let records: Vec<R> = match schema.endianness {
        Endianness::Little => raw
            .par_chunks_exact(schema.record_len)
            .map(|chunk| R::decode::<LittleEndian>(chunk))
            .collect(),
        Endianness::Big => raw
            .par_chunks_exact(schema.record_len)
            .map(|chunk| R::decode::<BigEndian>(chunk))
            .collect(),
    };
    debug!(
        "Read {} {level} records from {} files",
        records.len(),
        paths.len()
    );
    Ok(records)
}

/// Read the records of any level into a [`LevelData`].
pub fn read_level(paths: &[PathBuf], level: Level) -> Result<LevelData, KronosError> {
    let data = match level {
        Level::N1 => LevelData::N1(read_records(paths, level)?),
        Level::N2 => LevelData::N2(read_records(paths, level)?),
        Level::N3b => LevelData::N3b(read_records(paths, level)?),
        Level::N3c => LevelData::N3c(read_records(paths, level)?),
        Level::N3d => LevelData::N3d(read_records(paths, level)?),
        Level::N3e => LevelData::N3e(read_records(paths, level)?),
    };
    Ok(data)
}

/// Read the paired n1 and n2 files that describe the same hours into a
/// [`ReferenceStream`].
pub fn read_reference(
    n1_paths: &[PathBuf],
    n2_paths: &[PathBuf],
) -> Result<ReferenceStream, KronosError> {
    let n1 = read_records(n1_paths, Level::N1)?;
    let n2 = read_records(n2_paths, Level::N2)?;
    ReferenceStream::from_records(n1, n2)
}
