//! Locating archive files on disk.

use std::path::{Path, PathBuf};

use hifitime::{Epoch, TimeUnits};
use log::debug;

use crate::{
    error::KronosError,
    kronos::{epoch_to_year_doy_hour, year_doy_epoch},
    level::Level,
};

/// Finds the files of a level that may hold records within a time range.
///
/// Implementations only narrow by file; records are still masked
/// individually after reading, so returning too much is harmless and
/// returning too little loses data.
pub trait LocateFiles {
    /// All files of `level` covering `range`, sorted by their hour tag.
    fn locate(&self, level: Level, range: (Epoch, Epoch)) -> Result<Vec<PathBuf>, KronosError>;
}

/// First day of year of each trimester directory.
const TRIMESTER_BEGINS: [u32; 4] = [1, 91, 181, 271];
/// Last day of year of each trimester directory.
const TRIMESTER_ENDS: [u32; 4] = [90, 180, 270, 366];

/// The on-disk archive layout: one directory per year trimester, named
/// `YYYY_DDD_DDD` after its first and last day of year, holding one
/// subdirectory per level with one file per hour. Hour files end in the
/// ten-character tag `yyyyddd.hh`.
#[derive(Debug, Clone)]
pub struct TrimesterTree {
    root: PathBuf,
}

impl TrimesterTree {
    pub fn new<P: Into<PathBuf>>(root: P) -> TrimesterTree {
        TrimesterTree { root: root.into() }
    }
}

impl LocateFiles for TrimesterTree {
    fn locate(&self, level: Level, range: (Epoch, Epoch)) -> Result<Vec<PathBuf>, KronosError> {
        let (start, end) = range;
        let start_tag = epoch_to_year_doy_hour(start);
        let end_tag = epoch_to_year_doy_hour(end);

        let mut found: Vec<((i32, u32, u8), PathBuf)> = vec![];
        for year in start_tag.0..=end_tag.0 {
            for (&begin, &last_doy) in TRIMESTER_BEGINS.iter().zip(&TRIMESTER_ENDS) {
                let first_instant = year_doy_epoch(year, begin);
                let past_last_instant = year_doy_epoch(year, last_doy) + 1.days();
                if past_last_instant <= start || first_instant > end {
                    continue;
                }

                let dir = self
                    .root
                    .join(format!("{year}_{begin:03}_{last_doy:03}"))
                    .join(level.name());
                let entries = match std::fs::read_dir(&dir) {
                    Ok(entries) => entries,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        debug!("{}: no such directory; skipping", dir.display());
                        continue;
                    }
                    Err(source) => return Err(KronosError::Io { path: dir, source }),
                };
                for entry in entries {
                    let entry = entry.map_err(|source| KronosError::Io {
                        path: dir.clone(),
                        source,
                    })?;
                    let path = entry.path();
                    let tag = match parse_hour_tag(&path) {
                        Some(tag) => tag,
                        None => {
                            debug!("{}: no hour tag; skipping", path.display());
                            continue;
                        }
                    };
                    if start_tag <= tag && tag <= end_tag {
                        found.push((tag, path));
                    }
                }
            }
        }

        found.sort_unstable();
        let paths: Vec<PathBuf> = found.into_iter().map(|(_, path)| path).collect();
        debug!(
            "Located {} {level} files between {start} and {end}",
            paths.len()
        );
        Ok(paths)
    }
}

/// Parse the trailing `yyyyddd.hh` of an hour file name.
fn parse_hour_tag(path: &Path) -> Option<(i32, u32, u8)> {
    let name = path.file_name()?.to_str()?;
    let tag = name.get(name.len().checked_sub(10)?..)?;
    if tag.as_bytes()[7] != b'.' {
        return None;
    }
    let year: i32 = tag.get(0..4)?.parse().ok()?;
    let doy: u32 = tag.get(4..7)?.parse().ok()?;
    let hour: u8 = tag.get(8..10)?.parse().ok()?;
    ((1..=366).contains(&doy) && hour <= 23).then(|| (year, doy, hour))
}
