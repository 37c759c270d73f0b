//! End-to-end selection against an on-disk archive.

use log::debug;
use vec1::Vec1;

use crate::{
    error::KronosError,
    grid::{build_grid, build_joined_grid, Grid},
    level::Level,
    locate::LocateFiles,
    read::{read_level, read_reference},
    select::{build_mask, dedupe_axes},
    Selection,
};

/// An archive reachable through some file locator, usually a
/// [`crate::locate::TrimesterTree`].
#[derive(Debug, Clone)]
pub struct Archive<L> {
    locator: L,
}

impl<L: LocateFiles> Archive<L> {
    pub fn new(locator: L) -> Archive<L> {
        Archive { locator }
    }

    /// Select records of `level` and reconstruct them as a dense grid.
    ///
    /// The selection must bound time, as the time range decides which
    /// files are read at all. The reference streams of the covered hours
    /// are read first and masked; direct levels grid straight from them,
    /// derived levels are read separately and joined on by record label.
    pub fn select(
        &self,
        level: Level,
        selection: &Selection,
        columns: &Vec1<String>,
    ) -> Result<Grid, KronosError> {
        let range = selection.time.ok_or(KronosError::UnboundedSelection)?;
        debug!("Selecting {level} between {} and {}", range.0, range.1);

        let n1_paths = self.locator.locate(Level::N1, range)?;
        let n2_paths = self.locator.locate(Level::N2, range)?;
        let reference = read_reference(&n1_paths, &n2_paths)?;
        let mask = build_mask(&reference, selection)?;
        let axes = dedupe_axes(&reference, &mask);

        match level {
            Level::N1 | Level::N2 => build_grid(&reference, level, &mask, &axes, columns),
            fine => {
                let fine_paths = self.locator.locate(fine, range)?;
                let data = read_level(&fine_paths, fine)?;
                build_joined_grid(&data, &reference, &mask, &axes, columns)
            }
        }
    }
}
