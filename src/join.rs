//! Matching derived-level records to reference rows by record label.
//!
//! Derived records do not carry selection keys of their own; they name the
//! reference record(s) they were computed from through the `(ydh, num)`
//! label. Joining hashes the selected reference rows once, then resolves
//! every derived record in constant time.

use std::collections::HashMap;

use log::debug;

use crate::{
    error::KronosError,
    record::{ColumnValues, LevelData},
    select::SelectionMask,
    ReferenceStream,
};

/// Index from a record label `(ydh, num)` to the reference row carrying
/// it. Only selected rows are indexed, so resolving a label also answers
/// whether that row passed the selection.
#[derive(Debug, Clone)]
pub struct LabelIndex {
    map: HashMap<(i64, i64), usize>,
}

impl LabelIndex {
    /// Index the rows of `reference` that `mask` keeps. If a label occurs
    /// twice, the earlier row wins.
    pub fn from_reference(reference: &ReferenceStream, mask: &SelectionMask) -> LabelIndex {
        let mut map = HashMap::with_capacity(mask.num_selected());
        for (row, keep) in mask.iter().enumerate() {
            if !keep {
                continue;
            }
            let n1 = &reference.n1[row];
            map.entry((i64::from(n1.ydh), i64::from(n1.num)))
                .or_insert(row);
        }
        debug!("Indexed {} selected reference labels", map.len());
        LabelIndex { map }
    }

    pub fn get(&self, ydh: i64, num: i64) -> Option<usize> {
        self.map.get(&(ydh, num)).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// The reference rows each derived record resolved to. `None` marks a
/// record whose label (or, for two-channel records, either sub-label)
/// did not match a selected row; such records take no part in the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinedRows {
    /// One reference row per record.
    Single(Vec<Option<usize>>),
    /// One row per antenna channel. Both must match or the record drops.
    Pair(Vec<Option<[usize; 2]>>),
}

impl JoinedRows {
    pub fn len(&self) -> usize {
        match self {
            JoinedRows::Single(v) => v.len(),
            JoinedRows::Pair(v) => v.len(),
        }
    }

    pub fn num_matched(&self) -> usize {
        match self {
            JoinedRows::Single(v) => v.iter().filter(|r| r.is_some()).count(),
            JoinedRows::Pair(v) => v.iter().filter(|r| r.is_some()).count(),
        }
    }
}

/// Resolve every record of `fine` against the indexed reference labels.
pub fn join_to_reference(
    fine: &LevelData,
    index: &LabelIndex,
) -> Result<JoinedRows, KronosError> {
    let ydhs = match fine.column("ydh")? {
        ColumnValues::Int(v) => v,
        _ => unreachable!("ydh is a scalar integer column in every layout"),
    };

    let joined = match fine.column("num")? {
        ColumnValues::Int(nums) => JoinedRows::Single(
            ydhs.iter()
                .zip(nums)
                .map(|(&ydh, num)| index.get(ydh, num))
                .collect(),
        ),
        ColumnValues::IntPair(nums) => JoinedRows::Pair(
            ydhs.iter()
                .zip(nums)
                .map(|(&ydh, [num0, num1])| {
                    match (index.get(ydh, num0), index.get(ydh, num1)) {
                        (Some(row0), Some(row1)) => Some([row0, row1]),
                        _ => None,
                    }
                })
                .collect(),
        ),
        _ => unreachable!("num is an integer column in every layout"),
    };
    debug!(
        "Joined {} of {} {} records to the reference",
        joined.num_matched(),
        joined.len(),
        fine.level()
    );
    Ok(joined)
}
