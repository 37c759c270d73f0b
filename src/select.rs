//! Row selection over a reference stream and the axes it induces.

use std::collections::{BTreeMap, BTreeSet};

use hifitime::Epoch;
use log::debug;

use crate::{error::KronosError, ReferenceStream, Selection};

/// A per-row keep/drop flag over a reference stream. Every mask criterion
/// narrows the selection; rows start out selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionMask(pub(crate) Vec<bool>);

impl SelectionMask {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn num_selected(&self) -> usize {
        self.0.iter().filter(|&&keep| keep).count()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.0.iter().copied()
    }
}

/// Flag the reference rows that satisfy every criterion of `selection`.
///
/// All bounds are inclusive on both ends. Requesting a configuration code
/// that never appears in the reference is an error rather than a silent
/// empty axis; an in-range selection that happens to match nothing is fine.
pub fn build_mask(
    reference: &ReferenceStream,
    selection: &Selection,
) -> Result<SelectionMask, KronosError> {
    let mut keep = vec![true; reference.len()];

    if let Some((start, end)) = selection.time {
        for (flag, epoch) in keep.iter_mut().zip(reference.times.iter()) {
            *flag &= start <= *epoch && *epoch <= end;
        }
    }
    if let Some(min) = selection.freq_min_khz {
        for (flag, f) in keep.iter_mut().zip(reference.freqs_khz.iter()) {
            *flag &= *f >= min;
        }
    }
    if let Some(max) = selection.freq_max_khz {
        for (flag, f) in keep.iter_mut().zip(reference.freqs_khz.iter()) {
            *flag &= *f <= max;
        }
    }
    if let Some(configurations) = &selection.configurations {
        let observed: BTreeSet<u8> = reference.n1.iter().map(|r| r.ant).collect();
        for &code in configurations {
            if !observed.contains(&code) {
                return Err(KronosError::InvalidConfiguration {
                    requested: code,
                    observed: observed.iter().copied().collect(),
                });
            }
        }
        let wanted: BTreeSet<u8> = configurations.iter().copied().collect();
        for (flag, r) in keep.iter_mut().zip(reference.n1.iter()) {
            *flag &= wanted.contains(&r.ant);
        }
    }

    let mask = SelectionMask(keep);
    debug!(
        "Selected {} of {} reference rows",
        mask.num_selected(),
        mask.len()
    );
    Ok(mask)
}

/// The sorted unique keys of each grid axis, together with the position in
/// the selected row sequence where each key first appears.
///
/// The physical value vectors run parallel to the key vectors: `times[i]`
/// is the epoch of `time_keys[i]` and `freqs_khz[j]` the frequency of
/// `freq_keys[j]`.
#[derive(Debug, Clone)]
pub struct AxisSet {
    pub time_keys: Vec<u32>,
    pub times: Vec<Epoch>,
    pub time_first: Vec<usize>,
    pub freq_keys: Vec<u32>,
    pub freqs_khz: Vec<f64>,
    pub freq_first: Vec<usize>,
    pub config_keys: Vec<u8>,
    pub config_first: Vec<usize>,
}

impl AxisSet {
    /// The dense grid shape these axes span, as (time, frequency,
    /// configuration).
    pub fn shape(&self) -> (usize, usize, usize) {
        (
            self.time_keys.len(),
            self.freq_keys.len(),
            self.config_keys.len(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.time_keys.is_empty()
    }

    pub(crate) fn time_pos(&self, ti: u32) -> Option<usize> {
        self.time_keys.binary_search(&ti).ok()
    }

    pub(crate) fn freq_pos(&self, fi: u32) -> Option<usize> {
        self.freq_keys.binary_search(&fi).ok()
    }

    pub(crate) fn config_pos(&self, ant: u8) -> Option<usize> {
        self.config_keys.binary_search(&ant).ok()
    }
}

/// Collapse the selected rows onto their unique time, frequency and
/// configuration keys.
///
/// An empty selection collapses to empty axes, which grid construction
/// accepts and turns into a zero-sized grid.
pub fn dedupe_axes(reference: &ReferenceStream, mask: &SelectionMask) -> AxisSet {
    let mut times: BTreeMap<u32, (usize, Epoch)> = BTreeMap::new();
    let mut freqs: BTreeMap<u32, (usize, f64)> = BTreeMap::new();
    let mut configs: BTreeMap<u8, usize> = BTreeMap::new();

    let mut selected_row = 0;
    for (row, keep) in mask.iter().enumerate() {
        if !keep {
            continue;
        }
        let n1 = &reference.n1[row];
        times
            .entry(n1.ti)
            .or_insert((selected_row, reference.times[row]));
        freqs
            .entry(n1.fi)
            .or_insert((selected_row, reference.freqs_khz[row]));
        configs.entry(n1.ant).or_insert(selected_row);
        selected_row += 1;
    }

    let mut axes = AxisSet {
        time_keys: Vec::with_capacity(times.len()),
        times: Vec::with_capacity(times.len()),
        time_first: Vec::with_capacity(times.len()),
        freq_keys: Vec::with_capacity(freqs.len()),
        freqs_khz: Vec::with_capacity(freqs.len()),
        freq_first: Vec::with_capacity(freqs.len()),
        config_keys: Vec::with_capacity(configs.len()),
        config_first: Vec::with_capacity(configs.len()),
    };
    for (ti, (first, epoch)) in times {
        axes.time_keys.push(ti);
        axes.times.push(epoch);
        axes.time_first.push(first);
    }
    for (fi, (first, f)) in freqs {
        axes.freq_keys.push(fi);
        axes.freqs_khz.push(f);
        axes.freq_first.push(first);
    }
    for (ant, first) in configs {
        axes.config_keys.push(ant);
        axes.config_first.push(first);
    }
    debug!(
        "Axes span {:?} over {} selected rows",
        axes.shape(),
        mask.num_selected()
    );
    axes
}
