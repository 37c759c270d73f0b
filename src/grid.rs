//! Dense time by frequency by configuration grids.

use std::{collections::BTreeMap, ops::Range};

use hifitime::Epoch;
use itertools::Itertools;
use log::{debug, trace};
use ndarray::{s, Array2, Array3, Axis};
use vec1::Vec1;

use crate::{
    error::{AxisKind, KronosError},
    join::{join_to_reference, JoinedRows, LabelIndex},
    level::Level,
    record::{n1_column, n2_column, ColumnValues, LevelData},
    select::{AxisSet, SelectionMask},
    ReferenceStream,
};

/// The direction-finding antenna channels, in plane order.
const DF_CHANNELS: [u8; 2] = [11, 12];

/// The configuration axis of a grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigAxis {
    /// One plane per observed antenna code, ascending.
    Codes(Vec<u8>),
    /// One plane per antenna channel of a two-channel level.
    ChannelPair([u8; 2]),
}

impl ConfigAxis {
    pub fn len(&self) -> usize {
        match self {
            ConfigAxis::Codes(codes) => codes.len(),
            ConfigAxis::ChannelPair(_) => 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The values of one grid column. Floating-point columns mark missing
/// cells with NaN; integer columns carry an explicit validity plane, as no
/// integer value can stand in for "absent".
#[derive(Debug, Clone)]
pub enum ColumnArray {
    Float(Array3<f64>),
    Int {
        values: Array3<i64>,
        valid: Array3<bool>,
    },
}

impl ColumnArray {
    /// A fully-missing array of the given shape.
    fn missing(is_float: bool, shape: (usize, usize, usize)) -> ColumnArray {
        if is_float {
            ColumnArray::Float(Array3::from_elem(shape, f64::NAN))
        } else {
            ColumnArray::Int {
                values: Array3::zeros(shape),
                valid: Array3::from_elem(shape, false),
            }
        }
    }

    fn is_float(&self) -> bool {
        matches!(self, ColumnArray::Float(_))
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        let shape = match self {
            ColumnArray::Float(a) => a.shape(),
            ColumnArray::Int { values, .. } => values.shape(),
        };
        (shape[0], shape[1], shape[2])
    }

    /// Whether the cell at (time, frequency, configuration) holds no
    /// observed value.
    pub fn is_missing(&self, at: (usize, usize, usize)) -> bool {
        match self {
            ColumnArray::Float(a) => a[at].is_nan(),
            ColumnArray::Int { valid, .. } => !valid[at],
        }
    }

    /// Copy frequency plane `src_j` of `src` into plane `dst_j`.
    fn assign_freq_plane(&mut self, src: &ColumnArray, src_j: usize, dst_j: usize) {
        match (self, src) {
            (ColumnArray::Float(dst), ColumnArray::Float(src)) => {
                dst.index_axis_mut(Axis(1), dst_j)
                    .assign(&src.index_axis(Axis(1), src_j));
            }
            (
                ColumnArray::Int {
                    values: dst_values,
                    valid: dst_valid,
                },
                ColumnArray::Int {
                    values: src_values,
                    valid: src_valid,
                },
            ) => {
                dst_values
                    .index_axis_mut(Axis(1), dst_j)
                    .assign(&src_values.index_axis(Axis(1), src_j));
                dst_valid
                    .index_axis_mut(Axis(1), dst_j)
                    .assign(&src_valid.index_axis(Axis(1), src_j));
            }
            _ => unreachable!("expanded arrays keep their column kind"),
        }
    }

    /// Copy the time rows `src_rows` of `src` into rows starting at
    /// `dst_start`.
    fn assign_time_rows(&mut self, dst_start: usize, src: &ColumnArray, src_rows: Range<usize>) {
        let dst_rows = dst_start..dst_start + src_rows.len();
        match (self, src) {
            (ColumnArray::Float(dst), ColumnArray::Float(src)) => {
                dst.slice_mut(s![dst_rows, .., ..])
                    .assign(&src.slice(s![src_rows, .., ..]));
            }
            (
                ColumnArray::Int {
                    values: dst_values,
                    valid: dst_valid,
                },
                ColumnArray::Int {
                    values: src_values,
                    valid: src_valid,
                },
            ) => {
                dst_values
                    .slice_mut(s![dst_rows.clone(), .., ..])
                    .assign(&src_values.slice(s![src_rows.clone(), .., ..]));
                dst_valid
                    .slice_mut(s![dst_rows, .., ..])
                    .assign(&src_valid.slice(s![src_rows, .., ..]));
            }
            _ => unreachable!("stacked arrays keep their column kind"),
        }
    }
}

/// Write the value of one record into one cell. Integer cells become
/// valid as a side effect.
fn write_cell(data: &mut ColumnArray, at: (usize, usize, usize), values: &ColumnValues, row: usize) {
    match (data, values) {
        (ColumnArray::Float(a), ColumnValues::Float(v)) => a[at] = v[row],
        (ColumnArray::Int { values: a, valid }, ColumnValues::Int(v)) => {
            a[at] = v[row];
            valid[at] = true;
        }
        _ => unreachable!("column arrays are allocated from their column kind"),
    }
}

/// As [`write_cell`], for levels carrying two antenna channels: pair
/// columns contribute their `channel` element, scalar columns repeat on
/// both channel planes.
fn write_channel_cell(
    data: &mut ColumnArray,
    at: (usize, usize, usize),
    values: &ColumnValues,
    row: usize,
    channel: usize,
) {
    match (data, values) {
        (ColumnArray::Float(a), ColumnValues::Float(v)) => a[at] = v[row],
        (ColumnArray::Float(a), ColumnValues::FloatPair(v)) => a[at] = v[row][channel],
        (ColumnArray::Int { values: a, valid }, ColumnValues::Int(v)) => {
            a[at] = v[row];
            valid[at] = true;
        }
        (ColumnArray::Int { values: a, valid }, ColumnValues::IntPair(v)) => {
            a[at] = v[row][channel];
            valid[at] = true;
        }
        _ => unreachable!("column arrays are allocated from their column kind"),
    }
}

/// One named column of a grid.
#[derive(Debug, Clone)]
pub struct GridColumn {
    pub name: String,
    pub data: ColumnArray,
}

/// A dense grid of one level's columns over sorted time, frequency and
/// configuration axes.
///
/// Every cell either holds the value of the first selected record with
/// that cell's keys or is marked missing; reconstruction never invents
/// values.
#[derive(Debug, Clone)]
pub struct Grid {
    pub level: Level,
    /// Packed time keys, ascending.
    pub time_keys: Vec<u32>,
    /// Decoded epoch of each time key.
    pub times: Vec<Epoch>,
    /// Packed frequency keys, ascending.
    pub freq_keys: Vec<u32>,
    /// Centre frequency of each key \[kHz\].
    pub freqs_khz: Vec<f64>,
    pub configs: ConfigAxis,
    pub columns: Vec<GridColumn>,
}

impl Grid {
    /// The grid shape as (time, frequency, configuration).
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.times.len(), self.freqs_khz.len(), self.configs.len())
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn column(&self, name: &str) -> Result<&ColumnArray, KronosError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.data)
            .ok_or_else(|| KronosError::ColumnNotFound {
                level: self.level,
                column: name.to_string(),
            })
    }

    /// Concatenate `other` onto this grid along the time axis, returning
    /// a new grid.
    ///
    /// Both grids must hold the same level, the same columns and the same
    /// configuration axis. The frequency axes may differ; the result
    /// spans their union, with cells missing where an input had no
    /// coverage. Where the time spans overlap, the rows of the
    /// later-starting grid win.
    pub fn concatenate(&self, other: &Grid) -> Result<Grid, KronosError> {
        if self.level != other.level {
            return Err(KronosError::IncompatibleGrids {
                reason: format!("levels differ: {} vs {}", self.level, other.level),
            });
        }
        let self_names = self.columns.iter().map(|c| c.name.as_str());
        let other_names = other.columns.iter().map(|c| c.name.as_str());
        if !self_names.clone().eq(other_names.clone()) {
            return Err(KronosError::IncompatibleGrids {
                reason: format!(
                    "columns differ: [{}] vs [{}]",
                    self_names.format(", "),
                    other_names.format(", ")
                ),
            });
        }

        // An empty operand contributes nothing; hand back the other one.
        let (r0, r1) = match (self.times.first(), self.times.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Ok(other.clone()),
        };
        let (o0, o1) = match (other.times.first(), other.times.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Ok(self.clone()),
        };

        if self.configs != other.configs {
            return Err(KronosError::IncompatibleGrids {
                reason: format!(
                    "configuration axes differ: {:?} vs {:?}",
                    self.configs, other.configs
                ),
            });
        }

        // Union frequency axis; both keys ascend, so the merged map does
        // too.
        let mut union: BTreeMap<u32, f64> = BTreeMap::new();
        for (&key, &f) in self.freq_keys.iter().zip(&self.freqs_khz) {
            union.entry(key).or_insert(f);
        }
        for (&key, &f) in other.freq_keys.iter().zip(&other.freqs_khz) {
            union.entry(key).or_insert(f);
        }
        let freq_keys: Vec<u32> = union.keys().copied().collect();
        let freqs_khz: Vec<f64> = union.values().copied().collect();

        let rx = expand_freq(self, &freq_keys, &freqs_khz);
        let ox = expand_freq(other, &freq_keys, &freqs_khz);

        let stacked = |a: &Grid, a_rows: Range<usize>, b: &Grid, b_rows: Range<usize>| -> Grid {
            let nt = a_rows.len() + b_rows.len();
            let shape = (nt, freq_keys.len(), self.configs.len());
            let mut columns = Vec::with_capacity(a.columns.len());
            for (ca, cb) in a.columns.iter().zip(&b.columns) {
                let mut data = ColumnArray::missing(ca.data.is_float(), shape);
                data.assign_time_rows(0, &ca.data, a_rows.clone());
                data.assign_time_rows(a_rows.len(), &cb.data, b_rows.clone());
                columns.push(GridColumn {
                    name: ca.name.clone(),
                    data,
                });
            }
            Grid {
                level: self.level,
                time_keys: [&a.time_keys[a_rows.clone()], &b.time_keys[b_rows.clone()]].concat(),
                times: [&a.times[a_rows], &b.times[b_rows]].concat(),
                freq_keys: freq_keys.clone(),
                freqs_khz: freqs_khz.clone(),
                configs: self.configs.clone(),
                columns,
            }
        };

        let result = if r0 >= o0 && r1 <= o1 {
            debug!("concatenate: receiver span lies within the other; taking the other");
            ox
        } else if r0 <= o0 && r1 >= o1 {
            debug!("concatenate: other span lies within the receiver; keeping the receiver");
            rx
        } else if r0 >= o1 {
            debug!("concatenate: other wholly before receiver");
            stacked(&ox, 0..ox.times.len(), &rx, 0..rx.times.len())
        } else if r1 <= o0 {
            debug!("concatenate: receiver wholly before other");
            stacked(&rx, 0..rx.times.len(), &ox, 0..ox.times.len())
        } else if r1 >= o0 && r0 <= o0 {
            let cut = rx.times.partition_point(|t| *t < o0);
            debug!("concatenate: receiver leads into other; keeping {cut} receiver rows");
            stacked(&rx, 0..cut, &ox, 0..ox.times.len())
        } else if r0 <= o1 && o0 <= r0 {
            let cut = ox.times.partition_point(|t| *t < r0);
            debug!("concatenate: other leads into receiver; keeping {cut} other rows");
            stacked(&ox, 0..cut, &rx, 0..rx.times.len())
        } else {
            // The guards above cover every ordering of the four
            // endpoints; landing here means the spans compare
            // inconsistently.
            return Err(KronosError::UnexpectedOverlapTopology {
                receiver_start: r0,
                receiver_end: r1,
                other_start: o0,
                other_end: o1,
            });
        };
        Ok(result)
    }
}

/// Re-space a grid onto a wider frequency axis, leaving the new planes
/// missing. `freq_keys` must be a superset of the grid's keys.
fn expand_freq(grid: &Grid, freq_keys: &[u32], freqs_khz: &[f64]) -> Grid {
    if grid.freq_keys == freq_keys {
        return grid.clone();
    }
    let shape = (grid.times.len(), freq_keys.len(), grid.configs.len());
    let mut columns = Vec::with_capacity(grid.columns.len());
    for column in &grid.columns {
        let mut data = ColumnArray::missing(column.data.is_float(), shape);
        for (src_j, key) in grid.freq_keys.iter().enumerate() {
            if let Ok(dst_j) = freq_keys.binary_search(key) {
                data.assign_freq_plane(&column.data, src_j, dst_j);
            }
        }
        columns.push(GridColumn {
            name: column.name.clone(),
            data,
        });
    }
    Grid {
        level: grid.level,
        time_keys: grid.time_keys.clone(),
        times: grid.times.clone(),
        freq_keys: freq_keys.to_vec(),
        freqs_khz: freqs_khz.to_vec(),
        configs: grid.configs.clone(),
        columns,
    }
}

/// Scatter the selected reference rows of a direct level onto dense axes.
///
/// Each selected row lands in the cell addressed by its three keys; cells
/// no row addresses stay missing, and where several rows share a cell the
/// first one wins. The axes must have been built from the same selection,
/// otherwise a row's key has nowhere to go and the mismatch is reported.
pub fn build_grid(
    reference: &ReferenceStream,
    level: Level,
    mask: &SelectionMask,
    axes: &AxisSet,
    columns: &Vec1<String>,
) -> Result<Grid, KronosError> {
    if !matches!(level, Level::N1 | Level::N2) {
        return Err(KronosError::JoinRequired(level));
    }

    let shape = axes.shape();
    let mut extracted = Vec::with_capacity(columns.len());
    let mut grid_columns = Vec::with_capacity(columns.len());
    for name in columns.iter() {
        let values = match level {
            Level::N1 => n1_column(&reference.n1, name),
            Level::N2 => n2_column(&reference.n2, name),
            _ => None,
        };
        let values = values.ok_or_else(|| KronosError::ColumnNotFound {
            level,
            column: name.clone(),
        })?;
        grid_columns.push(GridColumn {
            name: name.clone(),
            data: ColumnArray::missing(values.is_float(), shape),
        });
        extracted.push(values);
    }

    let mut touched = Array3::from_elem(shape, false);
    for (row, keep) in mask.iter().enumerate() {
        if !keep {
            continue;
        }
        let n1 = &reference.n1[row];
        let t = axes
            .time_pos(n1.ti)
            .ok_or(KronosError::AxisCardinalityMismatch {
                axis: AxisKind::Time,
                key: i64::from(n1.ti),
            })?;
        let f = axes
            .freq_pos(n1.fi)
            .ok_or(KronosError::AxisCardinalityMismatch {
                axis: AxisKind::Frequency,
                key: i64::from(n1.fi),
            })?;
        let c = axes
            .config_pos(n1.ant)
            .ok_or(KronosError::AxisCardinalityMismatch {
                axis: AxisKind::Configuration,
                key: i64::from(n1.ant),
            })?;
        if touched[(t, f, c)] {
            trace!("cell ({t}, {f}, {c}) already filled; dropping row {row}");
            continue;
        }
        touched[(t, f, c)] = true;
        for (column, values) in grid_columns.iter_mut().zip(&extracted) {
            write_cell(&mut column.data, (t, f, c), values, row);
        }
    }

    debug!("Built {} {level} grid", format_shape(shape));
    Ok(Grid {
        level,
        time_keys: axes.time_keys.clone(),
        times: axes.times.clone(),
        freq_keys: axes.freq_keys.clone(),
        freqs_khz: axes.freqs_khz.clone(),
        configs: ConfigAxis::Codes(axes.config_keys.clone()),
        columns: grid_columns,
    })
}

/// Build a grid for a derived level by joining its records onto the
/// selected reference rows.
///
/// Two-channel levels grid onto a channel-pair configuration axis, which
/// requires a non-empty selection to cover exactly the two
/// direction-finding codes; their scalar columns repeat on both planes.
/// Single-channel derived levels grid like direct levels, each record
/// landing in the cell of its source reference row.
pub fn build_joined_grid(
    fine: &LevelData,
    reference: &ReferenceStream,
    mask: &SelectionMask,
    axes: &AxisSet,
    columns: &Vec1<String>,
) -> Result<Grid, KronosError> {
    let level = fine.level();
    if matches!(level, Level::N1 | Level::N2) {
        return build_grid(reference, level, mask, axes, columns);
    }

    let mut extracted = Vec::with_capacity(columns.len());
    for name in columns.iter() {
        extracted.push(fine.column(name)?);
    }

    let index = LabelIndex::from_reference(reference, mask);
    let joined = join_to_reference(fine, &index)?;

    let (nt, nf, _) = axes.shape();
    match joined {
        JoinedRows::Pair(rows) => {
            // The channel-pair rule only binds once rows were selected;
            // empty axes grid to a zero-sized result like any other level.
            if !axes.is_empty() && axes.config_keys != DF_CHANNELS {
                return Err(KronosError::ChannelPairRequired {
                    level,
                    observed: axes.config_keys.clone(),
                });
            }
            let shape = (nt, nf, 2);
            let mut grid_columns: Vec<GridColumn> = columns
                .iter()
                .zip(&extracted)
                .map(|(name, values)| GridColumn {
                    name: name.clone(),
                    data: ColumnArray::missing(values.is_float(), shape),
                })
                .collect();

            let mut touched = Array2::from_elem((nt, nf), false);
            for (record, channels) in rows.iter().enumerate() {
                let row = match channels {
                    // Both channels resolved to the same sweep position,
                    // so either row keys the cell.
                    Some([row, _]) => *row,
                    None => continue,
                };
                let n1 = &reference.n1[row];
                let t = axes
                    .time_pos(n1.ti)
                    .ok_or(KronosError::AxisCardinalityMismatch {
                        axis: AxisKind::Time,
                        key: i64::from(n1.ti),
                    })?;
                let f = axes
                    .freq_pos(n1.fi)
                    .ok_or(KronosError::AxisCardinalityMismatch {
                        axis: AxisKind::Frequency,
                        key: i64::from(n1.fi),
                    })?;
                if touched[(t, f)] {
                    trace!("cell ({t}, {f}) already filled; dropping record {record}");
                    continue;
                }
                touched[(t, f)] = true;
                for (column, values) in grid_columns.iter_mut().zip(&extracted) {
                    for channel in 0..2 {
                        write_channel_cell(&mut column.data, (t, f, channel), values, record, channel);
                    }
                }
            }

            debug!("Built {} {level} grid", format_shape(shape));
            Ok(Grid {
                level,
                time_keys: axes.time_keys.clone(),
                times: axes.times.clone(),
                freq_keys: axes.freq_keys.clone(),
                freqs_khz: axes.freqs_khz.clone(),
                configs: ConfigAxis::ChannelPair(DF_CHANNELS),
                columns: grid_columns,
            })
        }
        JoinedRows::Single(rows) => {
            let shape = axes.shape();
            let mut grid_columns: Vec<GridColumn> = columns
                .iter()
                .zip(&extracted)
                .map(|(name, values)| GridColumn {
                    name: name.clone(),
                    data: ColumnArray::missing(values.is_float(), shape),
                })
                .collect();

            let mut touched = Array3::from_elem(shape, false);
            for (record, row) in rows.iter().enumerate() {
                let row = match row {
                    Some(row) => *row,
                    None => continue,
                };
                let n1 = &reference.n1[row];
                let t = axes
                    .time_pos(n1.ti)
                    .ok_or(KronosError::AxisCardinalityMismatch {
                        axis: AxisKind::Time,
                        key: i64::from(n1.ti),
                    })?;
                let f = axes
                    .freq_pos(n1.fi)
                    .ok_or(KronosError::AxisCardinalityMismatch {
                        axis: AxisKind::Frequency,
                        key: i64::from(n1.fi),
                    })?;
                let c = axes
                    .config_pos(n1.ant)
                    .ok_or(KronosError::AxisCardinalityMismatch {
                        axis: AxisKind::Configuration,
                        key: i64::from(n1.ant),
                    })?;
                if touched[(t, f, c)] {
                    trace!("cell ({t}, {f}, {c}) already filled; dropping record {record}");
                    continue;
                }
                touched[(t, f, c)] = true;
                for (column, values) in grid_columns.iter_mut().zip(&extracted) {
                    write_cell(&mut column.data, (t, f, c), values, record);
                }
            }

            debug!("Built {} {level} grid", format_shape(shape));
            Ok(Grid {
                level,
                time_keys: axes.time_keys.clone(),
                times: axes.times.clone(),
                freq_keys: axes.freq_keys.clone(),
                freqs_khz: axes.freqs_khz.clone(),
                configs: ConfigAxis::Codes(axes.config_keys.clone()),
                columns: grid_columns,
            })
        }
    }
}

fn format_shape((nt, nf, nc): (usize, usize, usize)) -> String {
    format!("{nt}x{nf}x{nc}")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use itertools::iproduct;
    use vec1::vec1;

    use super::*;
    use crate::{
        kronos::t97_to_epoch,
        record::{N1Record, N2Record, N3ScalarRecord, N3cRecord},
        select::{build_mask, dedupe_axes},
        Selection,
    };

    /// A reference stream from (ti, fi, ant) triples. Timestamps place
    /// `ti` seconds after the start of day 5659; frequencies are `fi`
    /// kHz. Row `i` carries `autoX` 100 + i and `agc1` 10 + i.
    fn reference(rows: &[(u32, u32, u8)]) -> ReferenceStream {
        let n1 = rows
            .iter()
            .enumerate()
            .map(|(i, &(ti, fi, ant))| N1Record {
                ydh: 201_218_100,
                num: i as u32,
                ti,
                fi,
                dti: 120,
                c: 0,
                ant,
                agc1: 10 + i as u8,
                agc2: 0,
                auto1: 0,
                auto2: 0,
                cross1: 0,
                cross2: 0,
            })
            .collect();
        let n2 = rows
            .iter()
            .enumerate()
            .map(|(i, &(ti, fi, ant))| N2Record {
                ydh: 201_218_100,
                num: i as u32,
                t97: 5659.0 + f64::from(ti) / 86400.0,
                f: fi as f32,
                dt: 80.0,
                df: 3.4,
                auto_x: 100.0 + i as f32,
                auto_z: 0.0,
                cross_r: 0.0,
                cross_i: 0.0,
                ant: ant as i8,
            })
            .collect();
        ReferenceStream::from_records(n1, n2).unwrap()
    }

    /// Build an n2 grid of `autoX` over all rows.
    fn auto_x_grid(rows: &[(u32, u32, u8)]) -> Grid {
        let reference = reference(rows);
        let mask = build_mask(&reference, &Selection::default()).unwrap();
        let axes = dedupe_axes(&reference, &mask);
        build_grid(
            &reference,
            Level::N2,
            &mask,
            &axes,
            &vec1!["autoX".to_string()],
        )
        .unwrap()
    }

    fn float_cell(grid: &Grid, name: &str, at: (usize, usize, usize)) -> f64 {
        match grid.column(name).unwrap() {
            ColumnArray::Float(a) => a[at],
            ColumnArray::Int { .. } => panic!("{name} is not a float column"),
        }
    }

    fn assert_grids_match(a: &Grid, b: &Grid) {
        assert_eq!(a.level, b.level);
        assert_eq!(a.time_keys, b.time_keys);
        assert_eq!(a.times, b.times);
        assert_eq!(a.freq_keys, b.freq_keys);
        assert_eq!(a.freqs_khz, b.freqs_khz);
        assert_eq!(a.configs, b.configs);
        assert_eq!(a.columns.len(), b.columns.len());
        for (ca, cb) in a.columns.iter().zip(&b.columns) {
            assert_eq!(ca.name, cb.name);
            match (&ca.data, &cb.data) {
                (ColumnArray::Float(x), ColumnArray::Float(y)) => {
                    assert_eq!(x.shape(), y.shape());
                    for (vx, vy) in x.iter().zip(y) {
                        assert!(
                            vx == vy || (vx.is_nan() && vy.is_nan()),
                            "{vx} vs {vy} in {}",
                            ca.name
                        );
                    }
                }
                (
                    ColumnArray::Int {
                        values: x,
                        valid: mx,
                    },
                    ColumnArray::Int {
                        values: y,
                        valid: my,
                    },
                ) => {
                    assert_eq!(x, y);
                    assert_eq!(mx, my);
                }
                _ => panic!("column kinds differ for {}", ca.name),
            }
        }
    }

    #[test]
    fn each_selected_row_lands_in_its_cell() {
        let grid = auto_x_grid(&[(10, 100, 3), (10, 200, 3), (20, 100, 3)]);

        assert_eq!(grid.shape(), (2, 2, 1));
        assert_eq!(grid.time_keys, [10, 20]);
        assert_eq!(grid.freq_keys, [100, 200]);
        assert_eq!(grid.freqs_khz, [100.0, 200.0]);
        assert_eq!(grid.configs, ConfigAxis::Codes(vec![3]));

        assert_eq!(float_cell(&grid, "autoX", (0, 0, 0)), 100.0);
        assert_eq!(float_cell(&grid, "autoX", (0, 1, 0)), 101.0);
        assert_eq!(float_cell(&grid, "autoX", (1, 0, 0)), 102.0);
    }

    #[test]
    fn cells_are_missing_exactly_where_no_row_addresses_them() {
        let grid = auto_x_grid(&[(10, 100, 3), (10, 200, 3), (20, 100, 3)]);
        let column = grid.column("autoX").unwrap();

        assert!(column.is_missing((1, 1, 0)));
        for at in [(0, 0, 0), (0, 1, 0), (1, 0, 0)] {
            assert!(!column.is_missing(at));
        }
    }

    #[test]
    fn filled_cells_rederive_the_axes() {
        // Four scattered rows leave holes in the 3x2x2 product.
        let reference = reference(&[(10, 100, 3), (10, 200, 11), (20, 100, 11), (30, 200, 3)]);
        let mask = build_mask(&reference, &Selection::default()).unwrap();
        let axes = dedupe_axes(&reference, &mask);
        let grid = build_grid(
            &reference,
            Level::N2,
            &mask,
            &axes,
            &vec1!["autoX".to_string()],
        )
        .unwrap();

        let column = grid.column("autoX").unwrap();
        let (nt, nf, nc) = grid.shape();
        let mut time_keys = BTreeSet::new();
        let mut freq_keys = BTreeSet::new();
        let mut config_keys = BTreeSet::new();
        for (t, f, c) in iproduct!(0..nt, 0..nf, 0..nc) {
            if column.is_missing((t, f, c)) {
                continue;
            }
            time_keys.insert(grid.time_keys[t]);
            freq_keys.insert(grid.freq_keys[f]);
            config_keys.insert(match &grid.configs {
                ConfigAxis::Codes(codes) => codes[c],
                ConfigAxis::ChannelPair(pair) => pair[c],
            });
        }

        assert_eq!(time_keys.into_iter().collect::<Vec<_>>(), axes.time_keys);
        assert_eq!(freq_keys.into_iter().collect::<Vec<_>>(), axes.freq_keys);
        assert_eq!(
            config_keys.into_iter().collect::<Vec<_>>(),
            axes.config_keys
        );
    }

    #[test]
    fn integer_columns_track_validity_explicitly() {
        // Two rows on the diagonal of a 2x2 grid leave the off-diagonal
        // cells unobserved.
        let reference = reference(&[(10, 100, 3), (20, 200, 3)]);
        let mask = build_mask(&reference, &Selection::default()).unwrap();
        let axes = dedupe_axes(&reference, &mask);

        let grid = build_grid(
            &reference,
            Level::N1,
            &mask,
            &axes,
            &vec1!["agc1".to_string()],
        )
        .unwrap();
        match grid.column("agc1").unwrap() {
            ColumnArray::Int { values, valid } => {
                assert!(valid[(0, 0, 0)]);
                assert!(valid[(1, 1, 0)]);
                assert!(!valid[(0, 1, 0)]);
                assert!(!valid[(1, 0, 0)]);
                assert_eq!(values[(0, 0, 0)], 10);
                assert_eq!(values[(1, 1, 0)], 11);
            }
            ColumnArray::Float(_) => panic!("agc1 is not a float column"),
        }
    }

    #[test]
    fn duplicate_keys_keep_the_first_row() {
        let grid = auto_x_grid(&[(10, 100, 3), (10, 100, 3)]);
        assert_eq!(grid.shape(), (1, 1, 1));
        assert_eq!(float_cell(&grid, "autoX", (0, 0, 0)), 100.0);
    }

    #[test]
    fn rows_outside_the_axes_are_reported() {
        let reference = reference(&[(10, 100, 3), (20, 100, 3)]);
        let full = build_mask(&reference, &Selection::default()).unwrap();
        // Axes built from a narrower selection than the scatter mask.
        let selection = Selection {
            time: Some((t97_to_epoch(5658.0), t97_to_epoch(5659.0002))),
            ..Default::default()
        };
        let narrow = build_mask(&reference, &selection).unwrap();
        assert_eq!(narrow.as_slice(), &[true, false]);
        let axes = dedupe_axes(&reference, &narrow);

        let err = build_grid(
            &reference,
            Level::N2,
            &full,
            &axes,
            &vec1!["autoX".to_string()],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            KronosError::AxisCardinalityMismatch {
                axis: AxisKind::Time,
                key: 20,
            }
        ));
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let reference = reference(&[(10, 100, 3)]);
        let mask = build_mask(&reference, &Selection::default()).unwrap();
        let axes = dedupe_axes(&reference, &mask);
        let err = build_grid(
            &reference,
            Level::N2,
            &mask,
            &axes,
            &vec1!["nope".to_string()],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            KronosError::ColumnNotFound { level: Level::N2, column } if column == "nope"
        ));
    }

    #[test]
    fn derived_levels_cannot_grid_directly() {
        let reference = reference(&[(10, 100, 3)]);
        let mask = build_mask(&reference, &Selection::default()).unwrap();
        let axes = dedupe_axes(&reference, &mask);
        let err = build_grid(
            &reference,
            Level::N3c,
            &mask,
            &axes,
            &vec1!["s".to_string()],
        )
        .unwrap_err();
        assert!(matches!(err, KronosError::JoinRequired(Level::N3c)));
    }

    #[test]
    fn two_channel_records_fill_both_planes() {
        // Two sweep positions, each observed by both channels.
        let reference = reference(&[
            (10, 100, 11),
            (10, 100, 12),
            (20, 100, 11),
            (20, 100, 12),
        ]);
        let mask = build_mask(&reference, &Selection::default()).unwrap();
        let axes = dedupe_axes(&reference, &mask);

        let fine = LevelData::N3c(vec![
            N3cRecord {
                ydh: 201_218_100,
                num: [0, 1],
                s: 7.0,
                q: 0.25,
                u: 0.0,
                v: [1.0, 2.0],
                th: [30.0, 40.0],
                ph: [0.0, 0.0],
                zr: 1.5,
                snx: [20.0, 20.0],
                snz: [20.0, 20.0],
            },
            // Names a reference row that does not exist: dropped whole.
            N3cRecord {
                ydh: 201_218_100,
                num: [2, 99],
                s: 8.0,
                q: 0.0,
                u: 0.0,
                v: [3.0, 4.0],
                th: [0.0, 0.0],
                ph: [0.0, 0.0],
                zr: 1.0,
                snx: [20.0, 20.0],
                snz: [20.0, 20.0],
            },
        ]);
        let grid = build_joined_grid(
            &fine,
            &reference,
            &mask,
            &axes,
            &vec1!["s".to_string(), "v".to_string()],
        )
        .unwrap();

        assert_eq!(grid.shape(), (2, 1, 2));
        assert_eq!(grid.configs, ConfigAxis::ChannelPair([11, 12]));
        // Scalar columns repeat on both channel planes.
        assert_eq!(float_cell(&grid, "s", (0, 0, 0)), 7.0);
        assert_eq!(float_cell(&grid, "s", (0, 0, 1)), 7.0);
        // Pair columns split across them.
        assert_eq!(float_cell(&grid, "v", (0, 0, 0)), 1.0);
        assert_eq!(float_cell(&grid, "v", (0, 0, 1)), 2.0);
        // The half-matched record contributed nothing.
        assert!(grid.column("s").unwrap().is_missing((1, 0, 0)));
        assert!(grid.column("v").unwrap().is_missing((1, 0, 1)));
    }

    #[test]
    fn two_channel_grids_need_both_channels_selected() {
        let reference = reference(&[(10, 100, 11), (10, 100, 12)]);
        let selection = Selection {
            configurations: Some(vec![11]),
            ..Default::default()
        };
        let mask = build_mask(&reference, &selection).unwrap();
        let axes = dedupe_axes(&reference, &mask);

        let fine = LevelData::N3c(vec![]);
        let err = build_joined_grid(
            &fine,
            &reference,
            &mask,
            &axes,
            &vec1!["s".to_string()],
        )
        .unwrap_err();
        match err {
            KronosError::ChannelPairRequired { level, observed } => {
                assert_eq!(level, Level::N3c);
                assert_eq!(observed, [11]);
            }
            _ => panic!("expected ChannelPairRequired, got {err:?}"),
        }
    }

    #[test]
    fn an_empty_selection_grids_two_channel_levels_to_nothing() {
        let reference = reference(&[(10, 100, 11), (10, 100, 12)]);
        // A window ending before the first row selects nothing.
        let selection = Selection {
            time: Some((t97_to_epoch(5658.0), t97_to_epoch(5658.5))),
            ..Default::default()
        };
        let mask = build_mask(&reference, &selection).unwrap();
        assert_eq!(mask.num_selected(), 0);
        let axes = dedupe_axes(&reference, &mask);

        let fine = LevelData::N3c(vec![N3cRecord {
            ydh: 201_218_100,
            num: [0, 1],
            s: 7.0,
            q: 0.0,
            u: 0.0,
            v: [1.0, 2.0],
            th: [30.0, 40.0],
            ph: [0.0, 0.0],
            zr: 1.5,
            snx: [20.0, 20.0],
            snz: [20.0, 20.0],
        }]);
        let grid = build_joined_grid(
            &fine,
            &reference,
            &mask,
            &axes,
            &vec1!["s".to_string()],
        )
        .unwrap();

        assert!(grid.is_empty());
        assert_eq!(grid.shape(), (0, 0, 2));
        assert_eq!(grid.configs, ConfigAxis::ChannelPair([11, 12]));
    }

    #[test]
    fn single_channel_records_land_in_their_source_cell() {
        let reference = reference(&[(10, 100, 3), (20, 100, 11)]);
        let mask = build_mask(&reference, &Selection::default()).unwrap();
        let axes = dedupe_axes(&reference, &mask);

        let fine = LevelData::N3d(vec![
            N3ScalarRecord {
                ydh: 201_218_100,
                num: 0,
                s: 5.0,
                q: 0.0,
                u: 0.0,
                v: 0.0,
                th: 0.0,
                ph: 0.0,
                snx: 15.0,
                snz: 15.0,
            },
            N3ScalarRecord {
                ydh: 201_218_100,
                num: 1,
                s: 6.0,
                q: 0.0,
                u: 0.0,
                v: 0.0,
                th: 0.0,
                ph: 0.0,
                snx: 15.0,
                snz: 15.0,
            },
        ]);
        let grid = build_joined_grid(
            &fine,
            &reference,
            &mask,
            &axes,
            &vec1!["s".to_string()],
        )
        .unwrap();

        assert_eq!(grid.shape(), (2, 1, 2));
        assert_eq!(grid.configs, ConfigAxis::Codes(vec![3, 11]));
        assert_eq!(float_cell(&grid, "s", (0, 0, 0)), 5.0);
        assert_eq!(float_cell(&grid, "s", (1, 0, 1)), 6.0);
        assert!(grid.column("s").unwrap().is_missing((0, 0, 1)));
        assert!(grid.column("s").unwrap().is_missing((1, 0, 0)));
    }

    #[test]
    fn concatenating_a_grid_with_itself_changes_nothing() {
        let grid = auto_x_grid(&[(10, 100, 3), (20, 100, 3)]);
        let doubled = grid.concatenate(&grid).unwrap();
        assert_grids_match(&doubled, &grid);
    }

    #[test]
    fn disjoint_grids_stack_in_time_order_from_either_side() {
        let early = auto_x_grid(&[(10, 100, 3), (20, 100, 3), (30, 100, 3)]);
        let late = auto_x_grid(&[(40, 100, 3), (50, 100, 3)]);

        let forward = early.concatenate(&late).unwrap();
        assert_eq!(forward.time_keys, [10, 20, 30, 40, 50]);
        assert_eq!(float_cell(&forward, "autoX", (0, 0, 0)), 100.0);
        assert_eq!(float_cell(&forward, "autoX", (2, 0, 0)), 102.0);
        assert_eq!(float_cell(&forward, "autoX", (3, 0, 0)), 100.0);
        assert_eq!(float_cell(&forward, "autoX", (4, 0, 0)), 101.0);

        let backward = late.concatenate(&early).unwrap();
        assert_grids_match(&backward, &forward);
    }

    #[test]
    fn overlapping_spans_prefer_the_later_starting_grid() {
        let early = auto_x_grid(&[(10, 100, 3), (20, 100, 3), (30, 100, 3), (40, 100, 3)]);
        let late = auto_x_grid(&[(30, 100, 3), (40, 100, 3), (50, 100, 3)]);

        let merged = early.concatenate(&late).unwrap();
        assert_eq!(merged.time_keys, [10, 20, 30, 40, 50]);
        // Rows 10 and 20 come from the early grid, the rest from the
        // late one.
        assert_eq!(float_cell(&merged, "autoX", (0, 0, 0)), 100.0);
        assert_eq!(float_cell(&merged, "autoX", (1, 0, 0)), 101.0);
        assert_eq!(float_cell(&merged, "autoX", (2, 0, 0)), 100.0);
        assert_eq!(float_cell(&merged, "autoX", (3, 0, 0)), 101.0);
        assert_eq!(float_cell(&merged, "autoX", (4, 0, 0)), 102.0);

        // The later-starting grid wins regardless of operand order.
        let reversed = late.concatenate(&early).unwrap();
        assert_grids_match(&reversed, &merged);
    }

    #[test]
    fn a_contained_span_is_absorbed() {
        let wide = auto_x_grid(&[(10, 100, 3), (20, 100, 3), (30, 100, 3)]);
        let inner = auto_x_grid(&[(20, 100, 3)]);

        let kept = wide.concatenate(&inner).unwrap();
        assert_grids_match(&kept, &wide);

        let replaced = inner.concatenate(&wide).unwrap();
        assert_grids_match(&replaced, &wide);
    }

    #[test]
    fn frequency_axes_merge_to_their_union() {
        let low = auto_x_grid(&[(10, 100, 3), (20, 100, 3)]);
        let high = auto_x_grid(&[(30, 200, 3), (40, 200, 3)]);

        let merged = low.concatenate(&high).unwrap();
        assert_eq!(merged.freq_keys, [100, 200]);
        assert_eq!(merged.freqs_khz, [100.0, 200.0]);
        assert_eq!(merged.shape(), (4, 2, 1));

        // Each row block only covers the frequencies its grid observed.
        assert_eq!(float_cell(&merged, "autoX", (0, 0, 0)), 100.0);
        assert!(merged.column("autoX").unwrap().is_missing((0, 1, 0)));
        assert_eq!(float_cell(&merged, "autoX", (2, 1, 0)), 100.0);
        assert!(merged.column("autoX").unwrap().is_missing((2, 0, 0)));
    }

    #[test]
    fn empty_grids_concatenate_to_the_other_operand() {
        let empty = auto_x_grid(&[]);
        let full = auto_x_grid(&[(10, 100, 3)]);

        assert!(empty.is_empty());
        assert_grids_match(&empty.concatenate(&full).unwrap(), &full);
        assert_grids_match(&full.concatenate(&empty).unwrap(), &full);
    }

    #[test]
    fn mismatched_grids_are_rejected() {
        let reference = reference(&[(10, 100, 3)]);
        let mask = build_mask(&reference, &Selection::default()).unwrap();
        let axes = dedupe_axes(&reference, &mask);
        let n2 = build_grid(
            &reference,
            Level::N2,
            &mask,
            &axes,
            &vec1!["autoX".to_string()],
        )
        .unwrap();
        let n1 = build_grid(
            &reference,
            Level::N1,
            &mask,
            &axes,
            &vec1!["agc1".to_string()],
        )
        .unwrap();
        assert!(matches!(
            n2.concatenate(&n1),
            Err(KronosError::IncompatibleGrids { .. })
        ));

        let other_columns = build_grid(
            &reference,
            Level::N2,
            &mask,
            &axes,
            &vec1!["autoZ".to_string()],
        )
        .unwrap();
        assert!(matches!(
            n2.concatenate(&other_columns),
            Err(KronosError::IncompatibleGrids { .. })
        ));

        let other_config = auto_x_grid(&[(10, 100, 11)]);
        assert!(matches!(
            n2.concatenate(&other_config),
            Err(KronosError::IncompatibleGrids { .. })
        ));
    }
}
