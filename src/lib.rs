//! Selection, grid reconstruction and concatenation for Cassini/RPWS
//! high-frequency receiver archives.
//!
//! The archive stores sweep records in packed per-hour files, one level
//! per flavour of processing. Levels n1 and n2 run in parallel and form
//! the reference stream every selection is evaluated against; the n3
//! levels are derived from them and join back on by record label.

pub mod archive;
pub mod error;
pub mod grid;
pub mod join;
pub mod kronos;
pub mod level;
pub mod locate;
pub mod read;
pub mod record;
pub mod select;

use hifitime::Epoch;

use crate::{
    kronos::t97_to_epoch,
    record::{N1Record, N2Record},
};

pub use crate::{
    archive::Archive,
    error::KronosError,
    grid::Grid,
    level::Level,
    locate::{LocateFiles, TrimesterTree},
};

/// What to pull out of the archive. Every bound is optional and
/// inclusive; a default selection keeps everything.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Keep records between these timestamps. Selecting against an
    /// on-disk archive requires this, as the range also decides which
    /// hour files are read at all.
    pub time: Option<(Epoch, Epoch)>,

    /// Keep records at or above this frequency \[kHz\].
    pub freq_min_khz: Option<f64>,

    /// Keep records at or below this frequency \[kHz\].
    pub freq_max_khz: Option<f64>,

    /// Keep records whose antenna configuration is one of these codes.
    /// Every listed code must actually occur in the reference stream;
    /// asking for one that never does is reported as an error rather
    /// than silently selecting nothing.
    pub configurations: Option<Vec<u8>>,
}

/// The paired n1 and n2 record streams of the covered hours. Row `i` of
/// both sides describes the same sweep measurement: the n1 side carries
/// the packed selection keys, the n2 side the physical timestamp and
/// frequency.
#[derive(Debug, Clone)]
pub struct ReferenceStream {
    pub n1: Vec<N1Record>,
    pub n2: Vec<N2Record>,

    /// The decoded timestamp of every row.
    pub times: Vec<Epoch>,

    /// The centre frequency of every row \[kHz\].
    pub freqs_khz: Vec<f64>,
}

impl ReferenceStream {
    /// Pair the two sides and decode the per-row timestamps and
    /// frequencies.
    ///
    /// The archive writes one n2 record per n1 record in the same order;
    /// unequal lengths mean the two sides do not describe the same hours.
    pub fn from_records(
        n1: Vec<N1Record>,
        n2: Vec<N2Record>,
    ) -> Result<ReferenceStream, KronosError> {
        if n1.len() != n2.len() {
            return Err(KronosError::ReferenceLengthMismatch {
                n1: n1.len(),
                n2: n2.len(),
            });
        }
        let times = n2.iter().map(|r| t97_to_epoch(r.t97)).collect();
        let freqs_khz = n2.iter().map(|r| f64::from(r.f)).collect();
        Ok(ReferenceStream {
            n1,
            n2,
            times,
            freqs_khz,
        })
    }

    pub fn len(&self) -> usize {
        self.n1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n1.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_sides_must_pair_up() {
        let n1 = vec![N1Record {
            ydh: 201_218_100,
            num: 0,
            ti: 1_618_100_001,
            fi: 800,
            dti: 120,
            c: 0,
            ant: 3,
            agc1: 0,
            agc2: 0,
            auto1: 0,
            auto2: 0,
            cross1: 0,
            cross2: 0,
        }];
        let err = ReferenceStream::from_records(n1, vec![]).unwrap_err();
        assert!(matches!(
            err,
            KronosError::ReferenceLengthMismatch { n1: 1, n2: 0 }
        ));
    }

    #[test]
    fn reference_rows_decode_time_and_frequency_from_the_calibrated_side() {
        let n1 = vec![N1Record {
            ydh: 201_218_100,
            num: 0,
            ti: 1_618_100_001,
            fi: 20_000_803,
            dti: 120,
            c: 0,
            ant: 3,
            agc1: 0,
            agc2: 0,
            auto1: 0,
            auto2: 0,
            cross1: 0,
            cross2: 0,
        }];
        let n2 = vec![N2Record {
            ydh: 201_218_100,
            num: 0,
            t97: 5659.25,
            f: 140.7693,
            dt: 80.0,
            df: 3.4,
            auto_x: 1.0e-12,
            auto_z: 1.0e-12,
            cross_r: 0.0,
            cross_i: 0.0,
            ant: 0,
        }];

        let reference = ReferenceStream::from_records(n1, n2).unwrap();
        assert_eq!(reference.len(), 1);
        assert_eq!(reference.times, [t97_to_epoch(5659.25)]);
        assert_eq!(reference.freqs_khz, [f64::from(140.7693_f32)]);
    }
}
