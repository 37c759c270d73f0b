//! Decoding of the archive's packed time and frequency indices.
//!
//! The receiver tags every record with compact integer indices rather than
//! physical values. The functions here unpack them:
//!
//! * `ti` packs `(year - 1996) * 1e8 + doy * 1e5 + seconds`, with a separate
//!   centisecond counter `c`;
//! * `t97` is a decimal day count with 1997-01-01 as day 1;
//! * `fi` packs `band * 1e7 + ccc * 1e4 + nfilt * 1e2 + nn`, where the ABC
//!   bands index fixed filter-bank tables and the HF bands are derived from
//!   a 25 kHz step;
//! * `ydh` packs `year * 1e5 + doy * 1e2 + hour`, the hour tag that also
//!   names the archive files.

use hifitime::{Epoch, TimeUnits};

/// Centre frequencies \[kHz\] of the ABC filter banks with 8 filters per
/// band. The three bands are concatenated: A, then B, then C.
const FREQ_ABC_8: [f64; 24] = [
    3.9548, 4.7729, 5.7601, 6.9516, 8.3895, 10.1248, 12.2191, 14.7465, 17.7968, 21.4779, 25.9205,
    31.2821, 37.7526, 45.5616, 54.9858, 66.3593, 80.0854, 96.6507, 116.6424, 140.7693, 169.8868,
    205.0270, 247.4359, 298.6168,
];

/// As [FREQ_ABC_8], for 16 filters per band.
const FREQ_ABC_16: [f64; 48] = [
    3.7732, 4.1452, 4.5537, 5.0026, 5.4956, 6.0373, 6.6324, 7.2861, 8.0043, 8.7932, 9.6599,
    10.6120, 11.6580, 12.8071, 14.0694, 15.4562, 16.9796, 18.6532, 20.4918, 22.5115, 24.7304,
    27.1679, 29.8458, 32.7875, 36.0192, 39.5694, 43.4696, 47.7542, 52.4611, 57.6319, 63.3124,
    69.5528, 76.4083, 83.9395, 92.2130, 101.3019, 111.2868, 122.2558, 134.3059, 147.5438,
    162.0864, 178.0625, 195.6132, 214.8939, 236.0749, 259.3436, 284.9058, 312.9876,
];

/// As [FREQ_ABC_8], for 32 filters per band.
const FREQ_ABC_32: [f64; 96] = [
    3.6856, 3.8630, 4.0489, 4.2437, 4.4480, 4.6620, 4.8864, 5.1215, 5.3680, 5.6263, 5.8971,
    6.1809, 6.4783, 6.7901, 7.1169, 7.4594, 7.8184, 8.1946, 8.5890, 9.0023, 9.4355, 9.8896,
    10.3656, 10.8644, 11.3872, 11.9352, 12.5096, 13.1116, 13.7426, 14.4040, 15.0972, 15.8237,
    16.5852, 17.3834, 18.2200, 19.0968, 20.0158, 20.9791, 21.9887, 23.0469, 24.1560, 25.3185,
    26.5369, 27.8140, 29.1525, 30.5555, 32.0259, 33.5672, 35.1826, 36.8757, 38.6504, 40.5104,
    42.4599, 44.5033, 46.6450, 48.8898, 51.2426, 53.7086, 56.2933, 59.0024, 61.8418, 64.8179,
    67.9373, 71.2067, 74.6335, 78.2252, 81.9898, 85.9355, 90.0711, 94.4057, 98.9490, 103.7109,
    108.7019, 113.9331, 119.4161, 125.1629, 131.1864, 137.4996, 144.1167, 151.0523, 158.3216,
    165.9408, 173.9266, 182.2967, 191.0697, 200.2648, 209.9025, 220.0039, 230.5915, 241.6886,
    253.3198, 265.5107, 278.2883, 291.6808, 305.7178, 320.4303,
];

/// Midnight, January 1st of `year`, plus `doy - 1` days. Day-of-year is
/// 1-based, so `(2012, 181)` is 2012-06-29.
///
/// The receiver stamps records with wall-clock UTC day counts, so day
/// arithmetic here runs on the UTC reading, not on elapsed atomic time.
pub fn year_doy_epoch(year: i32, doy: u32) -> Epoch {
    let jan1 = Epoch::from_gregorian_utc_at_midnight(year, 1, 1).to_utc_seconds();
    Epoch::from_utc_seconds(jan1 + (f64::from(doy) - 1.0) * 86_400.0)
}

/// Decode a time index and its centisecond counter into a timestamp.
pub fn ti_to_epoch(ti: u32, c: u8) -> Epoch {
    let year = (ti / 100_000_000) as i32 + 1996;
    let doy = (ti % 100_000_000) / 100_000;
    let seconds = ti % 100_000;
    year_doy_epoch(year, doy) + i64::from(seconds).seconds() + (i64::from(c) * 10).milliseconds()
}

/// Decode a decimal-day timestamp (day 1 is 1997-01-01). Days are UTC
/// wall-clock days, like the rest of the archive's time tags.
///
/// The count is stored as a 64-bit float, so the conversion lands slightly
/// off the encoded instant; the result is rounded to the archive's native
/// 10 ms resolution.
pub fn t97_to_epoch(t97: f64) -> Epoch {
    let base = Epoch::from_gregorian_utc_at_midnight(1997, 1, 1).to_utc_seconds();
    Epoch::from_utc_seconds(base + (t97 - 1.0) * 86_400.0).round(10.milliseconds())
}

/// Decode a frequency index into its centre frequency \[kHz\].
///
/// Bands 0 to 2 are the ABC filter banks; the index selects one of the
/// fixed tables by filter count and an entry within it. Higher bands are
/// the HF receiver, whose frequency is a 25 kHz multiple offset by the
/// filter position. Returns `None` for a filter count without a table and
/// for indices past the end of one, which a well-formed archive never
/// produces.
pub fn fi_to_khz(fi: u32) -> Option<f64> {
    let band = fi / 10_000_000;
    let ccc = (fi % 10_000_000) / 10_000;
    let nfilt = (fi % 10_000) / 100;
    let nn = fi % 100;

    if band <= 2 {
        let table: &[f64] = match nfilt {
            8 => &FREQ_ABC_8,
            16 => &FREQ_ABC_16,
            32 => &FREQ_ABC_32,
            _ => return None,
        };
        table.get((band * nfilt + nn) as usize).copied()
    } else {
        if nfilt == 0 {
            return None;
        }
        let step = (2.0 * f64::from(nn) - f64::from(nfilt) + 1.0) / (2.0 * f64::from(nfilt));
        Some((f64::from(ccc) + step) * 25.0)
    }
}

/// Decode an hour tag (`yyyydddhh` packed in decimal) into the start of
/// that hour.
pub fn ydh_to_epoch(ydh: u32) -> Epoch {
    let year = (ydh / 100_000) as i32;
    let doy = (ydh % 100_000) / 100;
    let hour = ydh % 100;
    year_doy_epoch(year, doy) + i64::from(hour).hours()
}

/// The `(year, day-of-year, hour)` triple of a timestamp, matching the
/// components of the archive's hour tags.
pub fn epoch_to_year_doy_hour(epoch: Epoch) -> (i32, u32, u8) {
    let (year, _, _, hour, _, _, _) = epoch.to_gregorian_utc();
    let jan1 = Epoch::from_gregorian_utc_at_midnight(year, 1, 1).to_utc_seconds();
    let doy = ((epoch.to_utc_seconds() - jan1) / 86_400.0) as u32 + 1;
    (year, doy, hour)
}
