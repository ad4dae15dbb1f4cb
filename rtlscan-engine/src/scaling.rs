//! Read-time presentation of stored linear power.

use rtlscan_messages::ScalingMode;

/// Smallest power fed to `log10`. Floors decibel readings at -100 dB.
pub const MIN_POWER: f32 = 1e-10;

pub fn to_db(power: f32) -> f32 {
    // NaN compares false, so it also lands on the floor
    let power = if power > MIN_POWER { power } else { MIN_POWER };
    10.0 * power.log10()
}

pub fn from_db(db: f32) -> f32 {
    10.0_f32.powf(db / 10.0)
}

/// Scale a snapshot of linear power bins for the caller.
pub fn apply(mode: ScalingMode, linear: &[f32]) -> Vec<f32> {
    match mode {
        ScalingMode::Linear => linear.to_vec(),
        ScalingMode::Decibel => linear.iter().map(|&p| to_db(p)).collect(),
    }
}

/// Scale linear values in place, e.g. after copying a snapshot out of the lock.
pub fn scale_in_place(mode: ScalingMode, values: &mut [f32]) {
    if mode == ScalingMode::Decibel {
        values.iter_mut().for_each(|v| *v = to_db(*v));
    }
}

/// Aggregate of already-scaled bins: their sum rounded to the nearest integer.
/// `as` saturates, so huge sums clamp to the `i32` bounds.
pub fn total_magnitude(scaled: &[f32]) -> i32 {
    let sum: f64 = scaled.iter().map(|&v| f64::from(v)).sum();
    sum.round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_floor_guards_zero_and_nan() {
        for p in [0.0, -3.0, f32::NAN] {
            let db = to_db(p);
            assert!(db.is_finite());
            assert!((db + 100.0).abs() < 1e-3, "{p} -> {db}");
        }
    }

    #[test]
    fn test_db_inverse_round_trips() {
        for &p in &[1e-9_f32, 0.0025, 1.0, 42.0] {
            let back = from_db(to_db(p));
            assert!((back - p).abs() <= p * 1e-5, "{p} -> {back}");
        }
    }

    #[test]
    fn test_linear_mode_is_identity() {
        let bins = [0.0, 0.5, 2.0];
        assert_eq!(apply(ScalingMode::Linear, &bins), bins.to_vec());
    }

    #[test]
    fn test_scale_in_place_matches_apply() {
        let bins = [1.0, 0.1, 0.01];
        let mut values = bins;
        scale_in_place(ScalingMode::Decibel, &mut values);
        assert_eq!(values.to_vec(), apply(ScalingMode::Decibel, &bins));

        let mut values = bins;
        scale_in_place(ScalingMode::Linear, &mut values);
        assert_eq!(values, bins);
    }

    #[test]
    fn test_total_magnitude_rounds_and_saturates() {
        assert_eq!(total_magnitude(&[-10.0, -20.0, -30.4]), -60);
        assert_eq!(total_magnitude(&[0.4, 0.4]), 1);
        assert_eq!(total_magnitude(&[]), 0);
        assert_eq!(total_magnitude(&[f32::MAX, f32::MAX]), i32::MAX);
    }
}
