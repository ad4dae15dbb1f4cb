use rtlscan_messages::WindowFunction;
use std::f64::consts::PI;

/// Periodic window coefficients of length `len`.
pub fn coefficients(window: WindowFunction, len: usize) -> Vec<f32> {
    let n = len as f64;
    (0..len)
        .map(|i| {
            let x = 2.0 * PI * i as f64 / n;
            let w = match window {
                WindowFunction::Rectangle => 1.0,
                WindowFunction::Hann => 0.5 - 0.5 * x.cos(),
                WindowFunction::Hamming => 0.54 - 0.46 * x.cos(),
                WindowFunction::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
            };
            w as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_is_flat() {
        assert!(coefficients(WindowFunction::Rectangle, 8).iter().all(|&w| w == 1.0));
    }

    #[test]
    fn test_hann_shape() {
        let w = coefficients(WindowFunction::Hann, 16);
        assert_eq!(w.len(), 16);
        assert!(w[0].abs() < 1e-6);
        assert!((w[8] - 1.0).abs() < 1e-6);
        // Periodic window sums to exactly half its length
        let sum: f32 = w.iter().sum();
        assert!((sum - 8.0).abs() < 1e-4);
    }

    #[test]
    fn test_tapered_windows_peak_mid_frame() {
        for window in [WindowFunction::Hamming, WindowFunction::Blackman] {
            let w = coefficients(window, 32);
            let (peak, _) = w
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.total_cmp(b))
                .unwrap();
            assert_eq!(peak, 16);
            assert!(w[0] < w[16]);
        }
    }
}
