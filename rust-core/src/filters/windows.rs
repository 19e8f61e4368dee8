//! Tapering windows for windowed-sinc FIR design

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Window applied to the ideal sinc response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    /// w[n] = 0.42 - 0.5*cos(2πn/(M-1)) + 0.08*cos(4πn/(M-1))
    /// Sidelobe attenuation: ~74 dB
    #[default]
    Blackman,

    /// w[n] = 0.5 - 0.5*cos(2πn/(M-1))
    /// Sidelobe attenuation: ~44 dB
    Hann,

    /// w[n] = 0.54 - 0.46*cos(2πn/(M-1))
    /// Sidelobe attenuation: ~53 dB
    Hamming,

    /// No tapering
    Rectangular,
}

impl WindowType {
    /// Weight of tap `n` in a window of `length` taps
    #[inline]
    pub fn weight(&self, n: usize, length: usize) -> f64 {
        if length < 2 {
            return 1.0;
        }

        let angle = 2.0 * PI * n as f64 / (length - 1) as f64;

        match self {
            WindowType::Blackman => 0.42 - 0.5 * angle.cos() + 0.08 * (2.0 * angle).cos(),
            WindowType::Hann => 0.5 - 0.5 * angle.cos(),
            WindowType::Hamming => 0.54 - 0.46 * angle.cos(),
            WindowType::Rectangular => 1.0,
        }
    }
}

/// Generate window coefficients w[n] for n = 0..length-1
pub fn generate_window(window_type: WindowType, length: usize) -> Vec<f64> {
    (0..length).map(|n| window_type.weight(n, length)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_generation() {
        let length = 257;

        for window_type in [WindowType::Blackman, WindowType::Hann, WindowType::Hamming] {
            let window = generate_window(window_type, length);
            assert_eq!(window.len(), length);

            // Symmetric, peak of 1.0 at the centre
            for i in 0..length / 2 {
                assert!((window[i] - window[length - 1 - i]).abs() < 1e-12);
            }
            assert!((window[length / 2] - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_blackman_endpoints() {
        let window = generate_window(WindowType::Blackman, 257);

        // 0.42 - 0.5 + 0.08 = 0
        assert!(window[0].abs() < 1e-12);
        assert!(window[256].abs() < 1e-12);
    }

    #[test]
    fn test_rectangular_window() {
        let window = generate_window(WindowType::Rectangular, 100);
        assert!(window.iter().all(|&w| w == 1.0));
    }

    #[test]
    fn test_degenerate_length() {
        assert_eq!(generate_window(WindowType::Blackman, 1), vec![1.0]);
        assert!(generate_window(WindowType::Hann, 0).is_empty());
    }
}
