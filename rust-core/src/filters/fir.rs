//! Direct-form FIR filter with its own delay line
//!
//! The delay line is a ring buffer of the same length as the coefficient set,
//! so processing a sample never allocates.

/// Real-time FIR filter
#[derive(Debug, Clone, Default)]
pub struct FirFilter {
    /// Filter coefficients h[k]
    coefficients: Vec<f64>,

    /// Delay line holding the last `coefficients.len()` inputs
    delay_line: Vec<f64>,

    /// Index of the most recent input in `delay_line`
    cursor: usize,
}

impl FirFilter {
    /// Create a new FIR filter with given coefficients
    pub fn new(coefficients: Vec<f64>) -> Self {
        let delay_line = vec![0.0; coefficients.len()];

        Self {
            coefficients,
            delay_line,
            cursor: 0,
        }
    }

    /// Filter with no coefficients; passes samples through unchanged
    pub fn empty() -> Self {
        Self::default()
    }

    /// Replace the coefficients
    ///
    /// A change of length reallocates and clears the delay line. With an
    /// unchanged length the input history is kept so a retune does not click.
    pub fn set_coefficients(&mut self, coefficients: Vec<f64>) {
        if coefficients.len() != self.delay_line.len() {
            self.delay_line = vec![0.0; coefficients.len()];
            self.cursor = 0;
        }

        self.coefficients = coefficients;
    }

    /// Process single sample: y[n] = Σ h[k] * x[n-k]
    #[inline]
    pub fn process_sample(&mut self, input: f64) -> f64 {
        let length = self.coefficients.len();
        if length == 0 {
            return input;
        }

        // Advance first so `cursor` always points at x[n]
        self.cursor = if self.cursor == 0 { length - 1 } else { self.cursor - 1 };
        self.delay_line[self.cursor] = input;

        // x[n-k] lives at cursor + k (mod length); split to avoid the modulo
        let (head, tail) = self.coefficients.split_at(length - self.cursor);
        let recent = &self.delay_line[self.cursor..];
        let older = &self.delay_line[..self.cursor];

        let mut output = 0.0;
        for (&coeff, &x) in head.iter().zip(recent) {
            output += coeff * x;
        }
        for (&coeff, &x) in tail.iter().zip(older) {
            output += coeff * x;
        }

        output
    }

    /// Process a block in-place
    pub fn process_block_inplace(&mut self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Reset filter state (clear delay line, keep coefficients)
    pub fn reset(&mut self) {
        self.delay_line.fill(0.0);
        self.cursor = 0;
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn delay_line_len(&self) -> usize {
        self.delay_line.len()
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_response_settles_at_dc_gain() {
        let mut filter = FirFilter::new(vec![0.25, 0.5, 0.25]);

        let step: Vec<f64> = (0..4).map(|_| filter.process_sample(2.0)).collect();
        assert_eq!(step, vec![0.5, 1.5, 2.0, 2.0]);
    }

    #[test]
    fn test_impulse_response_matches_coefficients() {
        let coeffs = vec![0.1, 0.2, 0.4, 0.2, 0.05];
        let mut filter = FirFilter::new(coeffs.clone());

        let mut input = vec![0.0; 8];
        input[0] = 1.0;
        filter.process_block_inplace(&mut input);

        for (i, &expected) in coeffs.iter().enumerate() {
            assert!((input[i] - expected).abs() < 1e-12, "tap {}", i);
        }
        assert!(input[5..].iter().all(|&y| y.abs() < 1e-12));
    }

    #[test]
    fn test_history_outlives_many_wraps() {
        // y[n] = x[n] - x[n-3]
        let mut filter = FirFilter::new(vec![1.0, 0.0, 0.0, -1.0]);

        let outputs: Vec<f64> = (1..=10).map(|n| filter.process_sample(n as f64)).collect();
        assert_eq!(&outputs[..3], &[1.0, 2.0, 3.0]);
        assert!(outputs[3..].iter().all(|&y| y == 3.0));
    }

    #[test]
    fn test_reset_zeroes_history_only() {
        let mut filter = FirFilter::new(vec![0.5, 0.5]);
        filter.process_sample(4.0);
        filter.reset();

        assert_eq!(filter.process_sample(2.0), 1.0);
        assert_eq!(filter.coefficients(), &[0.5, 0.5]);
    }

    #[test]
    fn test_set_coefficients_same_length_keeps_history() {
        let mut filter = FirFilter::new(vec![1.0, 0.0]);
        filter.process_sample(1.0);

        filter.set_coefficients(vec![0.0, 1.0]);

        // Previous sample (1.0) weighted by h[1]
        let output = filter.process_sample(2.0);
        assert!((output - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_set_coefficients_new_length_clears_history() {
        let mut filter = FirFilter::empty();
        assert_eq!(filter.process_sample(0.25), 0.25);

        filter.set_coefficients(vec![0.5; 5]);
        assert_eq!(filter.len(), filter.delay_line_len());

        let output = filter.process_sample(1.0);
        assert!((output - 0.5).abs() < 1e-12);
        assert!(!filter.is_empty());
    }
}
