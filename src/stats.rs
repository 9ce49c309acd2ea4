/// Running statistics accumulator for a scalar observable series.
#[derive(Debug)]
pub struct Statistics {
    pub count: usize,
    pub sum: f64,
    pub sum_sq: f64,
}

impl Statistics {
    pub fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            sum_sq: 0.0,
        }
    }

    pub fn update(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }

    /// Sample variance (n - 1 normalization).
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        ((self.sum_sq - n * mean * mean) / (n - 1.0)).max(0.0)
    }

    /// Standard error of the mean, ignoring autocorrelation.
    pub fn std_error(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.variance() / self.count as f64).sqrt()
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_accumulator() {
        let stats = Statistics::new();
        assert_eq!(stats.mean(), 0.0);
        assert_eq!(stats.variance(), 0.0);
        assert_eq!(stats.std_error(), 0.0);
    }

    #[test]
    fn test_mean_and_variance() {
        let mut stats = Statistics::new();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stats.update(v);
        }
        assert_eq!(stats.count, 8);
        assert_relative_eq!(stats.mean(), 5.0);
        // sum of squared deviations is 32, over n - 1 = 7
        assert_relative_eq!(stats.variance(), 32.0 / 7.0, epsilon = 1e-12);
        assert_relative_eq!(stats.std_error(), (32.0_f64 / 7.0 / 8.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_constant_series_has_zero_spread() {
        let mut stats = Statistics::new();
        for _ in 0..100 {
            stats.update(1.25);
        }
        assert_relative_eq!(stats.mean(), 1.25);
        assert_eq!(stats.variance(), 0.0);
        assert_eq!(stats.std_error(), 0.0);
    }
}
