use std::time::Duration;

/// Default number of samples the moving average is spread across.
pub const DEFAULT_LATENCY_WINDOW: usize = 1000;

/// Exponential moving average over round-trip samples.
///
/// The smoothing factor is derived from the sample count until the window
/// fills, so early estimates behave like a plain average instead of being
/// dominated by the first sample. Once the window is full the factor is
/// constant and the estimate is recency-weighted.
#[derive(Debug, Clone)]
pub struct LatencyEstimator {
    average_secs: f64,
    samples: usize,
    window_len: usize,
}

impl Default for LatencyEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY_WINDOW)
    }
}

impl LatencyEstimator {
    pub fn new(window_len: usize) -> Self {
        Self {
            average_secs: 0.0,
            samples: 0,
            window_len: window_len.max(1),
        }
    }

    pub fn update(&mut self, sample: Duration) {
        self.samples = self.samples.saturating_add(1);

        let effective = self.samples.min(self.window_len);
        let alpha = 2.0 / (effective as f64 + 1.0);

        self.average_secs += (sample.as_secs_f64() - self.average_secs) * alpha;
    }

    pub fn sample_count(&self) -> usize {
        self.samples
    }

    pub fn average(&self) -> Duration {
        Duration::from_secs_f64(self.average_secs.max(0.0))
    }
}
