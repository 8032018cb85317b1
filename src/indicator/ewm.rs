/// Exponentially weighted mean in the unadjusted recursive form:
/// the first value seeds the mean, then `m = m * (1 - alpha) + x * alpha`.
#[derive(Debug, Clone)]
pub struct Ewm {
    alpha: f64,
    mean: Option<f64>,
}

impl Ewm {
    pub fn new(alpha: f64) -> Self {
        assert!(alpha > 0.0 && alpha <= 1.0, "EWM alpha must be in (0, 1]");
        Self { alpha, mean: None }
    }

    /// Wilder's smoothing for a lookback of `period` observations.
    pub fn wilder(period: usize) -> Self {
        assert!(period > 0, "EWM period must be > 0");
        Self::new(1.0 / period as f64)
    }

    pub fn push(&mut self, value: f64) -> f64 {
        let next = match self.mean {
            Some(prev) => prev * (1.0 - self.alpha) + value * self.alpha,
            None => value,
        };
        self.mean = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.mean
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}
