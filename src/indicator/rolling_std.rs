/// Sample standard deviation over a trailing window, ring buffer backed.
///
/// The deviation is recomputed from the buffered values on every read, so a
/// window of identical values yields exactly zero no matter what preceded it.
#[derive(Debug, Clone)]
pub struct RollingStd {
    period: usize,
    buffer: Vec<f64>,
    head: usize,
    count: usize,
}

impl RollingStd {
    pub fn new(period: usize) -> Self {
        assert!(period > 1, "RollingStd period must be > 1");
        Self {
            period,
            buffer: vec![0.0; period],
            head: 0,
            count: 0,
        }
    }

    /// Push a new value, return the current deviation if the window is full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.buffer[self.head] = value;
        self.head = (self.head + 1) % self.period;
        if self.count < self.period {
            self.count += 1;
        }
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        if self.count < self.period {
            return None;
        }
        let n = self.period as f64;
        let mean = self.buffer.iter().sum::<f64>() / n;
        let ss = self
            .buffer
            .iter()
            .map(|v| {
                let d = v - mean;
                d * d
            })
            .sum::<f64>();
        Some((ss / (n - 1.0)).max(0.0).sqrt())
    }

    pub fn is_ready(&self) -> bool {
        self.count >= self.period
    }
}
