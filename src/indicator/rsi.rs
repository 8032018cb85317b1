use super::ewm::Ewm;

/// Relative Strength Index with Wilder smoothing of gains and losses.
#[derive(Debug, Clone)]
pub struct WilderRsi {
    prev_close: Option<f64>,
    avg_gain: Ewm,
    avg_loss: Ewm,
}

impl WilderRsi {
    pub fn new(period: usize) -> Self {
        Self {
            prev_close: None,
            avg_gain: Ewm::wilder(period),
            avg_loss: Ewm::wilder(period),
        }
    }

    /// Push a close; returns `None` until a price change has been seen.
    pub fn push(&mut self, close: f64) -> Option<f64> {
        let prev = self.prev_close.replace(close)?;
        let delta = close - prev;
        self.avg_gain.push(delta.max(0.0));
        self.avg_loss.push((-delta).max(0.0));
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        let gain = self.avg_gain.value()?;
        let loss = self.avg_loss.value()?;
        Some(rsi_from_averages(gain, loss))
    }
}

/// `100 - 100 / (1 + gain / loss)`; zero average loss reads as an infinite
/// ratio, i.e. 100.
pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss <= 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_close_has_no_value() {
        let mut rsi = WilderRsi::new(14);
        assert_eq!(rsi.push(100.0), None);
        assert!(rsi.push(101.0).is_some());
    }

    #[test]
    fn only_gains_is_100() {
        let mut rsi = WilderRsi::new(14);
        let mut last = None;
        for p in [100.0, 101.0, 102.0, 103.0] {
            last = rsi.push(p);
        }
        assert_eq!(last, Some(100.0));
    }

    #[test]
    fn flat_prices_do_not_divide_by_zero() {
        let mut rsi = WilderRsi::new(14);
        rsi.push(50.0);
        assert_eq!(rsi.push(50.0), Some(100.0));
    }

    #[test]
    fn only_losses_is_zero() {
        let mut rsi = WilderRsi::new(14);
        let mut last = None;
        for p in [100.0, 99.0, 98.0] {
            last = rsi.push(p);
        }
        assert_eq!(last, Some(0.0));
    }

    #[test]
    fn mixed_moves_stay_in_bounds() {
        let mut rsi = WilderRsi::new(14);
        for i in 0..200 {
            let p = 100.0 + ((i as f64) * 0.7).sin() * 5.0;
            if let Some(v) = rsi.push(p) {
                assert!((0.0..=100.0).contains(&v), "rsi out of range: {}", v);
            }
        }
    }

    #[test]
    fn recursive_form_matches_hand_computation() {
        // deltas +2, -1: gains 2 then 2*13/14, losses 0 then 1/14
        let mut rsi = WilderRsi::new(14);
        rsi.push(10.0);
        rsi.push(12.0);
        let v = rsi.push(11.0).unwrap();
        let gain = 2.0 * 13.0 / 14.0;
        let loss = 1.0 / 14.0;
        let expected = 100.0 - 100.0 / (1.0 + gain / loss);
        assert!((v - expected).abs() < 1e-9);
    }
}
