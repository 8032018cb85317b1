use crate::indicator::{RollingStd, WilderRsi};
use crate::merge::MergedRow;
use crate::model::feature::FeatureRow;

pub const SHORT_WINDOW: usize = 7;
pub const LONG_WINDOW: usize = 30;
pub const RSI_PERIOD: usize = 14;
/// Crypto trades every calendar day.
pub const ANNUALIZATION_DAYS: f64 = 365.0;
/// Rows dropped from the head of the table; the final row is always kept.
pub const WARMUP_ROWS: usize = LONG_WINDOW - 1;

pub struct FeatureBuilder;

impl FeatureBuilder {
    /// Feature table with warm-up rows removed. The last row is the live row
    /// and survives even when it lacks history or a label.
    pub fn build(merged: &[MergedRow]) -> Vec<FeatureRow> {
        let mut rows = Self::compute(merged);
        let n = rows.len();
        if n <= WARMUP_ROWS {
            return rows.pop().into_iter().collect();
        }
        rows.split_off(WARMUP_ROWS)
    }

    /// Every feature for every input day, warm-up included.
    pub fn compute(merged: &[MergedRow]) -> Vec<FeatureRow> {
        let mut ordered: Vec<&MergedRow> = merged
            .iter()
            .filter(|r| r.close.is_finite() && r.close > 0.0)
            .collect();
        ordered.sort_by_key(|r| r.date);
        // stable sort: the later duplicate of a date wins
        let mut sorted: Vec<&MergedRow> = Vec::with_capacity(ordered.len());
        for r in ordered {
            match sorted.last_mut() {
                Some(last) if last.date == r.date => *last = r,
                _ => sorted.push(r),
            }
        }

        let closes: Vec<f64> = sorted.iter().map(|r| r.close).collect();
        let ann = ANNUALIZATION_DAYS.sqrt();
        let mut rv_short = RollingStd::new(SHORT_WINDOW);
        let mut rv_long = RollingStd::new(LONG_WINDOW);
        let mut rsi = WilderRsi::new(RSI_PERIOD);

        let mut out = Vec::with_capacity(sorted.len());
        for (t, src) in sorted.iter().enumerate() {
            let close = closes[t];
            let mut row = FeatureRow::empty(src.date, close);
            row.spot_last = src.spot_last;

            if t > 0 {
                let ret = (close / closes[t - 1]).ln();
                row.rv7 = rv_short.push(ret).map(|s| s * ann);
                row.rv30 = rv_long.push(ret).map(|s| s * ann);
            }
            row.mom7 = momentum(&closes, t, SHORT_WINDOW);
            row.mom30 = momentum(&closes, t, LONG_WINDOW);
            row.rsi14 = rsi.push(close);

            row.iv = src
                .iv_vega
                .filter(|v| v.is_finite())
                .or(src.iv_atm.filter(|v| v.is_finite()))
                .or(row.rv30);
            row.iv_minus_rv30 = match (row.iv, row.rv30) {
                (Some(iv), Some(rv)) => Some(iv - rv),
                _ => None,
            };
            row.target_next_ret = closes.get(t + 1).map(|next| next / close - 1.0);
            out.push(row);
        }
        out
    }
}

fn momentum(closes: &[f64], t: usize, window: usize) -> Option<f64> {
    if t < window {
        return None;
    }
    Some(closes[t] / closes[t - window] - 1.0)
}
