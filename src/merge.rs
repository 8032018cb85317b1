use chrono::NaiveDate;

use crate::model::price::PriceSeries;
use crate::model::vol::VolSeries;

/// A price day left-joined with whatever the IV feed had for that day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergedRow {
    pub date: NaiveDate,
    pub close: f64,
    pub spot_last: Option<f64>,
    pub iv_atm: Option<f64>,
    pub iv_vega: Option<f64>,
}

impl MergedRow {
    pub fn price_only(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            spot_last: None,
            iv_atm: None,
            iv_vega: None,
        }
    }
}

pub struct SeriesMerger;

impl SeriesMerger {
    /// One row per price date. Days without IV coverage get nulls; IV days
    /// with no price are dropped.
    pub fn merge(price: &PriceSeries, vol: &VolSeries) -> Vec<MergedRow> {
        price
            .points()
            .iter()
            .map(|p| match vol.get(p.date) {
                Some(v) => MergedRow {
                    date: p.date,
                    close: p.close,
                    spot_last: v.spot_last,
                    iv_atm: v.iv_atm,
                    iv_vega: v.iv_vega,
                },
                None => MergedRow::price_only(p.date, p.close),
            })
            .collect()
    }
}
