use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

/// One intraday IV feed observation. A missing timestamp marks an
/// observation whose time could not be parsed; it never joins any day.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VolObservation {
    pub timestamp: Option<DateTime<Utc>>,
    pub spot: Option<f64>,
    pub iv_atm: Option<f64>,
    pub iv_vega: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolPoint {
    pub date: NaiveDate,
    pub spot_last: Option<f64>,
    pub iv_atm: Option<f64>,
    pub iv_vega: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct VolSeries {
    by_day: BTreeMap<NaiveDate, VolPoint>,
}

impl VolSeries {
    /// Collapses the stream to one row per UTC day. Observations are ordered by
    /// timestamp and each column keeps the last non-null value seen that day.
    pub fn from_observations(observations: &[VolObservation]) -> Self {
        let mut ordered: Vec<(DateTime<Utc>, &VolObservation)> = observations
            .iter()
            .filter_map(|o| o.timestamp.map(|ts| (ts, o)))
            .collect();
        ordered.sort_by_key(|(ts, _)| *ts);

        let mut by_day: BTreeMap<NaiveDate, VolPoint> = BTreeMap::new();
        for (ts, o) in ordered {
            let date = ts.date_naive();
            let point = by_day.entry(date).or_insert(VolPoint {
                date,
                spot_last: None,
                iv_atm: None,
                iv_vega: None,
            });
            if let Some(v) = finite(o.spot) {
                point.spot_last = Some(v);
            }
            if let Some(v) = finite(o.iv_atm) {
                point.iv_atm = Some(v);
            }
            if let Some(v) = finite(o.iv_vega) {
                point.iv_vega = Some(v);
            }
        }
        Self { by_day }
    }

    pub fn get(&self, date: NaiveDate) -> Option<&VolPoint> {
        self.by_day.get(&date)
    }

    pub fn points(&self) -> impl Iterator<Item = &VolPoint> {
        self.by_day.values()
    }

    pub fn len(&self) -> usize {
        self.by_day.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_day.is_empty()
    }
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(d: u32, h: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2024, 2, d, h, 0, 0).unwrap())
    }

    #[test]
    fn collapses_to_last_value_per_day() {
        let series = VolSeries::from_observations(&[
            VolObservation {
                timestamp: at(1, 18),
                spot: Some(101.0),
                iv_atm: Some(0.55),
                iv_vega: None,
            },
            VolObservation {
                timestamp: at(1, 6),
                spot: Some(100.0),
                iv_atm: Some(0.50),
                iv_vega: Some(0.52),
            },
            VolObservation {
                timestamp: at(2, 1),
                spot: Some(99.0),
                iv_atm: None,
                iv_vega: None,
            },
        ]);
        assert_eq!(series.len(), 2);
        let day1 = series
            .get(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap())
            .unwrap();
        assert_eq!(day1.spot_last, Some(101.0));
        assert_eq!(day1.iv_atm, Some(0.55));
        // the 18:00 row has no vega IV; the earlier value carries
        assert_eq!(day1.iv_vega, Some(0.52));
    }

    #[test]
    fn unparsed_timestamps_are_skipped() {
        let series = VolSeries::from_observations(&[VolObservation {
            timestamp: None,
            spot: Some(1.0),
            iv_atm: Some(0.4),
            iv_vega: Some(0.4),
        }]);
        assert!(series.is_empty());
    }
}
