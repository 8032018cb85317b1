use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceObservation {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Daily closes, ascending and unique by UTC calendar day.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Collapses observations to one close per UTC day; the latest
    /// observation of a day wins. Non-positive or non-finite closes are skipped.
    pub fn from_observations(observations: &[PriceObservation]) -> Self {
        let mut ordered: Vec<&PriceObservation> = observations
            .iter()
            .filter(|o| o.close.is_finite() && o.close > 0.0)
            .collect();
        ordered.sort_by_key(|o| o.timestamp);

        let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for o in ordered {
            by_day.insert(o.timestamp.date_naive(), o.close);
        }
        Self {
            points: by_day
                .into_iter()
                .map(|(date, close)| PricePoint { date, close })
                .collect(),
        }
    }

    /// Builds a series from daily points; later duplicates of a date win.
    pub fn from_points(points: &[PricePoint]) -> Self {
        let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for p in points {
            if p.close.is_finite() && p.close > 0.0 {
                by_day.insert(p.date, p.close);
            }
        }
        Self {
            points: by_day
                .into_iter()
                .map(|(date, close)| PricePoint { date, close })
                .collect(),
        }
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
