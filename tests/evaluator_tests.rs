use chrono::{NaiveDate, TimeZone, Utc};

use iv_forecast::evaluate::Evaluator;
use iv_forecast::model::feature::FeatureRow;
use iv_forecast::model::forecast::{ForecastRecord, ForecastStatus};
use iv_forecast::model::metrics::EvaluationStatus;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn logged(for_date: &str, predicted: Option<f64>, prob_up: Option<f64>) -> ForecastRecord {
    let mut r = ForecastRecord::no_source_data(
        "BTC",
        "gbt-d3-n150",
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    );
    r.status = ForecastStatus::Ok;
    r.for_date = Some(for_date.to_string());
    r.predicted_return = predicted;
    r.prob_up = prob_up;
    r
}

fn realized(d: &str, target: Option<f64>) -> FeatureRow {
    let mut r = FeatureRow::empty(date(d), 100.0);
    r.target_next_ret = target;
    r
}

#[test]
fn single_pair_mae() {
    let log = vec![logged("2024-01-05", Some(0.01), None)];
    let rows = vec![realized("2024-01-05", Some(0.02))];
    let report = Evaluator::default().evaluate("BTC", &log, &rows);
    assert_eq!(report.status, EvaluationStatus::Ok);
    let m = report.metrics.unwrap();
    assert_eq!(m.n, 1);
    assert!((m.mae - 0.01).abs() < 1e-15);
    assert!((m.bias + 0.01).abs() < 1e-15);
    assert!((m.hit_rate - 1.0).abs() < f64::EPSILON);
    assert_eq!(m.brier, None);
    assert_eq!(m.last_eval_date, date("2024-01-05"));
}

#[test]
fn date_key_ignores_time_and_offset_suffix() {
    let log = vec![logged("2024-01-05T23:00:00-05:00", Some(0.01), None)];
    let rows = vec![realized("2024-01-05", Some(0.02))];
    let report = Evaluator::default().evaluate("BTC", &log, &rows);
    assert_eq!(report.status, EvaluationStatus::Ok);
}

#[test]
fn no_overlap_serializes_without_metric_fields() {
    let log = vec![logged("2024-02-01", Some(0.01), Some(0.6))];
    let rows = vec![
        realized("2024-01-05", Some(0.02)),
        realized("2024-02-01", None),
    ];
    let report = Evaluator::default().evaluate("ETH", &log, &rows);
    assert_eq!(report.status, EvaluationStatus::NoOverlap);
    assert!(report.metrics.is_none());

    let json = serde_json::to_value(&report).unwrap();
    let obj = json.as_object().unwrap();
    assert_eq!(obj.len(), 2);
    assert_eq!(obj["status"], "no_overlap");
    assert_eq!(obj["symbol"], "ETH");
}

#[test]
fn ok_report_flattens_metrics() {
    let log = vec![logged("2024-01-05", Some(0.01), Some(0.7))];
    let rows = vec![realized("2024-01-05", Some(0.02))];
    let report = Evaluator::default().evaluate("BTC", &log, &rows);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["n"], 1);
    assert_eq!(json["last_eval_date"], "2024-01-05");
    assert!((json["brier"].as_f64().unwrap() - 0.09).abs() < 1e-12);
}

#[test]
fn empty_inputs_are_no_data() {
    let rows = vec![realized("2024-01-05", Some(0.02))];
    let report = Evaluator::default().evaluate("BTC", &[], &rows);
    assert_eq!(report.status, EvaluationStatus::NoData);

    let log = vec![logged("2024-01-05", Some(0.01), None)];
    let report = Evaluator::default().evaluate("BTC", &log, &[]);
    assert_eq!(report.status, EvaluationStatus::NoData);
}

#[test]
fn records_without_prediction_are_skipped() {
    let log = vec![
        logged("2024-01-05", None, None),
        logged("2024-01-06", Some(-0.01), None),
        logged("not a date", Some(0.5), None),
    ];
    let rows = vec![
        realized("2024-01-05", Some(0.02)),
        realized("2024-01-06", Some(-0.03)),
    ];
    let m = Evaluator::default()
        .evaluate("BTC", &log, &rows)
        .metrics
        .unwrap();
    assert_eq!(m.n, 1);
    assert_eq!(m.last_eval_date, date("2024-01-06"));
}

#[test]
fn hit_rate_is_a_fraction() {
    let days = ["2024-03-01", "2024-03-02", "2024-03-03", "2024-03-04", "2024-03-05"];
    let preds = [0.01, -0.02, 0.0, 0.03, -0.01];
    let actual = [0.02, 0.01, 0.0, -0.01, -0.04];
    let log: Vec<_> = days
        .iter()
        .zip(preds)
        .map(|(d, p)| logged(d, Some(p), None))
        .collect();
    let rows: Vec<_> = days
        .iter()
        .zip(actual)
        .map(|(d, y)| realized(d, Some(y)))
        .collect();
    let m = Evaluator::default()
        .evaluate("BTC", &log, &rows)
        .metrics
        .unwrap();
    assert!((0.0..=1.0).contains(&m.hit_rate));
    assert!((m.hit_rate - 0.6).abs() < 1e-12);
}

#[test]
fn brier_fallback_is_configurable() {
    let log = vec![
        logged("2024-01-05", Some(0.01), Some(1.0)),
        logged("2024-01-06", Some(0.01), None),
    ];
    let rows = vec![
        realized("2024-01-05", Some(0.02)),
        realized("2024-01-06", Some(0.02)),
    ];
    let with_fallback = Evaluator::new(Some(0.5)).evaluate("BTC", &log, &rows);
    let b = with_fallback.metrics.unwrap().brier.unwrap();
    assert!((b - 0.125).abs() < 1e-12);

    let without = Evaluator::new(None).evaluate("BTC", &log, &rows);
    assert!(without.metrics.unwrap().brier.unwrap().abs() < 1e-12);
}

#[test]
fn legacy_prediction_alias_is_accepted() {
    let raw = r#"{"symbol": "BTC", "timestamp": "2024-01-04T00:05:00Z", "for_date": "2024-01-05",
                  "next_day_return_pred": 0.01, "prob_up": null, "status": "ok"}"#;
    let record: ForecastRecord = serde_json::from_str(raw).unwrap();
    assert_eq!(record.predicted_return, Some(0.01));
    let rows = vec![realized("2024-01-05", Some(0.02))];
    let report = Evaluator::default().evaluate("BTC", &[record], &rows);
    assert_eq!(report.status, EvaluationStatus::Ok);
}
