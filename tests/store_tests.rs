use chrono::{NaiveDate, TimeZone, Utc};

use iv_forecast::model::feature::FeatureRow;
use iv_forecast::model::forecast::{ForecastBatch, ForecastRecord};
use iv_forecast::model::metrics::{EvaluationReport, EvaluationStatus};
use iv_forecast::store::ArtifactStore;

fn temp_store() -> (tempfile::TempDir, ArtifactStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path().join("data"), dir.path().join("docs"));
    (dir, store)
}

fn row(d: u32, target: Option<f64>) -> FeatureRow {
    let date = NaiveDate::from_ymd_opt(2024, 2, d).unwrap();
    let mut r = FeatureRow::empty(date, 100.0 + d as f64 / 3.0);
    r.iv = Some(0.61);
    r.rv30 = Some(0.4712345678901234);
    r.rsi14 = Some(55.5);
    r.target_next_ret = target;
    r
}

fn record(symbol: &str) -> ForecastRecord {
    ForecastRecord::no_source_data(
        symbol,
        "gbt-d3-n150",
        Utc.with_ymd_and_hms(2024, 2, 3, 0, 0, 0).unwrap(),
    )
}

#[test]
fn feature_table_round_trip() {
    let (_dir, store) = temp_store();
    let rows = vec![row(1, Some(0.0123)), row(2, None)];
    let path = store.write_features("btc", &rows).unwrap();
    assert!(path.ends_with("BTC_features.csv"));

    let header = std::fs::read_to_string(&path).unwrap();
    assert!(header.starts_with(
        "date,close,spot_last,iv,rv7,rv30,mom7,mom30,rsi14,iv_minus_rv30,target_next_ret"
    ));

    let loaded = store.load_features("BTC").unwrap().unwrap();
    assert_eq!(loaded, rows);
}

#[test]
fn missing_table_is_none() {
    let (_dir, store) = temp_store();
    assert!(store.load_features("ETH").unwrap().is_none());
}

#[test]
fn empty_table_still_has_header() {
    let (_dir, store) = temp_store();
    let path = store.write_features("ETH", &[]).unwrap();
    let text = std::fs::read_to_string(path).unwrap();
    assert!(text.starts_with("date,close"));
    assert_eq!(store.load_features("ETH").unwrap(), Some(Vec::new()));
}

#[test]
fn missing_columns_read_as_null() {
    let (_dir, store) = temp_store();
    let path = store.features_path("LINK");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        "date,close,iv,target_next_ret\n2024-02-01,15.5,0.8,0.01\n2024-02-02,15.6,,\n",
    )
    .unwrap();

    let rows = store.load_features("LINK").unwrap().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].iv, Some(0.8));
    assert_eq!(rows[0].rsi14, None);
    assert_eq!(rows[0].rv30, None);
    assert_eq!(rows[0].target_next_ret, Some(0.01));
    assert_eq!(rows[1].iv, None);
}

#[test]
fn forecast_log_appends_and_keeps_unknown_entries() {
    let (_dir, store) = temp_store();
    let path = store.forecast_log_path("BTC");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, r#"[{"garbage": true}]"#).unwrap();

    assert_eq!(store.append_forecast_log(&record("BTC")).unwrap(), 2);
    assert_eq!(store.append_forecast_log(&record("BTC")).unwrap(), 3);

    let log = store.load_forecast_log("BTC");
    assert_eq!(log.len(), 2);
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw.as_array().unwrap().len(), 3);
}

#[test]
fn corrupt_forecast_log_reads_empty() {
    let (_dir, store) = temp_store();
    let path = store.forecast_log_path("ETH");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{not json").unwrap();
    assert!(store.load_forecast_log("ETH").is_empty());
}

#[test]
fn forecast_and_aggregates_are_written() {
    let (_dir, store) = temp_store();
    let rec = record("ETH");
    store.write_forecast(&rec).unwrap();
    assert_eq!(store.load_forecast("ETH").unwrap(), Some(rec.clone()));

    let batch = ForecastBatch {
        generated_at: rec.timestamp,
        assets: vec![rec],
    };
    let path = store.write_predictions(&batch).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(json["assets"][0]["status"], "no_source_data");
    assert!(json["generated_at"].is_string());

    let reports = vec![
        EvaluationReport::without_metrics("BTC", EvaluationStatus::NoData),
        EvaluationReport::without_metrics("ETH", EvaluationStatus::NoOverlap),
    ];
    store.write_metrics(&reports[0]).unwrap();
    let path = store.write_metrics_aggregate(&reports).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(json[1]["symbol"], "ETH");
    assert_eq!(json[1]["status"], "no_overlap");
    assert!(store.metrics_path("BTC").exists());
}
