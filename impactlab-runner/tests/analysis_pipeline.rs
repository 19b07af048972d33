//! End-to-end: stored CSV files → parallel analysis → artifacts on disk.

use impactlab_core::data::{synthetic_candles, CandleStore, DataSource, SyntheticSpec};
use impactlab_core::domain::Candle;
use impactlab_core::estimator::InsufficientReason;
use impactlab_runner::{
    analyze_tickers, import_json, save_artifacts, AnalysisError, ImpactLabConfig, TickerOutcome,
    Verdict,
};

fn candles(ticker: &str, count: usize, exponent: f64) -> Vec<Candle> {
    let spec = SyntheticSpec {
        count,
        exponent,
        ..SyntheticSpec::default()
    };
    synthetic_candles(ticker, &spec)
}

#[test]
fn batch_reports_each_ticker_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = CandleStore::new(dir.path());
    store
        .write("SBER", &candles("SBER", 4_000, 0.5), DataSource::TBank)
        .unwrap();
    store
        .write("FLOT", &candles("FLOT", 60, 0.5), DataSource::TBank)
        .unwrap();
    store
        .write("SELG", &candles("SELG", 4_000, 0.9), DataSource::TBank)
        .unwrap();

    let config = ImpactLabConfig::default();
    let tickers: Vec<String> = ["SBER", "FLOT", "SELG", "GAZP"]
        .map(String::from)
        .to_vec();
    let results = analyze_tickers(&store, &tickers, &config.analysis_config());
    assert_eq!(results.len(), 4);

    let outcomes: Vec<TickerOutcome> = results.into_iter().map(Result::unwrap).collect();
    let order: Vec<&str> = outcomes.iter().map(TickerOutcome::ticker).collect();
    assert_eq!(order, vec!["SBER", "FLOT", "SELG", "GAZP"]);

    match &outcomes[0] {
        TickerOutcome::Fitted { report, .. } => {
            assert_eq!(report.verdict, Verdict::Confirmed);
            assert_eq!(report.source, DataSource::TBank);
            assert!(!report.synthetic);
            assert_eq!(report.candle_count, 4_000);
        }
        other => panic!("SBER: expected fit, got {other:?}"),
    }
    assert!(matches!(
        &outcomes[1],
        TickerOutcome::Insufficient {
            reason: InsufficientReason::TooFewObservations { found: 60, required: 100 },
            ..
        }
    ));
    match &outcomes[2] {
        TickerOutcome::Fitted { report, .. } => assert_eq!(report.verdict, Verdict::Anomaly),
        other => panic!("SELG: expected fit, got {other:?}"),
    }
    assert!(matches!(&outcomes[3], TickerOutcome::Missing { .. }));
}

#[test]
fn corrupt_file_is_a_data_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("SBER_1min.csv"),
        "time,open,close,high,low,volume,is_complete,volatility\nnot-a-time,1,1,1,1,1,true,0\n",
    )
    .unwrap();
    let store = CandleStore::new(dir.path());

    let results = analyze_tickers(
        &store,
        &["SBER".to_string()],
        &ImpactLabConfig::default().analysis_config(),
    );
    assert!(matches!(results[0], Err(AnalysisError::Data { .. })));
}

#[test]
fn artifacts_land_under_ticker_directory() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let store = CandleStore::new(data.path());
    store
        .write("SBER", &candles("SBER", 3_000, 0.5), DataSource::TBank)
        .unwrap();

    let config = ImpactLabConfig::default();
    let results = analyze_tickers(&store, &["SBER".to_string()], &config.analysis_config());
    let (report, fit) = match results.into_iter().next().unwrap().unwrap() {
        TickerOutcome::Fitted { report, fit } => (report, fit),
        other => panic!("expected fit, got {other:?}"),
    };

    let plot = cfg!(feature = "plot");
    let dir = save_artifacts(&report, &fit, out.path(), plot).unwrap();
    assert_eq!(dir, out.path().join("SBER"));

    let json = std::fs::read_to_string(dir.join("report.json")).unwrap();
    let loaded = import_json(&json).unwrap();
    assert_eq!(loaded.ticker, "SBER");
    assert_eq!(loaded.dataset_hash, report.dataset_hash);
    assert_eq!(loaded.dataset_hash, store.meta("SBER").unwrap().data_hash);

    let bins = std::fs::read_to_string(dir.join("bins.csv")).unwrap();
    assert_eq!(bins.lines().count(), report.bin_count + 1);
    assert_eq!(dir.join("impact.svg").is_file(), plot);

    // Saving again overwrites in place.
    save_artifacts(&report, &fit, out.path(), false).unwrap();
    assert!(dir.join("report.json").is_file());
}
