mod common;

use common::{random_walk, same_partition};
use voldash_core::{AnomalyLabel, Config};
use voldash_pipeline::VolatilityPipeline;

#[test]
fn synthetic_walk_is_fully_annotated() {
    let raw = random_walk(300, 17);
    let output = VolatilityPipeline::default().run(&raw).unwrap();
    let table = &output.table;

    assert_eq!(table.len(), 300);
    assert_eq!(table.bars(), raw.bars());

    for w in [20usize, 60, 120] {
        let vol = table.feature(&format!("vol_{w}")).unwrap();
        assert!(vol[..w].iter().all(Option::is_none), "vol_{w} warmup");
        assert!(vol[w..].iter().all(Option::is_some), "vol_{w} populated");
    }

    // Clustering needs vol_20 and vol_60
    let clusters = table.clusters().unwrap();
    assert!(clusters[..60].iter().all(Option::is_none));
    assert!(clusters[60..].iter().all(|c| matches!(c, Some(l) if *l < 3)));

    // Anomaly detection needs return and vol_20
    let anomalies = table.anomalies().unwrap();
    assert!(anomalies[..20].iter().all(Option::is_none));
    assert!(anomalies[20..].iter().all(Option::is_some));

    let eligible = 280;
    assert_eq!(output.summary.anomaly.eligible_rows, eligible);
    let count = anomalies
        .iter()
        .filter(|a| **a == Some(AnomalyLabel::Anomaly))
        .count();
    let expected = (0.02 * eligible as f64).round() as usize;
    assert!(count.abs_diff(expected) <= 1, "count = {count}, expected ~{expected}");
    assert_eq!(output.summary.anomaly_count, count);

    assert_eq!(output.summary.clustering.eligible_rows, 240);
    assert!(!output.summary.clustering.skipped);
    let regime_rows: usize = output.summary.regimes.iter().map(|r| r.rows).sum();
    assert_eq!(regime_rows, 240);
}

#[test]
fn repeated_runs_give_same_partition() {
    let raw = random_walk(300, 5);
    let pipeline = VolatilityPipeline::default();
    let a = pipeline.run(&raw).unwrap();
    let b = pipeline.run(&raw).unwrap();

    assert!(same_partition(
        a.table.clusters().unwrap(),
        b.table.clusters().unwrap()
    ));
    assert_eq!(a.table.anomalies(), b.table.anomalies());
}

#[test]
fn feature_columns_untouched_by_labelers() {
    let raw = random_walk(250, 9);
    let pipeline = VolatilityPipeline::default();
    let output = pipeline.run(&raw).unwrap();

    let features_only = voldash_features::FeatureEngine::new(&pipeline.config().features)
        .apply(&raw)
        .unwrap();
    assert_eq!(output.table.features(), features_only.features());
}

#[test]
fn contamination_sets_anomaly_rate() {
    let raw = random_walk(1020, 23);
    let output = VolatilityPipeline::default().run(&raw).unwrap();

    assert_eq!(output.summary.anomaly.eligible_rows, 1000);
    let count = output.summary.anomaly_count;
    assert!((14..=26).contains(&count), "count = {count}");
}

#[test]
fn independent_runs_in_parallel() {
    let raw = random_walk(300, 31);
    let seeds = [1u64, 2, 3, 4];

    let sequential: Vec<_> = seeds
        .iter()
        .map(|&seed| {
            let mut config = Config::default();
            config.clustering.seed = seed;
            config.anomaly.seed = seed;
            VolatilityPipeline::new(config).unwrap().run(&raw).unwrap().table
        })
        .collect();

    let parallel: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = seeds
            .iter()
            .map(|&seed| {
                let raw = &raw;
                s.spawn(move || {
                    let mut config = Config::default();
                    config.clustering.seed = seed;
                    config.anomaly.seed = seed;
                    VolatilityPipeline::new(config).unwrap().run(raw).unwrap().table
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(sequential, parallel);
}

#[test]
fn config_from_json_drives_windows() {
    let config = Config::from_json_str(
        r#"{
            "features": {"volatility_windows": [10, 30], "volume_windows": [5]},
            "clustering": {"feature_columns": ["vol_10", "vol_30"], "n_clusters": 2},
            "anomaly": {"feature_columns": ["return", "vol_10"]}
        }"#,
    )
    .unwrap();
    let output = VolatilityPipeline::new(config)
        .unwrap()
        .run(&random_walk(120, 2))
        .unwrap();

    assert_eq!(
        output.table.feature_names(),
        vec!["return", "vol_10", "vol_30", "vol_avg_5"]
    );
    let clusters = output.table.clusters().unwrap();
    assert!(clusters[..30].iter().all(Option::is_none));
    assert!(clusters[30..].iter().all(|c| matches!(c, Some(l) if *l < 2)));
    assert_eq!(output.summary.anomaly.eligible_rows, 110);
}

#[test]
fn rows_serialize_with_nulls() {
    let output = VolatilityPipeline::default()
        .run(&random_walk(150, 4))
        .unwrap();
    let rows = serde_json::to_value(output.table.rows()).unwrap();

    assert_eq!(rows.as_array().unwrap().len(), 150);
    assert!(rows[0]["return"].is_null());
    assert!(rows[0]["cluster"].is_null());
    assert!(rows[0]["anomaly"].is_null());
    assert!(rows[149]["vol_120"].is_number());
    assert!(rows[149]["Close"].is_number());
    assert!(rows[149]["anomaly"].is_string());
}
