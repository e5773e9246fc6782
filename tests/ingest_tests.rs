//! File ingestion feeding a full pipeline
//!
//! Toyota Way: Genchi Genbutsu (go and see)
//! Real files on disk, plain and gzip-compressed, through split, fit and
//! validation.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fmt::Write as _;
use std::io::Write;
use tempfile::TempDir;
use trueno_pipeline::config::Config;
use trueno_pipeline::context::Context;
use trueno_pipeline::dataframe::{DataType, Value};
use trueno_pipeline::ingest::{parse_file, TabularFormat};
use trueno_pipeline::metrics::ValidationMetrics;
use trueno_pipeline::pipeline::Pipeline;
use trueno_pipeline::split::split;
use trueno_pipeline::stage::{
    MinMaxScalerParams, NearestCentroidParams, OneHotEncoderParams, TrainingParameters,
};

const COLUMNS: &[(&str, DataType)] = &[
    ("width", DataType::Numerical),
    ("color", DataType::Categorical),
    ("species", DataType::Categorical),
];

/// Two well separated species, 40 rows each
fn table(delimiter: char) -> String {
    let mut text = format!("species{delimiter}width{delimiter}color\n");
    for i in 0..40_u32 {
        let jitter = f64::from(i % 5) * 0.1;
        writeln!(text, "setosa{delimiter}{}{delimiter}red", 1.0 + jitter).unwrap();
        writeln!(text, "virginica{delimiter}{}{delimiter}blue", 9.0 + jitter).unwrap();
    }
    text
}

fn fit_and_validate(path: &std::path::Path, format: &TabularFormat) -> f64 {
    let ctx = Context::new(Config::default()).unwrap();
    let df = parse_file(path, format, COLUMNS, Some("species")).unwrap();
    assert_eq!(df.len(), 80);

    let parts = split(&df, 0.75, 11).unwrap();
    let (mut train, mut test) = (parts.train, parts.test);
    assert_eq!(train.len(), 60);

    let mut pipeline = Pipeline::builder(&ctx, "Species")
        .preprocess(TrainingParameters::OneHotEncoder(OneHotEncoderParams::default()))
        .preprocess(TrainingParameters::MinMaxScaler(MinMaxScalerParams::default()))
        .estimator(TrainingParameters::NearestCentroid(NearestCentroidParams::default()))
        .build()
        .unwrap();
    pipeline.fit(&mut train).unwrap();

    match pipeline.validate(&mut test).unwrap() {
        ValidationMetrics::Classification(metrics) => {
            assert_eq!(metrics.count, 20);
            metrics.accuracy
        }
        other => panic!("expected classification metrics, got {other:?}"),
    }
}

#[test]
fn test_tsv_file_through_pipeline() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("species.tsv");
    std::fs::write(&path, table('\t')).unwrap();

    let accuracy = fit_and_validate(&path, &TabularFormat::tsv());
    assert!((accuracy - 1.0).abs() < f64::EPSILON);
}

#[test]
fn test_gzip_csv_file_through_pipeline() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("species.csv.gz");
    let mut encoder = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::best());
    encoder.write_all(table(',').as_bytes()).unwrap();
    encoder.finish().unwrap();

    let accuracy = fit_and_validate(&path, &TabularFormat::csv());
    assert!((accuracy - 1.0).abs() < f64::EPSILON);
}

#[test]
fn test_ingested_labels_and_features() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("species.csv");
    std::fs::write(&path, table(',')).unwrap();

    let df = parse_file(&path, &TabularFormat::csv(), COLUMNS, Some("species")).unwrap();
    let label = df.label().unwrap();
    assert_eq!(label.name, "species");
    assert!(!df.schema().contains("species"));

    let first = df.get(0).unwrap();
    assert_eq!(first.y(), Some(&Value::from("setosa")));
    assert_eq!(first.number("width"), Some(1.0));
    assert_eq!(first.feature("color"), Some(&Value::from("red")));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = parse_file(
        dir.path().join("absent.csv"),
        &TabularFormat::csv(),
        COLUMNS,
        None,
    )
    .unwrap_err();
    assert!(matches!(err, trueno_pipeline::Error::Io(_)));
}
