//! Comprehensive property-based tests for trueno-pipeline
//!
//! Following ruchy/trueno/aprender pattern:
//! - Test mathematical invariants
//! - Test data integrity properties
//! - Run with ProptestConfig::with_cases(100)
//! - Must complete in <30 seconds for pre-commit hook

use proptest::prelude::*;
use std::collections::BTreeSet;
use trueno_pipeline::config::Config;
use trueno_pipeline::context::Context;
use trueno_pipeline::dataframe::{DataType, Dataframe, Record, Schema};
use trueno_pipeline::split::split;
use trueno_pipeline::stage::{
    KMeansParams, MinMaxScalerParams, NearestCentroidParams, Stage, StageType, TrainingParameters,
};

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Generate (a, b) feature rows
fn arb_rows(max: usize) -> impl Strategy<Value = Vec<(f64, f64)>> {
    proptest::collection::vec((-1000.0f64..1000.0, -1000.0f64..1000.0), 1..max)
}

/// Generate rows with a two-class label
fn arb_labelled_rows(max: usize) -> impl Strategy<Value = Vec<(f64, f64, bool)>> {
    proptest::collection::vec((-100.0f64..100.0, -100.0f64..100.0, any::<bool>()), 2..max)
}

fn frame(rows: &[(f64, f64)]) -> Dataframe {
    let schema = Schema::new([("a", DataType::Numerical), ("b", DataType::Numerical)]).unwrap();
    let mut df = Dataframe::new(schema);
    for &(a, b) in rows {
        df.add(Record::default().with_feature("a", a).with_feature("b", b))
            .unwrap();
    }
    df
}

fn labelled_frame(rows: &[(f64, f64, bool)]) -> Dataframe {
    let schema = Schema::new([("a", DataType::Numerical), ("b", DataType::Numerical)]).unwrap();
    let mut df = Dataframe::new(schema).with_label("class", DataType::Categorical);
    for &(a, b, positive) in rows {
        let class = if positive { "pos" } else { "neg" };
        df.add(
            Record::default()
                .with_feature("a", a)
                .with_feature("b", b)
                .with_label(class),
        )
        .unwrap();
    }
    df
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * (1.0 + a.abs().max(b.abs()))
}

// ============================================================================
// Property Tests: Split
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: split is a deterministic partition with floor sizing
    #[test]
    fn prop_split_is_deterministic_partition(
        n in 1u32..200,
        fraction in 0.01f64..0.99,
        seed in any::<u64>()
    ) {
        let rows: Vec<(f64, f64)> = (0..n).map(|i| (f64::from(i), 0.0)).collect();
        let df = frame(&rows);

        let first = split(&df, fraction, seed).unwrap();
        let second = split(&df, fraction, seed).unwrap();
        prop_assert_eq!(first.train.ids(), second.train.ids());
        prop_assert_eq!(first.test.ids(), second.test.ids());

        let train: BTreeSet<u64> = first.train.ids().into_iter().collect();
        let test: BTreeSet<u64> = first.test.ids().into_iter().collect();
        prop_assert!(train.is_disjoint(&test));
        let all: BTreeSet<u64> = df.ids().into_iter().collect();
        prop_assert_eq!(&train | &test, all);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let expected = (f64::from(n) * fraction).floor() as usize;
        prop_assert_eq!(train.len(), expected);
        prop_assert_eq!(df.len(), n as usize);
    }

    /// Property: out-of-range fractions are always rejected
    #[test]
    fn prop_split_rejects_fraction_outside_unit_interval(
        fraction in prop_oneof![-10.0f64..=0.0, 1.0f64..10.0]
    ) {
        let df = frame(&[(1.0, 2.0), (3.0, 4.0)]);
        prop_assert!(split(&df, fraction, 7).is_err());
    }
}

// ============================================================================
// Property Tests: Scaling
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: training data scales into [0, 1]
    #[test]
    fn prop_scaled_training_data_in_unit_interval(rows in arb_rows(60)) {
        let ctx = Context::new(Config::default()).unwrap();
        let mut stage = Stage::new(
            &ctx,
            "Prop",
            TrainingParameters::MinMaxScaler(MinMaxScalerParams::default()),
        );
        let mut df = frame(&rows);
        stage.fit_transform(&mut df).unwrap();

        for (_, record) in df.iter() {
            for column in ["a", "b"] {
                let x = record.number(column).unwrap();
                prop_assert!((0.0..=1.0).contains(&x), "{} = {} outside [0, 1]", column, x);
            }
        }
    }

    /// Property: denormalize(transform(X)) == X
    #[test]
    fn prop_scaler_denormalize_round_trip(
        train in arb_rows(40),
        probe in arb_rows(40)
    ) {
        let ctx = Context::new(Config::default()).unwrap();
        let mut stage = Stage::new(
            &ctx,
            "Prop",
            TrainingParameters::MinMaxScaler(MinMaxScalerParams::default()),
        );
        stage.fit(&frame(&train)).unwrap();

        let original = frame(&probe);
        let mut df = original.copy();
        stage.transform(&mut df).unwrap();
        stage.denormalize(&mut df).unwrap();

        for (id, record) in df.iter() {
            let source = original.get(id).unwrap();
            for column in ["a", "b"] {
                let (got, want) = (record.number(column).unwrap(), source.number(column).unwrap());
                prop_assert!(close(got, want), "{}: {} != {}", column, got, want);
            }
        }
    }
}

// ============================================================================
// Property Tests: Persistence
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: a saved-then-loaded classifier replays bit-identically
    #[test]
    fn prop_save_load_replay_identical(rows in arb_labelled_rows(40)) {
        let ctx = Context::new(Config::default()).unwrap();
        let train = labelled_frame(&rows);
        let mut stage = Stage::new(
            &ctx,
            "Replay",
            TrainingParameters::NearestCentroid(NearestCentroidParams::default()),
        );
        stage.fit(&train).unwrap();
        stage.save("Replay").unwrap();
        stage.close().unwrap();

        let loaded = Stage::load(&ctx, StageType::NearestCentroid, "Replay").unwrap();
        let mut fresh = Stage::new(
            &ctx,
            "Fresh",
            TrainingParameters::NearestCentroid(NearestCentroidParams::default()),
        );
        fresh.fit(&train).unwrap();

        let mut a = train.copy();
        let mut b = train.copy();
        loaded.predict(&mut a).unwrap();
        fresh.predict(&mut b).unwrap();
        for ((_, x), (_, y)) in a.iter().zip(b.iter()) {
            prop_assert_eq!(x.y_predicted(), y.y_predicted());
            let px: Vec<u64> = x.probabilities().unwrap().values().map(|p| p.to_bits()).collect();
            let py: Vec<u64> = y.probabilities().unwrap().values().map(|p| p.to_bits()).collect();
            prop_assert_eq!(px, py);
        }
    }

    /// Property: k-means fits are a pure function of (data, seed, model name)
    #[test]
    fn prop_kmeans_reproducible_for_fixed_seed(rows in arb_rows(40), seed in any::<u64>()) {
        let df = frame(&rows);
        let fit = || {
            let ctx = Context::new(Config::builder().random_seed(seed).build().unwrap()).unwrap();
            let mut stage = Stage::new(
                &ctx,
                "Clusters",
                TrainingParameters::KMeans(KMeansParams::default().with_k(1)),
            );
            stage.fit(&df).unwrap();
            stage.learned().cloned()
        };
        prop_assert_eq!(fit(), fit());
    }
}
