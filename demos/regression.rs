//! Regression: NLMS with Label Scaling
//!
//! Fits a min-max scaler that also scales the target, then an NLMS linear
//! model on the scaled data. Predictions are mapped back to the original units
//! with `denormalize` before reporting error metrics.
//!
//! Run with: cargo run --example regression

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;
use trueno_pipeline::config::Config;
use trueno_pipeline::context::Context;
use trueno_pipeline::dataframe::{DataType, Dataframe, Record, Schema};
use trueno_pipeline::metrics::{Task, ValidationMetrics};
use trueno_pipeline::pipeline::Pipeline;
use trueno_pipeline::split::split;
use trueno_pipeline::stage::{LearnedState, MinMaxScalerParams, NlmsParams, TrainingParameters};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("=== Trueno-Pipeline NLMS Regression ===\n");
    println!("Target: price = 3.0 * rooms + 0.05 * area - 2.0 * age_decades + noise\n");

    let ctx = Context::new(Config::default())?;
    let df = houses(500)?;
    let parts = split(&df, 0.8, 99)?;
    let (mut train, mut test) = (parts.train, parts.test);

    let mut pipeline = Pipeline::builder(&ctx, "Houses")
        .preprocess(TrainingParameters::MinMaxScaler(
            MinMaxScalerParams::default().with_scale_y(true),
        ))
        .estimator(TrainingParameters::Nlms(
            NlmsParams::default().with_learning_rate(0.2).with_epochs(200),
        ))
        .build()?;
    pipeline.fit(&mut train)?;

    if let Some(LearnedState::Nlms(state)) = pipeline.estimator().learned() {
        println!("Learned weights (scaled space):");
        for (column, weight) in state.weights() {
            println!("  {column:<12} {weight:+.4}");
        }
        println!("  {:<12} {:+.4}", "bias", state.bias());
    }

    pipeline.predict(&mut test)?;
    pipeline.denormalize(&mut test)?;
    for (id, record) in test.iter().take(5) {
        println!(
            "  record {id:>3}: price {:>8} predicted {:>8}",
            record.y().map(ToString::to_string).unwrap_or_default(),
            record.y_predicted().map(ToString::to_string).unwrap_or_default(),
        );
    }

    if let ValidationMetrics::Regression(m) = ValidationMetrics::compute(Task::Regression, &test)? {
        println!("\n=== Held-Out Error (original units) ===");
        println!("  RMSE: {:.3}", m.rmse);
        println!("  MAE:  {:.3}", m.mae);
        println!("  R^2:  {:.3}", m.r_squared);
    }

    Ok(())
}

fn houses(n: usize) -> Result<Dataframe> {
    let schema = Schema::new([
        ("rooms", DataType::Ordinal),
        ("area", DataType::Numerical),
        ("age_decades", DataType::Numerical),
    ])?;
    let mut df = Dataframe::new(schema).with_label("price", DataType::Numerical);
    let mut rng = StdRng::seed_from_u64(5);

    for _ in 0..n {
        let rooms = f64::from(rng.gen_range(1_u32..7));
        let area: f64 = rng.gen_range(30.0..250.0);
        let age: f64 = rng.gen_range(0.0..8.0);
        let price = 3.0f64.mul_add(rooms, 0.05f64.mul_add(area, -2.0 * age)) + rng.gen_range(-0.5..0.5);
        df.add(
            Record::default()
                .with_feature("rooms", rooms)
                .with_feature("area", area)
                .with_feature("age_decades", age)
                .with_label(price),
        )?;
    }
    Ok(df)
}
