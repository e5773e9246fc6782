//! Classification: Fit Once, Replay After Restart
//!
//! Builds a synthetic three-species flower table, fits a
//! one-hot encoder -> min-max scaler -> variance selector -> nearest centroid
//! pipeline on 80% of it, persists the fitted stages to disk, drops every
//! in-memory handle, and replays the reloaded pipeline on the held-out 20%.
//!
//! Run with: cargo run --example classification
//! Verbose:  RUST_LOG=trueno_pipeline=debug cargo run --example classification

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;
use trueno_pipeline::config::{Config, StorageConfig};
use trueno_pipeline::context::Context;
use trueno_pipeline::dataframe::{DataType, Dataframe, Record, Schema};
use trueno_pipeline::metrics::ValidationMetrics;
use trueno_pipeline::pipeline::Pipeline;
use trueno_pipeline::registry::ModelRegistry;
use trueno_pipeline::split::Splitter;
use trueno_pipeline::stage::{
    MinMaxScalerParams, NearestCentroidParams, OneHotEncoderParams, StageType,
    TrainingParameters, VarianceSelectorParams,
};

const PREPROCESSING: [StageType; 3] = [
    StageType::OneHotEncoder,
    StageType::MinMaxScaler,
    StageType::VarianceSelector,
];

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("=== Trueno-Pipeline Classification ===\n");

    let dir = tempfile::tempdir()?;
    let config = Config::builder()
        .storage(StorageConfig::persistent(dir.path()))
        .random_seed(2024)
        .build()?;
    let ctx = Context::new(config.clone())?;

    let df = flowers(300)?;
    let mut parts = Splitter::new(&ctx).split(&df, 0.8)?;
    println!("Records: {} (train {}, test {})", df.len(), parts.train.len(), parts.test.len());

    let mut pipeline = Pipeline::builder(&ctx, "Flowers")
        .preprocess(TrainingParameters::OneHotEncoder(OneHotEncoderParams::default()))
        .preprocess(TrainingParameters::MinMaxScaler(MinMaxScalerParams::default()))
        .preprocess(TrainingParameters::VarianceSelector(
            VarianceSelectorParams::default(),
        ))
        .estimator(TrainingParameters::NearestCentroid(NearestCentroidParams::default()))
        .build()?;
    pipeline.fit(&mut parts.train)?;
    println!("Fitted {} stages", pipeline.len());

    let metrics = pipeline.validate(&mut parts.test.copy())?;
    pipeline.estimator_mut().set_validation_metrics(metrics);
    pipeline.save("Flowers")?;
    pipeline.close()?;
    drop(pipeline);
    drop(ctx);

    println!("\n=== After Restart ===");
    let ctx = Context::new(config)?;
    let registry = ModelRegistry::new(&ctx);
    println!("Saved models: {:?}", registry.models()?);
    println!("Stages of 'Flowers': {:?}", registry.saved_stages("Flowers")?);

    let restored = Pipeline::load(&ctx, "Flowers", &PREPROCESSING, StageType::NearestCentroid)?;
    let mut test = parts.test;
    restored.predict(&mut test)?;
    for (id, record) in test.iter().take(5) {
        println!(
            "  record {id:>3}: true {:<10} predicted {}",
            record.y().map(ToString::to_string).unwrap_or_default(),
            record.y_predicted().map(ToString::to_string).unwrap_or_default(),
        );
    }

    if let Some(ValidationMetrics::Classification(m)) = restored.estimator().validation_metrics() {
        println!("\nAccuracy:  {:.3}", m.accuracy);
        println!("Macro F1:  {:.3}", m.macro_f1);
        for class in &m.classes {
            println!(
                "  {:<10} precision {:.3} recall {:.3} support {}",
                class.label.to_string(),
                class.precision,
                class.recall,
                class.support
            );
        }
    }

    Ok(())
}

/// Three species separated on petal size, with a weakly informative color
fn flowers(n: usize) -> Result<Dataframe> {
    let schema = Schema::new([
        ("petal_length", DataType::Numerical),
        ("petal_width", DataType::Numerical),
        ("sepal_length", DataType::Numerical),
        ("color", DataType::Categorical),
        ("cultivated", DataType::Boolean),
    ])?;
    let mut df = Dataframe::new(schema).with_label("species", DataType::Categorical);
    let mut rng = StdRng::seed_from_u64(7);
    let species = [
        ("setosa", 1.4, 0.2, "white"),
        ("versicolor", 4.3, 1.3, "violet"),
        ("virginica", 5.6, 2.0, "violet"),
    ];

    for i in 0..n {
        let (name, length, width, color) = species[i % species.len()];
        df.add(
            Record::default()
                .with_feature("petal_length", length + rng.gen_range(-0.4..0.4))
                .with_feature("petal_width", width + rng.gen_range(-0.2..0.2))
                .with_feature("sepal_length", rng.gen_range(4.5..7.5))
                .with_feature("color", color)
                .with_feature("cultivated", true)
                .with_label(name),
        )?;
    }
    Ok(df)
}
