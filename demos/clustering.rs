//! Clustering: Reproducible K-Means
//!
//! Fits k-means twice from the same context seed and shows the centroids are
//! identical, then scores the clusters against the hidden source labels.
//!
//! Run with: cargo run --example clustering

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;
use trueno_pipeline::config::Config;
use trueno_pipeline::context::Context;
use trueno_pipeline::dataframe::{DataType, Dataframe, Record, Schema};
use trueno_pipeline::metrics::ValidationMetrics;
use trueno_pipeline::stage::{
    Initialization, KMeansParams, LearnedState, MinMaxScalerParams, Stage, TrainingParameters,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("=== Trueno-Pipeline K-Means Clustering ===\n");

    let config = Config::builder().random_seed(42).build()?;
    let ctx = Context::new(config.clone())?;
    let params = KMeansParams::default()
        .with_k(3)
        .with_initialization(Initialization::FurthestFirst);

    let mut df = blobs(600)?;
    let mut scaler = Stage::new(
        &ctx,
        "Blobs",
        TrainingParameters::MinMaxScaler(MinMaxScalerParams::default()),
    );
    scaler.fit_transform(&mut df)?;

    let mut first = Stage::new(&ctx, "Blobs", TrainingParameters::KMeans(params.clone()));
    first.fit(&df)?;

    let replay_ctx = Context::new(config)?;
    let mut second = Stage::new(&replay_ctx, "Blobs", TrainingParameters::KMeans(params));
    second.fit(&df)?;

    if let Some(LearnedState::KMeans(state)) = first.learned() {
        println!("Converged after {} iterations", state.iterations());
        for (i, centroid) in state.centroids().iter().enumerate() {
            println!("  centroid {i}: [{:.3}, {:.3}]", centroid[0], centroid[1]);
        }
    }
    println!(
        "Same seed, same centroids: {}",
        first.learned() == second.learned()
    );

    println!("\n=== Cluster Quality ===");
    if let ValidationMetrics::Clustering(m) = first.validate(&mut df)? {
        for (cluster, size) in &m.cluster_sizes {
            println!("  cluster {cluster}: {size} records");
        }
        if let Some(purity) = m.purity {
            println!("  purity against source labels: {purity:.3}");
        }
    }

    Ok(())
}

/// Three gaussian-ish blobs labelled by source
fn blobs(n: usize) -> Result<Dataframe> {
    let schema = Schema::new([("x", DataType::Numerical), ("y", DataType::Numerical)])?;
    let mut df = Dataframe::new(schema).with_label("source", DataType::Categorical);
    let mut rng = StdRng::seed_from_u64(11);
    let centers = [("north", 0.0, 10.0), ("east", 10.0, 0.0), ("west", -10.0, 0.0)];

    for i in 0..n {
        let (name, cx, cy) = centers[i % centers.len()];
        let noise: f64 = rng.gen_range(-1.5..1.5) + rng.gen_range(-1.5..1.5);
        df.add(
            Record::default()
                .with_feature("x", cx + noise)
                .with_feature("y", cy + rng.gen_range(-2.0..2.0))
                .with_label(name),
        )?;
    }
    Ok(df)
}
