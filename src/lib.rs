//! # Trueno-Pipeline: Fit Once, Replay Anywhere
//!
//! **Version**: 0.1.0
//!
//! Trueno-Pipeline composes independent processing stages (scalers, encoders,
//! feature selectors, estimators) into pipelines that are fit once on a
//! training dataframe and replayed deterministically on new data. Every
//! stage's learned state is durably named, saved, reloaded, and deleted
//! through one keyspace-scoped storage abstraction.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Poka-Yoke safety**: lifecycle state machine rejects transform-before-fit,
//!   double fits, and use after close/delete with typed errors
//! - **Jidoka**: storage engine equivalence tests (in-memory == persistent)
//! - **Genchi Genbutsu**: parameters come only from the training dataframe;
//!   replay is a pure function of them
//! - **Muda elimination**: lazy-loaded persistent pages, per-keyspace locking
//!
//! ## Example Usage
//!
//! ```rust
//! use trueno_pipeline::config::Config;
//! use trueno_pipeline::context::Context;
//! use trueno_pipeline::dataframe::{DataType, Dataframe, Record, Schema};
//! use trueno_pipeline::pipeline::Pipeline;
//! use trueno_pipeline::split::split;
//! use trueno_pipeline::stage::{MinMaxScalerParams, NearestCentroidParams, StageType, TrainingParameters};
//!
//! # fn example() -> trueno_pipeline::Result<()> {
//! let ctx = Context::new(Config::default())?;
//!
//! let schema = Schema::new([("x", DataType::Numerical)])?;
//! let mut df = Dataframe::new(schema).with_label("class", DataType::Categorical);
//! for i in 0..20 {
//!     let label = if i < 10 { "low" } else { "high" };
//!     df.add(Record::default().with_feature("x", f64::from(i)).with_label(label))?;
//! }
//!
//! let parts = split(&df, 0.8, 1)?;
//! let (mut train, mut test) = (parts.train, parts.test);
//!
//! let mut pipeline = Pipeline::builder(&ctx, "Demo")
//!     .preprocess(TrainingParameters::MinMaxScaler(MinMaxScalerParams::default()))
//!     .estimator(TrainingParameters::NearestCentroid(NearestCentroidParams::default()))
//!     .build()?;
//! pipeline.fit(&mut train)?;
//! pipeline.save("Demo")?;
//! pipeline.close()?;
//!
//! let restored = Pipeline::load(&ctx, "Demo", &[StageType::MinMaxScaler], StageType::NearestCentroid)?;
//! restored.predict(&mut test)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod context;
pub mod dataframe;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod split;
pub mod stage;
pub mod storage;

pub use error::{Error, Result};
