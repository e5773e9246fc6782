//! Stage - the unit of the fit/transform/predict lifecycle
//!
//! A stage is one of a closed set of tagged variants ([`StageType`]) driven
//! through a single state machine:
//!
//! ```text
//!            fit                save             close
//! Unfitted ───────> Fitted ─────────> Saved ─────────> Closed
//!                     │                                  │ reload / Stage::load
//!                     └──── close (discards) ───> Closed ▼
//!                                                      Loaded ──> ...
//!
//! any state ── delete ──> Deleted (terminal)
//! ```
//!
//! Learned parameters come only from the dataframe passed to `fit`; every
//! later `transform`/`predict` is a pure function of those parameters and its
//! input.
//!
//! # Example
//!
//! ```rust
//! use trueno_pipeline::config::Config;
//! use trueno_pipeline::context::Context;
//! use trueno_pipeline::dataframe::{DataType, Dataframe, Record, Schema};
//! use trueno_pipeline::stage::{MinMaxScalerParams, Stage, StageType, TrainingParameters};
//!
//! # fn example() -> trueno_pipeline::Result<()> {
//! let ctx = Context::new(Config::default())?;
//! let mut train = Dataframe::new(Schema::new([("x", DataType::Numerical)])?);
//! train.add(Record::default().with_feature("x", 10.0))?;
//! train.add(Record::default().with_feature("x", 20.0))?;
//!
//! let mut scaler = Stage::new(&ctx, "demo", TrainingParameters::MinMaxScaler(MinMaxScalerParams::default()));
//! scaler.fit_transform(&mut train)?;
//! scaler.save("demo")?;
//! scaler.close()?;
//!
//! let reloaded = Stage::load(&ctx, StageType::MinMaxScaler, "demo")?;
//! let mut test = Dataframe::new(Schema::new([("x", DataType::Numerical)])?);
//! test.add(Record::default().with_feature("x", 15.0))?;
//! reloaded.transform(&mut test)?;
//! assert_eq!(test.get(0).and_then(|r| r.number("x")), Some(0.5));
//! # Ok(())
//! # }
//! ```

mod centroid;
mod encoder;
mod features;
mod kmeans;
mod nlms;
mod scaler;
mod selector;

pub use centroid::{Distance, NearestCentroidParams, NearestCentroidState};
pub use encoder::{OneHotEncoderParams, OneHotEncoderState};
pub use kmeans::{Initialization, KMeansParams, KMeansState};
pub use nlms::{NlmsParams, NlmsState};
pub use scaler::{MinMaxScalerParams, MinMaxScalerState};
pub use selector::{VarianceSelectorParams, VarianceSelectorState};

use crate::context::{Context, Executor, RngContext};
use crate::dataframe::{Dataframe, LabelColumn, Schema};
use crate::metrics::{Task, ValidationMetrics};
use crate::registry;
use crate::storage::Keyspace;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, info_span, warn};

/// Storage key of the stage manifest
const MANIFEST_KEY: &str = "manifest";
/// Storage key of the training parameters
const PARAMETERS_KEY: &str = "parameters";
/// Storage key of the learned state
const LEARNED_KEY: &str = "learned";
/// Storage key of the stored validation metrics
const METRICS_KEY: &str = "metrics";

/// Stage variant identity. Together with a model name it names a keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StageType {
    /// Per-column min/max normalization
    MinMaxScaler,
    /// Dummy (one-hot) encoding of categorical columns
    OneHotEncoder,
    /// Drop low-variance numeric columns
    VarianceSelector,
    /// Nearest-centroid classifier
    NearestCentroid,
    /// Normalized least-mean-squares regressor
    Nlms,
    /// K-means clusterer
    KMeans,
}

/// What role a stage plays in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Rescales numeric columns
    Scaler,
    /// Rewrites categorical columns
    Encoder,
    /// Removes columns
    FeatureSelector,
    /// Predicts labels; always last in a pipeline
    Estimator,
}

impl StageType {
    /// Every stage type, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::MinMaxScaler,
        Self::OneHotEncoder,
        Self::VarianceSelector,
        Self::NearestCentroid,
        Self::Nlms,
        Self::KMeans,
    ];

    /// Get stage type name as string (used in keyspace names)
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MinMaxScaler => "min_max_scaler",
            Self::OneHotEncoder => "one_hot_encoder",
            Self::VarianceSelector => "variance_selector",
            Self::NearestCentroid => "nearest_centroid",
            Self::Nlms => "nlms",
            Self::KMeans => "k_means",
        }
    }

    /// Pipeline role of this stage type.
    #[must_use]
    pub const fn kind(&self) -> StageKind {
        match self {
            Self::MinMaxScaler => StageKind::Scaler,
            Self::OneHotEncoder => StageKind::Encoder,
            Self::VarianceSelector => StageKind::FeatureSelector,
            Self::NearestCentroid | Self::Nlms | Self::KMeans => StageKind::Estimator,
        }
    }

    /// Whether this stage predicts rather than transforms.
    #[must_use]
    pub const fn is_estimator(&self) -> bool {
        matches!(self.kind(), StageKind::Estimator)
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable, stage-specific configuration. The variant selects the stage type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrainingParameters {
    /// See [`MinMaxScalerParams`]
    MinMaxScaler(MinMaxScalerParams),
    /// See [`OneHotEncoderParams`]
    OneHotEncoder(OneHotEncoderParams),
    /// See [`VarianceSelectorParams`]
    VarianceSelector(VarianceSelectorParams),
    /// See [`NearestCentroidParams`]
    NearestCentroid(NearestCentroidParams),
    /// See [`NlmsParams`]
    Nlms(NlmsParams),
    /// See [`KMeansParams`]
    KMeans(KMeansParams),
}

impl TrainingParameters {
    /// Stage type these parameters configure.
    #[must_use]
    pub const fn stage_type(&self) -> StageType {
        match self {
            Self::MinMaxScaler(_) => StageType::MinMaxScaler,
            Self::OneHotEncoder(_) => StageType::OneHotEncoder,
            Self::VarianceSelector(_) => StageType::VarianceSelector,
            Self::NearestCentroid(_) => StageType::NearestCentroid,
            Self::Nlms(_) => StageType::Nlms,
            Self::KMeans(_) => StageType::KMeans,
        }
    }

    fn fit(&self, df: &Dataframe, env: &FitEnv<'_>) -> Result<LearnedState> {
        Ok(match self {
            Self::MinMaxScaler(p) => LearnedState::MinMaxScaler(scaler::fit(p, df, env)?),
            Self::OneHotEncoder(p) => LearnedState::OneHotEncoder(encoder::fit(p, df)?),
            Self::VarianceSelector(p) => {
                LearnedState::VarianceSelector(selector::fit(p, df, env)?)
            }
            Self::NearestCentroid(p) => {
                LearnedState::NearestCentroid(centroid::fit(p, df, env)?)
            }
            Self::Nlms(p) => LearnedState::Nlms(nlms::fit(p, df)?),
            Self::KMeans(p) => LearnedState::KMeans(kmeans::fit(p, df, env)?),
        })
    }
}

/// Parameters learned by `fit`, one variant per stage type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LearnedState {
    /// See [`MinMaxScalerState`]
    MinMaxScaler(MinMaxScalerState),
    /// See [`OneHotEncoderState`]
    OneHotEncoder(OneHotEncoderState),
    /// See [`VarianceSelectorState`]
    VarianceSelector(VarianceSelectorState),
    /// See [`NearestCentroidState`]
    NearestCentroid(NearestCentroidState),
    /// See [`NlmsState`]
    Nlms(NlmsState),
    /// See [`KMeansState`]
    KMeans(KMeansState),
}

impl LearnedState {
    fn transform(&self, df: &mut Dataframe) -> Result<()> {
        match self {
            Self::MinMaxScaler(s) => {
                s.transform(df);
                Ok(())
            }
            Self::OneHotEncoder(s) => s.transform(df),
            Self::VarianceSelector(s) => s.transform(df),
            Self::NearestCentroid(_) | Self::Nlms(_) | Self::KMeans(_) => Err(
                Error::InvalidInput("estimators predict; call predict() instead of transform()".into()),
            ),
        }
    }

    fn predict(&self, df: &mut Dataframe) -> Result<()> {
        match self {
            Self::NearestCentroid(s) => s.predict(df),
            Self::Nlms(s) => s.predict(df),
            Self::KMeans(s) => s.predict(df),
            Self::MinMaxScaler(_) | Self::OneHotEncoder(_) | Self::VarianceSelector(_) => Err(
                Error::InvalidInput("only estimators predict; call transform() instead".into()),
            ),
        }
    }
}

/// Inputs a stage's fit may draw on besides the training data.
pub(crate) struct FitEnv<'a> {
    pub(crate) executor: &'a Executor,
    pub(crate) rng: RngContext,
}

/// Fit-time schema plus learned parameters; the unit persisted under `learned`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Learned {
    input_schema: Schema,
    label: Option<LabelColumn>,
    state: LearnedState,
}

/// Written alongside the parameters on every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageManifest {
    /// Stage type that wrote the keyspace
    pub stage_type: StageType,
    /// Model name the stage was saved under
    pub model_name: String,
    /// Crate version that wrote the keyspace
    pub crate_version: String,
    /// Save timestamp
    pub saved_at: DateTime<Utc>,
}

/// Lifecycle state of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, holds no learned state
    Unfitted,
    /// Learned state in memory, not persisted
    Fitted,
    /// Learned state in memory and persisted
    Saved,
    /// In-memory state evicted; persisted state (if any) intact
    Closed,
    /// Learned state restored from storage
    Loaded,
    /// Keyspace purged; terminal
    Deleted,
}

/// Result of [`Stage::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Nothing was lost: the parameters are durable (or there were none)
    Retained,
    /// Fitted parameters were never saved and are gone
    Discarded,
}

/// One fit/transform(/predict) unit bound to a model name and a context.
///
/// Dropping a stage performs the soft release (evicts caches, closes its
/// keyspace handle). Durable state is only ever purged by [`delete`](Self::delete).
#[derive(Debug)]
pub struct Stage {
    ctx: Context,
    model_name: String,
    params: TrainingParameters,
    lifecycle: LifecycleState,
    learned: Option<Learned>,
    validation_metrics: Option<ValidationMetrics>,
    persisted: bool,
}

impl Stage {
    /// Create an unfitted stage for `model_name`.
    #[must_use]
    pub fn new(ctx: &Context, model_name: impl Into<String>, params: TrainingParameters) -> Self {
        Self {
            ctx: ctx.clone(),
            model_name: model_name.into(),
            params,
            lifecycle: LifecycleState::Unfitted,
            learned: None,
            validation_metrics: None,
            persisted: false,
        }
    }

    /// Model name the stage is bound to.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Stage type.
    #[must_use]
    pub const fn stage_type(&self) -> StageType {
        self.params.stage_type()
    }

    /// Training parameters.
    #[must_use]
    pub const fn params(&self) -> &TrainingParameters {
        &self.params
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.lifecycle
    }

    /// Learned parameters, if held in memory.
    #[must_use]
    pub fn learned(&self) -> Option<&LearnedState> {
        self.learned.as_ref().map(|l| &l.state)
    }

    /// Schema the stage was fit on, if held in memory.
    #[must_use]
    pub fn input_schema(&self) -> Option<&Schema> {
        self.learned.as_ref().map(|l| &l.input_schema)
    }

    /// Keyspace owned by this stage.
    #[must_use]
    pub fn keyspace(&self) -> Keyspace {
        registry::keyspace(&self.model_name, self.stage_type())
    }

    /// Whether the in-memory parameters are also durable.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Metrics attached with [`set_validation_metrics`](Self::set_validation_metrics).
    #[must_use]
    pub const fn validation_metrics(&self) -> Option<&ValidationMetrics> {
        self.validation_metrics.as_ref()
    }

    fn identity(&self) -> String {
        format!("{}/{}", self.model_name, self.stage_type())
    }

    fn ensure_not_deleted(&self) -> Result<()> {
        if self.lifecycle == LifecycleState::Deleted {
            return Err(Error::Deleted(self.identity()));
        }
        Ok(())
    }

    fn fitted(&self) -> Result<&Learned> {
        match self.lifecycle {
            LifecycleState::Unfitted => Err(Error::NotFitted(self.identity())),
            LifecycleState::Closed => Err(Error::Closed(self.identity())),
            LifecycleState::Deleted => Err(Error::Deleted(self.identity())),
            LifecycleState::Fitted | LifecycleState::Saved | LifecycleState::Loaded => self
                .learned
                .as_ref()
                .ok_or_else(|| Error::NotFitted(self.identity())),
        }
    }

    /// Learn parameters from the training dataframe. The dataframe is not modified.
    ///
    /// # Errors
    /// Returns `AlreadyFitted` unless the stage is `Unfitted`, `Closed`/`Deleted`
    /// for released stages, or the strategy's error for unusable training data
    pub fn fit(&mut self, train: &Dataframe) -> Result<()> {
        let _span = info_span!("fit", model = %self.model_name, stage = self.stage_type().as_str())
            .entered();
        match self.lifecycle {
            LifecycleState::Unfitted => {}
            LifecycleState::Fitted | LifecycleState::Saved | LifecycleState::Loaded => {
                return Err(Error::AlreadyFitted(self.identity()))
            }
            LifecycleState::Closed => return Err(Error::Closed(self.identity())),
            LifecycleState::Deleted => return Err(Error::Deleted(self.identity())),
        }
        if train.is_empty() {
            return Err(Error::InvalidInput(format!(
                "{}: cannot fit on an empty dataframe",
                self.identity()
            )));
        }

        let env = FitEnv {
            executor: self.ctx.executor(),
            rng: self.ctx.rng().fork(self.keyspace().as_str()),
        };
        let state = self.params.fit(train, &env)?;
        self.learned = Some(Learned {
            input_schema: train.schema().clone(),
            label: train.label().cloned(),
            state,
        });
        self.lifecycle = LifecycleState::Fitted;
        self.persisted = false;
        info!(records = train.len(), "fitted stage");
        Ok(())
    }

    /// Rewrite the dataframe's features with the learned parameters.
    ///
    /// # Errors
    /// Returns `NotFitted`/`Closed`/`Deleted` per lifecycle state,
    /// `SchemaMismatch` for columns unseen at fit time, `InvalidInput` on an estimator
    pub fn transform(&self, df: &mut Dataframe) -> Result<()> {
        let learned = self.fitted()?;
        df.schema().check_subset_of(&learned.input_schema)?;
        learned.state.transform(df)?;
        debug!(model = %self.model_name, stage = self.stage_type().as_str(), records = df.len(), "transformed");
        Ok(())
    }

    /// Fill `y_predicted` (and probabilities) with the learned parameters.
    ///
    /// # Errors
    /// Returns `NotFitted`/`Closed`/`Deleted` per lifecycle state,
    /// `SchemaMismatch` for columns unseen at fit time, `InvalidInput` on a non-estimator
    pub fn predict(&self, df: &mut Dataframe) -> Result<()> {
        let learned = self.fitted()?;
        df.schema().check_subset_of(&learned.input_schema)?;
        learned.state.predict(df)?;
        debug!(model = %self.model_name, stage = self.stage_type().as_str(), records = df.len(), "predicted");
        Ok(())
    }

    /// `fit` then `transform` on the same dataframe.
    ///
    /// # Errors
    /// Returns any error of [`fit`](Self::fit) or [`transform`](Self::transform)
    pub fn fit_transform(&mut self, df: &mut Dataframe) -> Result<()> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Undo a scaler's transform (features, plus `y`/`y_predicted` when Y-scaling).
    ///
    /// # Errors
    /// Returns lifecycle errors, or `InvalidInput` for stages that cannot invert
    pub fn denormalize(&self, df: &mut Dataframe) -> Result<()> {
        match &self.fitted()?.state {
            LearnedState::MinMaxScaler(s) => {
                s.denormalize(df);
                Ok(())
            }
            _ => Err(Error::InvalidInput(format!(
                "{}: only scalers can denormalize",
                self.identity()
            ))),
        }
    }

    /// Predict on `df`, then summarize true vs predicted labels.
    ///
    /// # Errors
    /// Returns any error of [`predict`](Self::predict), or `InvalidInput` if no
    /// record carries both labels
    pub fn validate(&self, df: &mut Dataframe) -> Result<ValidationMetrics> {
        self.predict(df)?;
        let task = match self.stage_type() {
            StageType::NearestCentroid => Task::Classification,
            StageType::Nlms => Task::Regression,
            _ => Task::Clustering,
        };
        ValidationMetrics::compute(task, df)
    }

    /// Attach metrics to the stage; they are persisted by the next `save`.
    pub fn set_validation_metrics(&mut self, metrics: ValidationMetrics) {
        self.validation_metrics = Some(metrics);
    }

    /// Persist parameters under `model_name`, rebinding the stage to that name.
    ///
    /// Saving again under the same name rewrites the same keyspace.
    ///
    /// # Errors
    /// Returns lifecycle errors, or storage errors from the write
    pub fn save(&mut self, model_name: &str) -> Result<()> {
        let _span = info_span!("save", model = %model_name, stage = self.stage_type().as_str())
            .entered();
        let learned = self.fitted()?;

        let keyspace = registry::keyspace(model_name, self.stage_type());
        let manifest = StageManifest {
            stage_type: self.stage_type(),
            model_name: model_name.to_string(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            saved_at: Utc::now(),
        };
        let mut entries = vec![
            (MANIFEST_KEY.to_string(), bincode::serialize(&manifest)?),
            (PARAMETERS_KEY.to_string(), bincode::serialize(&self.params)?),
            (LEARNED_KEY.to_string(), bincode::serialize(learned)?),
        ];
        if let Some(metrics) = &self.validation_metrics {
            entries.push((METRICS_KEY.to_string(), bincode::serialize(metrics)?));
        }

        let storage = self.ctx.storage();
        storage.put_many(&keyspace, entries)?;
        if self.validation_metrics.is_none() {
            storage.remove(&keyspace, METRICS_KEY)?;
        }

        self.model_name = model_name.to_string();
        self.lifecycle = LifecycleState::Saved;
        self.persisted = true;
        info!(keyspace = %keyspace, "saved stage");
        Ok(())
    }

    /// Evict in-memory parameters. Persisted state stays intact.
    ///
    /// Closing a fitted stage that was never saved discards its parameters;
    /// this is reported as [`CloseOutcome::Discarded`]. Closing an `Unfitted`
    /// stage is a no-op.
    ///
    /// # Errors
    /// Returns `Deleted` for a deleted stage, or storage errors from the flush
    pub fn close(&mut self) -> Result<CloseOutcome> {
        self.ensure_not_deleted()?;
        if self.lifecycle == LifecycleState::Unfitted {
            return Ok(CloseOutcome::Retained);
        }
        let outcome = if self.lifecycle == LifecycleState::Fitted && !self.persisted {
            warn!(
                model = %self.model_name,
                stage = self.stage_type().as_str(),
                "closing a fitted stage that was never saved; its parameters are discarded"
            );
            CloseOutcome::Discarded
        } else {
            CloseOutcome::Retained
        };

        self.learned = None;
        if self.persisted {
            self.ctx.storage().close_keyspace(&self.keyspace())?;
        }
        self.lifecycle = LifecycleState::Closed;
        debug!(model = %self.model_name, stage = self.stage_type().as_str(), ?outcome, "closed stage");
        Ok(outcome)
    }

    /// Restore parameters of a closed (or unfitted) stage from its own keyspace.
    ///
    /// # Errors
    /// Returns `NotFound` if nothing is persisted, `AlreadyFitted` if the stage
    /// holds parameters, `Deleted` for a deleted stage
    pub fn reload(&mut self) -> Result<()> {
        match self.lifecycle {
            LifecycleState::Closed | LifecycleState::Unfitted => {}
            LifecycleState::Fitted | LifecycleState::Saved | LifecycleState::Loaded => {
                return Err(Error::AlreadyFitted(self.identity()))
            }
            LifecycleState::Deleted => return Err(Error::Deleted(self.identity())),
        }
        let loaded = Self::load(&self.ctx, self.stage_type(), &self.model_name)?;
        self.params = loaded.params.clone();
        self.learned = loaded.learned.clone();
        self.validation_metrics = loaded.validation_metrics.clone();
        self.lifecycle = LifecycleState::Loaded;
        self.persisted = true;
        Ok(())
    }

    /// Reconstruct a stage from the keyspace of `(model_name, stage_type)`.
    ///
    /// # Errors
    /// Returns `NotFound` if the keyspace is absent, `StageTypeMismatch` if it
    /// was written by another stage type, storage errors for unreadable pages
    pub fn load(ctx: &Context, stage_type: StageType, model_name: &str) -> Result<Self> {
        let _span = info_span!("load", model = %model_name, stage = stage_type.as_str()).entered();
        let keyspace = registry::keyspace(model_name, stage_type);
        let storage = ctx.storage();

        let manifest: StageManifest = match storage.get(&keyspace, MANIFEST_KEY)? {
            Some(bytes) => bincode::deserialize(&bytes)?,
            None => {
                return Err(Error::NotFound(format!(
                    "{model_name}/{stage_type} (keyspace {keyspace})"
                )))
            }
        };
        if manifest.stage_type != stage_type {
            return Err(Error::StageTypeMismatch {
                expected: stage_type.to_string(),
                found: manifest.stage_type.to_string(),
            });
        }

        let read = |key: &str| -> Result<Vec<u8>> {
            storage.get(&keyspace, key)?.ok_or_else(|| {
                Error::StorageError(format!("keyspace {keyspace} is missing '{key}'"))
            })
        };
        let params: TrainingParameters = bincode::deserialize(&read(PARAMETERS_KEY)?)?;
        let learned: Learned = bincode::deserialize(&read(LEARNED_KEY)?)?;
        if params.stage_type() != stage_type {
            return Err(Error::StageTypeMismatch {
                expected: stage_type.to_string(),
                found: params.stage_type().to_string(),
            });
        }
        let validation_metrics = match storage.get(&keyspace, METRICS_KEY)? {
            Some(bytes) => Some(bincode::deserialize(&bytes)?),
            None => None,
        };

        info!(keyspace = %keyspace, saved_at = %manifest.saved_at, "loaded stage");
        Ok(Self {
            ctx: ctx.clone(),
            model_name: model_name.to_string(),
            params,
            lifecycle: LifecycleState::Loaded,
            learned: Some(learned),
            validation_metrics,
            persisted: true,
        })
    }

    /// Drop in-memory parameters and return to `Unfitted`. Durable state is untouched.
    ///
    /// # Errors
    /// Returns `Deleted` for a deleted stage
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_not_deleted()?;
        self.learned = None;
        self.validation_metrics = None;
        self.persisted = false;
        self.lifecycle = LifecycleState::Unfitted;
        Ok(())
    }

    /// Purge the stage's keyspace. Idempotent; every other operation afterwards
    /// fails with `Deleted`.
    ///
    /// # Errors
    /// Returns storage errors if the keyspace cannot be dropped
    pub fn delete(&mut self) -> Result<()> {
        if self.lifecycle == LifecycleState::Deleted {
            return Ok(());
        }
        let keyspace = self.keyspace();
        self.ctx.storage().drop_keyspace(&keyspace)?;
        self.learned = None;
        self.validation_metrics = None;
        self.persisted = false;
        self.lifecycle = LifecycleState::Deleted;
        info!(keyspace = %keyspace, "deleted stage");
        Ok(())
    }

    /// Alias of [`delete`](Self::delete).
    ///
    /// # Errors
    /// Returns storage errors if the keyspace cannot be dropped
    pub fn erase(&mut self) -> Result<()> {
        self.delete()
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        if self.persisted && self.lifecycle != LifecycleState::Deleted {
            if let Err(e) = self.ctx.storage().close_keyspace(&self.keyspace()) {
                debug!(error = %e, "failed to release keyspace on drop");
            }
        }
    }
}
