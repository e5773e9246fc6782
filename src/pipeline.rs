//! Pipeline - ordered preprocessing stages followed by exactly one estimator
//!
//! Every stage of a pipeline shares one model name and one context, so the
//! whole fitted pipeline can be rebuilt by name later. Stages run strictly in
//! sequence and execution stops at the first failing stage; state persisted by
//! earlier stages is not rolled back.
//!
//! ```rust
//! use trueno_pipeline::config::Config;
//! use trueno_pipeline::context::Context;
//! use trueno_pipeline::pipeline::Pipeline;
//! use trueno_pipeline::stage::{MinMaxScalerParams, NlmsParams, TrainingParameters};
//!
//! # fn example() -> trueno_pipeline::Result<()> {
//! let ctx = Context::new(Config::default())?;
//! let pipeline = Pipeline::builder(&ctx, "housing")
//!     .preprocess(TrainingParameters::MinMaxScaler(MinMaxScalerParams::default()))
//!     .estimator(TrainingParameters::Nlms(NlmsParams::default()))
//!     .build()?;
//! assert_eq!(pipeline.len(), 2);
//! # Ok(())
//! # }
//! ```

use crate::context::Context;
use crate::dataframe::Dataframe;
use crate::metrics::ValidationMetrics;
use crate::stage::{CloseOutcome, Stage, StageType, TrainingParameters};
use crate::{Error, Result};
use std::collections::BTreeSet;
use tracing::{info, info_span};

fn check_layout(preprocessing: &[StageType], estimator: Option<StageType>) -> Result<()> {
    let Some(estimator) = estimator else {
        return Err(Error::InvalidPipeline(
            "a pipeline needs exactly one estimator".to_string(),
        ));
    };
    if !estimator.is_estimator() {
        return Err(Error::InvalidPipeline(format!(
            "{estimator} is not an estimator"
        )));
    }
    if let Some(t) = preprocessing.iter().find(|t| t.is_estimator()) {
        return Err(Error::InvalidPipeline(format!(
            "estimator {t} cannot be a preprocessing stage"
        )));
    }
    let mut seen = BTreeSet::new();
    for t in preprocessing.iter().chain(std::iter::once(&estimator)) {
        if !seen.insert(*t) {
            return Err(Error::InvalidPipeline(format!(
                "stage type {t} appears twice; its keyspaces would collide"
            )));
        }
    }
    Ok(())
}

/// Pipeline builder
#[derive(Debug)]
pub struct PipelineBuilder {
    ctx: Context,
    model_name: String,
    preprocessing: Vec<TrainingParameters>,
    estimator: Option<TrainingParameters>,
}

impl PipelineBuilder {
    /// Append a preprocessing stage
    #[must_use]
    pub fn preprocess(mut self, params: TrainingParameters) -> Self {
        self.preprocessing.push(params);
        self
    }

    /// Set the estimator
    #[must_use]
    pub fn estimator(mut self, params: TrainingParameters) -> Self {
        self.estimator = Some(params);
        self
    }

    /// Build the pipeline
    ///
    /// # Errors
    ///
    /// Returns `InvalidPipeline` without an estimator, with an estimator in a
    /// preprocessing slot, or with a repeated stage type
    pub fn build(self) -> Result<Pipeline> {
        let types: Vec<StageType> = self
            .preprocessing
            .iter()
            .map(TrainingParameters::stage_type)
            .collect();
        check_layout(&types, self.estimator.as_ref().map(TrainingParameters::stage_type))?;
        let Some(estimator) = self.estimator else {
            return Err(Error::InvalidPipeline(
                "a pipeline needs exactly one estimator".to_string(),
            ));
        };

        Ok(Pipeline {
            preprocessing: self
                .preprocessing
                .into_iter()
                .map(|p| Stage::new(&self.ctx, self.model_name.clone(), p))
                .collect(),
            estimator: Stage::new(&self.ctx, self.model_name.clone(), estimator),
            model_name: self.model_name,
        })
    }
}

/// Preprocessing stages plus one estimator, sharing a model name
#[derive(Debug)]
pub struct Pipeline {
    model_name: String,
    preprocessing: Vec<Stage>,
    estimator: Stage,
}

impl Pipeline {
    /// Start building a pipeline for `model_name`.
    #[must_use]
    pub fn builder(ctx: &Context, model_name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder {
            ctx: ctx.clone(),
            model_name: model_name.into(),
            preprocessing: Vec::new(),
            estimator: None,
        }
    }

    /// Rebuild a saved pipeline from the keyspaces of `model_name`.
    ///
    /// # Errors
    /// Returns `InvalidPipeline` for an invalid layout, otherwise the first
    /// error of [`Stage::load`]
    pub fn load(
        ctx: &Context,
        model_name: &str,
        preprocessing: &[StageType],
        estimator: StageType,
    ) -> Result<Self> {
        check_layout(preprocessing, Some(estimator))?;
        let _span = info_span!("pipeline_load", model = %model_name).entered();
        let preprocessing = preprocessing
            .iter()
            .map(|t| Stage::load(ctx, *t, model_name))
            .collect::<Result<Vec<_>>>()?;
        let estimator = Stage::load(ctx, estimator, model_name)?;
        Ok(Self {
            model_name: model_name.to_string(),
            preprocessing,
            estimator,
        })
    }

    /// Model name shared by every stage.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Number of stages, estimator included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.preprocessing.len() + 1
    }

    /// Always false: a pipeline holds at least its estimator.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Preprocessing stages in execution order.
    #[must_use]
    pub fn preprocessing(&self) -> &[Stage] {
        &self.preprocessing
    }

    /// The estimator.
    #[must_use]
    pub const fn estimator(&self) -> &Stage {
        &self.estimator
    }

    /// Mutable access to the estimator (e.g. to attach validation metrics).
    pub fn estimator_mut(&mut self) -> &mut Stage {
        &mut self.estimator
    }

    /// Every stage in execution order.
    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.preprocessing.iter().chain(std::iter::once(&self.estimator))
    }

    fn stages_mut(&mut self) -> impl Iterator<Item = &mut Stage> {
        self.preprocessing
            .iter_mut()
            .chain(std::iter::once(&mut self.estimator))
    }

    /// `fit_transform` each preprocessing stage on `train`, then fit the estimator.
    ///
    /// # Errors
    /// Returns the first stage error
    pub fn fit(&mut self, train: &mut Dataframe) -> Result<()> {
        let _span = info_span!("pipeline_fit", model = %self.model_name).entered();
        for stage in &mut self.preprocessing {
            stage.fit_transform(train)?;
        }
        self.estimator.fit(train)?;
        info!(stages = self.len(), records = train.len(), "fitted pipeline");
        Ok(())
    }

    /// Apply the preprocessing stages only.
    ///
    /// # Errors
    /// Returns the first stage error
    pub fn transform(&self, df: &mut Dataframe) -> Result<()> {
        for stage in &self.preprocessing {
            stage.transform(df)?;
        }
        Ok(())
    }

    /// Transform with every preprocessing stage, then predict.
    ///
    /// # Errors
    /// Returns the first stage error
    pub fn predict(&self, df: &mut Dataframe) -> Result<()> {
        let _span = info_span!("pipeline_predict", model = %self.model_name).entered();
        self.transform(df)?;
        self.estimator.predict(df)
    }

    /// Undo the scaling stages, last first (features and, when Y-scaling, labels).
    ///
    /// # Errors
    /// Returns the first stage error
    pub fn denormalize(&self, df: &mut Dataframe) -> Result<()> {
        for stage in self.preprocessing.iter().rev() {
            if stage.stage_type() == StageType::MinMaxScaler {
                stage.denormalize(df)?;
            }
        }
        Ok(())
    }

    /// Predict on `test` and summarize against its true labels.
    ///
    /// # Errors
    /// Returns the first stage error, or `InvalidInput` if nothing can be evaluated
    pub fn validate(&self, test: &mut Dataframe) -> Result<ValidationMetrics> {
        self.transform(test)?;
        self.estimator.validate(test)
    }

    /// Save every stage under `model_name`.
    ///
    /// # Errors
    /// Returns the first stage error; stages saved before it stay saved
    pub fn save(&mut self, model_name: &str) -> Result<()> {
        let _span = info_span!("pipeline_save", model = %model_name).entered();
        for stage in self.stages_mut() {
            stage.save(model_name)?;
        }
        self.model_name = model_name.to_string();
        Ok(())
    }

    /// Close every stage. Reports `Discarded` if any stage lost unsaved parameters.
    ///
    /// # Errors
    /// Returns the first stage error
    pub fn close(&mut self) -> Result<CloseOutcome> {
        let mut outcome = CloseOutcome::Retained;
        for stage in self.stages_mut() {
            if stage.close()? == CloseOutcome::Discarded {
                outcome = CloseOutcome::Discarded;
            }
        }
        Ok(outcome)
    }

    /// Reload every closed stage from its keyspace.
    ///
    /// # Errors
    /// Returns the first stage error
    pub fn reload(&mut self) -> Result<()> {
        for stage in self.stages_mut() {
            stage.reload()?;
        }
        Ok(())
    }

    /// Return every stage to `Unfitted`.
    ///
    /// # Errors
    /// Returns `Deleted` if a stage was deleted
    pub fn reset(&mut self) -> Result<()> {
        for stage in self.stages_mut() {
            stage.reset()?;
        }
        Ok(())
    }

    /// Delete every stage's keyspace.
    ///
    /// # Errors
    /// Returns the first stage error
    pub fn delete(&mut self) -> Result<()> {
        let _span = info_span!("pipeline_delete", model = %self.model_name).entered();
        for stage in self.stages_mut() {
            stage.delete()?;
        }
        Ok(())
    }
}
