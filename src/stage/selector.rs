//! Variance feature selector
//!
//! Drops numerical, ordinal and boolean columns whose variance on the training
//! data does not exceed a threshold. Categorical columns always pass through.

use super::FitEnv;
use crate::dataframe::{DataType, Dataframe, Schema, Value};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Variance selector parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VarianceSelectorParams {
    /// Keep a column only if its population variance is strictly greater
    pub threshold: f64,
}

impl VarianceSelectorParams {
    /// Set the variance threshold
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

/// Learned per-column variances and the columns removed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceSelectorState {
    variances: BTreeMap<String, f64>,
    removed: BTreeSet<String>,
}

impl VarianceSelectorState {
    /// Variance observed for a column at fit time.
    #[must_use]
    pub fn variance(&self, column: &str) -> Option<f64> {
        self.variances.get(column).copied()
    }

    /// Columns removed by `transform`.
    pub fn removed(&self) -> impl Iterator<Item = &str> {
        self.removed.iter().map(String::as_str)
    }

    pub(super) fn transform(&self, df: &mut Dataframe) -> Result<()> {
        let schema = Schema::new(
            df.schema()
                .columns()
                .filter(|(name, _)| !self.removed.contains(*name))
                .map(|(name, t)| (name.to_string(), t)),
        )?;
        for record in df.records_mut() {
            for column in &self.removed {
                record.remove_feature(column);
            }
        }
        df.replace_schema(schema);
        Ok(())
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) if !n.is_nan() => Some(*n),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}

pub(super) fn fit(
    params: &VarianceSelectorParams,
    df: &Dataframe,
    env: &FitEnv<'_>,
) -> Result<VarianceSelectorState> {
    if params.threshold.is_nan() || params.threshold < 0.0 {
        return Err(Error::InvalidInput(format!(
            "variance threshold must be >= 0, got {}",
            params.threshold
        )));
    }
    let candidates: Vec<String> = df
        .schema()
        .columns()
        .filter(|(_, t)| t.is_numeric() || *t == DataType::Boolean)
        .map(|(n, _)| n.to_string())
        .collect();

    let variances: BTreeMap<String, f64> = env
        .executor
        .map(candidates, |column| {
            let values: Vec<f64> = df
                .records()
                .filter_map(|r| r.feature(&column).and_then(numeric))
                .collect();
            (column, population_variance(&values))
        })
        .into_iter()
        .collect();
    let removed = variances
        .iter()
        .filter(|(_, v)| **v <= params.threshold)
        .map(|(c, _)| c.clone())
        .collect();

    Ok(VarianceSelectorState { variances, removed })
}
