//! Nearest-centroid classifier
//!
//! Fit averages the feature vectors of each class; predict assigns the class
//! of the closest centroid and reports a softmax over negated distances as
//! class probabilities.

use super::{features, FitEnv};
use crate::dataframe::{DataType, Dataframe, Value};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Distance used to compare a record with a centroid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    /// Squared Euclidean distance
    #[default]
    Euclidean,
    /// L1 distance
    Manhattan,
}

impl Distance {
    fn between(self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Self::Euclidean => features::squared_euclidean(a, b),
            Self::Manhattan => features::manhattan(a, b),
        }
    }
}

/// Nearest-centroid parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearestCentroidParams {
    /// Distance metric
    pub distance: Distance,
}

impl NearestCentroidParams {
    /// Set the distance metric
    #[must_use]
    pub const fn with_distance(mut self, distance: Distance) -> Self {
        self.distance = distance;
        self
    }
}

/// Learned class centroids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestCentroidState {
    distance: Distance,
    columns: Vec<String>,
    classes: Vec<Value>,
    centroids: Vec<Vec<f64>>,
}

impl NearestCentroidState {
    /// Feature columns the centroids are expressed in.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Centroid of a class.
    #[must_use]
    pub fn centroid(&self, class: &Value) -> Option<&[f64]> {
        self.classes
            .iter()
            .position(|c| c == class)
            .map(|i| self.centroids[i].as_slice())
    }

    /// Classes in sorted order.
    #[must_use]
    pub fn classes(&self) -> &[Value] {
        &self.classes
    }

    pub(super) fn predict(&self, df: &mut Dataframe) -> Result<()> {
        for record in df.records_mut() {
            let x = features::vector(record, &self.columns);
            let distances: Vec<f64> = self
                .centroids
                .iter()
                .map(|c| self.distance.between(&x, c))
                .collect();
            let best = features::argmin(&distances);
            record.set_y_predicted(Some(self.classes[best].clone()));
            record.set_probabilities(Some(features::distance_probabilities(
                self.classes.iter().cloned(),
                &distances,
            )));
        }
        Ok(())
    }
}

pub(super) fn fit(
    params: &NearestCentroidParams,
    df: &Dataframe,
    env: &FitEnv<'_>,
) -> Result<NearestCentroidState> {
    match df.label() {
        None => {
            return Err(Error::InvalidInput(
                "nearest centroid needs a label column".to_string(),
            ))
        }
        Some(label) if label.data_type == DataType::Numerical => {
            return Err(Error::InvalidInput(format!(
                "nearest centroid needs a categorical, boolean or ordinal label, '{}' is numerical",
                label.name
            )))
        }
        Some(_) => {}
    }

    let columns = features::model_columns(df.schema());
    features::require_columns(&columns, "nearest centroid")?;
    let rows = features::labelled_rows(df.records(), &columns);
    if rows.is_empty() {
        return Err(Error::InvalidInput(
            "nearest centroid needs at least one labelled record".to_string(),
        ));
    }

    let mut members: BTreeMap<Value, Vec<usize>> = BTreeMap::new();
    for (i, (_, class)) in rows.iter().enumerate() {
        members.entry(class.clone()).or_default().push(i);
    }
    let (classes, groups): (Vec<Value>, Vec<Vec<usize>>) = members.into_iter().unzip();

    let dims = columns.len();
    let centroids = env.executor.map(groups, |group| {
        let mut sum = vec![0.0; dims];
        for &i in &group {
            for (s, x) in sum.iter_mut().zip(&rows[i].0) {
                *s += x;
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let n = group.len() as f64;
        sum.into_iter().map(|s| s / n).collect::<Vec<f64>>()
    });

    Ok(NearestCentroidState {
        distance: params.distance,
        columns,
        classes,
        centroids,
    })
}
