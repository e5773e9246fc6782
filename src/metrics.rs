//! Validation metrics
//!
//! Summaries of true vs predicted labels over a predicted dataframe. Only
//! records carrying both `y` and `y_predicted` contribute.

use crate::dataframe::{Dataframe, Value};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Learning task an estimator solves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Task {
    /// Discrete labels
    Classification,
    /// Continuous labels
    Regression,
    /// Unsupervised grouping
    Clustering,
}

/// Per-class precision/recall
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// Class label
    pub label: Value,
    /// TP / (TP + FP), 0 when the class is never predicted
    pub precision: f64,
    /// TP / (TP + FN), 0 when the class never occurs
    pub recall: f64,
    /// Harmonic mean of precision and recall
    pub f1: f64,
    /// Records whose true label is this class
    pub support: usize,
}

/// Classification summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    /// Fraction of correct predictions
    pub accuracy: f64,
    /// Unweighted mean of per-class precision
    pub macro_precision: f64,
    /// Unweighted mean of per-class recall
    pub macro_recall: f64,
    /// Unweighted mean of per-class F1
    pub macro_f1: f64,
    /// Per-class breakdown, sorted by label
    pub classes: Vec<ClassMetrics>,
    /// Records evaluated
    pub count: usize,
}

/// Regression summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Root mean squared error
    pub rmse: f64,
    /// Mean absolute error
    pub mae: f64,
    /// Coefficient of determination (`NaN` for a constant target)
    pub r_squared: f64,
    /// Records evaluated
    pub count: usize,
}

/// Clustering summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringMetrics {
    /// Records per predicted cluster, sorted by cluster
    pub cluster_sizes: Vec<(Value, usize)>,
    /// Share of records whose true label is the majority label of their
    /// cluster; `None` when no record is labelled
    pub purity: Option<f64>,
    /// Records evaluated
    pub count: usize,
}

/// Metrics produced by [`Stage::validate`](crate::stage::Stage::validate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationMetrics {
    /// See [`ClassificationMetrics`]
    Classification(ClassificationMetrics),
    /// See [`RegressionMetrics`]
    Regression(RegressionMetrics),
    /// See [`ClusteringMetrics`]
    Clustering(ClusteringMetrics),
}

#[allow(clippy::cast_precision_loss)]
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ValidationMetrics {
    /// Summarize a predicted dataframe for `task`.
    ///
    /// # Errors
    /// Returns `InvalidInput` if no record can be evaluated
    pub fn compute(task: Task, df: &Dataframe) -> Result<Self> {
        match task {
            Task::Classification => classification(df).map(Self::Classification),
            Task::Regression => regression(df).map(Self::Regression),
            Task::Clustering => clustering(df).map(Self::Clustering),
        }
    }

    /// Task these metrics describe.
    #[must_use]
    pub const fn task(&self) -> Task {
        match self {
            Self::Classification(_) => Task::Classification,
            Self::Regression(_) => Task::Regression,
            Self::Clustering(_) => Task::Clustering,
        }
    }

    /// Render as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Other(format!("metrics to JSON: {e}")))
    }
}

fn pairs(df: &Dataframe) -> Vec<(&Value, &Value)> {
    df.records()
        .filter_map(|r| Some((r.y()?, r.y_predicted()?)))
        .collect()
}

fn nothing_to_evaluate() -> Error {
    Error::InvalidInput("no record carries both a label and a prediction".to_string())
}

fn classification(df: &Dataframe) -> Result<ClassificationMetrics> {
    let pairs = pairs(df);
    if pairs.is_empty() {
        return Err(nothing_to_evaluate());
    }
    let labels: BTreeSet<&Value> = pairs.iter().flat_map(|(y, p)| [*y, *p]).collect();

    let classes: Vec<ClassMetrics> = labels
        .into_iter()
        .map(|label| {
            let tp = pairs.iter().filter(|(y, p)| *y == label && *p == label).count();
            let predicted = pairs.iter().filter(|(_, p)| *p == label).count();
            let support = pairs.iter().filter(|(y, _)| *y == label).count();
            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            let f1 = if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            };
            ClassMetrics {
                label: label.clone(),
                precision,
                recall,
                f1,
                support,
            }
        })
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let n = classes.len() as f64;
    let correct = pairs.iter().filter(|(y, p)| y == p).count();
    Ok(ClassificationMetrics {
        accuracy: ratio(correct, pairs.len()),
        macro_precision: classes.iter().map(|c| c.precision).sum::<f64>() / n,
        macro_recall: classes.iter().map(|c| c.recall).sum::<f64>() / n,
        macro_f1: classes.iter().map(|c| c.f1).sum::<f64>() / n,
        count: pairs.len(),
        classes,
    })
}

fn regression(df: &Dataframe) -> Result<RegressionMetrics> {
    let pairs: Vec<(f64, f64)> = pairs(df)
        .into_iter()
        .filter_map(|(y, p)| Some((y.as_f64()?, p.as_f64()?)))
        .collect();
    if pairs.is_empty() {
        return Err(nothing_to_evaluate());
    }
    #[allow(clippy::cast_precision_loss)]
    let n = pairs.len() as f64;
    let mean = pairs.iter().map(|(y, _)| y).sum::<f64>() / n;
    let sse: f64 = pairs.iter().map(|(y, p)| (y - p) * (y - p)).sum();
    let sst: f64 = pairs.iter().map(|(y, _)| (y - mean) * (y - mean)).sum();
    Ok(RegressionMetrics {
        rmse: (sse / n).sqrt(),
        mae: pairs.iter().map(|(y, p)| (y - p).abs()).sum::<f64>() / n,
        r_squared: if sst == 0.0 { f64::NAN } else { 1.0 - sse / sst },
        count: pairs.len(),
    })
}

fn clustering(df: &Dataframe) -> Result<ClusteringMetrics> {
    let mut members: BTreeMap<&Value, Vec<Option<&Value>>> = BTreeMap::new();
    for record in df.records() {
        if let Some(cluster) = record.y_predicted() {
            members.entry(cluster).or_default().push(record.y());
        }
    }
    if members.is_empty() {
        return Err(Error::InvalidInput("no record carries a prediction".to_string()));
    }

    let mut labelled = 0;
    let mut majority_total = 0;
    for labels in members.values() {
        let mut counts: BTreeMap<&Value, usize> = BTreeMap::new();
        for y in labels.iter().flatten() {
            *counts.entry(*y).or_default() += 1;
            labelled += 1;
        }
        majority_total += counts.values().copied().max().unwrap_or(0);
    }

    Ok(ClusteringMetrics {
        count: members.values().map(Vec::len).sum(),
        cluster_sizes: members
            .iter()
            .map(|(c, labels)| ((*c).clone(), labels.len()))
            .collect(),
        purity: (labelled > 0).then(|| ratio(majority_total, labelled)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataframe::{DataType, Record, Schema};

    fn predicted(rows: &[(Option<Value>, Option<Value>)]) -> Dataframe {
        let mut df = Dataframe::new(Schema::default());
        for (y, p) in rows {
            let mut record = Record::default();
            record.set_y(y.clone());
            record.set_y_predicted(p.clone());
            df.add(record).unwrap();
        }
        df
    }

    fn text(s: &str) -> Option<Value> {
        Some(Value::from(s))
    }

    fn num(n: f64) -> Option<Value> {
        Some(Value::Number(n))
    }

    #[test]
    fn test_classification_metrics() {
        let df = predicted(&[
            (text("a"), text("a")),
            (text("a"), text("b")),
            (text("b"), text("b")),
            (text("b"), text("b")),
            (None, text("a")),
        ]);
        let ValidationMetrics::Classification(m) =
            ValidationMetrics::compute(Task::Classification, &df).unwrap()
        else {
            panic!("expected classification metrics");
        };
        assert_eq!(m.count, 4);
        assert_eq!(m.accuracy, 0.75);
        let a = &m.classes[0];
        assert_eq!(a.label, Value::from("a"));
        assert_eq!((a.precision, a.recall, a.support), (1.0, 0.5, 2));
        let b = &m.classes[1];
        assert!((b.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(b.recall, 1.0);
    }

    #[test]
    fn test_regression_metrics() {
        let df = predicted(&[(num(1.0), num(2.0)), (num(3.0), num(3.0)), (num(5.0), num(4.0))]);
        let ValidationMetrics::Regression(m) =
            ValidationMetrics::compute(Task::Regression, &df).unwrap()
        else {
            panic!("expected regression metrics");
        };
        assert_eq!(m.count, 3);
        assert!((m.rmse - (2.0_f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((m.mae - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.r_squared - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_clustering_metrics() {
        let df = predicted(&[
            (text("x"), num(0.0)),
            (text("x"), num(0.0)),
            (text("y"), num(0.0)),
            (text("y"), num(1.0)),
            (None, num(1.0)),
        ]);
        let ValidationMetrics::Clustering(m) =
            ValidationMetrics::compute(Task::Clustering, &df).unwrap()
        else {
            panic!("expected clustering metrics");
        };
        assert_eq!(m.count, 5);
        assert_eq!(m.cluster_sizes, vec![(Value::Number(0.0), 3), (Value::Number(1.0), 2)]);
        assert_eq!(m.purity, Some(0.75));
    }

    #[test]
    fn test_empty_dataframe_is_rejected() {
        let df = Dataframe::new(Schema::new([("x", DataType::Numerical)]).unwrap());
        assert!(ValidationMetrics::compute(Task::Classification, &df).is_err());
        assert!(ValidationMetrics::compute(Task::Regression, &df).is_err());
        assert!(ValidationMetrics::compute(Task::Clustering, &df).is_err());
    }

    #[test]
    fn test_to_json() {
        let df = predicted(&[(num(1.0), num(1.0))]);
        let metrics = ValidationMetrics::compute(Task::Regression, &df).unwrap();
        let json = metrics.to_json().unwrap();
        assert!(json.contains("\"rmse\""));
        assert_eq!(metrics.task(), Task::Regression);
    }
}
