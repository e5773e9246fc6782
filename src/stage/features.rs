//! Numeric views over records shared by the estimators

use crate::dataframe::{DataType, Record, Schema, Value};
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Columns an estimator reads as numbers: numerical, ordinal and boolean.
pub(super) fn model_columns(schema: &Schema) -> Vec<String> {
    schema
        .columns()
        .filter(|(_, t)| t.is_numeric() || *t == DataType::Boolean)
        .map(|(n, _)| n.to_string())
        .collect()
}

/// Dense feature vector over `columns`. Missing cells read as 0.
pub(super) fn vector(record: &Record, columns: &[String]) -> Vec<f64> {
    columns
        .iter()
        .map(|c| match record.feature(c) {
            Some(Value::Number(n)) => *n,
            Some(Value::Bool(true)) => 1.0,
            _ => 0.0,
        })
        .collect()
}

pub(super) fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

pub(super) fn manhattan(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

/// Index of the smallest distance; ties go to the lowest index.
pub(super) fn argmin(distances: &[f64]) -> usize {
    let mut best = 0;
    for (i, d) in distances.iter().enumerate() {
        if d.total_cmp(&distances[best]).is_lt() {
            best = i;
        }
    }
    best
}

/// Softmax over negated distances, keyed by `labels`.
pub(super) fn distance_probabilities(
    labels: impl IntoIterator<Item = Value>,
    distances: &[f64],
) -> BTreeMap<Value, f64> {
    let min = distances.iter().copied().fold(f64::INFINITY, f64::min);
    let weights: Vec<f64> = distances.iter().map(|d| (min - d).exp()).collect();
    let total: f64 = weights.iter().sum();
    labels
        .into_iter()
        .zip(weights)
        .map(|(label, w)| (label, w / total))
        .collect()
}

/// `(features, label)` pairs of the records that carry a label.
pub(super) fn labelled_rows<'a>(
    records: impl Iterator<Item = &'a Record>,
    columns: &[String],
) -> Vec<(Vec<f64>, Value)> {
    records
        .filter_map(|r| r.y().map(|y| (vector(r, columns), y.clone())))
        .collect()
}

pub(super) fn require_columns(columns: &[String], stage: &str) -> Result<()> {
    if columns.is_empty() {
        return Err(Error::InvalidInput(format!(
            "{stage} needs at least one numerical, ordinal or boolean column"
        )));
    }
    Ok(())
}
