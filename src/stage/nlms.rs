//! Normalized least-mean-squares regressor
//!
//! Online linear regression: each epoch visits the labelled records in id
//! order and applies `w += mu * e * x / (eps + |x|^2 + 1)` where `e` is the
//! residual (the `+ 1` accounts for the bias input). Visiting order is fixed,
//! so fitting the same data twice gives bit-identical weights.

use super::features;
use crate::dataframe::{Dataframe, Value};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// NLMS parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NlmsParams {
    /// Step size, in `(0, 2)`
    pub learning_rate: f64,
    /// Passes over the training data
    pub epochs: usize,
    /// Regularizer added to the input power
    pub epsilon: f64,
}

impl Default for NlmsParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            epochs: 100,
            epsilon: 1e-6,
        }
    }
}

impl NlmsParams {
    /// Set step size
    #[must_use]
    pub const fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set number of epochs
    #[must_use]
    pub const fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }
}

/// Learned weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NlmsState {
    columns: Vec<String>,
    weights: Vec<f64>,
    bias: f64,
}

impl NlmsState {
    /// Weight per feature column.
    pub fn weights(&self) -> impl Iterator<Item = (&str, f64)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.weights.iter().copied())
    }

    /// Intercept.
    #[must_use]
    pub const fn bias(&self) -> f64 {
        self.bias
    }

    fn estimate(&self, x: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(x)
            .fold(self.bias, |acc, (w, x)| w.mul_add(*x, acc))
    }

    pub(super) fn predict(&self, df: &mut Dataframe) -> Result<()> {
        for record in df.records_mut() {
            let x = features::vector(record, &self.columns);
            record.set_y_predicted(Some(Value::Number(self.estimate(&x))));
            record.set_probabilities(None);
        }
        Ok(())
    }
}

pub(super) fn fit(params: &NlmsParams, df: &Dataframe) -> Result<NlmsState> {
    if !(params.learning_rate > 0.0 && params.learning_rate < 2.0) {
        return Err(Error::InvalidInput(format!(
            "NLMS learning rate must be in (0, 2), got {}",
            params.learning_rate
        )));
    }
    match df.label() {
        Some(label) if label.data_type.is_numeric() => {}
        Some(label) => {
            return Err(Error::InvalidInput(format!(
                "NLMS needs a numerical label, '{}' is {}",
                label.name, label.data_type
            )))
        }
        None => return Err(Error::InvalidInput("NLMS needs a label column".to_string())),
    }

    let columns = features::model_columns(df.schema());
    features::require_columns(&columns, "NLMS")?;
    let rows: Vec<(Vec<f64>, f64)> = features::labelled_rows(df.records(), &columns)
        .into_iter()
        .filter_map(|(x, y)| y.as_f64().map(|y| (x, y)))
        .collect();
    if rows.is_empty() {
        return Err(Error::InvalidInput(
            "NLMS needs at least one labelled record".to_string(),
        ));
    }

    let mut state = NlmsState {
        weights: vec![0.0; columns.len()],
        columns,
        bias: 0.0,
    };
    for _ in 0..params.epochs {
        for (x, y) in &rows {
            let error = y - state.estimate(x);
            let power = params.epsilon + 1.0 + x.iter().map(|v| v * v).sum::<f64>();
            let step = params.learning_rate * error / power;
            for (w, xi) in state.weights.iter_mut().zip(x) {
                *w = step.mul_add(*xi, *w);
            }
            state.bias += step;
        }
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataframe::{DataType, Record, Schema};

    fn linear(n: u32) -> Dataframe {
        let schema = Schema::new([("a", DataType::Numerical), ("b", DataType::Numerical)]).unwrap();
        let mut df = Dataframe::new(schema).with_label("t", DataType::Numerical);
        for i in 0..n {
            let a = f64::from(i % 7) / 7.0;
            let b = f64::from(i % 5) / 5.0;
            df.add(
                Record::default()
                    .with_feature("a", a)
                    .with_feature("b", b)
                    .with_label(2.0 * a - b + 0.5),
            )
            .unwrap();
        }
        df
    }

    #[test]
    fn test_fit_recovers_linear_relation() {
        let params = NlmsParams::default().with_epochs(300);
        let state = fit(&params, &linear(70)).unwrap();

        let weights: Vec<(&str, f64)> = state.weights().collect();
        assert!((weights[0].1 - 2.0).abs() < 1e-2, "{weights:?}");
        assert!((weights[1].1 + 1.0).abs() < 1e-2, "{weights:?}");
        assert!((state.bias() - 0.5).abs() < 1e-2);
    }

    #[test]
    fn test_predict_fills_numeric_prediction() {
        let mut data = linear(35);
        let state = fit(&NlmsParams::default(), &data).unwrap();
        state.predict(&mut data).unwrap();
        for (_, record) in data.iter() {
            let predicted = record.y_predicted().and_then(Value::as_f64).unwrap();
            let actual = record.y().and_then(Value::as_f64).unwrap();
            assert!((predicted - actual).abs() < 0.1);
        }
    }

    #[test]
    fn test_fit_is_deterministic() {
        let data = linear(20);
        assert_eq!(
            fit(&NlmsParams::default(), &data).unwrap(),
            fit(&NlmsParams::default(), &data).unwrap()
        );
    }

    #[test]
    fn test_invalid_parameters_and_labels() {
        let data = linear(5);
        assert!(fit(&NlmsParams::default().with_learning_rate(2.0), &data).is_err());
        assert!(fit(&NlmsParams::default().with_learning_rate(0.0), &data).is_err());

        let schema = Schema::new([("a", DataType::Numerical)]).unwrap();
        let mut categorical = Dataframe::new(schema).with_label("t", DataType::Categorical);
        categorical
            .add(Record::default().with_feature("a", 1.0).with_label("x"))
            .unwrap();
        assert!(matches!(
            fit(&NlmsParams::default(), &categorical),
            Err(Error::InvalidInput(_))
        ));
    }
}
