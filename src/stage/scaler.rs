//! Min-max scaler
//!
//! Maps every numerical/ordinal column to `(x - min) / (max - min)` using the
//! range observed at fit time. Values outside that range map outside `[0, 1]`;
//! they are never clamped. A constant column maps to 0.

use super::FitEnv;
use crate::dataframe::{Dataframe, Value};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Min-max scaler parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinMaxScalerParams {
    /// Also scale the (numeric) label, and un-scale `y`/`y_predicted` on denormalize
    pub scale_y: bool,
}

impl MinMaxScalerParams {
    /// Enable or disable label scaling
    #[must_use]
    pub const fn with_scale_y(mut self, scale_y: bool) -> Self {
        self.scale_y = scale_y;
        self
    }
}

/// Observed `[min, max]` of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    /// Smallest observed value
    pub min: f64,
    /// Largest observed value
    pub max: f64,
}

impl Range {
    fn observe(values: impl Iterator<Item = f64>) -> Option<Self> {
        values.filter(|v| !v.is_nan()).fold(None, |acc, v| {
            Some(match acc {
                None => Self { min: v, max: v },
                Some(r) => Self {
                    min: r.min.min(v),
                    max: r.max.max(v),
                },
            })
        })
    }

    fn scale(&self, x: f64) -> f64 {
        let span = self.max - self.min;
        if span == 0.0 {
            0.0
        } else {
            (x - self.min) / span
        }
    }

    fn unscale(&self, x: f64) -> f64 {
        x.mul_add(self.max - self.min, self.min)
    }
}

/// Learned column ranges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScalerState {
    columns: BTreeMap<String, Range>,
    y: Option<Range>,
}

impl MinMaxScalerState {
    /// Range learned for a column.
    #[must_use]
    pub fn range(&self, column: &str) -> Option<Range> {
        self.columns.get(column).copied()
    }

    /// Range learned for the label, when Y-scaling.
    #[must_use]
    pub const fn label_range(&self) -> Option<Range> {
        self.y
    }

    pub(super) fn transform(&self, df: &mut Dataframe) {
        for record in df.records_mut() {
            for (column, range) in &self.columns {
                if let Some(x) = record.number(column) {
                    record.set_feature(column.as_str(), range.scale(x));
                }
            }
            if let (Some(range), Some(y)) = (&self.y, record.y().and_then(Value::as_f64)) {
                record.set_y(Some(Value::Number(range.scale(y))));
            }
        }
    }

    pub(super) fn denormalize(&self, df: &mut Dataframe) {
        for record in df.records_mut() {
            for (column, range) in &self.columns {
                if let Some(x) = record.number(column) {
                    record.set_feature(column.as_str(), range.unscale(x));
                }
            }
            if let Some(range) = &self.y {
                if let Some(y) = record.y().and_then(Value::as_f64) {
                    record.set_y(Some(Value::Number(range.unscale(y))));
                }
                if let Some(y) = record.y_predicted().and_then(Value::as_f64) {
                    record.set_y_predicted(Some(Value::Number(range.unscale(y))));
                }
            }
        }
    }
}

pub(super) fn fit(
    params: &MinMaxScalerParams,
    df: &Dataframe,
    env: &FitEnv<'_>,
) -> Result<MinMaxScalerState> {
    let columns = df.schema().numeric_columns();
    let ranges = env.executor.map(columns, |column| {
        let range = Range::observe(df.records().filter_map(|r| r.number(&column)));
        (column, range)
    });
    let columns = ranges
        .into_iter()
        .filter_map(|(column, range)| range.map(|r| (column, r)))
        .collect();

    let y = if params.scale_y {
        match df.label() {
            Some(label) if label.data_type.is_numeric() => {
                Range::observe(df.records().filter_map(|r| r.y().and_then(Value::as_f64)))
            }
            Some(label) => {
                return Err(Error::InvalidInput(format!(
                    "cannot scale {} label '{}'",
                    label.data_type, label.name
                )))
            }
            None => {
                return Err(Error::InvalidInput(
                    "scale_y requires a label column".to_string(),
                ))
            }
        }
    } else {
        None
    };

    Ok(MinMaxScalerState { columns, y })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Executor, RngContext};
    use crate::dataframe::{DataType, Record, Schema};

    fn env(executor: &Executor) -> FitEnv<'_> {
        FitEnv {
            executor,
            rng: RngContext::new(1),
        }
    }

    fn df() -> Dataframe {
        let schema = Schema::new([
            ("x", DataType::Numerical),
            ("k", DataType::Numerical),
            ("c", DataType::Categorical),
        ])
        .unwrap();
        let mut df = Dataframe::new(schema).with_label("t", DataType::Numerical);
        for (x, y) in [(2.0, 10.0), (4.0, 20.0), (6.0, 30.0)] {
            df.add(
                Record::default()
                    .with_feature("x", x)
                    .with_feature("k", 5.0)
                    .with_feature("c", "a")
                    .with_label(y),
            )
            .unwrap();
        }
        df
    }

    #[test]
    fn test_fit_learns_ranges() {
        let executor = Executor::serial();
        let state = fit(&MinMaxScalerParams::default(), &df(), &env(&executor)).unwrap();
        assert_eq!(state.range("x"), Some(Range { min: 2.0, max: 6.0 }));
        assert_eq!(state.range("c"), None);
        assert_eq!(state.label_range(), None);
    }

    #[test]
    fn test_transform_maps_into_unit_interval() {
        let executor = Executor::serial();
        let mut data = df();
        let state = fit(&MinMaxScalerParams::default(), &data, &env(&executor)).unwrap();
        state.transform(&mut data);

        let xs: Vec<f64> = data.records().filter_map(|r| r.number("x")).collect();
        assert_eq!(xs, vec![0.0, 0.5, 1.0]);
        // constant column
        assert!(data.records().all(|r| r.number("k") == Some(0.0)));
        // categorical untouched, label untouched without scale_y
        assert!(data.records().all(|r| r.feature("c") == Some(&Value::from("a"))));
        assert_eq!(data.get(2).unwrap().y(), Some(&Value::Number(30.0)));
    }

    #[test]
    fn test_out_of_range_is_not_clamped() {
        let executor = Executor::serial();
        let state = fit(&MinMaxScalerParams::default(), &df(), &env(&executor)).unwrap();

        let mut test = Dataframe::new(Schema::new([("x", DataType::Numerical)]).unwrap());
        test.add(Record::default().with_feature("x", 10.0)).unwrap();
        test.add(Record::default().with_feature("x", 0.0)).unwrap();
        state.transform(&mut test);

        assert_eq!(test.get(0).unwrap().number("x"), Some(2.0));
        assert_eq!(test.get(1).unwrap().number("x"), Some(-0.5));
    }

    #[test]
    fn test_scale_y_and_denormalize() {
        let executor = Executor::serial();
        let mut data = df();
        let original = data.copy();
        let params = MinMaxScalerParams::default().with_scale_y(true);
        let state = fit(&params, &data, &env(&executor)).unwrap();

        state.transform(&mut data);
        assert_eq!(data.get(1).unwrap().y(), Some(&Value::Number(0.5)));

        for record in data.records_mut() {
            let y = record.y().cloned();
            record.set_y_predicted(y);
        }
        state.denormalize(&mut data);
        for (id, record) in original.iter() {
            let restored = data.get(id).unwrap();
            assert_eq!(restored.number("x"), record.number("x"));
            assert_eq!(restored.y(), record.y());
            assert_eq!(restored.y_predicted(), record.y());
        }
    }

    #[test]
    fn test_scale_y_rejects_categorical_label() {
        let executor = Executor::serial();
        let mut data = Dataframe::new(Schema::new([("x", DataType::Numerical)]).unwrap())
            .with_label("t", DataType::Categorical);
        data.add(Record::default().with_feature("x", 1.0).with_label("a"))
            .unwrap();
        let params = MinMaxScalerParams::default().with_scale_y(true);
        assert!(matches!(
            fit(&params, &data, &env(&executor)),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_parallel_fit_matches_serial() {
        let serial = Executor::serial();
        let parallel = Executor::with_threads(3).unwrap();
        let data = df();
        let a = fit(&MinMaxScalerParams::default(), &data, &env(&serial)).unwrap();
        let b = fit(&MinMaxScalerParams::default(), &data, &env(&parallel)).unwrap();
        assert_eq!(a, b);
    }
}
