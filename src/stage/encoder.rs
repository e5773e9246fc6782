//! One-hot (dummy) encoder
//!
//! Replaces each categorical column `c` with one boolean column `c=<level>`
//! per level seen at fit time. A level unseen at fit time sets every dummy of
//! its column to `false`; no new columns are ever created after fit.

use crate::dataframe::{DataType, Dataframe, Schema, Value};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One-hot encoder parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotEncoderParams {
    /// Encode boolean columns too (as `c=true` / `c=false`)
    pub include_booleans: bool,
}

impl OneHotEncoderParams {
    /// Enable or disable encoding of boolean columns
    #[must_use]
    pub const fn with_include_booleans(mut self, include: bool) -> Self {
        self.include_booleans = include;
        self
    }
}

/// Learned levels per encoded column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoderState {
    levels: BTreeMap<String, Vec<Value>>,
}

fn dummy_column(column: &str, level: &Value) -> String {
    format!("{column}={level}")
}

impl OneHotEncoderState {
    /// Levels learned for a column, in sorted order.
    #[must_use]
    pub fn levels(&self, column: &str) -> Option<&[Value]> {
        self.levels.get(column).map(Vec::as_slice)
    }

    fn output_schema(&self, input: &Schema) -> Result<Schema> {
        let mut columns = Vec::with_capacity(input.len());
        for (name, data_type) in input.columns() {
            match self.levels.get(name) {
                Some(levels) => columns.extend(
                    levels
                        .iter()
                        .map(|level| (dummy_column(name, level), DataType::Boolean)),
                ),
                None => columns.push((name.to_string(), data_type)),
            }
        }
        Schema::new(columns)
    }

    pub(super) fn transform(&self, df: &mut Dataframe) -> Result<()> {
        let schema = self.output_schema(df.schema())?;
        for record in df.records_mut() {
            for (column, levels) in &self.levels {
                if let Some(value) = record.remove_feature(column) {
                    for level in levels {
                        record.set_feature(dummy_column(column, level), *level == value);
                    }
                }
            }
        }
        df.replace_schema(schema);
        Ok(())
    }
}

pub(super) fn fit(params: &OneHotEncoderParams, df: &Dataframe) -> Result<OneHotEncoderState> {
    let levels = df
        .schema()
        .columns()
        .filter(|(_, t)| {
            *t == DataType::Categorical || (params.include_booleans && *t == DataType::Boolean)
        })
        .map(|(column, _)| {
            let seen: BTreeSet<Value> = df
                .records()
                .filter_map(|r| r.feature(column).cloned())
                .collect();
            (column.to_string(), seen.into_iter().collect())
        })
        .collect();
    Ok(OneHotEncoderState { levels })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataframe::Record;
    use crate::Error;

    fn df() -> Dataframe {
        let schema = Schema::new([
            ("x", DataType::Numerical),
            ("color", DataType::Categorical),
            ("flag", DataType::Boolean),
        ])
        .unwrap();
        let mut df = Dataframe::new(schema);
        for (x, color, flag) in [(1.0, "red", true), (2.0, "blue", false), (3.0, "red", true)] {
            df.add(
                Record::default()
                    .with_feature("x", x)
                    .with_feature("color", color)
                    .with_feature("flag", flag),
            )
            .unwrap();
        }
        df
    }

    #[test]
    fn test_fit_collects_sorted_levels() {
        let state = fit(&OneHotEncoderParams::default(), &df()).unwrap();
        assert_eq!(
            state.levels("color").unwrap(),
            &[Value::from("blue"), Value::from("red")]
        );
        assert!(state.levels("flag").is_none());
        assert!(state.levels("x").is_none());
    }

    #[test]
    fn test_transform_replaces_column_with_dummies() {
        let mut data = df();
        let state = fit(&OneHotEncoderParams::default(), &data).unwrap();
        state.transform(&mut data).unwrap();

        let names: Vec<&str> = data.schema().names().collect();
        assert_eq!(names, vec!["x", "color=blue", "color=red", "flag"]);
        assert_eq!(data.schema().data_type("color=red"), Some(DataType::Boolean));

        let first = data.get(0).unwrap();
        assert!(first.feature("color").is_none());
        assert_eq!(first.feature("color=red"), Some(&Value::Bool(true)));
        assert_eq!(first.feature("color=blue"), Some(&Value::Bool(false)));
        assert_eq!(first.number("x"), Some(1.0));
    }

    #[test]
    fn test_unseen_level_sets_all_dummies_false() {
        let train = df();
        let state = fit(&OneHotEncoderParams::default(), &train).unwrap();

        let mut test = Dataframe::new(Schema::new([("color", DataType::Categorical)]).unwrap());
        test.add(Record::default().with_feature("color", "green")).unwrap();
        state.transform(&mut test).unwrap();

        let record = test.get(0).unwrap();
        assert_eq!(record.features().len(), 2);
        assert!(record.features().values().all(|v| *v == Value::Bool(false)));
    }

    #[test]
    fn test_include_booleans() {
        let mut data = df();
        let params = OneHotEncoderParams::default().with_include_booleans(true);
        let state = fit(&params, &data).unwrap();
        state.transform(&mut data).unwrap();
        assert!(data.schema().contains("flag=true"));
        assert!(data.schema().contains("flag=false"));
        assert!(!data.schema().contains("flag"));
    }

    #[test]
    fn test_dummy_name_collision_leaves_dataframe_untouched() {
        let schema = Schema::new([
            ("c", DataType::Categorical),
            ("c=a", DataType::Boolean),
        ])
        .unwrap();
        let mut data = Dataframe::new(schema);
        data.add(Record::default().with_feature("c", "a").with_feature("c=a", true))
            .unwrap();
        let state = fit(&OneHotEncoderParams::default(), &data).unwrap();

        assert!(matches!(state.transform(&mut data), Err(Error::InvalidInput(_))));
        assert_eq!(data.get(0).unwrap().feature("c"), Some(&Value::from("a")));
    }
}
