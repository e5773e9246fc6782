//! Record - one row of a dataframe

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single cell value.
///
/// Values are totally ordered (numbers by IEEE 754 `total_cmp`) so they can
/// key maps, e.g. class labels in predicted probabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Numerical or ordinal value
    Number(f64),
    /// Categorical level
    Text(String),
    /// Boolean flag
    Bool(bool),
}

impl Value {
    /// Numeric view of the value, if it is a number.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text view of the value, if it is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean view of the value, if it is a bool.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Text(_) => 1,
            Self::Bool(_) => 2,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Number(n) => n.to_bits().hash(state),
            Self::Text(s) => s.hash(state),
            Self::Bool(b) => b.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// One row: features, true label, predicted label, predicted probabilities.
///
/// Transform stages rewrite `features` in place; estimators fill
/// `y_predicted` and `probabilities`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    features: BTreeMap<String, Value>,
    y: Option<Value>,
    y_predicted: Option<Value>,
    probabilities: Option<BTreeMap<Value, f64>>,
}

impl Record {
    /// Create a record from a feature map with no label.
    #[must_use]
    pub const fn new(features: BTreeMap<String, Value>) -> Self {
        Self {
            features,
            y: None,
            y_predicted: None,
            probabilities: None,
        }
    }

    /// Builder-style feature setter.
    #[must_use]
    pub fn with_feature(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.features.insert(column.into(), value.into());
        self
    }

    /// Builder-style label setter.
    #[must_use]
    pub fn with_label(mut self, y: impl Into<Value>) -> Self {
        self.y = Some(y.into());
        self
    }

    /// Feature map.
    #[must_use]
    pub const fn features(&self) -> &BTreeMap<String, Value> {
        &self.features
    }

    /// Feature value for a column.
    #[must_use]
    pub fn feature(&self, column: &str) -> Option<&Value> {
        self.features.get(column)
    }

    /// Numeric feature value for a column.
    #[must_use]
    pub fn number(&self, column: &str) -> Option<f64> {
        self.features.get(column).and_then(Value::as_f64)
    }

    /// True label.
    #[must_use]
    pub const fn y(&self) -> Option<&Value> {
        self.y.as_ref()
    }

    /// Predicted label.
    #[must_use]
    pub const fn y_predicted(&self) -> Option<&Value> {
        self.y_predicted.as_ref()
    }

    /// Predicted class probabilities.
    #[must_use]
    pub const fn probabilities(&self) -> Option<&BTreeMap<Value, f64>> {
        self.probabilities.as_ref()
    }

    /// Set or replace a feature value.
    pub fn set_feature(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.features.insert(column.into(), value.into());
    }

    /// Remove a feature, returning its value.
    pub fn remove_feature(&mut self, column: &str) -> Option<Value> {
        self.features.remove(column)
    }

    /// Set or clear the true label.
    pub fn set_y(&mut self, y: Option<Value>) {
        self.y = y;
    }

    /// Set or clear the predicted label.
    pub fn set_y_predicted(&mut self, y: Option<Value>) {
        self.y_predicted = y;
    }

    /// Set or clear predicted probabilities.
    pub fn set_probabilities(&mut self, probabilities: Option<BTreeMap<Value, f64>>) {
        self.probabilities = probabilities;
    }
}
