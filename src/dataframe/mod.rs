//! Dataframe - the tabular container passed between stages
//!
//! A dataframe maps record ids to [`Record`]s that share one immutable
//! [`Schema`]. Stages mutate records in place; stages that change the column
//! set (encoders, selectors) install a new schema object rather than editing
//! the existing one.
//!
//! ```rust
//! use trueno_pipeline::dataframe::{DataType, Dataframe, Record, Schema};
//!
//! # fn example() -> trueno_pipeline::Result<()> {
//! let schema = Schema::new([("age", DataType::Numerical), ("sex", DataType::Categorical)])?;
//! let mut df = Dataframe::new(schema).with_label("sick", DataType::Boolean);
//!
//! let id = df.add(Record::default().with_feature("age", 61.0).with_feature("sex", "M").with_label(true))?;
//! assert_eq!(df.get(id).and_then(|r| r.number("age")), Some(61.0));
//! # Ok(())
//! # }
//! ```

mod record;

pub use record::{Record, Value};

use crate::context::Context;
use crate::registry;
use crate::storage::{Keyspace, StorageEngine};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Record identifier, unique within a dataframe.
pub type RecordId = u64;

/// Storage key holding a saved dataframe snapshot.
const SNAPSHOT_KEY: &str = "dataframe";

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Continuous number
    Numerical,
    /// Unordered level (text, number, or bool accepted)
    Categorical,
    /// True/false flag
    Boolean,
    /// Ordered level stored as a number
    Ordinal,
}

impl DataType {
    /// Get type name as string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Numerical => "numerical",
            Self::Categorical => "categorical",
            Self::Boolean => "boolean",
            Self::Ordinal => "ordinal",
        }
    }

    /// Whether values of this type are numbers.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Numerical | Self::Ordinal)
    }

    /// Whether `value` is a legal value for this type.
    #[must_use]
    pub const fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Numerical | Self::Ordinal => matches!(value, Value::Number(_)),
            Self::Boolean => matches!(value, Value::Bool(_)),
            Self::Categorical => true,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, duplicate-free column → type mapping.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<(String, DataType)>,
}

impl Schema {
    /// Create a schema from ordered `(column, type)` pairs.
    ///
    /// # Errors
    /// Returns error if a column name repeats
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, DataType)>,
        S: Into<String>,
    {
        let columns: Vec<(String, DataType)> =
            columns.into_iter().map(|(n, t)| (n.into(), t)).collect();
        let mut seen = BTreeSet::new();
        for (name, _) in &columns {
            if !seen.insert(name.as_str()) {
                return Err(Error::InvalidInput(format!("duplicate column '{name}'")));
            }
        }
        Ok(Self { columns })
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, DataType)> {
        self.columns.iter().map(|(n, t)| (n.as_str(), *t))
    }

    /// Column names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Numerical and ordinal column names.
    #[must_use]
    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, t)| t.is_numeric())
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Type of a column.
    #[must_use]
    pub fn data_type(&self, column: &str) -> Option<DataType> {
        self.columns
            .iter()
            .find(|(n, _)| n == column)
            .map(|(_, t)| *t)
    }

    /// Whether the column is declared.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.data_type(column).is_some()
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the schema has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Fail unless every column of `self` is declared in `fitted` with the same type.
    ///
    /// # Errors
    /// Returns `SchemaMismatch` naming the first offending column
    pub fn check_subset_of(&self, fitted: &Self) -> Result<()> {
        for (name, data_type) in self.columns() {
            match fitted.data_type(name) {
                Some(t) if t == data_type => {}
                Some(t) => {
                    return Err(Error::SchemaMismatch(format!(
                        "column '{name}' is {data_type} but was {t} at fit time"
                    )))
                }
                None => {
                    return Err(Error::SchemaMismatch(format!(
                        "column '{name}' was not present at fit time"
                    )))
                }
            }
        }
        Ok(())
    }
}

/// Label (target) column description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelColumn {
    /// Column name as it appeared in the source
    pub name: String,
    /// Label type
    pub data_type: DataType,
}

/// Persisted form of a dataframe.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    schema: Schema,
    label: Option<LabelColumn>,
    records: BTreeMap<RecordId, Record>,
    next_id: RecordId,
}

/// Storage binding of a saved dataframe.
#[derive(Debug, Clone)]
struct Binding {
    storage: Arc<dyn StorageEngine>,
    keyspace: Keyspace,
}

/// Tabular dataset: records sharing one column schema.
#[derive(Debug)]
pub struct Dataframe {
    schema: Arc<Schema>,
    label: Option<LabelColumn>,
    records: BTreeMap<RecordId, Record>,
    next_id: RecordId,
    binding: Option<Binding>,
}

impl Dataframe {
    /// Create an empty dataframe with the given schema and no label column.
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self {
            schema: Arc::new(schema),
            label: None,
            records: BTreeMap::new(),
            next_id: 0,
            binding: None,
        }
    }

    /// Declare the label column.
    #[must_use]
    pub fn with_label(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.label = Some(LabelColumn {
            name: name.into(),
            data_type,
        });
        self
    }

    /// Column schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Label column, if declared.
    #[must_use]
    pub const fn label(&self) -> Option<&LabelColumn> {
        self.label.as_ref()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataframe has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a record under the next free id.
    ///
    /// # Errors
    /// Returns error if the record violates the schema
    pub fn add(&mut self, record: Record) -> Result<RecordId> {
        let id = self.next_id;
        self.insert(id, record)?;
        Ok(id)
    }

    /// Insert a record under an explicit id, returning any record it replaces.
    ///
    /// # Errors
    /// Returns error if the record violates the schema
    pub fn insert(&mut self, id: RecordId, record: Record) -> Result<Option<Record>> {
        self.validate(&record)?;
        self.next_id = self.next_id.max(id.saturating_add(1));
        Ok(self.records.insert(id, record))
    }

    /// Remove a record.
    pub fn remove(&mut self, id: RecordId) -> Option<Record> {
        self.records.remove(&id)
    }

    /// Record by id.
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(&id)
    }

    /// Iterate `(id, record)` in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &Record)> {
        self.records.iter().map(|(id, r)| (*id, r))
    }

    /// Record ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<RecordId> {
        self.records.keys().copied().collect()
    }

    /// Independent deep clone. The copy is not bound to storage.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self {
            schema: Arc::new(Schema::clone(&self.schema)),
            label: self.label.clone(),
            records: self.records.clone(),
            next_id: self.next_id,
            binding: None,
        }
    }

    /// Whether the dataframe is bound to a storage keyspace.
    #[must_use]
    pub const fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Persist schema and records under `name`, binding the dataframe to it.
    ///
    /// # Errors
    /// Returns error if serialization or the storage write fails
    pub fn save(&mut self, ctx: &Context, name: &str) -> Result<()> {
        let keyspace = registry::dataframe_keyspace(name);
        let snapshot = Snapshot {
            schema: Schema::clone(&self.schema),
            label: self.label.clone(),
            records: self.records.clone(),
            next_id: self.next_id,
        };
        let bytes = bincode::serialize(&snapshot)?;
        let storage = Arc::clone(ctx.storage());
        storage.put(&keyspace, SNAPSHOT_KEY, bytes)?;
        info!(keyspace = %keyspace, records = self.records.len(), "saved dataframe");
        self.binding = Some(Binding { storage, keyspace });
        Ok(())
    }

    /// Restore a dataframe saved under `name`.
    ///
    /// # Errors
    /// Returns `NotFound` if nothing was saved under `name`
    pub fn load(ctx: &Context, name: &str) -> Result<Self> {
        let keyspace = registry::dataframe_keyspace(name);
        let storage = Arc::clone(ctx.storage());
        let bytes = storage
            .get(&keyspace, SNAPSHOT_KEY)?
            .ok_or_else(|| Error::NotFound(format!("dataframe '{name}' (keyspace {keyspace})")))?;
        let snapshot: Snapshot = bincode::deserialize(&bytes)?;
        debug!(keyspace = %keyspace, records = snapshot.records.len(), "loaded dataframe");
        Ok(Self {
            schema: Arc::new(snapshot.schema),
            label: snapshot.label,
            records: snapshot.records,
            next_id: snapshot.next_id,
            binding: Some(Binding { storage, keyspace }),
        })
    }

    /// Release the storage binding. Persisted data stays.
    ///
    /// # Errors
    /// Returns error if the keyspace cannot be flushed
    pub fn close(&mut self) -> Result<()> {
        if let Some(binding) = self.binding.take() {
            binding.storage.close_keyspace(&binding.keyspace)?;
        }
        Ok(())
    }

    /// Irreversibly purge the persisted copy, if any. In-memory records stay.
    ///
    /// # Errors
    /// Returns error if the keyspace cannot be dropped
    pub fn delete(&mut self) -> Result<()> {
        if let Some(binding) = self.binding.take() {
            binding.storage.drop_keyspace(&binding.keyspace)?;
            info!(keyspace = %binding.keyspace, "deleted dataframe");
        }
        Ok(())
    }

    /// Alias of [`delete`](Self::delete).
    ///
    /// # Errors
    /// Returns error if the keyspace cannot be dropped
    pub fn erase(&mut self) -> Result<()> {
        self.delete()
    }

    /// New dataframe with the same schema holding clones of `ids`.
    pub(crate) fn subset(&self, ids: &[RecordId]) -> Self {
        let records = ids
            .iter()
            .filter_map(|id| self.records.get(id).map(|r| (*id, r.clone())))
            .collect();
        Self {
            schema: Arc::clone(&self.schema),
            label: self.label.clone(),
            records,
            next_id: self.next_id,
            binding: None,
        }
    }

    pub(crate) fn records_mut(&mut self) -> impl Iterator<Item = &mut Record> {
        self.records.values_mut()
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Install a new schema after a column-changing transform.
    pub(crate) fn replace_schema(&mut self, schema: Schema) {
        self.schema = Arc::new(schema);
    }

    fn validate(&self, record: &Record) -> Result<()> {
        for (column, value) in record.features() {
            let Some(data_type) = self.schema.data_type(column) else {
                return Err(Error::SchemaMismatch(format!(
                    "column '{column}' is not declared in the schema"
                )));
            };
            if !data_type.accepts(value) {
                return Err(Error::SchemaMismatch(format!(
                    "column '{column}' is {data_type}, got value '{value}'"
                )));
            }
        }
        if let (Some(label), Some(y)) = (&self.label, record.y()) {
            if !label.data_type.accepts(y) {
                return Err(Error::SchemaMismatch(format!(
                    "label '{}' is {}, got value '{y}'",
                    label.name, label.data_type
                )));
            }
        }
        Ok(())
    }
}
