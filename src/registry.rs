//! Model Registry - naming convention binding a model name to its keyspaces
//!
//! Every stage built "for" a model name stores its learned state in the
//! keyspace `<model>.<stage type>`. Sharing one model name across the stages
//! of a pipeline is what lets a caller rebuild the whole fitted pipeline by
//! name later.
//!
//! There is no cascade: deleting one stage's keyspace leaves its siblings in
//! place. Callers delete every stage explicitly.

use crate::context::Context;
use crate::stage::StageType;
use crate::storage::{escape, Keyspace, StorageEngine};
use crate::Result;
use std::sync::Arc;

/// Suffix used for saved dataframes.
const DATAFRAME_SUFFIX: &str = "dataframe";

/// Escape a model name so it cannot contain the `.` separator.
fn model_component(model_name: &str) -> String {
    escape(model_name).replace('.', "%2E")
}

/// Keyspace owned by stage `stage_type` of `model_name`.
#[must_use]
pub fn keyspace(model_name: &str, stage_type: StageType) -> Keyspace {
    Keyspace::from_escaped(format!(
        "{}.{}",
        model_component(model_name),
        stage_type.as_str()
    ))
}

/// Keyspace holding a dataframe saved under `name`.
#[must_use]
pub fn dataframe_keyspace(name: &str) -> Keyspace {
    Keyspace::from_escaped(format!("{}.{DATAFRAME_SUFFIX}", model_component(name)))
}

/// Read-only view over the models persisted in a storage engine.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    storage: Arc<dyn StorageEngine>,
}

impl ModelRegistry {
    /// Registry over a context's storage engine.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self {
            storage: Arc::clone(ctx.storage()),
        }
    }

    /// Keyspace of `(model_name, stage_type)`.
    #[must_use]
    pub fn keyspace(&self, model_name: &str, stage_type: StageType) -> Keyspace {
        keyspace(model_name, stage_type)
    }

    /// Whether `(model_name, stage_type)` has persisted state.
    ///
    /// # Errors
    /// Returns error if the storage engine cannot be inspected
    pub fn contains(&self, model_name: &str, stage_type: StageType) -> Result<bool> {
        self.storage
            .contains_keyspace(&keyspace(model_name, stage_type))
    }

    /// Stage types with persisted state under `model_name`, in declaration order.
    ///
    /// # Errors
    /// Returns error if the storage engine cannot be listed
    pub fn saved_stages(&self, model_name: &str) -> Result<Vec<StageType>> {
        let present = self.storage.list_keyspaces()?;
        Ok(StageType::ALL
            .into_iter()
            .filter(|t| present.contains(&keyspace(model_name, *t)))
            .collect())
    }

    /// Distinct model names with at least one persisted stage, sorted.
    ///
    /// Names are reported in their escaped keyspace form.
    ///
    /// # Errors
    /// Returns error if the storage engine cannot be listed
    pub fn models(&self) -> Result<Vec<String>> {
        let mut models: Vec<String> = self
            .storage
            .list_keyspaces()?
            .iter()
            .filter_map(|ks| {
                let (model, suffix) = ks.as_str().rsplit_once('.')?;
                StageType::ALL
                    .iter()
                    .any(|t| t.as_str() == suffix)
                    .then(|| model.to_string())
            })
            .collect();
        models.sort();
        models.dedup();
        Ok(models)
    }
}
