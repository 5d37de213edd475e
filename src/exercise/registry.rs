use std::{collections::HashMap, sync::Arc};

use thiserror::Error;

use super::{ExerciseDefinition, catalog};
use crate::config::ExerciseOverride;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("exercise `{0}` is already registered")]
    Duplicate(String),
    #[error("unknown exercise `{0}`")]
    Unknown(String),
    #[error("invalid configuration for `{id}`: {reason}")]
    Invalid { id: String, reason: String },
}

/// Collects definitions once at start-up; [`RegistryBuilder::build`] freezes them.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: HashMap<String, ExerciseDefinition>,
}

impl RegistryBuilder {
    pub fn register(mut self, definition: ExerciseDefinition) -> Result<Self, RegistryError> {
        definition
            .config
            .validate()
            .map_err(|reason| RegistryError::Invalid {
                id: definition.id.clone(),
                reason,
            })?;
        if self.entries.contains_key(&definition.id) {
            return Err(RegistryError::Duplicate(definition.id));
        }
        self.entries.insert(definition.id.clone(), definition);
        Ok(self)
    }

    pub fn build(self) -> ExerciseRegistry {
        ExerciseRegistry {
            entries: self
                .entries
                .into_iter()
                .map(|(id, def)| (id, Arc::new(def)))
                .collect(),
        }
    }
}

/// Immutable lookup from exercise id to its definition.
#[derive(Clone, Debug)]
pub struct ExerciseRegistry {
    entries: HashMap<String, Arc<ExerciseDefinition>>,
}

impl ExerciseRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn with_builtin() -> Result<Self, RegistryError> {
        Ok(catalog::register_builtin(Self::builder())?.build())
    }

    pub fn get(&self, id: &str) -> Result<Arc<ExerciseDefinition>, RegistryError> {
        self.entries
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::Unknown(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// New registry with tuning overrides applied; `self` is left untouched.
    pub fn with_overrides(
        &self,
        overrides: &HashMap<String, ExerciseOverride>,
    ) -> Result<Self, RegistryError> {
        let mut entries = self.entries.clone();
        for (id, tuning) in overrides {
            let current = entries
                .get(id)
                .ok_or_else(|| RegistryError::Unknown(id.clone()))?;
            let mut definition = current.as_ref().clone();
            tuning.apply(&mut definition.config);
            definition
                .config
                .validate()
                .map_err(|reason| RegistryError::Invalid {
                    id: id.clone(),
                    reason,
                })?;
            log::info!("applied tuning overrides to `{id}`");
            entries.insert(id.clone(), Arc::new(definition));
        }
        Ok(Self { entries })
    }
}
