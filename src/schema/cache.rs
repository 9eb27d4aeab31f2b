use crate::error::ContractError;
use crate::schema::compiled::CompiledSchema;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

type CompileOutcome = Result<Arc<CompiledSchema>, String>;

/// Compile-once cache of schemas, keyed by their canonical JSON text.
///
/// The first caller to ask for a schema compiles it while any concurrent
/// callers for the same key wait on its cell. Once a cell is filled,
/// lookups only take the map's read lock.
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: RwLock<HashMap<String, Arc<OnceLock<CompileOutcome>>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compile<F>(&self, schema: &Value, compile: F) -> Result<Arc<CompiledSchema>, ContractError>
    where
        F: FnOnce(&Value) -> Result<CompiledSchema, ContractError>,
    {
        let key = schema.to_string();

        let existing = self.entries.read().get(&key).cloned();
        let cell = match existing {
            Some(cell) => cell,
            None => self.entries.write().entry(key).or_default().clone(),
        };

        cell.get_or_init(|| {
            tracing::debug!("compiling schema");
            compile(schema).map(Arc::new).map_err(|e| {
                tracing::warn!(error = %e, "schema failed to compile");
                e.to_string()
            })
        })
        .clone()
        .map_err(ContractError::SchemaCompilationError)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
