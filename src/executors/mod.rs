//! Simple-type value executors
//!
//! An executor checks one attribute value or one element text against a
//! simple type. Executors chain along the type's derivation: a derived
//! type's executor consults its base type's executor first and only applies
//! its own facets when the base accepts the value.
//!
//! Executors are built once per distinct simple type while the schema is
//! compiled, stored in the automaton nodes, and shared read-only between
//! validation passes.

pub mod builtins;
pub mod datetime;
pub mod pattern;
pub mod restricted;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::diagnostics::{NodeKind, Position, SchemaDiagnostic};
use crate::error::{Error, Result};
use crate::schema::SimpleType;

use builtins::builtin_executor;
use restricted::RestrictedExecutor;

/// The value-validation contract.
///
/// `execute` returns `None` when the value is acceptable, or the diagnostic
/// describing the first failed check. `kind` and `name` identify the node
/// the value came from so the diagnostic can name it.
pub trait SimpleTypeExecutor: Send + Sync {
    /// Check one value
    fn execute(
        &self,
        value: &str,
        kind: NodeKind,
        name: &str,
        position: Position,
    ) -> Option<SchemaDiagnostic>;
}

/// Builds and memoizes executors for the simple types of one schema.
///
/// Memoization is keyed by type identity: every declaration site sharing an
/// `Arc<SimpleType>` shares one executor.
#[derive(Default)]
pub struct ExecutorFactory {
    cache: RwLock<HashMap<usize, Arc<dyn SimpleTypeExecutor>>>,
}

impl ExecutorFactory {
    /// Create an empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Build (or reuse) the executor for a simple type
    pub fn build(&self, ty: &Arc<SimpleType>) -> Result<Arc<dyn SimpleTypeExecutor>> {
        let key = Arc::as_ptr(ty) as usize;
        if let Some(executor) = self.cache.read().expect("executor cache poisoned").get(&key) {
            return Ok(Arc::clone(executor));
        }
        let executor: Arc<dyn SimpleTypeExecutor> =
            if ty.base.is_none() && ty.restriction.is_none() {
                builtin_executor(&ty.name).ok_or_else(|| {
                    Error::SchemaParse(format!("unknown simple type '{}'", ty.name))
                })?
            } else {
                let base = match &ty.base {
                    Some(base) => Some(self.build(base)?),
                    None => None,
                };
                Arc::new(RestrictedExecutor::new(base, ty)?)
            };
        let mut cache = self.cache.write().expect("executor cache poisoned");
        let entry = cache.entry(key).or_insert(executor);
        Ok(Arc::clone(entry))
    }
}
