use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{AgentBusError, Result};

use super::agent::Agent;

/// Fallible construction path for agents built from configuration. A
/// factory that cannot allocate its resources fails here, before the agent
/// ever joins a registry.
pub type AgentFactory = Arc<dyn Fn(Option<Value>) -> Result<Arc<dyn Agent>> + Send + Sync>;

#[derive(Default)]
pub struct AgentFactoryRegistry {
    factories: HashMap<String, AgentFactory>,
}

impl AgentFactoryRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: impl Into<String>, factory: AgentFactory) {
        self.factories.insert(kind.into(), factory);
    }

    pub fn build(&self, kind: &str, config: Option<Value>) -> Result<Arc<dyn Agent>> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| AgentBusError::AgentNotRegistered(kind.to_string()))?;
        factory(config)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}
