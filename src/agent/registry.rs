use std::collections::HashMap;
use std::sync::Arc;

use super::agent::{Agent, AgentDescriptor};

/// Name-keyed agent collection that remembers registration order.
///
/// Insertion is last-write-wins: re-registering a name replaces the agent
/// but keeps its original position, so capability scans stay stable across
/// replacements. Entries are never removed.
#[derive(Default)]
pub struct AgentRegistry {
    order: Vec<String>,
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `agent` under its descriptor name, returning the agent it
    /// replaced, if any.
    pub fn insert(&mut self, agent: Arc<dyn Agent>) -> Option<Arc<dyn Agent>> {
        let name = agent.name().to_string();
        let previous = self.agents.insert(name.clone(), agent);
        if previous.is_none() {
            self.order.push(name);
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Agent>> {
        self.agents.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Agents in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Agent>> + '_ {
        self.order.iter().filter_map(|name| self.agents.get(name))
    }

    /// First registered agent advertising `capability`. Linear scan in
    /// registration order, O(agents).
    pub fn find_by_capability(&self, capability: &str) -> Option<&Arc<dyn Agent>> {
        self.iter()
            .find(|agent| agent.capabilities().iter().any(|tag| tag == capability))
    }

    /// Snapshot of every agent's capability set, keyed by name.
    pub fn capabilities_by_agent(&self) -> HashMap<String, Vec<String>> {
        self.agents
            .iter()
            .map(|(name, agent)| (name.clone(), agent.capabilities().to_vec()))
            .collect()
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> Vec<AgentDescriptor> {
        self.iter().map(|agent| agent.descriptor().clone()).collect()
    }
}
