use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use crate::error::{AgentBusError, Result};

/// Identity and configuration of an agent, fixed at construction time.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "AgentDescriptor::default_version")]
    pub version: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl AgentDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            version: Self::default_version(),
            capabilities: Vec::new(),
        }
    }

    pub fn builder(name: impl Into<String>) -> AgentDescriptorBuilder {
        AgentDescriptorBuilder::new(name)
    }

    fn default_version() -> String {
        "0.1.0".to_string()
    }
}

pub struct AgentDescriptorBuilder {
    descriptor: AgentDescriptor,
}

impl AgentDescriptorBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            descriptor: AgentDescriptor::new(name),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.descriptor.description = description.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.descriptor.version = version.into();
        self
    }

    pub fn capability(mut self, capability: impl Into<String>) -> Self {
        self.descriptor.capabilities.push(capability.into());
        self
    }

    pub fn capabilities<I, T>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.descriptor
            .capabilities
            .extend(capabilities.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> AgentDescriptor {
        self.descriptor
    }
}

/// A named, capability-tagged processing unit invoked by the coordinator.
///
/// Construction is the initialization step: a concrete agent's constructor
/// (or its factory closure) allocates whatever resources it needs and
/// returns an error if that fails, making the agent unusable. Once built,
/// the descriptor and capability set never change.
#[async_trait]
pub trait Agent: Send + Sync {
    fn descriptor(&self) -> &AgentDescriptor;

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Capability tags used for discovery; stable after construction.
    fn capabilities(&self) -> &[String] {
        &self.descriptor().capabilities
    }

    /// Handles one delivered payload. Expected failures should be reported
    /// through [`Agent::handle_error`] and returned as error-shaped output
    /// instead of raised: the dispatch loop does not retry, and a raised
    /// error never reaches the original sender as data.
    async fn process(&self, input: Value) -> Result<Value>;

    /// Best-effort failure notification; must not fail itself.
    async fn handle_error(&self, error: &AgentBusError) {
        error!(agent = %self.name(), %error, "agent error");
    }

    /// Optional cleanup hook. The bus never calls this on its own; whoever
    /// owns the agent decides when to invoke it.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
