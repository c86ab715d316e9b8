pub mod agent;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod utils;
pub mod workflow;

pub use agent::{
    register_builtin_agent_factories, Agent, AgentDescriptor, AgentDescriptorBuilder, AgentFactory,
    AgentFactoryRegistry, AgentRegistry, DataFileAgent, EchoAgent, Message, MessageContext,
    TextStatsAgent, RESPONSE_MESSAGE_TYPE,
};
#[cfg(feature = "http-agent")]
pub use agent::{HttpApiAgent, ServiceConfig};
pub use config::EnvConfig;
pub use coordinator::{Coordinator, ResponseHandle};
pub use error::{AgentBusError, Result};
pub use utils::{logging, LoggingConfig};
pub use workflow::{Workflow, WorkflowConfig, WorkflowStepConfig};
