pub mod agent;
pub mod builtin;
pub mod factory;
pub mod message;
pub mod registry;

pub use agent::{Agent, AgentDescriptor, AgentDescriptorBuilder};
pub use builtin::{register_builtin_agent_factories, DataFileAgent, EchoAgent, TextStatsAgent};
#[cfg(feature = "http-agent")]
pub use builtin::{HttpApiAgent, ServiceConfig};
pub use factory::{AgentFactory, AgentFactoryRegistry};
pub use message::{Message, MessageContext, RESPONSE_MESSAGE_TYPE};
pub use registry::AgentRegistry;
