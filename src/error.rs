use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentBusError>;

#[derive(Debug, Error)]
pub enum AgentBusError {
    #[error("agent `{0}` not registered")]
    AgentNotRegistered(String),
    #[error("dispatch loop is already running")]
    DispatchLoopRunning,
    #[error("message queue is closed")]
    QueueClosed,
    #[error("response from `{0}` was dropped before completion")]
    ResponseDropped(String),
    #[error("processing failed: {0}")]
    Processing(String),
    #[error("invalid workflow step {index}: {reason}")]
    InvalidWorkflowStep { index: usize, reason: String },
    #[error("workflow config error: {0}")]
    WorkflowConfig(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
