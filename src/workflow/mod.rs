pub mod config;

pub use config::{WorkflowConfig, WorkflowStepConfig};

use futures::future::try_join_all;
use serde_json::Value;

use crate::agent::Message;
use crate::coordinator::{Coordinator, ResponseHandle};
use crate::error::Result;

/// An ordered list of message templates replayed through a coordinator.
/// Created per execution; owns nothing beyond its own step list.
pub struct Workflow {
    coordinator: Coordinator,
    steps: Vec<Message>,
}

impl Workflow {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator,
            steps: Vec::new(),
        }
    }

    pub fn add_step(&mut self, message: Message) {
        self.steps.push(message);
    }

    pub fn steps(&self) -> &[Message] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Submits every step in order without waiting for processing or for
    /// replies. Any reply envelopes are delivered on the bus only; a
    /// sender that is not itself a registered agent never sees them.
    pub fn submit(&self) -> Result<()> {
        for step in &self.steps {
            self.coordinator.send_message(step.clone())?;
        }
        Ok(())
    }

    /// Submits every step in order, then waits for each step's output.
    /// Every step is upgraded to a request; results come back in step
    /// order. A step whose receiver is unknown or whose processing raised
    /// fails the whole execution.
    pub async fn execute(&self) -> Result<Vec<Value>> {
        let mut handles = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            handles.push(self.coordinator.send_request(step.clone())?);
        }
        try_join_all(handles.into_iter().map(ResponseHandle::wait)).await
    }
}
