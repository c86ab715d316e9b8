use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::{Message, MessageContext};
use crate::coordinator::Coordinator;
use crate::error::{AgentBusError, Result};

use super::Workflow;

pub const DEFAULT_STEP_TYPE: &str = "process";

/// JSON workflow description: `{"name": ..., "steps": [{"agent", "input",
/// "type"}]}`. Validation happens at load time, before any loop runs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkflowConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub steps: Vec<WorkflowStepConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkflowStepConfig {
    pub agent: String,
    pub input: Value,
    #[serde(default = "default_step_type", rename = "type")]
    pub step_type: String,
}

fn default_step_type() -> String {
    DEFAULT_STEP_TYPE.to_string()
}

impl WorkflowConfig {
    pub fn from_value(value: Value) -> Result<Self> {
        let config: WorkflowConfig = serde_json::from_value(value)
            .map_err(|e| AgentBusError::WorkflowConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_str(raw: &str) -> Result<Self> {
        let config: WorkflowConfig = serde_json::from_str(raw)
            .map_err(|e| AgentBusError::WorkflowConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            AgentBusError::WorkflowConfig(format!("failed to read `{}`: {e}", path.display()))
        })?;
        Self::from_str(&raw)
    }

    fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(AgentBusError::WorkflowConfig(
                "workflow has no steps".to_string(),
            ));
        }
        for (index, step) in self.steps.iter().enumerate() {
            if step.agent.trim().is_empty() {
                return Err(AgentBusError::InvalidWorkflowStep {
                    index,
                    reason: "agent name is empty".to_string(),
                });
            }
            if step.input.is_null() {
                return Err(AgentBusError::InvalidWorkflowStep {
                    index,
                    reason: "input is missing".to_string(),
                });
            }
            if step.step_type.trim().is_empty() {
                return Err(AgentBusError::InvalidWorkflowStep {
                    index,
                    reason: "step type is empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Translates the description into a workflow of request messages
    /// submitted on behalf of `sender`.
    pub fn build_workflow(&self, coordinator: Coordinator, sender: &str) -> Workflow {
        let mut workflow = Workflow::new(coordinator);
        for step in &self.steps {
            workflow.add_step(
                Message::new(sender, &step.agent, step.input.clone(), &step.step_type)
                    .with_context(MessageContext::requiring_response()),
            );
        }
        workflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_type_defaults_to_process() {
        let config = WorkflowConfig::from_value(json!({
            "steps": [{ "agent": "echo", "input": "hi" }]
        }))
        .expect("config should parse");
        assert_eq!(config.steps[0].step_type, DEFAULT_STEP_TYPE);
    }

    #[test]
    fn empty_agent_name_is_rejected() {
        let err = WorkflowConfig::from_value(json!({
            "steps": [
                { "agent": "echo", "input": "hi" },
                { "agent": "  ", "input": "hi" }
            ]
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            AgentBusError::InvalidWorkflowStep { index: 1, .. }
        ));
    }

    #[test]
    fn null_input_is_rejected() {
        let err = WorkflowConfig::from_value(json!({
            "steps": [{ "agent": "echo", "input": null }]
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            AgentBusError::InvalidWorkflowStep { index: 0, .. }
        ));
    }

    #[test]
    fn missing_steps_are_rejected() {
        let err = WorkflowConfig::from_str(r#"{ "steps": [] }"#).unwrap_err();
        assert!(matches!(err, AgentBusError::WorkflowConfig(_)));

        let err = WorkflowConfig::from_str(r#"{ "name": "empty" }"#).unwrap_err();
        assert!(matches!(err, AgentBusError::WorkflowConfig(_)));
    }

    #[test]
    fn built_steps_are_requests_from_sender() {
        let config = WorkflowConfig::from_value(json!({
            "steps": [{ "agent": "stats", "input": { "text": "hello" }, "type": "analyze" }]
        }))
        .expect("config should parse");

        let workflow = config.build_workflow(crate::coordinator::Coordinator::new(), "cli");
        let steps = workflow.steps();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].sender, "cli");
        assert_eq!(steps[0].receiver, "stats");
        assert_eq!(steps[0].message_type, "analyze");
        assert!(steps[0].requires_response());
    }
}
