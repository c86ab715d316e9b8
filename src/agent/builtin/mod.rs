use std::fs;
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::error;

use crate::agent::{Agent, AgentDescriptor, AgentFactoryRegistry};
use crate::error::{AgentBusError, Result};

#[cfg(feature = "http-agent")]
pub mod http;
#[cfg(feature = "http-agent")]
pub use http::{HttpApiAgent, ServiceConfig};

/// Returns its input unchanged, annotated with uptime since construction.
pub struct EchoAgent {
    descriptor: AgentDescriptor,
    started_at: Instant,
}

impl EchoAgent {
    pub fn new(descriptor: AgentDescriptor) -> Self {
        Self {
            descriptor,
            started_at: Instant::now(),
        }
    }
}

#[async_trait]
impl Agent for EchoAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process(&self, input: Value) -> Result<Value> {
        Ok(json!({
            "input": input,
            "uptime": self.started_at.elapsed().as_secs_f64(),
            "processed": true,
        }))
    }
}

/// Word and character statistics plus case conversions over text input,
/// with an in-memory history of every result produced.
pub struct TextStatsAgent {
    descriptor: AgentDescriptor,
    history: Mutex<Vec<Value>>,
}

impl TextStatsAgent {
    pub fn new(descriptor: AgentDescriptor) -> Self {
        Self {
            descriptor,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn history(&self) -> Vec<Value> {
        self.history.lock().clone()
    }

    fn extract_text(input: &Value) -> Option<&str> {
        input
            .as_str()
            .or_else(|| input.get("text").and_then(Value::as_str))
    }
}

#[async_trait]
impl Agent for TextStatsAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process(&self, input: Value) -> Result<Value> {
        let Some(text) = Self::extract_text(&input) else {
            let err = AgentBusError::Processing(
                "text input must be a string or an object with a `text` field".to_string(),
            );
            self.handle_error(&err).await;
            return Ok(json!({ "error": err.to_string() }));
        };

        let result = json!({
            "original": text,
            "word_count": text.split_whitespace().count(),
            "char_count": text.chars().count(),
            "uppercase": text.to_uppercase(),
            "lowercase": text.to_lowercase(),
        });
        self.history.lock().push(result.clone());
        Ok(result)
    }

    async fn handle_error(&self, error: &AgentBusError) {
        error!(agent = %self.name(), %error, "text processing failed");
    }
}

/// Reads and writes JSON data files. Input selects the operation:
/// `{"operation": "read", "source": path}` or
/// `{"operation": "write", "target": path, "data": ...}`.
pub struct DataFileAgent {
    descriptor: AgentDescriptor,
}

impl DataFileAgent {
    pub fn new(descriptor: AgentDescriptor) -> Self {
        Self { descriptor }
    }

    fn run(&self, input: &Value) -> Result<Value> {
        let operation = input
            .get("operation")
            .and_then(Value::as_str)
            .unwrap_or("read");
        match operation {
            "read" => {
                let source = required_field(input, "source")?;
                let raw = fs::read_to_string(source).map_err(|e| {
                    AgentBusError::Processing(format!("failed to read `{source}`: {e}"))
                })?;
                let data: Value = serde_json::from_str(&raw)
                    .map_err(|e| AgentBusError::Serialization(e.to_string()))?;
                Ok(json!({ "data": data }))
            }
            "write" => {
                let target = required_field(input, "target")?;
                let data = input.get("data").cloned().unwrap_or(Value::Null);
                let raw = serde_json::to_string_pretty(&data)
                    .map_err(|e| AgentBusError::Serialization(e.to_string()))?;
                fs::write(target, raw).map_err(|e| {
                    AgentBusError::Processing(format!("failed to write `{target}`: {e}"))
                })?;
                Ok(json!({ "status": "success", "target": target }))
            }
            other => Err(AgentBusError::Processing(format!(
                "unsupported operation: {other}"
            ))),
        }
    }
}

fn required_field<'a>(input: &'a Value, field: &str) -> Result<&'a str> {
    input
        .get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AgentBusError::Processing(format!("`{field}` is required")))
}

#[async_trait]
impl Agent for DataFileAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process(&self, input: Value) -> Result<Value> {
        match self.run(&input) {
            Ok(result) => Ok(result),
            Err(err) => {
                self.handle_error(&err).await;
                Ok(json!({ "error": err.to_string() }))
            }
        }
    }

    async fn handle_error(&self, error: &AgentBusError) {
        error!(agent = %self.name(), %error, "data operation failed");
    }
}

fn extract_config<T: DeserializeOwned>(value: Option<Value>) -> Result<T> {
    let normalized = value.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    serde_json::from_value(normalized).map_err(|e| AgentBusError::Other(anyhow!(e)))
}

pub fn register_builtin_agent_factories(registry: &mut AgentFactoryRegistry) {
    registry.register(
        "echo",
        Arc::new(|config| {
            let descriptor: AgentDescriptor = extract_config(config)?;
            Ok(Arc::new(EchoAgent::new(descriptor)) as Arc<dyn Agent>)
        }),
    );

    registry.register(
        "text_stats",
        Arc::new(|config| {
            let descriptor: AgentDescriptor = extract_config(config)?;
            Ok(Arc::new(TextStatsAgent::new(descriptor)) as Arc<dyn Agent>)
        }),
    );

    registry.register(
        "data_file",
        Arc::new(|config| {
            let descriptor: AgentDescriptor = extract_config(config)?;
            Ok(Arc::new(DataFileAgent::new(descriptor)) as Arc<dyn Agent>)
        }),
    );

    #[cfg(feature = "http-agent")]
    http::register_http_agent_factory(registry);
}
