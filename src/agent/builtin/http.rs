use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use crate::agent::{Agent, AgentDescriptor, AgentFactoryRegistry};
use crate::config::EnvConfig;
use crate::error::{AgentBusError, Result};

/// One named upstream API: base URL plus an optional bearer key.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

/// Performs outbound HTTP calls against a table of named services. Input:
/// `{"service", "endpoint", "method", "params", "data", "headers"}`;
/// output: `{"status": code, "data": body}`.
pub struct HttpApiAgent {
    descriptor: AgentDescriptor,
    client: Client,
    services: HashMap<String, ServiceConfig>,
}

impl HttpApiAgent {
    pub fn new(descriptor: AgentDescriptor) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| AgentBusError::Other(anyhow!(e)))?;
        Ok(Self {
            descriptor,
            client,
            services: Self::default_services(),
        })
    }

    /// Well-known services, keyed to their conventional environment
    /// variables. Missing keys leave the service usable unauthenticated.
    fn default_services() -> HashMap<String, ServiceConfig> {
        let mut services = HashMap::new();
        services.insert(
            "openai".to_string(),
            ServiceConfig {
                base_url: "https://api.openai.com/v1/".to_string(),
                api_key: EnvConfig::get_env_optional("OPENAI_API_KEY"),
            },
        );
        services.insert(
            "github".to_string(),
            ServiceConfig {
                base_url: "https://api.github.com/".to_string(),
                api_key: EnvConfig::get_env_optional("GITHUB_TOKEN"),
            },
        );
        services
    }

    pub fn with_service(mut self, name: impl Into<String>, config: ServiceConfig) -> Self {
        self.services.insert(name.into(), config);
        self
    }

    async fn execute(&self, input: &Value) -> Result<Value> {
        let service = input
            .get("service")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if service.is_empty() {
            return Err(AgentBusError::Processing(
                "service name is required".to_string(),
            ));
        }
        let config = self.services.get(service).ok_or_else(|| {
            AgentBusError::Processing(format!("unknown service: {service}"))
        })?;

        let endpoint = input
            .get("endpoint")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let method_name = input
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_uppercase();
        let method: reqwest::Method = method_name
            .parse()
            .map_err(|_| AgentBusError::Processing(format!("unsupported method: {method_name}")))?;

        let url = format!(
            "{}/{}",
            config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );

        let mut request = self.client.request(method, url);
        if let Some(key) = &config.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(params) = input.get("params").filter(|p| !p.is_null()) {
            let params: HashMap<String, String> = serde_json::from_value(params.clone())
                .map_err(|e| AgentBusError::Processing(format!("invalid params: {e}")))?;
            request = request.query(&params);
        }
        if let Some(headers) = input.get("headers").filter(|h| !h.is_null()) {
            let headers: HashMap<String, String> = serde_json::from_value(headers.clone())
                .map_err(|e| AgentBusError::Processing(format!("invalid headers: {e}")))?;
            for (name, value) in &headers {
                request = request.header(name.as_str(), value.as_str());
            }
        }
        if let Some(data) = input.get("data").filter(|d| !d.is_null()) {
            request = request.json(data);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AgentBusError::Processing(format!("request to {service} failed: {e}")))?;
        let status = response.status().as_u16();
        let data: Value = response
            .json()
            .await
            .map_err(|e| AgentBusError::Processing(format!("invalid response body: {e}")))?;

        Ok(json!({ "status": status, "data": data }))
    }
}

#[async_trait]
impl Agent for HttpApiAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process(&self, input: Value) -> Result<Value> {
        match self.execute(&input).await {
            Ok(result) => Ok(result),
            Err(err) => {
                self.handle_error(&err).await;
                Ok(json!({ "error": err.to_string() }))
            }
        }
    }

    async fn handle_error(&self, error: &AgentBusError) {
        error!(agent = %self.name(), %error, "api call failed");
    }
}

#[derive(Deserialize)]
struct HttpAgentConfig {
    #[serde(flatten)]
    descriptor: AgentDescriptor,
    #[serde(default)]
    services: HashMap<String, ServiceEntry>,
}

#[derive(Deserialize)]
struct ServiceEntry {
    base_url: String,
    #[serde(default)]
    api_key: Option<String>,
}

pub(super) fn register_http_agent_factory(registry: &mut AgentFactoryRegistry) {
    registry.register(
        "http_api",
        Arc::new(|config| {
            let normalized = config.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
            let conf: HttpAgentConfig = serde_json::from_value(normalized)
                .map_err(|e| AgentBusError::Other(anyhow!(e)))?;
            let mut agent = HttpApiAgent::new(conf.descriptor)?;
            for (name, entry) in conf.services {
                let api_key = match entry.api_key {
                    Some(raw) => Some(EnvConfig::resolve(&raw)?),
                    None => None,
                };
                agent = agent.with_service(
                    name,
                    ServiceConfig {
                        base_url: entry.base_url,
                        api_key,
                    },
                );
            }
            Ok(Arc::new(agent) as Arc<dyn Agent>)
        }),
    );
}
