use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message type the coordinator stamps on reply envelopes. Every other
/// message type is opaque to the bus and only meaningful to agents.
pub const RESPONSE_MESSAGE_TYPE: &str = "response";

/// The unit of transport between sender and receiver names. Created per
/// hop; never mutated after it enters the queue.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub sender: String,
    pub receiver: String,
    pub content: Value,
    pub message_type: String,
    #[serde(default)]
    pub context: MessageContext,
}

impl Message {
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        content: Value,
        message_type: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            content,
            message_type: message_type.into(),
            context: MessageContext::default(),
        }
    }

    /// A message whose sender expects a reply envelope.
    pub fn request(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        content: Value,
        message_type: impl Into<String>,
    ) -> Self {
        Self::new(sender, receiver, content, message_type)
            .with_context(MessageContext::requiring_response())
    }

    /// The reply envelope for `request`: sender and receiver swapped,
    /// context carried over unchanged so the two ends can match them up.
    pub fn response_to(request: &Message, content: Value) -> Self {
        Self {
            sender: request.receiver.clone(),
            receiver: request.sender.clone(),
            content,
            message_type: RESPONSE_MESSAGE_TYPE.to_string(),
            context: request.context.clone(),
        }
    }

    pub fn with_context(mut self, context: MessageContext) -> Self {
        self.context = context;
        self
    }

    pub fn requires_response(&self) -> bool {
        self.context.requires_response
    }

    pub fn is_response(&self) -> bool {
        self.message_type == RESPONSE_MESSAGE_TYPE
    }
}

/// Auxiliary flags carried with a message. `requires_response` drives the
/// reply path; `correlation_id` is stamped by request submission so a
/// completion handle can be resolved when the matching request finishes.
/// Any other keys pass through untouched in `extra`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageContext {
    #[serde(default)]
    pub requires_response: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requiring_response() -> Self {
        Self {
            requires_response: true,
            ..Self::default()
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}
