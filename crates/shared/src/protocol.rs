use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::AgentId;

/// Body posted to the agent service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub message: String,
    pub agent_id: AgentId,
}

impl AgentRequest {
    pub fn new(message: impl Into<String>, agent_id: AgentId) -> Self {
        Self {
            message: message.into(),
            agent_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResponseBody {
    #[serde(default)]
    pub result: Option<Value>,
}

/// Envelope returned by the agent service:
/// `{success, response?: {result?}, error?}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AgentResponseBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentEnvelope {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            response: Some(AgentResponseBody {
                result: Some(result),
            }),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            response: None,
            error: Some(error.into()),
        }
    }
}

/// Settled outcome of one agent call.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentResult {
    Success { result: Option<Value> },
    Failure { error: Option<String> },
}

impl AgentResult {
    pub fn success(result: Value) -> Self {
        Self::Success {
            result: Some(result),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<AgentEnvelope> for AgentResult {
    fn from(value: AgentEnvelope) -> Self {
        if value.success {
            Self::Success {
                result: value.response.and_then(|body| body.result),
            }
        } else {
            Self::Failure {
                error: value.error.filter(|e| !e.is_empty()),
            }
        }
    }
}
