//! HTTP transport to the agent service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::AgentId,
    error::{AgentCallError, CallErrorKind},
    protocol::{AgentEnvelope, AgentRequest, AgentResult},
};
use tracing::debug;
use url::Url;

use crate::AgentInvoker;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, Default)]
pub struct HttpInvokerOptions {
    pub api_key: Option<String>,
    /// Applied per request; unset means the call waits for the service.
    pub request_timeout: Option<Duration>,
}

pub struct HttpAgentInvoker {
    http: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpAgentInvoker {
    pub fn new(endpoint: Url, options: HttpInvokerOptions) -> Result<Self, AgentCallError> {
        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|err| {
            AgentCallError::new(
                CallErrorKind::Internal,
                format!("failed to build http client: {err}"),
            )
        })?;
        Ok(Self {
            http,
            endpoint,
            api_key: options.api_key.filter(|key| !key.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn call_error(err: reqwest::Error) -> AgentCallError {
    let kind = if err.is_timeout() {
        CallErrorKind::Timeout
    } else if err.is_decode() {
        CallErrorKind::Decode
    } else {
        CallErrorKind::Transport
    };
    AgentCallError::new(kind, err.to_string())
}

#[async_trait]
impl AgentInvoker for HttpAgentInvoker {
    async fn invoke(&self, prompt: &str, agent_id: &AgentId) -> Result<AgentResult, AgentCallError> {
        let mut request = self
            .http
            .post(self.endpoint.clone())
            .json(&AgentRequest::new(prompt, agent_id.clone()));
        if let Some(api_key) = &self.api_key {
            request = request.header(API_KEY_HEADER, api_key);
        }

        let response = request.send().await.map_err(call_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(call_error)?;
        debug!(
            agent_id = %agent_id,
            status = status.as_u16(),
            bytes = body.len(),
            "agent call settled"
        );

        let http_failure = || {
            AgentResult::failure(format!(
                "agent service returned HTTP {}",
                status.as_u16()
            ))
        };
        match serde_json::from_slice::<AgentEnvelope>(&body) {
            Ok(envelope) if status.is_success() => Ok(envelope.into()),
            Ok(envelope) => match AgentResult::from(envelope) {
                failure @ AgentResult::Failure { error: Some(_) } => Ok(failure),
                _ => Ok(http_failure()),
            },
            Err(err) if status.is_success() => Err(AgentCallError::new(
                CallErrorKind::Decode,
                format!("invalid agent response: {err}"),
            )),
            Err(_) => Ok(http_failure()),
        }
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
