use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallErrorKind {
    Transport,
    Timeout,
    Decode,
    Internal,
}

/// An agent call that did not settle with a result envelope.
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct AgentCallError {
    pub kind: CallErrorKind,
    pub message: String,
}

impl AgentCallError {
    pub fn new(kind: CallErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The human readable part of the error, if there is one.
    pub fn detail(&self) -> Option<&str> {
        let message = self.message.trim();
        (!message.is_empty()).then_some(message)
    }
}

/// The agent's `response.result` did not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("agent response carried no result")]
    MissingResult,
    #[error("agent result is not an object")]
    NotAnObject,
    #[error("agent result is missing field `{0}`")]
    MissingField(&'static str),
    #[error("agent result field `{0}` is not a list")]
    NotAList(&'static str),
}
