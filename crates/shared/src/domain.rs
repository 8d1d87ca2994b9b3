use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Commits shown per repository card.
pub const MAX_RECENT_COMMITS: usize = 5;

pub const UNNAMED_REPOSITORY: &str = "Unnamed Repository";
pub const NO_DESCRIPTION: &str = "No description available";
pub const NO_COMMIT_MESSAGE: &str = "No message";
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Routing key for one agent on the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Unknown,
    Checking,
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionStatus::Unknown => "unknown",
            ConnectionStatus::Checking => "checking",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        };
        f.write_str(label)
    }
}

/// A commit as reported by the data agent. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: Option<String>,
}

impl Commit {
    /// Builds a commit from any JSON value; non-objects yield an empty commit.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    pub fn message(&self) -> &str {
        non_empty(&self.message).unwrap_or(NO_COMMIT_MESSAGE)
    }

    pub fn author(&self) -> &str {
        self.author.as_deref().unwrap_or(UNKNOWN_AUTHOR)
    }

    pub fn timestamp(&self) -> &str {
        self.timestamp.as_deref().unwrap_or_default()
    }
}

/// A repository as reported by the data agent. Every field may be missing;
/// accessors substitute display defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub language: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub stars: u64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_updated: Option<String>,
    #[serde(default, deserialize_with = "lenient_commits")]
    pub commits: Vec<Commit>,
}

impl Repository {
    /// Builds a repository from any JSON value; non-objects yield defaults.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNNAMED_REPOSITORY)
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or(NO_DESCRIPTION)
    }

    pub fn language(&self) -> Option<&str> {
        non_empty(&self.language)
    }

    pub fn last_updated(&self) -> Option<&str> {
        non_empty(&self.last_updated)
    }

    pub fn recent_commits(&self) -> &[Commit] {
        let end = self.commits.len().min(MAX_RECENT_COMMITS);
        &self.commits[..end]
    }
}

/// Delivery report returned by the manager agent after an email request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailReceipt {
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub recipient: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
}

impl EmailReceipt {
    pub fn status(&self) -> &str {
        self.status.as_deref().unwrap_or_default()
    }

    pub fn message(&self) -> Option<&str> {
        non_empty(&self.message)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(value) => Some(value),
        _ => None,
    })
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let count = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        _ => None,
    };
    Ok(count.unwrap_or_default())
}

fn lenient_commits<'de, D>(deserializer: D) -> Result<Vec<Commit>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().map(Commit::from_value).collect(),
        _ => Vec::new(),
    })
}
