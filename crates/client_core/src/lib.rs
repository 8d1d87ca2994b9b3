use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    domain::{AgentId, ConnectionStatus, EmailReceipt, Repository},
    error::AgentCallError,
    protocol::AgentResult,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub mod classify;
pub mod fixtures;
pub mod format;
pub mod schema;
pub mod transport;

use classify::{
    classify_connection_failure, classify_email_status, is_plausible_email, ConnectionFailure,
    EmailDelivery,
};
use schema::{parse_email_receipt, parse_repositories};
pub use transport::{HttpAgentInvoker, HttpInvokerOptions};

pub const MANAGER_AGENT_ID: &str = "698dad3c9bedf36d52f84667";
pub const GITHUB_DATA_AGENT_ID: &str = "698dad212dc7772e4cc0755e";
pub const EMAIL_COMPOSER_AGENT_ID: &str = "698dad2e75b236a82be3cfbc";

const CHECK_CONNECTION_PROMPT: &str =
    "Check if my GitHub account is connected and return the connection status";
const FETCH_REPOSITORIES_PROMPT: &str = "Fetch my GitHub repositories with their commit history";

const CONNECTED_MESSAGE: &str = "GitHub account is connected and ready";
const NOT_CONNECTED_MESSAGE: &str =
    "GitHub account is not connected. Please connect your account.";
const UNVERIFIED_MESSAGE: &str = "Unable to verify connection status";
const CHECK_FAILED_MESSAGE: &str = "Error checking connection status";

const NO_REPOSITORIES_MESSAGE: &str =
    "No repositories found. Please ensure your GitHub account is connected.";
const FETCH_FAILED_MESSAGE: &str = "Failed to fetch repositories";
const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred";

const MISSING_RECIPIENT_MESSAGE: &str = "Please enter a recipient email address";
const INVALID_RECIPIENT_MESSAGE: &str = "Please enter a valid email address";
const FETCH_FIRST_MESSAGE: &str = "Please fetch repositories first before sharing";
const EMAIL_FAILED_MESSAGE: &str = "Failed to send email";

/// The instruction sent to the manager agent. Only the recipient travels with
/// it; the agent is expected to hold the repository context itself.
pub fn share_prompt(recipient: &str) -> String {
    format!(
        "Send an email to {recipient} with a summary of my GitHub repositories and recent commits"
    )
}

/// Calls one agent with a natural-language instruction.
///
/// `Ok(AgentResult::Failure)` is a call the service answered with
/// `success: false`; `Err` is a call that never produced an answer.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, prompt: &str, agent_id: &AgentId)
        -> Result<AgentResult, AgentCallError>;
}

#[async_trait]
impl<T> AgentInvoker for Arc<T>
where
    T: AgentInvoker + ?Sized,
{
    async fn invoke(
        &self,
        prompt: &str,
        agent_id: &AgentId,
    ) -> Result<AgentResult, AgentCallError> {
        (**self).invoke(prompt, agent_id).await
    }
}

/// Routing keys for the agents the dashboard talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDirectory {
    pub manager: AgentId,
    pub github_data: AgentId,
    pub email_composer: AgentId,
}

impl Default for AgentDirectory {
    fn default() -> Self {
        Self {
            manager: AgentId::new(MANAGER_AGENT_ID),
            github_data: AgentId::new(GITHUB_DATA_AGENT_ID),
            email_composer: AgentId::new(EMAIL_COMPOSER_AGENT_ID),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CheckConnection,
    FetchRepositories,
    ShareViaEmail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlightOperation {
    pub id: Uuid,
    pub operation: Operation,
    pub agent_id: AgentId,
}

/// Everything the view renders. Each operation owns its own slots; the
/// in-flight list is shared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    pub repositories: Vec<Repository>,
    pub loading: bool,
    pub error: Option<String>,
    pub email_loading: bool,
    pub email_error: Option<String>,
    pub email_success: Option<String>,
    pub recipient_email: String,
    pub use_sample_data: bool,
    pub connection_status: ConnectionStatus,
    pub status_message: String,
    pub in_flight: Vec<InFlightOperation>,
}

impl DashboardState {
    /// Most recently started operation that has not settled yet.
    pub fn active_agent(&self) -> Option<&AgentId> {
        self.in_flight.last().map(|op| &op.agent_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Sample(usize),
    Loaded(usize),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareOutcome {
    /// Refused locally; no agent call was made.
    Rejected(String),
    Sent(String),
    Failed(String),
}

fn lock(state: &Mutex<DashboardState>) -> MutexGuard<'_, DashboardState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Deregisters an operation when it settles or when its future is dropped.
struct InFlightGuard<'a> {
    state: &'a Mutex<DashboardState>,
    id: Uuid,
    settle: fn(&mut DashboardState),
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = lock(self.state);
        state.in_flight.retain(|op| op.id != self.id);
        (self.settle)(&mut state);
    }
}

pub struct DashboardController<I: AgentInvoker> {
    invoker: I,
    agents: AgentDirectory,
    sample_repositories: Vec<Repository>,
    state: Mutex<DashboardState>,
}

impl<I: AgentInvoker> DashboardController<I> {
    pub fn new(invoker: I, agents: AgentDirectory) -> Self {
        Self::with_clock(invoker, agents, Utc::now())
    }

    /// `now` anchors the sample fixture timestamps.
    pub fn with_clock(invoker: I, agents: AgentDirectory, now: DateTime<Utc>) -> Self {
        Self {
            invoker,
            agents,
            sample_repositories: fixtures::sample_repositories(now),
            state: Mutex::new(DashboardState::default()),
        }
    }

    pub fn agents(&self) -> &AgentDirectory {
        &self.agents
    }

    pub fn snapshot(&self) -> DashboardState {
        lock(&self.state).clone()
    }

    pub fn active_agent(&self) -> Option<AgentId> {
        lock(&self.state).active_agent().cloned()
    }

    pub fn is_busy(&self) -> bool {
        !lock(&self.state).in_flight.is_empty()
    }

    /// Switching sample mode on drops the live list and any fetch error.
    pub fn set_use_sample_data(&self, enabled: bool) {
        let mut state = lock(&self.state);
        if enabled && !state.use_sample_data {
            state.repositories.clear();
            state.error = None;
        }
        state.use_sample_data = enabled;
    }

    /// Editing the recipient clears the previous send result.
    pub fn set_recipient_email(&self, recipient: &str) {
        let mut state = lock(&self.state);
        state.recipient_email = recipient.to_string();
        state.email_error = None;
        state.email_success = None;
    }

    /// The list the view shows: the fixture in sample mode, otherwise the
    /// last fetched repositories.
    pub fn displayed_repositories(&self) -> Vec<Repository> {
        let state = lock(&self.state);
        if state.use_sample_data {
            self.sample_repositories.clone()
        } else {
            state.repositories.clone()
        }
    }

    fn update<R>(&self, apply: impl FnOnce(&mut DashboardState) -> R) -> R {
        apply(&mut lock(&self.state))
    }

    fn begin(
        &self,
        operation: Operation,
        agent_id: &AgentId,
        settle: fn(&mut DashboardState),
    ) -> InFlightGuard<'_> {
        let id = Uuid::new_v4();
        self.update(|state| {
            state.in_flight.push(InFlightOperation {
                id,
                operation,
                agent_id: agent_id.clone(),
            })
        });
        debug!(operation = ?operation, agent_id = %agent_id, op_id = %id, "agent operation started");
        InFlightGuard {
            state: &self.state,
            id,
            settle,
        }
    }

    /// Any answer from the data agent counts as proof of connectivity.
    pub async fn check_connection(&self) -> ConnectionStatus {
        let agent_id = self.agents.github_data.clone();
        self.update(|state| {
            state.connection_status = ConnectionStatus::Checking;
            state.status_message.clear();
        });
        let _in_flight = self.begin(Operation::CheckConnection, &agent_id, |state| {
            if state.connection_status == ConnectionStatus::Checking {
                state.connection_status = ConnectionStatus::Disconnected;
            }
        });

        let outcome = self
            .invoker
            .invoke(CHECK_CONNECTION_PROMPT, &agent_id)
            .await;

        let (status, message) = match outcome {
            Ok(AgentResult::Success { .. }) => {
                info!(agent_id = %agent_id, "agent connection verified");
                (ConnectionStatus::Connected, CONNECTED_MESSAGE.to_string())
            }
            Ok(AgentResult::Failure { error }) => {
                let error = error.unwrap_or_default();
                warn!(agent_id = %agent_id, error = %error, "agent connection check failed");
                let message = match classify_connection_failure(&error) {
                    ConnectionFailure::NotConnected => NOT_CONNECTED_MESSAGE,
                    ConnectionFailure::Other => UNVERIFIED_MESSAGE,
                };
                (ConnectionStatus::Disconnected, message.to_string())
            }
            Err(err) => {
                warn!(agent_id = %agent_id, error = %err, "agent connection check errored");
                (
                    ConnectionStatus::Disconnected,
                    CHECK_FAILED_MESSAGE.to_string(),
                )
            }
        };

        self.update(|state| {
            state.connection_status = status;
            state.status_message = message;
        });
        status
    }

    /// Replaces the repository list wholesale. In sample mode the fixture is
    /// assigned and no call is made.
    pub async fn fetch_repositories(&self) -> FetchOutcome {
        let sample = self.update(|state| {
            if state.use_sample_data {
                state.repositories = self.sample_repositories.clone();
                Some(state.repositories.len())
            } else {
                None
            }
        });
        if let Some(count) = sample {
            debug!(count, "serving sample repositories");
            return FetchOutcome::Sample(count);
        }

        let agent_id = self.agents.github_data.clone();
        self.update(|state| {
            state.loading = true;
            state.error = None;
        });
        let _in_flight = self.begin(Operation::FetchRepositories, &agent_id, |state| {
            state.loading = false
        });

        let outcome = self
            .invoker
            .invoke(FETCH_REPOSITORIES_PROMPT, &agent_id)
            .await;

        match outcome {
            Ok(AgentResult::Success { result }) => {
                let repositories = parse_repositories(result.as_ref()).unwrap_or_else(|err| {
                    warn!(agent_id = %agent_id, error = %err, "agent result has no repository list");
                    Vec::new()
                });
                let count = repositories.len();
                info!(agent_id = %agent_id, count, "repositories fetched");
                self.update(|state| {
                    state.repositories = repositories;
                    if count == 0 {
                        state.error = Some(NO_REPOSITORIES_MESSAGE.to_string());
                    }
                });
                if count == 0 {
                    FetchOutcome::Failed(NO_REPOSITORIES_MESSAGE.to_string())
                } else {
                    FetchOutcome::Loaded(count)
                }
            }
            Ok(AgentResult::Failure { error }) => {
                warn!(agent_id = %agent_id, error = ?error, "repository fetch failed");
                let message = error.unwrap_or_else(|| FETCH_FAILED_MESSAGE.to_string());
                self.update(|state| state.error = Some(message.clone()));
                FetchOutcome::Failed(message)
            }
            Err(err) => {
                warn!(agent_id = %agent_id, error = %err, "repository fetch errored");
                let message = err.detail().unwrap_or(UNEXPECTED_MESSAGE).to_string();
                self.update(|state| state.error = Some(message.clone()));
                FetchOutcome::Failed(message)
            }
        }
    }

    /// Asks the manager agent to email a summary to `recipient`. Delivery is
    /// judged from the returned status text, not from the call's own flag.
    pub async fn share_via_email(&self, recipient: &str) -> ShareOutcome {
        let rejection = self.update(|state| {
            state.recipient_email = recipient.to_string();
            let rejection = if recipient.is_empty() {
                Some(MISSING_RECIPIENT_MESSAGE)
            } else if !is_plausible_email(recipient) {
                Some(INVALID_RECIPIENT_MESSAGE)
            } else if state.repositories.is_empty() && !state.use_sample_data {
                Some(FETCH_FIRST_MESSAGE)
            } else {
                None
            };
            if let Some(message) = rejection {
                state.email_error = Some(message.to_string());
            }
            rejection
        });
        if let Some(message) = rejection {
            debug!(reason = message, "share request rejected");
            return ShareOutcome::Rejected(message.to_string());
        }

        let agent_id = self.agents.manager.clone();
        self.update(|state| {
            state.email_loading = true;
            state.email_error = None;
            state.email_success = None;
        });
        let _in_flight = self.begin(Operation::ShareViaEmail, &agent_id, |state| {
            state.email_loading = false
        });

        let outcome = self
            .invoker
            .invoke(&share_prompt(recipient), &agent_id)
            .await;

        match outcome {
            Ok(AgentResult::Success { result }) => {
                let receipt = parse_email_receipt(result.as_ref()).unwrap_or_else(|err| {
                    warn!(agent_id = %agent_id, error = %err, "agent result has no delivery report");
                    EmailReceipt::default()
                });
                match classify_email_status(receipt.status()) {
                    EmailDelivery::Sent => {
                        let message = receipt
                            .message()
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("Email successfully sent to {recipient}"));
                        info!(agent_id = %agent_id, "summary email sent");
                        self.update(|state| {
                            state.email_success = Some(message.clone());
                            state.recipient_email.clear();
                        });
                        ShareOutcome::Sent(message)
                    }
                    EmailDelivery::NotSent => {
                        let message = receipt.message().unwrap_or(EMAIL_FAILED_MESSAGE).to_string();
                        warn!(
                            agent_id = %agent_id,
                            status = receipt.status(),
                            "agent did not report delivery"
                        );
                        self.update(|state| state.email_error = Some(message.clone()));
                        ShareOutcome::Failed(message)
                    }
                }
            }
            Ok(AgentResult::Failure { error }) => {
                warn!(agent_id = %agent_id, error = ?error, "share request failed");
                let message = error.unwrap_or_else(|| EMAIL_FAILED_MESSAGE.to_string());
                self.update(|state| state.email_error = Some(message.clone()));
                ShareOutcome::Failed(message)
            }
            Err(err) => {
                warn!(agent_id = %agent_id, error = %err, "share request errored");
                self.update(|state| state.email_error = Some(UNEXPECTED_MESSAGE.to_string()));
                ShareOutcome::Failed(UNEXPECTED_MESSAGE.to_string())
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
