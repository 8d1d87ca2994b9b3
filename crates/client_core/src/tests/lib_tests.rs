use super::*;
use std::{collections::HashMap, collections::VecDeque, time::Duration};

use chrono::TimeZone;
use serde_json::json;
use shared::error::CallErrorKind;
use tokio::sync::{oneshot, Mutex as AsyncMutex};

type Scripted = Result<AgentResult, AgentCallError>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct RecordedCall {
    prompt: String,
    agent_id: AgentId,
}

/// Replays queued results in order and records every call.
#[derive(Default)]
struct ScriptedInvoker {
    responses: AsyncMutex<VecDeque<Scripted>>,
    calls: AsyncMutex<Vec<RecordedCall>>,
}

impl ScriptedInvoker {
    fn replying(responses: impl IntoIterator<Item = Scripted>) -> Arc<Self> {
        Arc::new(Self {
            responses: AsyncMutex::new(responses.into_iter().collect()),
            calls: AsyncMutex::new(Vec::new()),
        })
    }

    async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl AgentInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        prompt: &str,
        agent_id: &AgentId,
    ) -> Result<AgentResult, AgentCallError> {
        self.calls.lock().await.push(RecordedCall {
            prompt: prompt.to_string(),
            agent_id: agent_id.clone(),
        });
        self.responses.lock().await.pop_front().unwrap_or_else(|| {
            Err(AgentCallError::new(
                CallErrorKind::Internal,
                "no scripted response left",
            ))
        })
    }
}

/// Holds each agent's call open until its gate is released.
#[derive(Default)]
struct GatedInvoker {
    gates: AsyncMutex<HashMap<AgentId, oneshot::Receiver<()>>>,
    results: HashMap<AgentId, AgentResult>,
}

#[async_trait]
impl AgentInvoker for GatedInvoker {
    async fn invoke(
        &self,
        _prompt: &str,
        agent_id: &AgentId,
    ) -> Result<AgentResult, AgentCallError> {
        let gate = self.gates.lock().await.remove(agent_id);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.results
            .get(agent_id)
            .cloned()
            .ok_or_else(|| AgentCallError::new(CallErrorKind::Internal, "no result for agent"))
    }
}

fn clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
}

fn controller<I: AgentInvoker>(invoker: I) -> DashboardController<I> {
    DashboardController::with_clock(invoker, AgentDirectory::default(), clock())
}

fn repositories_result(count: usize) -> AgentResult {
    let repos = (0..count)
        .map(|i| json!({ "name": format!("repo-{i}"), "stars": i }))
        .collect::<Vec<_>>();
    AgentResult::success(json!({ "repositories": repos }))
}

fn transport_error(message: &str) -> AgentCallError {
    AgentCallError::new(CallErrorKind::Transport, message)
}

async fn wait_until(mut ready: impl FnMut() -> bool) {
    for _ in 0..200 {
        if ready() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn check_connection_success_marks_connected() {
    let invoker = ScriptedInvoker::replying([Ok(AgentResult::Success { result: None })]);
    let controller = controller(invoker.clone());

    let status = controller.check_connection().await;

    assert_eq!(status, ConnectionStatus::Connected);
    let state = controller.snapshot();
    assert_eq!(state.connection_status, ConnectionStatus::Connected);
    assert_eq!(state.status_message, CONNECTED_MESSAGE);
    assert_eq!(state.active_agent(), None);

    let calls = invoker.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].prompt, CHECK_CONNECTION_PROMPT);
    assert_eq!(calls[0].agent_id, AgentId::new(GITHUB_DATA_AGENT_ID));
}

#[tokio::test]
async fn check_connection_oauth_failure_uses_not_connected_message() {
    let invoker = ScriptedInvoker::replying([Ok(AgentResult::failure(
        "GitHub OAUTH token missing",
    ))]);
    let controller = controller(invoker);

    let status = controller.check_connection().await;

    assert_eq!(status, ConnectionStatus::Disconnected);
    let state = controller.snapshot();
    assert_eq!(state.status_message, NOT_CONNECTED_MESSAGE);
    assert!(!controller.is_busy());
}

#[tokio::test]
async fn check_connection_other_failure_uses_generic_message() {
    let invoker = ScriptedInvoker::replying([
        Ok(AgentResult::failure("timeout")),
        Ok(AgentResult::Failure { error: None }),
    ]);
    let controller = controller(invoker);

    controller.check_connection().await;
    let state = controller.snapshot();
    assert_eq!(state.connection_status, ConnectionStatus::Disconnected);
    assert_eq!(state.status_message, UNVERIFIED_MESSAGE);

    controller.check_connection().await;
    assert_eq!(controller.snapshot().status_message, UNVERIFIED_MESSAGE);
}

#[tokio::test]
async fn check_connection_exception_marks_disconnected() {
    let invoker = ScriptedInvoker::replying([Err(transport_error("connection refused"))]);
    let controller = controller(invoker);

    controller.check_connection().await;

    let state = controller.snapshot();
    assert_eq!(state.connection_status, ConnectionStatus::Disconnected);
    assert_eq!(state.status_message, CHECK_FAILED_MESSAGE);
    assert_eq!(state.active_agent(), None);
}

#[tokio::test]
async fn sample_mode_fetch_makes_no_call_and_is_idempotent() {
    let invoker = ScriptedInvoker::replying([]);
    let controller = controller(invoker.clone());
    controller.set_use_sample_data(true);

    let first = controller.fetch_repositories().await;
    let first_repos = controller.snapshot().repositories;
    let second = controller.fetch_repositories().await;
    let second_repos = controller.snapshot().repositories;

    assert_eq!(first, FetchOutcome::Sample(5));
    assert_eq!(second, FetchOutcome::Sample(5));
    assert_eq!(first_repos, second_repos);
    assert_eq!(first_repos, fixtures::sample_repositories(clock()));
    assert!(invoker.calls().await.is_empty());
    assert!(!controller.snapshot().loading);
}

#[tokio::test]
async fn fetch_replaces_repositories_wholesale() {
    let invoker = ScriptedInvoker::replying([Ok(repositories_result(3)), Ok(repositories_result(1))]);
    let controller = controller(invoker.clone());

    assert_eq!(controller.fetch_repositories().await, FetchOutcome::Loaded(3));
    assert_eq!(controller.fetch_repositories().await, FetchOutcome::Loaded(1));

    let state = controller.snapshot();
    assert_eq!(state.repositories.len(), 1);
    assert_eq!(state.repositories[0].name(), "repo-0");
    assert_eq!(state.error, None);
    assert!(!state.loading);
    assert_eq!(state.active_agent(), None);

    let calls = invoker.calls().await;
    assert_eq!(calls[0].prompt, FETCH_REPOSITORIES_PROMPT);
    assert_eq!(calls[0].agent_id, AgentId::new(GITHUB_DATA_AGENT_ID));
}

#[tokio::test]
async fn fetch_with_empty_list_is_reported_as_error() {
    let invoker = ScriptedInvoker::replying([Ok(repositories_result(0))]);
    let controller = controller(invoker);

    let outcome = controller.fetch_repositories().await;

    assert_eq!(
        outcome,
        FetchOutcome::Failed(NO_REPOSITORIES_MESSAGE.to_string())
    );
    let state = controller.snapshot();
    assert!(state.repositories.is_empty());
    assert_eq!(state.error.as_deref(), Some(NO_REPOSITORIES_MESSAGE));
}

#[tokio::test]
async fn fetch_with_malformed_result_treats_it_as_empty() {
    let invoker = ScriptedInvoker::replying([
        Ok(AgentResult::success(json!({ "repositories": "lots" }))),
        Ok(AgentResult::Success { result: None }),
    ]);
    let controller = controller(invoker);

    for _ in 0..2 {
        controller.fetch_repositories().await;
        let state = controller.snapshot();
        assert!(state.repositories.is_empty());
        assert_eq!(state.error.as_deref(), Some(NO_REPOSITORIES_MESSAGE));
    }
}

#[tokio::test]
async fn fetch_failure_forwards_error_text_or_fallback() {
    let invoker = ScriptedInvoker::replying([
        Ok(repositories_result(2)),
        Ok(AgentResult::failure("rate limited")),
        Ok(AgentResult::Failure { error: None }),
    ]);
    let controller = controller(invoker);
    controller.fetch_repositories().await;

    assert_eq!(
        controller.fetch_repositories().await,
        FetchOutcome::Failed("rate limited".to_string())
    );
    assert_eq!(controller.snapshot().error.as_deref(), Some("rate limited"));
    // A failed call leaves the previous list in place.
    assert_eq!(controller.snapshot().repositories.len(), 2);

    controller.fetch_repositories().await;
    assert_eq!(
        controller.snapshot().error.as_deref(),
        Some(FETCH_FAILED_MESSAGE)
    );
}

#[tokio::test]
async fn fetch_exception_uses_its_message_or_fallback() {
    let invoker = ScriptedInvoker::replying([
        Err(transport_error("dns lookup failed")),
        Err(transport_error("  ")),
    ]);
    let controller = controller(invoker);

    controller.fetch_repositories().await;
    assert_eq!(
        controller.snapshot().error.as_deref(),
        Some("dns lookup failed")
    );

    controller.fetch_repositories().await;
    let state = controller.snapshot();
    assert_eq!(state.error.as_deref(), Some(UNEXPECTED_MESSAGE));
    assert!(!state.loading);
    assert_eq!(state.active_agent(), None);
}

#[tokio::test]
async fn share_rejects_missing_and_invalid_addresses_without_calling() {
    let invoker = ScriptedInvoker::replying([]);
    let controller = controller(invoker.clone());
    controller.set_use_sample_data(true);

    assert_eq!(
        controller.share_via_email("").await,
        ShareOutcome::Rejected(MISSING_RECIPIENT_MESSAGE.to_string())
    );
    assert_eq!(
        controller.share_via_email("not-an-email").await,
        ShareOutcome::Rejected(INVALID_RECIPIENT_MESSAGE.to_string())
    );
    let state = controller.snapshot();
    assert_eq!(state.email_error.as_deref(), Some(INVALID_RECIPIENT_MESSAGE));
    assert_eq!(state.recipient_email, "not-an-email");
    assert!(invoker.calls().await.is_empty());
}

#[tokio::test]
async fn share_requires_fetched_repositories_outside_sample_mode() {
    let invoker = ScriptedInvoker::replying([]);
    let controller = controller(invoker.clone());

    let outcome = controller.share_via_email("a@b.co").await;

    assert_eq!(
        outcome,
        ShareOutcome::Rejected(FETCH_FIRST_MESSAGE.to_string())
    );
    assert_eq!(
        controller.snapshot().email_error.as_deref(),
        Some(FETCH_FIRST_MESSAGE)
    );
    assert!(invoker.calls().await.is_empty());
}

#[tokio::test]
async fn share_in_sample_mode_skips_fetch_guard_but_still_calls_manager() {
    let invoker = ScriptedInvoker::replying([Ok(AgentResult::success(
        json!({ "status": "success", "message": "" }),
    ))]);
    let controller = controller(invoker.clone());
    controller.set_use_sample_data(true);

    let outcome = controller.share_via_email("a@b.co").await;

    assert_eq!(
        outcome,
        ShareOutcome::Sent("Email successfully sent to a@b.co".to_string())
    );
    let calls = invoker.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].agent_id, AgentId::new(MANAGER_AGENT_ID));
    assert_eq!(calls[0].prompt, share_prompt("a@b.co"));
    assert!(calls[0].prompt.contains("a@b.co"));
}

#[tokio::test]
async fn share_success_status_reports_message_and_clears_recipient() {
    let invoker = ScriptedInvoker::replying([
        Ok(repositories_result(2)),
        Ok(AgentResult::success(json!({ "status": "Sent", "message": "ok" }))),
    ]);
    let controller = controller(invoker);
    controller.fetch_repositories().await;

    let outcome = controller.share_via_email("a@b.co").await;

    assert_eq!(outcome, ShareOutcome::Sent("ok".to_string()));
    let state = controller.snapshot();
    assert_eq!(state.email_success.as_deref(), Some("ok"));
    assert_eq!(state.email_error, None);
    assert_eq!(state.recipient_email, "");
    assert!(!state.email_loading);
    assert_eq!(state.active_agent(), None);
}

#[tokio::test]
async fn share_with_undelivered_status_is_a_failure_despite_call_success() {
    let invoker = ScriptedInvoker::replying([
        Ok(repositories_result(1)),
        Ok(AgentResult::success(
            json!({ "status": "pending", "message": "queued" }),
        )),
    ]);
    let controller = controller(invoker);
    controller.fetch_repositories().await;

    let outcome = controller.share_via_email("a@b.co").await;

    assert_eq!(outcome, ShareOutcome::Failed("queued".to_string()));
    let state = controller.snapshot();
    assert_eq!(state.email_error.as_deref(), Some("queued"));
    assert_eq!(state.email_success, None);
    assert_eq!(state.recipient_email, "a@b.co");
}

#[tokio::test]
async fn share_failures_and_exceptions_use_fallbacks() {
    let invoker = ScriptedInvoker::replying([
        Ok(repositories_result(1)),
        Ok(AgentResult::success(json!("not an object"))),
        Ok(AgentResult::failure("mailbox unavailable")),
        Err(transport_error("socket closed")),
    ]);
    let controller = controller(invoker);
    controller.fetch_repositories().await;

    assert_eq!(
        controller.share_via_email("a@b.co").await,
        ShareOutcome::Failed(EMAIL_FAILED_MESSAGE.to_string())
    );
    assert_eq!(
        controller.share_via_email("a@b.co").await,
        ShareOutcome::Failed("mailbox unavailable".to_string())
    );
    assert_eq!(
        controller.share_via_email("a@b.co").await,
        ShareOutcome::Failed(UNEXPECTED_MESSAGE.to_string())
    );
    let state = controller.snapshot();
    assert_eq!(state.email_error.as_deref(), Some(UNEXPECTED_MESSAGE));
    assert!(!state.email_loading);
    assert_eq!(state.active_agent(), None);
}

#[tokio::test]
async fn displayed_repositories_follow_sample_toggle() {
    let invoker = ScriptedInvoker::replying([Ok(repositories_result(2))]);
    let controller = controller(invoker);
    controller.fetch_repositories().await;

    assert_eq!(controller.displayed_repositories().len(), 2);
    controller.set_use_sample_data(true);
    assert_eq!(
        controller.displayed_repositories(),
        fixtures::sample_repositories(clock())
    );
    controller.set_use_sample_data(false);
    assert!(controller.displayed_repositories().is_empty());
}

#[tokio::test]
async fn enabling_sample_mode_drops_live_list_and_fetch_error() {
    let invoker = ScriptedInvoker::replying([Ok(repositories_result(0))]);
    let controller = controller(invoker.clone());
    controller.fetch_repositories().await;
    assert_eq!(
        controller.snapshot().error.as_deref(),
        Some(NO_REPOSITORIES_MESSAGE)
    );

    controller.set_use_sample_data(true);
    assert_eq!(controller.snapshot().error, None);

    controller.set_use_sample_data(false);
    assert_eq!(
        controller.share_via_email("a@b.co").await,
        ShareOutcome::Rejected(FETCH_FIRST_MESSAGE.to_string())
    );
    assert_eq!(invoker.calls().await.len(), 1);
}

#[tokio::test]
async fn re_enabling_sample_mode_keeps_the_assigned_fixture() {
    let controller = controller(ScriptedInvoker::replying([]));
    controller.set_use_sample_data(true);
    controller.fetch_repositories().await;

    controller.set_use_sample_data(true);

    assert_eq!(controller.snapshot().repositories.len(), 5);
}

#[tokio::test]
async fn editing_recipient_clears_previous_send_result() {
    let invoker = ScriptedInvoker::replying([Ok(AgentResult::success(
        json!({ "status": "sent", "message": "delivered" }),
    ))]);
    let controller = controller(invoker);
    controller.set_use_sample_data(true);

    controller.share_via_email("bad").await;
    assert_eq!(
        controller.snapshot().email_error.as_deref(),
        Some(INVALID_RECIPIENT_MESSAGE)
    );
    controller.set_recipient_email("a@b.co");
    let state = controller.snapshot();
    assert_eq!(state.email_error, None);
    assert_eq!(state.recipient_email, "a@b.co");

    controller.share_via_email("a@b.co").await;
    assert_eq!(
        controller.snapshot().email_success.as_deref(),
        Some("delivered")
    );
    controller.set_recipient_email("b@c.io");
    assert_eq!(controller.snapshot().email_success, None);
}

#[tokio::test]
async fn in_flight_fetch_sets_flags_until_the_call_settles() {
    let agents = AgentDirectory::default();
    let (release, gate) = oneshot::channel();
    let invoker = GatedInvoker {
        gates: AsyncMutex::new(HashMap::from([(agents.github_data.clone(), gate)])),
        results: HashMap::from([(agents.github_data.clone(), repositories_result(2))]),
    };
    let controller = Arc::new(controller(invoker));

    let task = tokio::spawn({
        let controller = controller.clone();
        async move { controller.fetch_repositories().await }
    });
    wait_until(|| controller.is_busy()).await;

    let state = controller.snapshot();
    assert!(state.loading);
    assert_eq!(state.active_agent(), Some(&agents.github_data));
    assert_eq!(state.in_flight[0].operation, Operation::FetchRepositories);
    assert!(state.repositories.is_empty());

    release.send(()).expect("release gate");
    assert_eq!(task.await.expect("join"), FetchOutcome::Loaded(2));

    let state = controller.snapshot();
    assert!(!state.loading);
    assert_eq!(state.active_agent(), None);
}

#[tokio::test]
async fn overlapping_operations_are_tracked_independently() {
    let agents = AgentDirectory::default();
    let (release_check, check_gate) = oneshot::channel();
    let (release_share, share_gate) = oneshot::channel();
    let invoker = GatedInvoker {
        gates: AsyncMutex::new(HashMap::from([
            (agents.github_data.clone(), check_gate),
            (agents.manager.clone(), share_gate),
        ])),
        results: HashMap::from([
            (agents.github_data.clone(), AgentResult::Success { result: None }),
            (
                agents.manager.clone(),
                AgentResult::success(json!({ "status": "sent" })),
            ),
        ]),
    };
    let controller = Arc::new(controller(invoker));
    controller.set_use_sample_data(true);

    let check = tokio::spawn({
        let controller = controller.clone();
        async move { controller.check_connection().await }
    });
    wait_until(|| controller.active_agent().as_ref() == Some(&agents.github_data)).await;
    assert_eq!(
        controller.snapshot().connection_status,
        ConnectionStatus::Checking
    );

    let share = tokio::spawn({
        let controller = controller.clone();
        async move { controller.share_via_email("a@b.co").await }
    });
    wait_until(|| controller.snapshot().in_flight.len() == 2).await;
    assert_eq!(controller.active_agent(), Some(agents.manager.clone()));

    release_share.send(()).expect("release share");
    assert!(matches!(share.await.expect("join"), ShareOutcome::Sent(_)));
    assert_eq!(controller.active_agent(), Some(agents.github_data.clone()));
    assert!(!controller.snapshot().email_loading);

    release_check.send(()).expect("release check");
    assert_eq!(check.await.expect("join"), ConnectionStatus::Connected);
    assert!(!controller.is_busy());
}

#[tokio::test]
async fn dropped_operation_still_clears_its_markers() {
    let agents = AgentDirectory::default();
    let (_release, gate) = oneshot::channel::<()>();
    let invoker = GatedInvoker {
        gates: AsyncMutex::new(HashMap::from([(agents.github_data.clone(), gate)])),
        results: HashMap::new(),
    };
    let controller = controller(invoker);

    let outcome =
        tokio::time::timeout(Duration::from_millis(50), controller.fetch_repositories()).await;

    assert!(outcome.is_err());
    let state = controller.snapshot();
    assert!(!state.loading);
    assert!(state.in_flight.is_empty());
}

#[tokio::test]
async fn dropped_connection_check_does_not_stay_checking() {
    let agents = AgentDirectory::default();
    let (_release, gate) = oneshot::channel::<()>();
    let invoker = GatedInvoker {
        gates: AsyncMutex::new(HashMap::from([(agents.github_data.clone(), gate)])),
        results: HashMap::new(),
    };
    let controller = controller(invoker);

    let outcome =
        tokio::time::timeout(Duration::from_millis(50), controller.check_connection()).await;

    assert!(outcome.is_err());
    let state = controller.snapshot();
    assert_eq!(state.connection_status, ConnectionStatus::Disconnected);
    assert!(state.in_flight.is_empty());
}
