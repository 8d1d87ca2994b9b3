//! Plain-text views of dashboard state.

use chrono::{DateTime, Utc};
use client_core::{
    format::{format_relative_time, truncate_message, DEFAULT_MESSAGE_WIDTH},
    DashboardState,
};
use shared::domain::Repository;

pub fn render_connection(state: &DashboardState) -> String {
    if state.status_message.is_empty() {
        format!("GitHub connection: {}", state.connection_status)
    } else {
        format!(
            "GitHub connection: {} ({})",
            state.connection_status, state.status_message
        )
    }
}

pub fn render_repository(repo: &Repository, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}  ★ {}\n", repo.name(), repo.stars));
    out.push_str(&format!("  {}\n", repo.description()));

    let mut meta = Vec::new();
    if let Some(language) = repo.language() {
        meta.push(language.to_string());
    }
    if let Some(updated) = repo.last_updated() {
        meta.push(format!("updated {}", format_relative_time(updated, now)));
    }
    if !meta.is_empty() {
        out.push_str(&format!("  {}\n", meta.join(" · ")));
    }

    let commits = repo.recent_commits();
    if !commits.is_empty() {
        out.push_str(&format!("  Recent commits ({})\n", commits.len()));
        for commit in commits {
            out.push_str(&format!(
                "    - {} [{}, {}]\n",
                truncate_message(commit.message(), DEFAULT_MESSAGE_WIDTH),
                commit.author(),
                format_relative_time(commit.timestamp(), now)
            ));
        }
    }
    out
}

pub fn render_repositories(repos: &[Repository], now: DateTime<Utc>) -> String {
    if repos.is_empty() {
        return "No repositories to show.\n".to_string();
    }
    repos
        .iter()
        .map(|repo| render_repository(repo, now))
        .collect::<Vec<_>>()
        .join("\n")
}
