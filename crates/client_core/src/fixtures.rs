//! Built-in repositories served in sample data mode.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use shared::domain::{Commit, Repository};

fn stamp(now: DateTime<Utc>, ago: Duration) -> Option<String> {
    Some((now - ago).to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn commit(now: DateTime<Utc>, message: &str, author: &str, ago: Duration) -> Commit {
    Commit {
        message: Some(message.to_string()),
        author: Some(author.to_string()),
        timestamp: stamp(now, ago),
    }
}

fn repository(
    now: DateTime<Utc>,
    name: &str,
    description: &str,
    language: &str,
    stars: u64,
    updated_ago: Duration,
    commits: Vec<Commit>,
) -> Repository {
    Repository {
        name: Some(name.to_string()),
        description: Some(description.to_string()),
        language: Some(language.to_string()),
        stars,
        last_updated: stamp(now, updated_ago),
        commits,
    }
}

/// Five demo repositories with timestamps relative to `now`.
pub fn sample_repositories(now: DateTime<Utc>) -> Vec<Repository> {
    vec![
        repository(
            now,
            "awesome-nextjs-app",
            "A modern Next.js application with TypeScript, Tailwind CSS, and AI integration",
            "TypeScript",
            142,
            Duration::days(2),
            vec![
                commit(
                    now,
                    "feat: Add GitHub integration with OAuth support",
                    "johndoe",
                    Duration::hours(1),
                ),
                commit(
                    now,
                    "fix: Resolve email sending issue in production",
                    "johndoe",
                    Duration::hours(4),
                ),
                commit(
                    now,
                    "docs: Update README with deployment instructions",
                    "janedoe",
                    Duration::hours(8),
                ),
            ],
        ),
        repository(
            now,
            "react-dashboard",
            "Interactive analytics dashboard built with React and D3.js",
            "JavaScript",
            89,
            Duration::days(5),
            vec![
                commit(
                    now,
                    "refactor: Improve chart rendering performance",
                    "alexsmith",
                    Duration::days(2),
                ),
                commit(
                    now,
                    "feat: Add real-time data streaming support",
                    "alexsmith",
                    Duration::days(3),
                ),
            ],
        ),
        repository(
            now,
            "python-ml-toolkit",
            "Machine learning utilities and pre-trained models for common tasks",
            "Python",
            256,
            Duration::days(1),
            vec![
                commit(
                    now,
                    "feat: Add sentiment analysis model",
                    "mlexpert",
                    Duration::hours(12),
                ),
                commit(
                    now,
                    "test: Add comprehensive unit tests for NLP module",
                    "mlexpert",
                    Duration::hours(20),
                ),
                commit(
                    now,
                    "chore: Update dependencies to latest versions",
                    "dependabot",
                    Duration::days(1),
                ),
            ],
        ),
        repository(
            now,
            "api-gateway",
            "Scalable microservices gateway with rate limiting and authentication",
            "Go",
            321,
            Duration::days(3),
            vec![
                commit(
                    now,
                    "perf: Optimize request routing algorithm",
                    "backend-dev",
                    Duration::days(2),
                ),
                commit(
                    now,
                    "security: Implement JWT token validation",
                    "backend-dev",
                    Duration::days(3),
                ),
            ],
        ),
        repository(
            now,
            "mobile-chat-app",
            "Cross-platform messaging app with end-to-end encryption",
            "Dart",
            178,
            Duration::days(7),
            vec![
                commit(
                    now,
                    "feat: Add voice message support",
                    "mobile-team",
                    Duration::days(5),
                ),
                commit(
                    now,
                    "fix: Resolve notification delivery on iOS",
                    "mobile-team",
                    Duration::days(6),
                ),
            ],
        ),
    ]
}
