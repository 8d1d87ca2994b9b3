//! Display helpers for repository cards.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

pub const DEFAULT_MESSAGE_WIDTH: usize = 80;

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Coarse "time ago" label. Timestamps in the future read as "Just now";
/// text that is not a timestamp is returned unchanged.
pub fn format_relative_time(timestamp: &str, now: DateTime<Utc>) -> String {
    if timestamp.is_empty() {
        return "Unknown".to_string();
    }
    let Some(at) = parse_timestamp(timestamp) else {
        return timestamp.to_string();
    };

    let elapsed = now.signed_duration_since(at);
    if elapsed.num_days() > 0 {
        format!("{}d ago", elapsed.num_days())
    } else if elapsed.num_hours() > 0 {
        format!("{}h ago", elapsed.num_hours())
    } else if elapsed.num_minutes() > 0 {
        format!("{}m ago", elapsed.num_minutes())
    } else {
        "Just now".to_string()
    }
}

pub fn truncate_message(message: &str, max_chars: usize) -> String {
    if message.is_empty() {
        return "No message".to_string();
    }
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    let mut truncated: String = message.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}
