//! Free-text classifiers for agent errors and delivery reports.
//!
//! The agent service only hands back prose, so every keyword match lives here
//! where it can be tested on its own.

const NOT_CONNECTED_MARKERS: [&str; 3] = ["not connected", "authentication", "oauth"];
const DELIVERED_MARKERS: [&str; 2] = ["success", "sent"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionFailure {
    /// The agent says the GitHub account is not linked or not authorized.
    NotConnected,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailDelivery {
    Sent,
    NotSent,
}

pub fn classify_connection_failure(error: &str) -> ConnectionFailure {
    let lower = error.to_lowercase();
    if NOT_CONNECTED_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
    {
        ConnectionFailure::NotConnected
    } else {
        ConnectionFailure::Other
    }
}

pub fn classify_email_status(status: &str) -> EmailDelivery {
    let lower = status.to_lowercase();
    if DELIVERED_MARKERS.iter().any(|marker| lower.contains(marker)) {
        EmailDelivery::Sent
    } else {
        EmailDelivery::NotSent
    }
}

/// Loose syntactic check: non-empty and containing both `@` and `.`.
/// Strings such as `a@.b` pass.
pub fn is_plausible_email(address: &str) -> bool {
    !address.is_empty() && address.contains('@') && address.contains('.')
}
