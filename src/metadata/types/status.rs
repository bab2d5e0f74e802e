use serde::{Deserialize, Serialize};

/// Lenient label matching: the upstream label matches when it is a substring
/// of a known label, ignoring case. Tolerates minor upstream drift
/// ("Returning" for "Returning Series", "Canceled" for "Cancelled").
fn lenient_match<T: Copy>(raw: &str, table: &[(T, &[&str])]) -> Option<T> {
    let raw = raw.trim().to_lowercase();
    if raw.is_empty() {
        return None;
    }

    table.iter().find_map(|(status, labels)| {
        labels
            .iter()
            .any(|label| label.contains(raw.as_str()))
            .then_some(*status)
    })
}

/// Movie lifecycle, declared in progression order.
///
/// `Cancelled` is reachable from any pre-release state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovieStatus {
    Announced,
    InProduction,
    PostProduction,
    Completed,
    Released,
    Cancelled,
}

impl MovieStatus {
    const LABELS: &'static [(Self, &'static [&'static str])] = &[
        (Self::Announced, &["announced", "rumored", "planned"]),
        (
            Self::InProduction,
            &["in production", "pre-production", "pre production"],
        ),
        (Self::PostProduction, &["post production", "post-production"]),
        (Self::Completed, &["completed"]),
        (Self::Released, &["released"]),
        (Self::Cancelled, &["cancelled", "canceled"]),
    ];

    /// Map a provider label onto the canonical status
    #[must_use]
    pub fn from_label(raw: &str) -> Option<Self> {
        lenient_match(raw, Self::LABELS)
    }
}

/// Show lifecycle: upcoming, then ongoing, then ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowStatus {
    Upcoming,
    Ongoing,
    Ended,
}

impl ShowStatus {
    const LABELS: &'static [(Self, &'static [&'static str])] = &[
        (Self::Upcoming, &["upcoming", "in production", "planned", "pilot"]),
        (Self::Ongoing, &["ongoing", "returning series", "continuing"]),
        (Self::Ended, &["ended", "canceled", "cancelled"]),
    ];

    #[must_use]
    pub fn from_label(raw: &str) -> Option<Self> {
        lenient_match(raw, Self::LABELS)
    }
}
