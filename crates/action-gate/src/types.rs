use serde::Serialize;

/// Which signal identified the confirmation page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SuccessSignal {
    Phrase(String),
    Url(String),
    Marker,
}

impl std::fmt::Display for SuccessSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuccessSignal::Phrase(phrase) => write!(f, "phrase '{}'", phrase),
            SuccessSignal::Url(fragment) => write!(f, "url '{}'", fragment),
            SuccessSignal::Marker => f.write_str("marker element"),
        }
    }
}

/// Result of one [`check_and_recover`](crate::SuccessDetector::check_and_recover).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuccessOutcome {
    /// Multi-order mode is off or the agent is disabled.
    Inactive,
    NotConfirmed,
    /// The current confirmation was already handled.
    AlreadyHandled,
    /// Back-navigation and reload were issued.
    Recovered(SuccessSignal),
}
