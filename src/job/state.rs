/// Job state definitions
///
/// The vocabulary is the remote service's; the client never invents states.
use serde::Serialize;
use std::fmt;

/// Status of a remote crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    // ===== In-progress States =====
    Queued,
    Waiting,
    Pending,
    Active,
    Paused,
    Scraping,

    // ===== Terminal States =====
    Completed,
    Failed,
}

impl JobState {
    /// Returns true once no further transitions can occur
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true while the job is still running and should be re-polled
    pub fn is_in_progress(&self) -> bool {
        !self.is_terminal()
    }

    /// Wire representation of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Waiting => "waiting",
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Scraping => "scraping",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a wire status; returns None for anything outside the vocabulary
    pub fn from_api_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "waiting" => Some(Self::Waiting),
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "scraping" => Some(Self::Scraping),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible job states
    pub fn all_states() -> [Self; 8] {
        [
            Self::Queued,
            Self::Waiting,
            Self::Pending,
            Self::Active,
            Self::Paused,
            Self::Scraping,
            Self::Completed,
            Self::Failed,
        ]
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
