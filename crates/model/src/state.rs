//! Analysis lifecycle.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// State of an analysis session.
///
/// `Cancelled` and `Complete` are terminal: once entered, frame results no
/// longer touch the composite or progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AnalysisState {
    #[default]
    NotStarted = 0,
    InProgress = 1,
    Cancelled = 2,
    Complete = 3,
}

impl AnalysisState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Complete)
    }

    /// Encoding for atomic storage.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Inverse of [`AnalysisState::as_u8`]. Unknown values map to `NotStarted`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::InProgress,
            2 => Self::Cancelled,
            3 => Self::Complete,
            _ => Self::NotStarted,
        }
    }
}

impl fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotStarted => "not started",
            Self::InProgress => "in progress",
            Self::Cancelled => "cancelled",
            Self::Complete => "complete",
        };
        f.write_str(label)
    }
}

/// What caused a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    /// `start` issued the decode requests.
    Started,
    /// The plan had no samples, so there was nothing to wait for.
    EmptyPlan,
    /// The frame for the final sample time was applied.
    LastFrameApplied,
    /// Every request produced a terminal result, some of them failures.
    AllRequestsResolved,
    /// `cancel` was called.
    Cancelled,
    /// `reset` discarded a finished run.
    Reset,
}

/// One entry in a session's transition log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: AnalysisState,
    pub to: AnalysisState,
    pub reason: TransitionReason,
    /// Session clock reading when the change happened.
    pub at: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8_round_trip() {
        for state in [
            AnalysisState::NotStarted,
            AnalysisState::InProgress,
            AnalysisState::Cancelled,
            AnalysisState::Complete,
        ] {
            assert_eq!(AnalysisState::from_u8(state.as_u8()), state);
        }
        assert_eq!(AnalysisState::from_u8(200), AnalysisState::NotStarted);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!AnalysisState::NotStarted.is_terminal());
        assert!(!AnalysisState::InProgress.is_terminal());
        assert!(AnalysisState::Cancelled.is_terminal());
        assert!(AnalysisState::Complete.is_terminal());
    }

    #[test]
    fn test_record_serializes_snake_case() {
        let record = TransitionRecord {
            from: AnalysisState::InProgress,
            to: AnalysisState::Complete,
            reason: TransitionReason::LastFrameApplied,
            at: Duration::from_millis(250),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"from\":\"in_progress\""));
        assert!(json.contains("\"reason\":\"last_frame_applied\""));
    }
}
