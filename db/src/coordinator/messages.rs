//! Coordinator response records

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{Operation, SessionId, SessionMode, SessionStatus};

/// A pending operation as returned by propose, revise and day-edit calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalView {
    pub session_id: SessionId,
    pub mode: SessionMode,
    pub operation: Operation,
}

/// Result of a confirm; replays return an identical value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmOutcome {
    pub status: SessionStatus,
    pub session_id: SessionId,
    pub operation_id: u64,
    pub day_date: NaiveDate,
    /// Rendering of the day after the write
    pub final_content: String,
}

/// Result of a cancel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOutcome {
    pub status: SessionStatus,
    pub session_id: SessionId,
}

/// Read-only view of a live session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub mode: SessionMode,
    pub status: SessionStatus,
    pub target_date: Option<NaiveDate>,
    pub operation_id: Option<u64>,
    pub last_input_text: String,
}
