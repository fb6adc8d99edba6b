//! Proposal sessions
//!
//! The coordinator turns user text into a pending, reviewable change and
//! applies it to the journal at most once:
//! - **Propose / Revise:** resolve text into an operation that replaces the
//!   session's pending one
//! - **Confirm:** write the pending operation, exactly once per idempotency key
//! - **Cancel:** close the session without writing

mod config;
mod core;
mod error;
mod messages;
mod registry;

pub use config::CoordinatorConfig;
pub use core::{ProposalCoordinator, parse_day};
pub use error::CoordinatorError;
pub use messages::{CancelOutcome, ConfirmOutcome, ProposalView, SessionSummary};
pub use registry::{Lookup, ReapStats, SessionRegistry, SessionSlot};
