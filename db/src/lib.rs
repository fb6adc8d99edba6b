//! Daybook - dictated journal with reviewable write sessions
//!
//! Free text is resolved into a proposed change to one journal day. The change
//! is shown as a diff, can be revised or canceled, and is written only when
//! confirmed, at most once per idempotency key.
//!
//! # Modules
//!
//! - [`domain`] - sessions, operations and write planning
//! - [`resolver`] - turns text into a proposed day change
//! - [`coordinator`] - session registry and propose/confirm/cancel
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface
//! - [`repl`] - interactive write session

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod repl;
pub mod resolver;

// Re-export commonly used types
pub use config::{Config, DecisionConfig, ModelConfig, StorageConfig};
pub use coordinator::{
    CancelOutcome, ConfirmOutcome, CoordinatorConfig, CoordinatorError, ProposalCoordinator, ProposalView,
    SessionRegistry, SessionSummary,
};
pub use domain::{Action, Operation, ProposedEntry, Resolution, Session, SessionId, SessionMode, SessionStatus};
pub use resolver::{ChangeResolver, JournalResolver, ModelDecider, ResolveContext, ResolverError};
