//! Domain types for daybook
//!
//! A write session negotiates one pending change to a journal day. Each
//! propose/revise call produces an [`Operation`] that replaces the session's
//! pending one; confirming turns the pending operation into a day write
//! planned by [`plan_day_write`].

mod id;
mod operation;
mod plan;
mod session;

pub use id::SessionId;
pub use operation::{Action, InvariantError, Operation, ProposedEntry, Resolution};
pub use plan::plan_day_write;
pub use session::{InDoubtWrite, Session, SessionMode, SessionStatus};
