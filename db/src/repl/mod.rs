//! Interactive REPL for Daybook
//!
//! Plain text proposes journal entries; slash commands revise, confirm,
//! cancel and edit whole days.

mod session;

pub use session::ReplSession;

use std::sync::Arc;

use eyre::{Context, Result};
use journalstore::{JournalStore, SqliteJournalStore};

use crate::config::Config;
use crate::coordinator::{ProposalCoordinator, SessionRegistry};
use crate::resolver::JournalResolver;

/// Open the configured journal database
pub fn open_store(config: &Config) -> Result<Arc<dyn JournalStore>> {
    let store = SqliteJournalStore::open(&config.storage.db_path)
        .context(format!("Failed to open journal at {}", config.storage.db_path))?;
    Ok(Arc::new(store))
}

/// Run the interactive REPL
///
/// This is the main entry point for `daybook repl`.
pub async fn run_interactive(config: &Config) -> Result<()> {
    config.validate()?;

    let store = open_store(config)?;
    let resolver = Arc::new(JournalResolver::from_config(store.clone(), config));
    let registry = Arc::new(SessionRegistry::new(
        config.coordinator.session_ttl(),
        config.coordinator.tombstone_ttl(),
    ));
    let reaper = registry.spawn_reaper(config.coordinator.reap_interval());
    let coordinator = ProposalCoordinator::new(registry, resolver, store.clone(), config.coordinator.clone());

    let mut session = ReplSession::new(coordinator, store);
    let result = session.run().await;
    reaper.abort();
    result
}
