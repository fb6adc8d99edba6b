//! REPL session management

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use colored::Colorize;
use eyre::Result;
use journalstore::JournalStore;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::coordinator::{CoordinatorError, ProposalCoordinator, ProposalView, parse_day};
use crate::domain::{SessionId, SessionMode};

/// The proposal the user is currently looking at
#[derive(Debug, Clone)]
struct Pending {
    session_id: SessionId,
    mode: SessionMode,
    operation_id: u64,
    day: NaiveDate,
    /// Minted once per operation and reused for every confirm retry
    confirm_key: String,
}

impl Pending {
    fn from_view(view: &ProposalView, previous: Option<&Pending>) -> Self {
        let confirm_key = match previous {
            Some(p) if p.session_id == view.session_id && p.operation_id == view.operation.id => p.confirm_key.clone(),
            _ => uuid::Uuid::now_v7().to_string(),
        };
        Self {
            session_id: view.session_id.clone(),
            mode: view.mode,
            operation_id: view.operation.id,
            day: view.operation.resolved_date,
            confirm_key,
        }
    }
}

/// Interactive REPL session
pub struct ReplSession {
    coordinator: ProposalCoordinator,
    store: Arc<dyn JournalStore>,
    pending: Option<Pending>,
}

impl ReplSession {
    /// Create a new REPL session
    pub fn new(coordinator: ProposalCoordinator, store: Arc<dyn JournalStore>) -> Self {
        Self {
            coordinator,
            store,
            pending: None,
        }
    }

    /// Run the REPL main loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", self.prompt().bright_green()));

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }

                    let _ = rl.add_history_entry(input);

                    if input.starts_with('/') {
                        match self.handle_slash_command(input, &mut rl).await? {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    } else {
                        self.propose(input).await;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        if let Some(pending) = self.pending.take() {
            let _ = self.coordinator.cancel(&pending.session_id).await;
            println!("{}", "Pending proposal discarded.".dimmed());
        }
        println!("Goodbye!");
        Ok(())
    }

    fn prompt(&self) -> String {
        match &self.pending {
            Some(p) => format!("[{} {}]>", p.mode, p.day),
            None => ">".to_string(),
        }
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "Daybook".bright_cyan().bold());
        println!("Dictate what happened; review the proposal, then {}.", "/confirm".yellow());
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    async fn handle_slash_command(&mut self, input: &str, rl: &mut DefaultEditor) -> Result<SlashResult> {
        let (cmd, rest) = input.split_once(char::is_whitespace).unwrap_or((input, ""));
        let rest = rest.trim();
        debug!(cmd, "handle_slash_command: called");

        match cmd {
            "/help" | "/h" => self.print_help(),
            "/quit" | "/q" | "/exit" => return Ok(SlashResult::Quit),
            "/revise" | "/r" => self.revise(rest).await,
            "/confirm" | "/y" => self.confirm().await,
            "/cancel" | "/n" => self.cancel().await,
            "/edit" => self.edit_day(rest, rl).await?,
            "/show" => self.show_day(rest).await,
            "/days" => self.list_days().await,
            "/status" => self.print_status().await,
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
            }
        }
        Ok(SlashResult::Continue)
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:18} Propose an entry (or re-propose in the open session)", "<text>".yellow());
        println!("  {:18} Re-propose the last text with an instruction", "/revise [text]".yellow());
        println!("  {:18} Write the pending proposal", "/confirm".yellow());
        println!("  {:18} Discard the pending proposal", "/cancel".yellow());
        println!("  {:18} Rewrite a whole day, ending input with '.'", "/edit DATE".yellow());
        println!("  {:18} Print a day (default: today)", "/show [DATE]".yellow());
        println!("  {:18} List days with content", "/days".yellow());
        println!("  {:18} Show the open session", "/status".yellow());
        println!("  {:18} Show this help", "/help".yellow());
        println!("  {:18} Exit the REPL", "/quit".yellow());
        println!();
    }

    async fn propose(&mut self, text: &str) {
        let session_id = match &self.pending {
            Some(p) if p.mode == SessionMode::DayEdit => {
                println!(
                    "{} A day edit is pending; {} or {} it first.",
                    "!".yellow(),
                    "/confirm".yellow(),
                    "/cancel".yellow()
                );
                return;
            }
            Some(p) => Some(p.session_id.clone()),
            None => None,
        };
        let result = self.coordinator.propose(text, session_id.as_ref(), None).await;
        self.show_proposal(result);
    }

    async fn revise(&mut self, instruction: &str) {
        let Some(pending) = self.pending.clone() else {
            println!("{}", "Nothing to revise.".dimmed());
            return;
        };
        let instruction = (!instruction.is_empty()).then_some(instruction);
        let result = self.coordinator.revise_entry(&pending.session_id, instruction).await;
        self.show_proposal(result);
    }

    async fn confirm(&mut self) {
        let Some(pending) = self.pending.clone() else {
            println!("{}", "Nothing to confirm.".dimmed());
            return;
        };
        match self.coordinator.confirm(&pending.session_id, &pending.confirm_key).await {
            Ok(outcome) => {
                self.pending = None;
                println!("{} {}", "Saved".bright_green(), outcome.day_date);
                println!("{}", outcome.final_content.trim_end());
            }
            Err(e) => self.report(e),
        }
    }

    async fn cancel(&mut self) {
        let Some(pending) = self.pending.take() else {
            println!("{}", "Nothing to cancel.".dimmed());
            return;
        };
        match self.coordinator.cancel(&pending.session_id).await {
            Ok(outcome) => println!("{} ({})", "Discarded".dimmed(), outcome.status),
            Err(e) => self.report(e),
        }
    }

    async fn edit_day(&mut self, day: &str, rl: &mut DefaultEditor) -> Result<()> {
        let day = match parse_day(day) {
            Ok(day) => day,
            Err(e) => {
                self.report(e);
                return Ok(());
            }
        };
        let session_id = match &self.pending {
            Some(p) if p.mode == SessionMode::DayEdit && p.day == day => Some(p.session_id.clone()),
            Some(_) => {
                println!(
                    "{} Another proposal is pending; {} or {} it first.",
                    "!".yellow(),
                    "/confirm".yellow(),
                    "/cancel".yellow()
                );
                return Ok(());
            }
            None => None,
        };

        match self.store.read_day(day).await {
            Ok(snapshot) => println!("{}", snapshot.content.trim_end().dimmed()),
            Err(e) => println!("{} {}", "Error:".red(), e),
        }
        println!("Enter the new content for {}; finish with a lone '.'", day);

        let mut lines = Vec::new();
        loop {
            match rl.readline("| ") {
                Ok(line) if line.trim() == "." => break,
                Ok(line) => lines.push(line),
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "Edit abandoned.".dimmed());
                    return Ok(());
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(eyre::eyre!("Readline error: {}", err)),
            }
        }

        let result = self
            .coordinator
            .propose_day_edit(day, &lines.join("\n"), session_id.as_ref())
            .await;
        self.show_proposal(result);
        Ok(())
    }

    async fn show_day(&self, day: &str) {
        let day = if day.is_empty() {
            self.pending.as_ref().map(|p| p.day).unwrap_or_else(|| Local::now().date_naive())
        } else {
            match parse_day(day) {
                Ok(day) => day,
                Err(e) => {
                    println!("{} {}", "Error:".red(), e);
                    return;
                }
            }
        };
        match self.store.read_day(day).await {
            Ok(snapshot) => println!("{}", snapshot.content.trim_end()),
            Err(e) => println!("{} {}", "Error:".red(), e),
        }
    }

    async fn list_days(&self) {
        match self.store.list_days().await {
            Ok(days) if days.is_empty() => println!("{}", "No days yet.".dimmed()),
            Ok(days) => {
                for day in days {
                    println!("  {}", day);
                }
            }
            Err(e) => println!("{} {}", "Error:".red(), e),
        }
    }

    async fn print_status(&self) {
        let Some(pending) = &self.pending else {
            println!("{}", "No open session.".dimmed());
            return;
        };
        match self.coordinator.session_snapshot(&pending.session_id).await {
            Ok(summary) => {
                println!("Session {} ({})", summary.session_id.short(), summary.mode);
                println!("  status:    {}", summary.status);
                if let Some(day) = summary.target_date {
                    println!("  day:       {}", day);
                }
                if let Some(id) = summary.operation_id {
                    println!("  operation: {}", id);
                }
            }
            Err(e) => println!("{} {}", "Error:".red(), e),
        }
    }

    fn show_proposal(&mut self, result: Result<ProposalView, CoordinatorError>) {
        let view = match result {
            Ok(view) => view,
            Err(e) => {
                self.report(e);
                return;
            }
        };
        let operation = &view.operation;

        println!();
        println!(
            "{} {} for {}",
            "Proposal:".bright_cyan(),
            operation.action.to_string().bold(),
            operation.resolved_date
        );
        println!("{}", operation.reason.dimmed());
        for line in operation.diff_text.lines() {
            if line.starts_with("+++") || line.starts_with("---") {
                println!("{}", line.bold());
            } else if line.starts_with('+') {
                println!("{}", line.green());
            } else if line.starts_with('-') {
                println!("{}", line.red());
            } else if line.starts_with("@@") {
                println!("{}", line.cyan());
            } else {
                println!("{}", line);
            }
        }
        for warning in &operation.warnings {
            println!("{} {}", "warning:".yellow(), warning);
        }
        println!(
            "{} to save, {} to refine, {} to discard",
            "/confirm".yellow(),
            "/revise".yellow(),
            "/cancel".yellow()
        );
        println!();

        self.pending = Some(Pending::from_view(&view, self.pending.as_ref()));
    }

    fn report(&mut self, err: CoordinatorError) {
        println!("{} {}", "Error:".red(), err);
        match err {
            CoordinatorError::SessionClosed(_) | CoordinatorError::SessionNotFound(_) => {
                self.pending = None;
            }
            e if e.is_retryable() => println!("{}", "Temporary failure; the proposal is kept, try again.".dimmed()),
            _ => {}
        }
    }
}

/// Result of handling a slash command
enum SlashResult {
    Continue,
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Action, Operation, Resolution, Session};

    fn view(session: &mut Session) -> ProposalView {
        let operation: Operation = session
            .replace_operation(
                "ran",
                Resolution {
                    action: Action::Create,
                    reason: String::new(),
                    diff_text: String::new(),
                    resolved_date: NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
                    proposed_entries: vec![],
                    warnings: vec![],
                },
            )
            .clone();
        ProposalView {
            session_id: session.id.clone(),
            mode: session.mode,
            operation,
        }
    }

    #[test]
    fn test_confirm_key_reused_for_same_operation() {
        let mut session = Session::new(SessionMode::Entry);
        let first_view = view(&mut session);
        let first = Pending::from_view(&first_view, None);
        let again = Pending::from_view(&first_view, Some(&first));
        assert_eq!(first.confirm_key, again.confirm_key);

        let second = Pending::from_view(&view(&mut session), Some(&first));
        assert_ne!(first.confirm_key, second.confirm_key);
        assert_eq!(second.operation_id, 2);
    }
}
