use serde::Serialize;

use crate::batch::{Batch, Proposal};
use crate::cli::OutputFormat;
use crate::coordinator::BatchOutcome;

/// Renders results for the caller in text or JSON.
///
/// Presentation only: nothing here feeds back into coordination. Failed and
/// timed-out tasks are always listed separately from succeeded ones so a
/// caller can retry exactly what did not finish.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn emit_outcome(&self, outcome: &BatchOutcome) {
        match self.format {
            OutputFormat::Text => self.print_outcome(outcome),
            OutputFormat::Json => self.write_json(outcome),
        }
    }

    pub fn emit_batch(&self, batch: &Batch) {
        match self.format {
            OutputFormat::Text => self.print_batch(batch),
            OutputFormat::Json => self.write_json(batch),
        }
    }

    pub fn emit_list(&self, batches: &[Batch]) {
        match self.format {
            OutputFormat::Text => {
                if batches.is_empty() {
                    println!("No batches recorded.");
                }
                for batch in batches {
                    println!(
                        "{}  {}  {} task(s)  created {}",
                        batch.id,
                        batch.status,
                        batch.tasks.len(),
                        batch.created_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
            OutputFormat::Json => self.write_json(&batches),
        }
    }

    pub fn print_error(&self, message: &str) {
        eprintln!("error: {}", message);
    }

    fn print_outcome(&self, outcome: &BatchOutcome) {
        self.print_batch(&outcome.batch);

        let decision = &outcome.decision;
        println!();
        if decision.safe_changes.is_empty() && decision.risky_changes.is_empty() {
            println!("No proposals produced.");
        }
        if !decision.safe_changes.is_empty() {
            println!("Safe changes (auto-appliable):");
            for proposal in &decision.safe_changes {
                self.print_proposal(proposal);
            }
        }
        if !decision.risky_changes.is_empty() {
            println!("Risky changes (approval required):");
            for proposal in &decision.risky_changes {
                self.print_proposal(proposal);
            }
        }
        if !decision.conflicts.is_empty() {
            println!("Conflicts:");
            for (a, b) in &decision.conflicts {
                println!("  tasks {} and {} touch overlapping files", a, b);
            }
        }
    }

    fn print_proposal(&self, proposal: &Proposal) {
        let files: Vec<String> = proposal
            .files_changed()
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        println!(
            "  [{}] {}  {}",
            proposal.task_id,
            proposal.kind,
            if files.is_empty() {
                "(no file changes)".to_string()
            } else {
                files.join(", ")
            }
        );
    }

    fn print_batch(&self, batch: &Batch) {
        println!("Batch {}: {}", batch.id, batch.status);

        let succeeded: Vec<_> = batch.succeeded().collect();
        if !succeeded.is_empty() {
            println!("Succeeded:");
            for task in succeeded {
                println!("  [{}] {}  {}", task.id, task.kind, task.instruction);
            }
        }

        let failed: Vec<_> = batch.failed().collect();
        if !failed.is_empty() {
            println!("Failed:");
            for task in failed {
                let detail = task.error.as_deref().unwrap_or("unknown error");
                println!("  [{}] {}  {}", task.id, task.kind, detail);
            }
        }

        let timed_out: Vec<_> = batch.timed_out().collect();
        if !timed_out.is_empty() {
            println!("Timed out (incomplete, retry candidates):");
            for task in timed_out {
                println!("  [{}] {}  {}", task.id, task.kind, task.instruction);
            }
        }
    }

    fn write_json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("error: failed to serialize output: {}", e),
        }
    }
}
