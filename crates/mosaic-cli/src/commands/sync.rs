use std::path::Path;

use serde::Serialize;

use crate::commands::common::{format_sync_timestamp, open_library, open_reconciler};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ParkedEntryItem {
    pub sequence: i64,
    pub operation: String,
    pub entity_type: String,
    pub target_id: String,
    pub attempts: u32,
    pub last_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SyncStatusReport {
    pub pending: usize,
    pub parked: usize,
    pub next_attempt_at: Option<i64>,
    pub parked_entries: Vec<ParkedEntryItem>,
}

pub async fn run_sync(pull: bool, db_path: &Path) -> Result<(), CliError> {
    let library = open_library(db_path)?;
    let reconciler = open_reconciler(&library)?;

    let report = reconciler.drain().await?;
    println!(
        "Pushed {} change(s); {} to retry, {} failed, {} waiting",
        report.applied, report.retried, report.failed, report.deferred
    );

    if pull {
        let pulled = reconciler.pull(library.owner_id()).await?;
        println!(
            "Pulled {} item(s) and {} collection(s); {} kept local",
            pulled.items, pulled.collections, pulled.skipped
        );
    }

    if report.failed > 0 {
        println!("Run `mosaic sync status` to see failed changes.");
    }
    Ok(())
}

pub fn run_sync_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let library = open_library(db_path)?;
    let overview = library.sync_overview()?;
    let parked_entries = library
        .parked_entries()?
        .into_iter()
        .map(|entry| ParkedEntryItem {
            sequence: entry.sequence,
            operation: entry.operation.to_string(),
            entity_type: entry.entity_type.to_string(),
            target_id: entry.target_id,
            attempts: entry.attempts,
            last_error: entry.last_error,
        })
        .collect::<Vec<_>>();

    let report = SyncStatusReport {
        pending: overview.pending,
        parked: overview.parked,
        next_attempt_at: overview.next_attempt_at,
        parked_entries,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in format_sync_status_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_sync_status_lines(report: &SyncStatusReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{} pending, {} failed",
        report.pending, report.parked
    )];
    if let Some(next) = report.next_attempt_at {
        lines.push(format!("Next attempt: {}", format_sync_timestamp(next)));
    }
    for entry in &report.parked_entries {
        lines.push(format!(
            "#{:<5} {:<6} {:<10} {}  attempts={}  {}",
            entry.sequence,
            entry.operation,
            entry.entity_type,
            entry.target_id,
            entry.attempts,
            entry.last_error.as_deref().unwrap_or("-")
        ));
    }
    lines
}

pub fn run_sync_retry(db_path: &Path) -> Result<(), CliError> {
    let library = open_library(db_path)?;
    let requeued = library.retry_parked()?;

    if requeued == 0 {
        println!("No failed changes to retry.");
    } else {
        println!("Requeued {requeued} change(s); run `mosaic sync` to push them.");
    }
    Ok(())
}
