//! Output renderers for CLI commands.

use anyhow::anyhow;
use omnibar_supervisor::{HealthState, ProcessRecord, ProcessState};

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

pub(crate) fn render_process_list(records: &[ProcessRecord], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(records),
        OutputFormat::Table => {
            println!("{:<24} {:<10} {:<10} {:>8} RESTARTS", "ID", "STATE", "HEALTH", "PID");
            for record in records {
                print_row(record);
            }
            Ok(())
        }
    }
}

pub(crate) fn render_process(record: &ProcessRecord, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(record),
        OutputFormat::Table => {
            println!("{:<24} {:<10} {:<10} {:>8} RESTARTS", "ID", "STATE", "HEALTH", "PID");
            print_row(record);
            Ok(())
        }
    }
}

fn print_row(record: &ProcessRecord) {
    let pid = record.pid.map_or_else(|| "-".to_string(), |pid| pid.to_string());
    println!(
        "{:<24} {:<10} {:<10} {:>8} {}",
        record.process_id,
        state_to_str(record.state),
        health_to_str(record.health_state),
        pid,
        record.restarts_in_window
    );
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

#[must_use]
pub(crate) const fn state_to_str(state: ProcessState) -> &'static str {
    match state {
        ProcessState::Stopped => "stopped",
        ProcessState::Starting => "starting",
        ProcessState::Running => "running",
        ProcessState::Stopping => "stopping",
        ProcessState::Failed => "failed",
        ProcessState::Backoff => "backoff",
    }
}

#[must_use]
pub(crate) const fn health_to_str(state: HealthState) -> &'static str {
    match state {
        HealthState::Unknown => "unknown",
        HealthState::Healthy => "healthy",
        HealthState::Unhealthy => "unhealthy",
    }
}
