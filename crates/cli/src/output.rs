//! Terminal output helpers
//!
//! Timestamped, leveled log lines for the human-facing stream plus table
//! and JSON rendering of the per-pod result records.

use chrono::Utc;
use clap::ValueEnum;
use colored::Colorize;
use podpart_lib::PartitionResult;
use tabled::{settings::Style, Table, Tabled};

/// Output format for the final result records
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {} {}", timestamp().dimmed(), "INFO".blue().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        "WARN".yellow().bold(),
        message
    );
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!(
        "{} {} {}",
        timestamp().dimmed(),
        "ERROR".red().bold(),
        message
    );
}

/// Print a success message
pub fn print_success(message: &str) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        "SUCCESS".green().bold(),
        message
    );
}

/// Row for the per-pod results table
#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Pod")]
    pod: String,
    #[tabled(rename = "Direction")]
    direction: String,
    #[tabled(rename = "Applied")]
    applied: String,
    #[tabled(rename = "Restored")]
    restored: String,
    #[tabled(rename = "Pre")]
    pre: String,
    #[tabled(rename = "Post")]
    post: String,
    #[tabled(rename = "Dropped")]
    dropped: String,
}

fn latency(value: Option<u64>) -> String {
    match value {
        Some(ms) => format!("{ms}ms"),
        None => "unreachable".to_string(),
    }
}

/// Print the result records in the requested format
pub fn print_results(results: &[PartitionResult], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let rows: Vec<ResultRow> = results
                .iter()
                .map(|r| ResultRow {
                    pod: r.pod.clone(),
                    direction: if r.directions.len() > 1 {
                        "egress+ingress".to_string()
                    } else {
                        "egress".to_string()
                    },
                    applied: if r.applied { "yes" } else { "no" }.to_string(),
                    restored: if r.restored { "yes" } else { "no" }.to_string(),
                    pre: latency(r.pre_latency_ms),
                    post: latency(r.post_latency_ms),
                    dropped: r
                        .packets_dropped
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                })
                .collect();
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{table}");
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(results) {
                println!("{json}");
            }
        }
    }
}
