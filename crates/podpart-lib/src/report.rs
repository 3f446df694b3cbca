//! Run summarization
//!
//! Pure mapping from the finalized result set to a human-readable summary
//! block and a process exit code. The exit code is non-zero if and only if
//! at least one pod was applied but not restored.

use crate::orchestrator::PartitionResult;
use crate::spec::{Direction, PartitionSpec};
use std::fmt::Write as _;

/// Build the final summary text and exit code for a run.
pub fn summarize(results: &[PartitionResult], spec: &PartitionSpec) -> (String, i32) {
    let affected = results.iter().filter(|r| r.applied).count();
    let restored = results.iter().filter(|r| r.applied && r.restored).count();
    let unrestored: Vec<&PartitionResult> = results
        .iter()
        .filter(|r| r.applied && !r.restored)
        .collect();

    let mut text = String::new();
    let _ = writeln!(text, "{}", "=".repeat(60));
    let _ = writeln!(text, " Partition summary");
    let _ = writeln!(text, "{}", "=".repeat(60));
    let _ = writeln!(
        text,
        " Source:   {} (namespace: {})",
        spec.source_service, spec.namespace
    );
    let mut target = spec.target_label();
    if let Some(port) = spec.target_port {
        let _ = write!(target, " port {port}");
    }
    let _ = writeln!(text, " Target:   {target}");
    let _ = writeln!(
        text,
        " Drop:     {}%   Duration: {}s{}",
        spec.drop_percent,
        spec.duration.as_secs(),
        if spec.dry_run { "   [dry run]" } else { "" }
    );
    let _ = writeln!(text);

    for result in results {
        let _ = writeln!(
            text,
            " {}  {}  applied={}  restored={}  pre={}  post={}  dropped={}",
            result.pod,
            directions_label(&result.directions),
            yes_no(result.applied),
            yes_no(result.restored),
            latency(result.pre_latency_ms),
            latency(result.post_latency_ms),
            count(result.packets_dropped),
        );
    }

    let _ = writeln!(text);
    let _ = writeln!(text, " Pods affected: {affected}");
    let _ = writeln!(text, " Pods restored: {restored}");

    if !unrestored.is_empty() {
        let _ = writeln!(text);
        let _ = writeln!(
            text,
            " Unrestored pods have live fault rules. Clean up by hand:"
        );
        for result in &unrestored {
            for command in &result.remediation {
                let _ = writeln!(text, "   {command}");
            }
        }
    }

    let exit_code = if unrestored.is_empty() { 0 } else { 1 };
    (text, exit_code)
}

fn directions_label(directions: &[Direction]) -> &'static str {
    if directions.contains(&Direction::Ingress) {
        "egress+ingress"
    } else {
        "egress"
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn latency(value: Option<u64>) -> String {
    match value {
        Some(ms) => format!("{ms}ms"),
        None => "unreachable".to_string(),
    }
}

fn count(value: Option<u64>) -> String {
    match value {
        Some(n) => n.to_string(),
        None => "-".to_string(),
    }
}
