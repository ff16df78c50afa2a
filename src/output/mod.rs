//! Output formatting for ping, scan, and trace results

use chrono::{DateTime, Utc};
use colored::*;
use serde::Serialize;

use crate::diagnostics::PingReport;
use crate::discovery::ScanReport;
use crate::network::ProbeStatus;
use crate::trace::{HopRecord, TraceTermination};
use crate::utils::format_millis;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// JSON document wrapping one result
#[derive(Debug, Serialize)]
pub struct JsonEnvelope<'a, T: Serialize> {
    pub generated_at: DateTime<Utc>,
    pub operation: &'a str,
    pub result: &'a T,
}

/// Serialize a result with a timestamp
pub fn to_json<T: Serialize>(operation: &str, result: &T) -> crate::Result<String> {
    let envelope = JsonEnvelope {
        generated_at: Utc::now(),
        operation,
        result,
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}

/// One line describing a ping
pub fn format_ping(report: &PingReport) -> String {
    let result = &report.result;
    if result.is_success() {
        let from = result
            .responder
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| report.target.clone());
        format!(
            "{} Reply from {}: time={} (round trip={} ms)",
            "[+]".bright_green(),
            from.bright_cyan(),
            format_millis(result.wall_clock_millis),
            result.round_trip_millis
        )
    } else {
        format!("{} Ping failed: {}", "[!]".bright_red(), result.status_text().bright_yellow())
    }
}

/// Heading printed before a sweep starts
pub fn format_scan_header(prefix: &str, start: &str, end: &str) -> String {
    format!("{} Scanning {}.{} to {}.{}...", "[~]".bright_blue(), prefix, start, prefix, end)
}

/// Reachable hosts followed by the summary line
pub fn format_scan(report: &ScanReport) -> String {
    let mut lines: Vec<String> = report
        .reachable()
        .map(|outcome| format!("{} {} is reachable.", "[+]".bright_green(), outcome.address.bright_cyan()))
        .collect();

    lines.push(format!(
        "{} Scan complete. {} of {} hosts reachable.",
        "[~]".bright_blue(),
        report.reachable_count().to_string().bold(),
        report.outcomes.len()
    ));
    lines.join("\n")
}

/// Heading printed before the first hop
pub fn format_trace_header(target: &str, max_hops: u8) -> String {
    format!("{} Tracing route to {} (max {} hops)...", "[~]".bright_blue(), target, max_hops)
}

/// One progressive trace line
pub fn format_hop(hop: &HopRecord) -> String {
    match hop.status {
        ProbeStatus::Success | ProbeStatus::TtlExceeded => format!(
            "{}\t{}\tlocal: {} (network: {})\t{}",
            hop.hop_index,
            hop.address.bright_cyan(),
            hop.local_time_label,
            hop.network_time_label,
            hop.geo_label
        ),
        ProbeStatus::TimedOut => format!(
            "{}\t{}\tlocal: {} (network: {})",
            hop.hop_index,
            hop.address.dimmed(),
            hop.local_time_label,
            hop.network_time_label
        ),
        ProbeStatus::Error => format!(
            "{}\t{} {} (local: {})",
            hop.hop_index,
            "Error:".bright_red(),
            hop.network_time_label,
            hop.local_time_label
        ),
    }
}

/// Closing line of a trace
pub fn format_trace_footer(termination: TraceTermination) -> String {
    match termination {
        TraceTermination::ReachedDestination => format!("{} Destination reached.", "[+]".bright_green()),
        TraceTermination::Failed => format!("{} Trace aborted.", "[!]".bright_red()),
        TraceTermination::Exhausted => {
            format!("{} Maximum hops reached without reaching the destination.", "[!]".bright_yellow())
        }
    }
}
