//! Text and JSON rendering of operation results.

use dstools_core::{AccessResult, ErrorMetadata, ListingResult, StorageMetrics, StorageOpError};
use dstools_infra::ErrorResponse;
use dstools_storage::{BatchOutcome, BatchReport, OperationOutput};
use serde::Serialize;
use serde_json::{json, Value};

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;

/// Size in base-1024 units with two decimals; plain bytes below 1 KB.
pub fn human_size(bytes: u64) -> String {
    let b = bytes as f64;
    if bytes >= GIB {
        format!("{:.2} GB", b / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.2} MB", b / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.2} KB", b / KIB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// `1234567` → `1,234,567`
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
}

pub fn metrics_text(metrics: &StorageMetrics) -> String {
    format!(
        "Storage: {}\nType: {}\nItems: {}\nTotal size: {} bytes\nHuman readable: {}",
        metrics.location(),
        metrics.storage_type(),
        group_thousands(metrics.item_count()),
        group_thousands(metrics.total_bytes()),
        human_size(metrics.total_bytes())
    )
}

pub fn listing_text(listing: &ListingResult) -> String {
    let kind = listing.content_type();
    if listing.items().is_empty() {
        return format!("No {} found.", kind);
    }
    let mut out = format!("Found {} {}:", listing.items().len(), kind);
    for item in listing.items() {
        out.push_str("\n  ");
        out.push_str(item);
    }
    if listing.truncated() {
        out.push_str(&format!(
            "\n(truncated at {} items; raise --max-items to see more)",
            listing.items().len()
        ));
    }
    out
}

pub fn access_text(access: &AccessResult) -> String {
    let mut out = if access.has_access() {
        format!(
            "✓ Access verified: {} permission granted for {}",
            access.operation(),
            access.location()
        )
    } else {
        format!(
            "✗ Access denied: {} permission denied for {}",
            access.operation(),
            access.location()
        )
    };
    out.push_str(&format!("\nMethod: {}", access.verification_method()));
    if let Some(details) = access.details() {
        out.push_str(&format!("\nDetails: {}", details));
    }
    out
}

fn output_summary(output: &OperationOutput) -> String {
    match output {
        OperationOutput::Metrics(m) => format!(
            "{} items, {}",
            group_thousands(m.item_count()),
            human_size(m.total_bytes())
        ),
        OperationOutput::Listing(l) => format!(
            "{} {}{}",
            l.items().len(),
            l.content_type(),
            if l.truncated() { " (truncated)" } else { "" }
        ),
        OperationOutput::Access(a) => format!(
            "{} {}",
            a.operation(),
            if a.has_access() { "granted" } else { "denied" }
        ),
    }
}

pub fn batch_text(report: &BatchReport) -> String {
    let mut lines: Vec<String> = report
        .results
        .iter()
        .map(|item| {
            let summary = match &item.outcome {
                BatchOutcome::Succeeded(output) => output_summary(output),
                BatchOutcome::Failed(e) => format!("error [{}] {}", e.error_code(), e),
                BatchOutcome::Skipped => "skipped".to_string(),
            };
            format!("#{} {}: {}", item.index, item.location, summary)
        })
        .collect();
    lines.push(format!(
        "{} succeeded, {} failed, {} skipped",
        report.succeeded, report.failed, report.skipped
    ));
    lines.join("\n")
}

pub fn batch_json(report: &BatchReport) -> Value {
    let results: Vec<Value> = report
        .results
        .iter()
        .map(|item| {
            let mut entry = json!({
                "index": item.index,
                "location": item.location,
                "duration_ms": item.duration_ms,
            });
            match &item.outcome {
                BatchOutcome::Succeeded(output) => {
                    entry["status"] = json!("succeeded");
                    entry["result"] = json!(output);
                }
                BatchOutcome::Failed(e) => {
                    entry["status"] = json!("failed");
                    entry["error"] = json!(ErrorResponse::from_error(e, None));
                }
                BatchOutcome::Skipped => entry["status"] = json!("skipped"),
            }
            entry
        })
        .collect();
    json!({
        "results": results,
        "succeeded": report.succeeded,
        "failed": report.failed,
        "skipped": report.skipped,
    })
}

pub fn error_text(err: &StorageOpError) -> String {
    match err.suggested_action() {
        Some(action) => format!("Error: {}\nHint: {}", err, action),
        None => format!("Error: {}", err),
    }
}

pub fn error_json(err: &StorageOpError) -> String {
    to_json(&ErrorResponse::from_error(err, None))
}
