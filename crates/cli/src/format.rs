//! Report → human/json string formatting.
//!
//! - **Human** (default): one summary line per report, `(error) ...` for errors
//! - **JSON** (`inspect --json`): `serde_json::to_string_pretty`

use serde::Serialize;
use tsvault_engine::{BackupReport, ClearReport, InspectReport, RestoreReport};

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Format an error.
pub fn format_error(err: &str, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => format_json(&serde_json::json!({ "error": err })),
        OutputMode::Human => format!("(error) {}", err),
    }
}

/// Format a backup report.
pub fn format_backup(report: &BackupReport) -> String {
    let mut line = format!(
        "Backed up {} objects from {} pools and {} key-value rows into {} data files ({} bytes)",
        report.objects_written,
        report.pools.len(),
        report.kv_rows,
        report.file_count,
        report.bytes
    );
    if report.objects_unchanged > 0 {
        line.push_str(&format!(", {} unchanged objects skipped", report.objects_unchanged));
    }
    line
}

/// Format a restore report.
pub fn format_restore(report: &RestoreReport) -> String {
    format!(
        "Restored {} objects ({} skipped, pool not mapped) and {} key-value rows",
        report.objects_restored, report.objects_skipped, report.kv_rows_restored
    )
}

/// Format a clear report.
pub fn format_clear(report: &ClearReport) -> String {
    format!(
        "Deleted {} objects from {} pools and {} key-value rows",
        report.objects_deleted,
        report.pools.len(),
        report.kv_rows_deleted
    )
}

/// Format an archive summary.
pub fn format_inspect(report: &InspectReport, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => format_json(report),
        OutputMode::Human => {
            let mut lines = vec![
                format!("Objects:       {}", report.objects),
                format!(
                    "Key-value:     {} rows in {} batches",
                    report.kv_rows, report.kv_batches
                ),
                format!("Payload bytes: {}", report.payload_bytes),
            ];
            if report.pools.is_empty() {
                lines.push("Pools:         (none)".to_string());
            } else {
                let pools: Vec<&str> = report.pools.iter().map(String::as_str).collect();
                lines.push(format!("Pools:         {}", pools.join(", ")));
            }
            match &report.manifest {
                Some(manifest) => lines.push(format!(
                    "Manifest:      {} data files, {} timestamps",
                    manifest.file_count, manifest.timestamps
                )),
                None => lines.push("Manifest:      (missing)".to_string()),
            }
            lines.join("\n")
        }
    }
}

fn format_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}
