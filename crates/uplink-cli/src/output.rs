//! Terminal output for uplink commands
//!
//! Commands talk to an [`OutputFormatter`]; the human formatter prints
//! marked lines and aligned tables, the JSON formatter prints one document
//! per result. Pass reports and watch listings have their own methods so
//! both formats render them from the same data.

use std::path::Path;

use uplink_core::domain::{WatchEntry, WatchId};
use uplink_sync::{PassReport, WatchStatus};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    /// `quiet` drops informational lines but keeps results
    Human { quiet: bool },
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
    /// Result of one pass over `local`
    fn report(&self, local: &Path, report: &PassReport);
    /// Every configured watch with its running flag
    fn watches(&self, watches: &[WatchStatus]);
}

// ============================================================================
// Human output
// ============================================================================

pub struct HumanFormatter {
    quiet: bool,
}

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {message}");
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {message}");
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {message}");
    }
    fn info(&self, message: &str) {
        if !self.quiet {
            println!("  {message}");
        }
    }
    fn print_json(&self, _value: &serde_json::Value) {}

    fn report(&self, local: &Path, report: &PassReport) {
        if report.failed == 0 {
            self.success(&format!("Pass complete for {}", local.display()));
        } else {
            self.warn(&format!(
                "Pass for {} finished with {} failure(s)",
                local.display(),
                report.failed
            ));
        }
        for line in report_lines(report) {
            println!("  {line}");
        }
        for error in &report.errors {
            self.error(error);
        }
    }

    fn watches(&self, watches: &[WatchStatus]) {
        if watches.is_empty() {
            println!("No watches configured. Use 'uplink watch add LOCAL REMOTE'.");
            return;
        }
        for line in watch_lines(watches) {
            println!("{line}");
        }
    }
}

/// Label/value rows of a pass report, labels padded to one width
fn report_lines(report: &PassReport) -> Vec<String> {
    let mut rows = vec![
        ("Uploaded", report.uploaded.to_string()),
        ("Unchanged", report.unchanged.to_string()),
        ("Ignored", report.ignored.to_string()),
        ("Failed", report.failed.to_string()),
        ("Duration", format!("{}ms", report.duration_ms)),
    ];
    if report.cancelled {
        rows.push(("Cancelled", "yes".to_string()));
    }

    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0) + 1;
    rows.into_iter()
        .map(|(label, value)| format!("{:<width$} {value}", format!("{label}:")))
        .collect()
}

/// One table row per watch, with a header; the local column is sized to fit
fn watch_lines(watches: &[WatchStatus]) -> Vec<String> {
    let locals: Vec<String> = watches
        .iter()
        .map(|w| w.entry.local.display().to_string())
        .collect();
    let width = locals.iter().map(String::len).max().unwrap_or(0).max("LOCAL".len());

    let mut lines = vec![format!(
        "{:<12}  {:<width$}  {:<8}  {:>9}  {:>6}  {:<8}  REMOTE",
        "ID", "LOCAL", "STATE", "INTERVAL", "FILES", "MODE"
    )];
    for (status, local) in watches.iter().zip(&locals) {
        let entry = &status.entry;
        let mode = match (entry.encryption.is_some(), entry.anonymizes()) {
            (true, true) => format!("{:?}+enc+anon", entry.mode),
            (true, false) => format!("{:?}+enc", entry.mode),
            _ => format!("{:?}", entry.mode),
        };
        lines.push(format!(
            "{:<12}  {:<width$}  {:<8}  {:>9}  {:>6}  {:<8}  {}",
            status.id.short(),
            local,
            if status.running { "running" } else { "stopped" },
            format!("{}s", entry.interval_secs),
            entry.files.len(),
            mode.to_lowercase(),
            entry.remote,
        ));
    }
    lines
}

// ============================================================================
// JSON output
// ============================================================================

pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", serde_json::json!({"success": true, "message": message}));
    }
    fn error(&self, message: &str) {
        eprintln!("{}", serde_json::json!({"success": false, "error": message}));
    }
    fn warn(&self, message: &str) {
        eprintln!("{}", serde_json::json!({"level": "warning", "message": message}));
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }

    fn report(&self, _local: &Path, report: &PassReport) {
        self.print_json(&report_json(report));
    }

    fn watches(&self, watches: &[WatchStatus]) {
        let items: Vec<serde_json::Value> = watches
            .iter()
            .map(|w| status_json(&w.id, &w.entry, w.running))
            .collect();
        self.print_json(&serde_json::json!({ "watches": items }));
    }
}

fn report_json(report: &PassReport) -> serde_json::Value {
    serde_json::json!({
        "success": report.failed == 0,
        "uploaded": report.uploaded,
        "unchanged": report.unchanged,
        "ignored": report.ignored,
        "failed": report.failed,
        "errors": report.errors,
        "cancelled": report.cancelled,
        "duration_ms": report.duration_ms,
    })
}

/// Watch summary for JSON output; the key itself is never printed
pub fn status_json(id: &WatchId, entry: &WatchEntry, running: bool) -> serde_json::Value {
    serde_json::json!({
        "id": id.as_str(),
        "local": entry.local.display().to_string(),
        "remote": entry.remote.as_str(),
        "interval_secs": entry.interval_secs,
        "mode": entry.mode,
        "fingerprint": entry.effective_fingerprint(),
        "encryption": entry.encryption.as_ref().map(|e| e.method.clone()),
        "anonymize_names": entry.anonymizes(),
        "ignore_file": entry.ignore_file.as_ref().map(|p| p.display().to_string()),
        "tracked_files": entry.files.len(),
        "running": running,
    })
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Human { quiet } => Box::new(HumanFormatter { quiet }),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use uplink_core::domain::{EncryptionSettings, RemotePath};

    use super::*;

    fn status(local: &str, running: bool) -> WatchStatus {
        let entry = WatchEntry::new(PathBuf::from(local), RemotePath::new("/backup").unwrap(), 60)
            .unwrap();
        WatchStatus {
            id: entry.id(),
            entry,
            running,
        }
    }

    // ------------------------------------------------------------------------
    // Pass reports
    // ------------------------------------------------------------------------

    #[test]
    fn test_report_json() {
        let report = PassReport {
            uploaded: 2,
            failed: 1,
            errors: vec!["b.txt: remote rejected".to_string()],
            ..Default::default()
        };

        let value = report_json(&report);
        assert_eq!(value["success"], false);
        assert_eq!(value["uploaded"], 2);
        assert_eq!(value["errors"][0], "b.txt: remote rejected");
    }

    #[test]
    fn test_report_lines_are_aligned() {
        let report = PassReport {
            uploaded: 3,
            duration_ms: 42,
            ..Default::default()
        };

        let lines = report_lines(&report);
        assert_eq!(lines[0], "Uploaded:  3");
        assert_eq!(lines[1], "Unchanged: 0");
        assert_eq!(lines[4], "Duration:  42ms");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_report_lines_mention_cancellation() {
        let report = PassReport {
            cancelled: true,
            ..Default::default()
        };
        assert_eq!(report_lines(&report).last().unwrap(), "Cancelled: yes");
    }

    // ------------------------------------------------------------------------
    // Watch listings
    // ------------------------------------------------------------------------

    #[test]
    fn test_watch_lines_columns() {
        let watches = vec![status("/data/docs", true), status("/srv/music/library", false)];

        let lines = watch_lines(&watches);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].starts_with(watches[0].id.short()));
        assert!(lines[1].contains("running"));
        assert!(lines[2].contains("stopped"));
        assert!(lines[1].ends_with("/backup"));

        // The state column starts at the same offset on every row.
        let offsets: Vec<usize> = lines[1..]
            .iter()
            .map(|l| l.find("running").or_else(|| l.find("stopped")).unwrap())
            .collect();
        assert_eq!(offsets[0], offsets[1]);
    }

    #[test]
    fn test_status_json_hides_key() {
        let entry = WatchEntry::new(PathBuf::from("/data"), RemotePath::new("/backup").unwrap(), 60)
            .unwrap()
            .with_encryption(Some(EncryptionSettings {
                key: "hunter2".to_string(),
                method: "aes-256-gcm".to_string(),
            }));

        let value = status_json(&entry.id(), &entry, true);
        assert_eq!(value["encryption"], "aes-256-gcm");
        assert_eq!(value["mode"], "incremental");
        assert_eq!(value["running"], true);
        assert!(!value.to_string().contains("hunter2"));

        let lines = watch_lines(&[WatchStatus {
            id: entry.id(),
            entry,
            running: false,
        }]);
        assert!(lines[1].contains("incremental+enc"));
        assert!(!lines[1].contains("hunter2"));
    }
}
