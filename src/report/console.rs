use crate::report::report_model::RunReport;

// ============================================================================
// Console reporter: formatted terminal output
// ============================================================================

/// Format a run report for terminal output.
///
/// Produces output like:
/// ```text
/// === Task: search for shoes on flipkart ===
///
/// ✓ COMPLETED after 4 steps
///     reason: task completed: results are shown
///
/// Progress:
///     [x] search_initiated
///     [x] query_entered
///
/// Recent actions:
///     step 3: type(540,180,"shoes") [structural]
///     step 4: wait # TASK_COMPLETE: results are shown [inference]
/// ```
pub fn format_console_report(report: &RunReport) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== Task: {} ===\n", report.task));
    if let Some(app) = &report.app {
        out.push_str(&format!("    app: {}\n", app));
    }
    out.push('\n');

    let marker = if report.succeeded() {
        "\u{2713}"
    } else {
        "\u{2717}"
    };
    out.push_str(&format!(
        "{} {} after {} steps",
        marker, report.status, report.steps_taken
    ));
    if let Some(ms) = report.duration_ms {
        out.push_str(&format!(" in {:.1}s", ms as f64 / 1000.0));
    }
    out.push('\n');
    out.push_str(&format!("    reason: {}\n", report.reason));

    if !report.progress.is_empty() {
        out.push_str("\nProgress:\n");
        for flag in &report.progress {
            let tick = if flag.achieved { "x" } else { " " };
            out.push_str(&format!("    [{}] {}\n", tick, flag.name));
        }
    }

    if !report.history.is_empty() {
        out.push_str("\nRecent actions:\n");
        for entry in &report.history {
            out.push_str(&format!("    {}\n", entry.summary()));
            if let Some(discarded) = &entry.discarded {
                out.push_str(&format!("        replaced looping {}\n", discarded.describe()));
            }
        }
    }

    out
}

/// Pretty JSON rendering of the report.
pub fn format_json_report(report: &RunReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
