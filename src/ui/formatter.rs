//! Pure formatting functions for UI output.
//!
//! This module contains all display/formatting logic separated from user interaction.
//! Styling goes through `console`, which drops colors when output is not a terminal.

use console::style;

use crate::notes::SynthesisReport;
use crate::pipeline::{DispatchReport, PipelineRun};
use crate::warning::ReleaseWarning;

/// Patches longer than this are cut when shown for review
const MAX_DIFF_LINES: usize = 400;

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

/// Format and print a success message with green checkmark.
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

/// Format and print a status message with yellow arrow.
pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

/// Print a phase heading, e.g. `== Updating versions ==`.
pub fn display_phase(title: &str) {
    println!("\n{}", style(format!("== {} ==", title)).blue().bold());
}

pub fn display_warning(warning: &ReleaseWarning) {
    eprintln!("{} {}", style("⚠ WARNING:").yellow(), warning);
}

/// Style one line of a unified diff
pub fn colorize_diff_line(line: &str) -> String {
    if line.starts_with("+++") || line.starts_with("---") {
        style(line).bold().to_string()
    } else if line.starts_with('+') {
        style(line).green().to_string()
    } else if line.starts_with('-') {
        style(line).red().to_string()
    } else if line.starts_with("@@") {
        style(line).cyan().to_string()
    } else {
        line.to_string()
    }
}

/// Show a service's pending changes for review.
pub fn display_diff(service: &str, patch: &str) {
    println!("\n{}", style(format!("Changes in {}:", service)).bold());
    if patch.trim().is_empty() {
        println!("  (no changes)");
        return;
    }

    let lines: Vec<&str> = patch.lines().collect();
    for line in lines.iter().take(MAX_DIFF_LINES) {
        println!("{}", colorize_diff_line(line));
    }
    if lines.len() > MAX_DIFF_LINES {
        println!("  ... and {} more lines", lines.len() - MAX_DIFF_LINES);
    }
}

/// Summarize a release notes run: file, lineage, new tasks and per-service counts.
pub fn display_notes_summary(report: &SynthesisReport) {
    match &report.lineage {
        Some(lineage) => println!("  Compared with: {}", style(lineage).cyan()),
        None => println!("  Compared with: {}", style("(nothing)").dim()),
    }
    for scan in &report.scans {
        println!(
            "  {:<30} {:<20} {} commits, {} tasks",
            scan.service, scan.marker, scan.commit_count, scan.task_count
        );
    }
    println!("  New tasks: {}", style(report.delta.new_tasks.len()).bold());
    display_success(&format!("Release notes written to {}", report.path.display()));
}

pub fn display_pipeline_run(run: &PipelineRun) {
    let status = if run.status.is_success() {
        style(run.status.to_string()).green()
    } else {
        style(run.status.to_string()).red()
    };
    let elapsed = run.finished_at.duration_since(run.dispatched_at).as_secs();
    println!(
        "  {:<30} {:<10} {:>5}s  {}",
        run.service, status, elapsed, run.web_url
    );
}

pub fn display_dispatch_summary(report: &DispatchReport) {
    for run in &report.runs {
        display_pipeline_run(run);
    }
}

/// Display manual push instruction for a service that was not pushed.
pub fn display_manual_push_instruction(service: &str, directory: &str, remote: &str) {
    println!(
        "  {} {}: {}",
        style("→").yellow(),
        service,
        style(format!(
            "git -C {} push -u {} HEAD --tags --force-with-lease",
            directory, remote
        ))
        .cyan()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colorize_keeps_text() {
        for line in ["+<version>12.0</version>", "-<version>11.0</version>", "@@ -1 +1 @@", " ctx"] {
            let styled = colorize_diff_line(line);
            assert!(console::strip_ansi_codes(&styled).contains(line));
        }
    }

    #[test]
    fn test_display_functions_do_not_panic() {
        display_error("test error");
        display_success("test success");
        display_status("test status");
        display_phase("Updating versions");
        display_diff("billing", "");
        display_diff("billing", "--- a/pom.xml\n+++ b/pom.xml\n-a\n+b\n");
    }
}
