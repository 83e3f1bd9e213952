use super::{ReleaseDelta, ServiceScan};
use crate::domain::ReleaseVersion;

const TASK_RULE: usize = 30;
const STATS_RULE: usize = 50;

fn header(version: ReleaseVersion) -> String {
    let title = format!("Release Notes for Version {}", version);
    let underline = "=".repeat(title.len() + 1);
    format!("{}\n{}\n\n", title, underline)
}

/// Artifact written when there is no previous release to compare against
pub fn render_without_lineage(version: ReleaseVersion) -> String {
    let mut out = header(version);
    out.push_str("No previous release branch found to compare against.\n");
    out
}

/// Full release notes. Scans are listed by service name.
pub fn render(
    version: ReleaseVersion,
    lineage: &str,
    delta: &ReleaseDelta,
    scans: &[ServiceScan],
    url_prefix: &str,
) -> String {
    let mut out = header(version);
    out.push_str(&format!(
        "Comparing with previous release branch: {}\n\n",
        lineage
    ));

    if delta.new_tasks.is_empty() {
        out.push_str("No new tasks with IDs found in commit messages.\n");
    } else {
        out.push_str("Tasks included in this release:\n");
        out.push_str(&"-".repeat(TASK_RULE));
        out.push_str("\n\n");
        for task in &delta.new_tasks {
            out.push_str(url_prefix);
            out.push_str(task);
            out.push('\n');
        }
        out.push_str(&format!("\nTotal new tasks: {}\n", delta.new_tasks.len()));
    }

    out.push_str("\n\nService Statistics:\n");
    out.push_str(&"-".repeat(STATS_RULE));
    out.push('\n');
    out.push_str(&format!("{:<30} {:<20} {}\n", "Service", "Last Tag", "Stats"));
    out.push_str(&"-".repeat(STATS_RULE));
    out.push('\n');

    let mut sorted: Vec<&ServiceScan> = scans.iter().collect();
    sorted.sort_by(|a, b| a.service.cmp(&b.service));
    for scan in sorted {
        out.push_str(&format!(
            "{:<30} {:<20} {} commits, {} tasks\n",
            scan.service, scan.marker, scan.commit_count, scan.task_count
        ));
    }

    out
}
