//! Markdown run report

use crate::output::stats::CrawlSummary;
use crate::output::traits::EmitResult;
use chrono::SecondsFormat;
use std::fs;
use std::path::Path;

/// Writes the markdown report for a finished run
pub fn generate_markdown_summary(summary: &CrawlSummary, output_path: &Path) -> EmitResult<()> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_path, format_markdown_summary(summary))?;
    Ok(())
}

/// Formats a crawl summary as markdown
pub fn format_markdown_summary(summary: &CrawlSummary) -> String {
    let stats = &summary.stats;
    let mut md = String::new();

    md.push_str("# Sampletrace Crawl Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!(
        "- **Started**: {}\n",
        summary.started_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    md.push_str(&format!(
        "- **Finished**: {}\n",
        summary.finished_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    md.push_str(&format!(
        "- **Duration**: {} seconds\n",
        summary.duration_seconds()
    ));
    md.push_str(&format!("- **Stop Reason**: {}\n", summary.stop_reason));
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    md.push_str("## Results\n\n");
    md.push_str("| Metric | Count |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!("| Tasks processed | {} |\n", stats.tasks_processed));
    md.push_str(&format!("| Tracks | {} |\n", stats.tracks_emitted));
    md.push_str(&format!("| Edges (forward) | {} |\n", stats.edges_forward));
    md.push_str(&format!("| Edges (reverse) | {} |\n", stats.edges_reverse));
    md.push_str(&format!(
        "| \"See all\" samples links | {} |\n",
        stats.see_all_samples
    ));
    md.push_str(&format!(
        "| \"See all\" sampled links | {} |\n",
        stats.see_all_sampled
    ));
    md.push_str(&format!("| Throttle events | {} |\n", stats.throttle_events));
    md.push_str(&format!("| Retried errors | {} |\n\n", stats.transient_errors));

    if !stats.failures.is_empty() {
        md.push_str("## Dropped Tasks\n\n");
        md.push_str("| Reason | Count |\n");
        md.push_str("|--------|-------|\n");
        for (kind, count) in &stats.failures {
            md.push_str(&format!("| {} | {} |\n", kind, count));
        }
        md.push('\n');
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::stats::{CrawlStats, FailureKind, StopReason};
    use chrono::{TimeZone, Utc};

    fn create_test_summary() -> CrawlSummary {
        let mut stats = CrawlStats {
            tasks_processed: 40,
            tracks_emitted: 12,
            edges_forward: 7,
            edges_reverse: 3,
            ..Default::default()
        };
        stats.record_failure(FailureKind::RobotsDenied);

        CrawlSummary {
            config_hash: "abc123".to_string(),
            started_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            finished_at: Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
            stop_reason: StopReason::Exhausted,
            stats,
        }
    }

    #[test]
    fn test_format_markdown_summary() {
        let markdown = format_markdown_summary(&create_test_summary());

        assert!(markdown.contains("# Sampletrace Crawl Summary"));
        assert!(markdown.contains("- **Started**: 2024-01-01T00:00:00Z"));
        assert!(markdown.contains("- **Duration**: 3600 seconds"));
        assert!(markdown.contains("- **Stop Reason**: frontier exhausted"));
        assert!(markdown.contains("| Edges (forward) | 7 |"));
        assert!(markdown.contains("| Edges (reverse) | 3 |"));
        assert!(markdown.contains("| robots_denied | 1 |"));
    }

    #[test]
    fn test_no_failure_table_when_clean() {
        let mut summary = create_test_summary();
        summary.stats.failures.clear();

        assert!(!format_markdown_summary(&summary).contains("Dropped Tasks"));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("reports/summary.md");

        generate_markdown_summary(&create_test_summary(), &path).unwrap();

        assert!(fs::read_to_string(path).unwrap().contains("abc123"));
    }
}
