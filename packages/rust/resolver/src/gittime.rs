//! Best-effort vertical timestamps from `git log`.

use std::path::Path;

use chrono::{DateTime, Utc};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use courseforge_shared::{Block, Course};

/// Fill `created_at`/`updated_at` on every vertical from the author dates of
/// commits touching its narrative blocks. Returns how many verticals got
/// timestamps; any git failure leaves the rest unset.
#[instrument(skip_all, fields(root = %root.display()))]
pub async fn enrich_timestamps(root: &Path, course: &mut Course) -> usize {
    if !inside_work_tree(root).await {
        warn!("course root is not inside a git work tree; skipping timestamps");
        return 0;
    }

    let mut enriched = 0;
    for vertical in course.verticals_mut() {
        let paths: Vec<&str> = vertical
            .blocks
            .iter()
            .filter_map(|b| match b {
                Block::Narrative(n) => Some(n.fs_path.as_str()),
                _ => None,
            })
            .collect();
        if paths.is_empty() {
            continue;
        }

        let dates = match author_dates(root, &paths).await {
            Ok(dates) => dates,
            Err(e) => {
                warn!(vertical = %vertical.url_name, error = %e, "git log failed; skipping timestamps");
                return enriched;
            }
        };
        if let (Some(first), Some(last)) = (dates.iter().min(), dates.iter().max()) {
            vertical.created_at = Some(*first);
            vertical.updated_at = Some(*last);
            enriched += 1;
        }
    }

    debug!(enriched, "git timestamps applied");
    enriched
}

async fn inside_work_tree(root: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(root)
        .output()
        .await
        .map(|out| out.status.success() && String::from_utf8_lossy(&out.stdout).trim() == "true")
        .unwrap_or(false)
}

async fn author_dates(root: &Path, paths: &[&str]) -> std::io::Result<Vec<DateTime<Utc>>> {
    let out = Command::new("git")
        .args(["log", "--format=%aI", "--"])
        .args(paths)
        .current_dir(root)
        .output()
        .await?;
    if !out.status.success() {
        return Err(std::io::Error::other(
            String::from_utf8_lossy(&out.stderr).trim().to_string(),
        ));
    }
    Ok(parse_dates(&String::from_utf8_lossy(&out.stdout)))
}

fn parse_dates(output: &str) -> Vec<DateTime<Utc>> {
    output
        .lines()
        .filter_map(|line| DateTime::parse_from_rfc3339(line.trim()).ok())
        .map(|d| d.with_timezone(&Utc))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use courseforge_shared::{Chapter, NarrativeBlock, Sequential, Vertical};

    #[test]
    fn parses_iso_author_dates() {
        let dates = parse_dates("2024-03-01T10:00:00+02:00\n\ngarbage\n2023-12-31T23:59:59Z\n");
        assert_eq!(dates.len(), 2);
        assert_eq!(dates[0].to_rfc3339(), "2024-03-01T08:00:00+00:00");
        assert!(dates[1] < dates[0]);
    }

    #[tokio::test]
    async fn outside_a_repository_nothing_changes() {
        let dir = tempfile::tempdir().unwrap();
        let mut course = Course {
            chapters: vec![Chapter {
                sequentials: vec![Sequential {
                    verticals: vec![Vertical {
                        blocks: vec![Block::Narrative(NarrativeBlock {
                            url_name: "b1".into(),
                            display_name: "x".into(),
                            fs_path: "00_A/00_B/00_C/x.md".into(),
                            markdown: "x".into(),
                        })],
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };

        assert_eq!(enrich_timestamps(dir.path(), &mut course).await, 0);
        assert!(course.verticals().all(|v| v.created_at.is_none()));
    }
}
