//! Cache statistics and summary display.
//!
//! Provides a quick overview of what's cached: per-project summary
//! counts, accumulated event totals by severity, embedding coverage, and
//! cache age. Used by `sawmill stats` and `sawmill show` to confirm that
//! pipeline runs and enrichment are behaving as expected.

use anyhow::Result;
use sqlx::Row;

use sawmill_core::models::ProjectCacheState;
use sawmill_core::store::SummaryStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Per-project breakdown of cached summaries.
struct ProjectStats {
    project_id: String,
    summary_count: i64,
    event_count: i64,
    error_count: i64,
    warning_count: i64,
    embedded_count: i64,
    newest_last_seen: Option<i64>,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_summaries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM summaries")
        .fetch_one(&pool)
        .await?;

    let total_events: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(count), 0) FROM summaries")
            .fetch_one(&pool)
            .await?;

    let total_embedded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM summary_vectors")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Sawmill — Cache Stats");
    println!("=====================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Summaries:   {}", total_summaries);
    println!("  Events:      {}", total_events);
    println!(
        "  Embedded:    {} / {} ({}%)",
        total_embedded,
        total_summaries,
        if total_summaries > 0 {
            (total_embedded * 100) / total_summaries
        } else {
            0
        }
    );

    let project_rows = sqlx::query(
        r#"
        SELECT
            s.project_id,
            COUNT(*) AS summary_count,
            COALESCE(SUM(s.count), 0) AS event_count,
            COALESCE(SUM(CASE WHEN s.severity = 'ERROR' THEN s.count ELSE 0 END), 0) AS error_count,
            COALESCE(SUM(CASE WHEN s.severity = 'WARNING' THEN s.count ELSE 0 END), 0) AS warning_count,
            COUNT(DISTINCT sv.group_key) AS embedded_count,
            MAX(s.last_seen) AS newest_last_seen
        FROM summaries s
        LEFT JOIN summary_vectors sv
            ON sv.project_id = s.project_id AND sv.group_key = s.group_key
        GROUP BY s.project_id
        ORDER BY summary_count DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let project_stats: Vec<ProjectStats> = project_rows
        .iter()
        .map(|row| ProjectStats {
            project_id: row.get("project_id"),
            summary_count: row.get("summary_count"),
            event_count: row.get("event_count"),
            error_count: row.get("error_count"),
            warning_count: row.get("warning_count"),
            embedded_count: row.get("embedded_count"),
            newest_last_seen: row.get("newest_last_seen"),
        })
        .collect();

    if !project_stats.is_empty() {
        println!();
        println!("  By project:");
        println!(
            "  {:<20} {:>9} {:>8} {:>7} {:>6} {:>9}   {}",
            "PROJECT", "SUMMARIES", "EVENTS", "ERRORS", "WARNS", "EMBEDDED", "NEWEST DATA"
        );
        println!("  {}", "-".repeat(82));

        for p in &project_stats {
            let age_display = match p.newest_last_seen {
                Some(ts) => format_ts_relative(ts),
                None => "never".to_string(),
            };
            println!(
                "  {:<20} {:>9} {:>8} {:>7} {:>6} {:>9}   {}",
                p.project_id,
                p.summary_count,
                p.event_count,
                p.error_count,
                p.warning_count,
                p.embedded_count,
                age_display
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Run the show command: print one project's cached summaries.
pub async fn run_show(config: &Config, project_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);

    let state = store.load(project_id).await?;
    print_state(project_id, state.as_ref());

    store.pool().close().await;
    Ok(())
}

fn print_state(project_id: &str, state: Option<&ProjectCacheState>) {
    let state = match state {
        Some(state) if !state.is_empty() => state,
        _ => {
            println!("No cached summaries for project '{}'.", project_id);
            return;
        }
    };

    println!("Project: {}", project_id);
    println!("Summaries: {}", state.summaries.len());
    println!();
    println!(
        "{:<8} {:>7} {:<16} {:<14}  {}",
        "SEVERITY", "COUNT", "SERVICE", "LAST SEEN", "PATTERN"
    );
    println!("{}", "-".repeat(90));

    for summary in &state.summaries {
        println!(
            "{:<8} {:>7} {:<16} {:<14}  {}",
            summary.severity.to_string(),
            summary.count,
            summary.service,
            format_ts_relative(summary.last_seen.timestamp()),
            truncate(&summary.pattern, 48)
        );
    }
    println!();
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        let long = "a".repeat(60);
        let out = truncate(&long, 48);
        assert!(out.chars().count() <= 48);
        assert!(out.ends_with('…'));
    }
}
