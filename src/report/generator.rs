//! Markdown and JSON rendering of engine views.
//!
//! Each [`View`] wraps the result of one engine query or command; the
//! generators turn it into Markdown tables or pretty-printed JSON.

use crate::analysis::{
    CrossPlatformTotals, Heatmap, PlatformRank, PlatformTable, RangeSummary, TableRow, TrendView,
    WEEKDAYS,
};
use crate::editor::CommitSummary;
use crate::error::Result;
use crate::models::{DataPoint, Metric, Platform};
use crate::transfer::MergeReport;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Renderable result of one command.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum View {
    Overview {
        totals: CrossPlatformTotals,
    },
    Table {
        platform: Platform,
        table: PlatformTable,
    },
    Trend {
        platform: Platform,
        trend: TrendView,
    },
    Summary {
        summary: RangeSummary,
    },
    Ranking {
        metric: Metric,
        ranking: Vec<PlatformRank>,
    },
    TopDays {
        platform: Platform,
        metric: Metric,
        days: Vec<DataPoint>,
    },
    Heatmap {
        platform: Platform,
        heatmap: Heatmap,
    },
    Edit {
        platform: Platform,
        day: usize,
        metrics: Vec<Metric>,
        before: TableRow,
        after: TableRow,
        committed: Option<CommitSummary>,
        saved_to: Option<PathBuf>,
    },
    Export {
        path: PathBuf,
        rows: usize,
    },
    Import {
        source: PathBuf,
        rows: usize,
        report: MergeReport,
        saved_to: Option<PathBuf>,
    },
}

/// Generate the Markdown rendering of a view.
pub fn generate_markdown(view: &View) -> String {
    match view {
        View::Overview { totals } => overview_section(totals),
        View::Table { platform, table } => table_section(platform, table),
        View::Trend { platform, trend } => trend_section(platform, trend),
        View::Summary { summary } => summary_section(summary),
        View::Ranking { metric, ranking } => ranking_section(*metric, ranking),
        View::TopDays {
            platform,
            metric,
            days,
        } => top_days_section(platform, *metric, days),
        View::Heatmap { platform, heatmap } => heatmap_section(platform, heatmap),
        View::Edit {
            platform,
            day,
            metrics,
            before,
            after,
            committed,
            saved_to,
        } => edit_section(
            platform,
            *day,
            metrics,
            before,
            after,
            committed.as_ref(),
            saved_to.as_ref(),
        ),
        View::Export { path, rows } => format!(
            "## Export\n\n- **File:** `{}`\n- **Rows:** {}\n",
            path.display(),
            rows
        ),
        View::Import {
            source,
            rows,
            report,
            saved_to,
        } => import_section(source, *rows, report, saved_to.as_ref()),
    }
}

/// Generate a JSON rendering of a view.
pub fn generate_json(view: &View) -> Result<String> {
    serde_json::to_string_pretty(view).map_err(Into::into)
}

fn header_row(cells: &[String]) -> String {
    let mut out = format!("| {} |\n", cells.join(" | "));
    out.push('|');
    for (i, _) in cells.iter().enumerate() {
        out.push_str(if i == 0 { ":---|" } else { "---:|" });
    }
    out.push('\n');
    out
}

fn missing_note(missing: &[Platform]) -> String {
    if missing.is_empty() {
        return String::new();
    }
    let names: Vec<String> = missing.iter().map(Platform::to_string).collect();
    format!("> ⚠️ No data available for: {}\n\n", names.join(", "))
}

fn overview_section(totals: &CrossPlatformTotals) -> String {
    let mut section = String::new();
    section.push_str("## All Metrics Overview\n\n");

    let metrics: Vec<Metric> = totals.totals.keys().copied().collect();
    let mut header = vec!["Platform".to_string()];
    header.extend(metrics.iter().map(|m| m.to_string()));
    section.push_str(&header_row(&header));

    for platform in totals.platforms() {
        let mut cells = vec![platform.to_string()];
        for metric in &metrics {
            cells.push(
                totals
                    .get(*metric, platform)
                    .map_or_else(String::new, |v| v.to_string()),
            );
        }
        section.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    section.push('\n');
    section.push_str(&missing_note(&totals.missing));

    section
}

fn table_section(platform: &Platform, table: &PlatformTable) -> String {
    let mut section = String::new();
    section.push_str(&format!("## Tracking Data for {}\n\n", platform));

    let mut header = vec!["Date".to_string()];
    header.extend(table.metrics.iter().map(|m| m.to_string()));
    header.push("Total".to_string());
    header.push("Average".to_string());
    section.push_str(&header_row(&header));

    for row in &table.rows {
        section.push_str(&format_row(row));
    }
    section.push('\n');

    let totals = table.column_totals();
    let means = table.column_means();
    section.push_str("### Column Statistics\n\n");
    section.push_str(&header_row(&[
        "Metric".to_string(),
        "Sum".to_string(),
        "Mean".to_string(),
    ]));
    for metric in &table.metrics {
        section.push_str(&format!(
            "| {} | {} | {:.2} |\n",
            metric,
            totals.get(metric).copied().unwrap_or(0),
            means.get(metric).copied().unwrap_or(0.0)
        ));
    }
    section.push('\n');

    section
}

fn format_row(row: &TableRow) -> String {
    let values: Vec<String> = row.values.iter().map(u32::to_string).collect();
    format!(
        "| {} | {} | {} | {:.2} |\n",
        row.date,
        values.join(" | "),
        row.total,
        row.average
    )
}

fn trend_section(platform: &Platform, trend: &TrendView) -> String {
    let mut section = String::new();
    section.push_str(&format!("## Metric Trends for {}\n\n", platform));

    let mut header = vec!["Date".to_string()];
    header.extend(trend.columns.keys().map(|m| m.to_string()));
    section.push_str(&header_row(&header));

    for (i, date) in trend.dates.iter().enumerate() {
        let values: Vec<String> = trend
            .columns
            .values()
            .map(|column| column[i].to_string())
            .collect();
        section.push_str(&format!("| {} | {} |\n", date, values.join(" | ")));
    }
    section.push('\n');

    section
}

fn summary_section(summary: &RangeSummary) -> String {
    let mut section = String::new();
    section.push_str(&format!(
        "## Summary {} to {} ({} day{})\n\n",
        summary.start,
        summary.end,
        summary.days,
        if summary.days == 1 { "" } else { "s" }
    ));

    let metrics: Vec<Metric> = summary
        .totals
        .values()
        .next()
        .map(|row| row.keys().copied().collect())
        .unwrap_or_default();

    let mut header = vec!["Platform".to_string()];
    header.extend(metrics.iter().map(|m| m.to_string()));
    section.push_str(&header_row(&header));

    for (platform, sums) in &summary.totals {
        let values: Vec<String> = sums.values().map(u64::to_string).collect();
        section.push_str(&format!("| {} | {} |\n", platform, values.join(" | ")));
    }
    section.push('\n');
    section.push_str(&missing_note(&summary.missing));

    section
}

fn ranking_section(metric: Metric, ranking: &[PlatformRank]) -> String {
    let mut section = String::new();
    section.push_str(&format!("## Platforms by Average {}\n\n", metric));

    if let Some(top) = ranking.first() {
        section.push_str(&format!(
            "Top Performing Platform: **{}** with average {} of {:.2}\n\n",
            top.platform,
            metric.name().to_lowercase(),
            top.mean
        ));
    } else {
        section.push_str("No platform has data.\n\n");
        return section;
    }

    section.push_str(&header_row(&[
        "Rank".to_string(),
        "Platform".to_string(),
        "Mean".to_string(),
    ]));
    for (i, entry) in ranking.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {:.2} |\n",
            i + 1,
            entry.platform,
            entry.mean
        ));
    }
    section.push('\n');

    section
}

fn top_days_section(platform: &Platform, metric: Metric, days: &[DataPoint]) -> String {
    let mut section = String::new();
    section.push_str(&format!("## Top {} Days for {}\n\n", metric, platform));
    section.push_str(&header_row(&["Date".to_string(), metric.to_string()]));
    for point in days {
        section.push_str(&format!("| {} | {} |\n", point.date, point.value));
    }
    section.push('\n');
    section
}

fn heatmap_section(platform: &Platform, heatmap: &Heatmap) -> String {
    let mut section = String::new();
    section.push_str(&format!("## {} Heat Map for {}\n\n", heatmap.metric, platform));

    let mut header = vec!["Week of".to_string()];
    header.extend(WEEKDAYS.iter().map(|d| d.to_string()));
    section.push_str(&header_row(&header));

    for (week, cells) in heatmap.weeks.iter().zip(&heatmap.cells) {
        let values: Vec<String> = cells
            .iter()
            .map(|c| c.map_or_else(|| "-".to_string(), |v| v.to_string()))
            .collect();
        section.push_str(&format!("| {} | {} |\n", week, values.join(" | ")));
    }
    section.push('\n');

    if let (Some(min), Some(max)) = (heatmap.min, heatmap.max) {
        section.push_str(&format!("*Range: {}..{}*\n\n", min, max));
    }

    section
}

fn edit_section(
    platform: &Platform,
    day: usize,
    metrics: &[Metric],
    before: &TableRow,
    after: &TableRow,
    committed: Option<&CommitSummary>,
    saved_to: Option<&PathBuf>,
) -> String {
    let mut section = String::new();
    section.push_str(&format!(
        "## Edit {} Day {} ({})\n\n",
        platform,
        day,
        after.date
    ));

    let mut header = vec!["".to_string()];
    header.extend(metrics.iter().map(|m| m.to_string()));
    header.push("Total".to_string());
    header.push("Average".to_string());
    section.push_str(&header_row(&header));
    section.push_str(&format_labeled_row("Before", before));
    section.push_str(&format_labeled_row("After", after));
    section.push('\n');

    match committed {
        Some(summary) => {
            section.push_str(&format!("✅ Saved {} cell(s).", summary.cells_written));
            if let Some(path) = saved_to {
                section.push_str(&format!(" Store written to `{}`.", path.display()));
            }
            section.push('\n');
        }
        None => section.push_str("Edits staged but not saved (use --save); discarded.\n"),
    }

    section
}

fn format_labeled_row(label: &str, row: &TableRow) -> String {
    let values: Vec<String> = row.values.iter().map(u32::to_string).collect();
    format!(
        "| {} | {} | {} | {:.2} |\n",
        label,
        values.join(" | "),
        row.total,
        row.average
    )
}

fn import_section(
    source: &Path,
    rows: usize,
    report: &MergeReport,
    saved_to: Option<&PathBuf>,
) -> String {
    let mut section = String::new();
    section.push_str("## Import\n\n");
    section.push_str(&format!("- **Source:** `{}`\n", source.display()));
    section.push_str(&format!("- **Rows staged:** {}\n", rows));
    if let Some(policy) = report.policy {
        section.push_str(&format!("- **Policy:** {}\n", policy));
    }
    section.push_str(&format!("- **Cells written:** {}\n", report.cells_written));
    section.push_str(&format!("- **Cells unchanged:** {}\n", report.cells_unchanged));
    section.push_str(&format!("- **Cells skipped:** {}\n", report.cells_skipped));
    if !report.platforms_added.is_empty() {
        let names: Vec<String> = report.platforms_added.iter().map(Platform::to_string).collect();
        section.push_str(&format!("- **Platforms added:** {}\n", names.join(", ")));
    }
    if let Some(path) = saved_to {
        section.push_str(&format!("- **Merged store written to:** `{}`\n", path.display()));
    }
    section
}
