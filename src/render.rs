//! Text rendering for review runs.
//!
//! Builders here return pre-formatted lines and never print; the command
//! layer decides where output goes.

use chrono::{DateTime, Utc};

use crate::api::types::{Finding, HistoryEntry, RunStatus, SelfCheck};

/// Monthly cost estimate, always two decimals: `$42.50/mo`.
pub fn format_money(usd_per_month: f64) -> String {
    format!("${usd_per_month:.2}/mo")
}

/// Millisecond durations below one second stay in `ms`; everything else
/// renders as one-decimal seconds.
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{ms} ms")
    } else {
        format!("{:.1} s", ms as f64 / 1000.0)
    }
}

/// Advisory run timestamp as UTC wall clock, empty when the service did
/// not report one.
pub fn format_date(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => String::new(),
    }
}

/// First line of a block of text, trimmed.
pub fn first_line(text: &str) -> &str {
    match text.find('\n') {
        Some(idx) => text[..idx].trim(),
        None => text.trim(),
    }
}

fn verdict_dot(safe_to_merge: Option<bool>) -> &'static str {
    match safe_to_merge {
        Some(true) => "\u{1f7e2}",
        Some(false) => "\u{1f534}",
        None => "\u{1f7e1}",
    }
}

/// One-line verdict: the review's own headline when it has one, otherwise
/// stock copy keyed on the merge verdict.
pub fn badge_line(status: &RunStatus) -> String {
    let headline = first_line(status.llm_comment_markdown.as_deref().unwrap_or(""));
    if headline.is_empty() {
        return match status.safe_to_merge {
            Some(true) => "\u{1f7e2} Auto-check: safe to merge".to_string(),
            Some(false) => "\u{1f534} Auto-check: needs changes".to_string(),
            None => "\u{1f7e1} Auto-check: not run".to_string(),
        };
    }
    format!("{} {}", verdict_dot(status.safe_to_merge), headline)
}

/// Extracts ```` ```diff ```` fenced blocks from the review markdown. Each
/// returned block is re-fenced with its body trimmed. The fence marker must
/// be followed by whitespace, so words like ```` ```diffstat ```` don't
/// open a block; an unterminated fence is dropped.
pub fn extract_diff_blocks(markdown: &str) -> Vec<String> {
    const OPEN: &str = "```diff";
    const CLOSE: &str = "```";

    let mut blocks = Vec::new();
    let mut rest = markdown;
    while let Some(start) = rest.find(OPEN) {
        let after = &rest[start + OPEN.len()..];
        let Some(next) = after.chars().next() else {
            break;
        };
        if !next.is_whitespace() {
            rest = after;
            continue;
        }
        let Some(end) = after.find(CLOSE) else {
            break;
        };
        blocks.push(format!("```diff\n{}\n```", after[..end].trim()));
        rest = &after[end + CLOSE.len()..];
    }
    blocks
}

/// Headline card for a run: verdict badge, summary chips, and the
/// self-check counts when the service reported them.
pub fn status_card(status: &RunStatus) -> Vec<String> {
    let s = &status.summary;
    let mut lines = vec![
        badge_line(status),
        format!(
            "Checkov issues: {}   Policy fails: {}   Est. cost: {}   Duration: {}",
            s.checkov_issues,
            s.policy_fails,
            format_money(s.cost_usd_month),
            format_duration(s.duration_ms),
        ),
    ];
    if let Some(check) = &status.self_check {
        lines.push(self_check_line(check));
    }
    lines
}

fn self_check_line(check: &SelfCheck) -> String {
    format!(
        "Self-check: issues {} -> {}, policy {} -> {}",
        check.issues_before, check.issues_after, check.policy_before, check.policy_after,
    )
}

/// Findings as an aligned table, most severe first. Sorting is stable, so
/// equally severe findings keep the service's order. Messages are cut to
/// their first line.
pub fn findings_table(findings: &[Finding]) -> Vec<String> {
    if findings.is_empty() {
        return vec!["No findings for this run.".to_string()];
    }

    let mut ordered: Vec<&Finding> = findings.iter().collect();
    ordered.sort_by_key(|f| std::cmp::Reverse(f.severity));

    let mut rows = Vec::with_capacity(ordered.len() + 1);
    rows.push(["SEVERITY", "RULE", "LOCATION", "MESSAGE", "TOOL"].map(String::from));
    for finding in ordered {
        rows.push([
            finding.severity.as_str().to_string(),
            finding.rule_id.clone(),
            format!("{}:{}", finding.file, finding.line),
            first_line(&finding.message).to_string(),
            finding.tool.as_str().to_string(),
        ]);
    }
    render_rows(&rows)
}

/// Recent runs as an aligned table, newest first as served.
pub fn history_table(entries: &[HistoryEntry]) -> Vec<String> {
    if entries.is_empty() {
        return vec!["No history yet.".to_string()];
    }

    let mut rows = Vec::with_capacity(entries.len() + 1);
    rows.push(["RUN ID", "ISSUES", "POLICY", "COST", "DURATION", "WHEN"].map(String::from));
    for entry in entries {
        rows.push([
            entry.run_id.clone(),
            entry.issues.to_string(),
            entry.fails.to_string(),
            format_money(entry.cost),
            format_duration(entry.duration_ms),
            format_date(entry.created_at),
        ]);
    }
    render_rows(&rows)
}

/// Full report for a finished run: card, findings, suggested patches.
pub fn run_report(status: &RunStatus) -> Vec<String> {
    let mut lines = status_card(status);

    lines.push(String::new());
    lines.push("Findings".to_string());
    lines.extend(findings_table(&status.findings));

    lines.push(String::new());
    lines.push("Suggested patches".to_string());
    let blocks = extract_diff_blocks(status.llm_comment_markdown.as_deref().unwrap_or(""));
    if blocks.is_empty() {
        lines.push("No suggested patches.".to_string());
    } else {
        for (i, block) in blocks.iter().enumerate() {
            if i > 0 {
                lines.push(String::new());
            }
            lines.extend(block.lines().map(str::to_string));
        }
    }
    lines
}

fn render_rows<const N: usize>(rows: &[[String; N]]) -> Vec<String> {
    let mut widths = [0usize; N];
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    rows.iter()
        .map(|row| {
            row.iter()
                .zip(widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        })
        .collect()
}
