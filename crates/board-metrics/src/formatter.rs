//! Exposition rendering
//!
//! Turns an aggregated board plus counters into `name{labels} value` lines.
//! The output depends only on its input, so identical boards render to
//! identical bytes.

use board_core::{AuxCounters, Project};
use std::borrow::Cow;
use std::fmt::Display;

/// Everything one refresh cycle renders
#[derive(Debug, Clone)]
pub struct BoardReport {
    pub project: Project,
    pub counters: AuxCounters,
    /// Static developer-count gauge from configuration
    pub developers: Option<u32>,
}

/// Escape `\`, `"` and newlines in a label value
fn escape(value: &str) -> Cow<'_, str> {
    if !value.contains(|c: char| matches!(c, '\\' | '"' | '\n')) {
        return Cow::Borrowed(value);
    }
    let mut escaped = String::with_capacity(value.len() + 4);
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

fn line(name: &str, labels: &[(&str, &str)], value: impl Display) -> String {
    let labels: Vec<String> = labels
        .iter()
        .map(|(key, value)| format!("{}=\"{}\"", key, escape(value)))
        .collect();
    format!("{}{{{}}} {}", name, labels.join(","), value)
}

/// Column, limit, total and WIP lines for a project
pub fn render_project(project: &Project) -> Vec<String> {
    let id = project.id.to_string();
    let mut lines = Vec::with_capacity(project.columns.len() * 2 + 2);

    for column in &project.columns {
        lines.push(line(
            "github_board_issues",
            &[("column", column.name.as_str()), ("project", id.as_str())],
            column.issue_count(),
        ));
        if let Some(limit) = column.limit {
            lines.push(line(
                "github_board_limit_exceeded",
                &[
                    ("column", column.name.as_str()),
                    ("project", id.as_str()),
                    ("exceeded", column.exceeded().to_string().as_str()),
                    ("limit", limit.to_string().as_str()),
                ],
                column.extra_issues(),
            ));
        }
    }

    lines.push(line(
        "github_board_issues_count",
        &[("project", id.as_str())],
        project.total_issues(),
    ));
    lines.push(line(
        "github_board_issues_wip",
        &[("project", id.as_str())],
        project.wip_issues(),
    ));
    lines
}

/// Pull request and issue counter lines, labelled by scope
pub fn render_counters(counters: &AuxCounters) -> Vec<String> {
    let scope = (counters.scope.key(), counters.scope.value());
    let mut lines = vec![
        line("github_board_pr_count", &[scope], counters.open_prs),
        line("github_board_pr_to_review", &[scope], counters.prs_to_review),
        line(
            "github_board_issues",
            &[scope, ("opened", "true")],
            counters.open_issues,
        ),
        line(
            "github_board_issues",
            &[scope, ("opened", "false")],
            counters.closed_issues,
        ),
    ];
    if let Some((label, count)) = &counters.open_bugs {
        lines.push(line("github_board_bugs", &[scope, ("label", label.as_str())], count));
    }
    lines
}

/// Full exposition text, newline separated, without a trailing newline
pub fn render(report: &BoardReport) -> String {
    let mut lines = render_project(&report.project);
    lines.extend(render_counters(&report.counters));
    if let Some(developers) = report.developers {
        lines.push(line(
            "github_board_developers",
            &[("project", report.project.id.to_string().as_str())],
            developers,
        ));
    }
    lines.join("\n")
}
