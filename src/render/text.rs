//! Human-readable report rendering.

use crate::report::{
    count_records, ProjectReport, RepairAction, RepairKind, Report, RunMode, UnfixedRecord,
};
use console::Style;

/// Styles for headings and outcome lines. Plain when `color` is false.
struct Palette {
    heading: Style,
    good: Style,
    warn: Style,
}

impl Palette {
    fn new(color: bool) -> Self {
        Self {
            heading: Style::new().bold().force_styling(color),
            good: Style::new().green().force_styling(color),
            warn: Style::new().yellow().force_styling(color),
        }
    }
}

fn mode_label(mode: RunMode) -> &'static str {
    match mode {
        RunMode::Analyze => "analyze",
        RunMode::DryRun => "dry run",
        RunMode::Fix => "fix",
    }
}

pub fn render_report_text(report: &Report, color: bool) -> String {
    let p = Palette::new(color);
    let mut out = String::new();

    let heading = format!("Message references ({})", mode_label(report.mode));
    out.push_str(&format!("{}\n", p.heading.apply_to(heading)));
    out.push_str(&format!("Valid users: {}\n", report.valid_owners.len()));
    for owner in &report.valid_owners {
        out.push_str(&format!("  {} <{}>\n", owner.id, owner.email));
    }
    out.push_str(&format!("Valid projects: {}\n", report.valid_projects.len()));
    for project in &report.valid_projects {
        out.push_str(&format!("  {} \"{}\" (user {})\n", project.id, project.name, project.owner_id));
    }
    out.push_str(&format!("Messages scanned: {}\n", report.total_messages));

    out.push_str(&format!("Invalid user references: {}\n", report.invalid_owner.len()));
    for m in &report.invalid_owner {
        out.push_str(&format!(
            "  {} \"{}\" user {} {}\n",
            m.id, m.subject, m.owner_id, m.external_message_id
        ));
    }
    out.push_str(&format!("Invalid project references: {}\n", report.invalid_project.len()));
    for m in &report.invalid_project {
        out.push_str(&format!(
            "  {} \"{}\" project {} (user {})\n",
            m.id,
            m.subject,
            m.project_id.as_deref().unwrap_or("-"),
            m.owner_id
        ));
    }

    if report.is_clean() {
        out.push_str(&format!("{}\n", p.good.apply_to("No issues found.")));
        return out;
    }
    if report.mode == RunMode::Analyze {
        out.push_str("Run with --fix to repair (add --dry-run to preview).\n");
        return out;
    }

    write_actions(&mut out, &p, report.mode, &report.actions, "message");
    write_unfixed(&mut out, &p, &report.unfixed, "message");
    write_summary(&mut out, &p, report.mode, report.fixed_messages, &report.actions, "message");
    out
}

pub fn render_project_report_text(report: &ProjectReport, color: bool) -> String {
    let p = Palette::new(color);
    let mut out = String::new();

    let heading = format!("Project owners ({})", mode_label(report.mode));
    out.push_str(&format!("{}\n", p.heading.apply_to(heading)));
    out.push_str(&format!("Valid users: {}\n", report.valid_owners.len()));
    for owner in &report.valid_owners {
        out.push_str(&format!("  {} <{}>\n", owner.id, owner.email));
    }
    out.push_str(&format!("Projects scanned: {}\n", report.total_projects));
    out.push_str(&format!("Invalid user references: {}\n", report.invalid_owner.len()));
    for project in &report.invalid_owner {
        out.push_str(&format!("  {} \"{}\" user {}\n", project.id, project.name, project.owner_id));
    }

    if report.is_clean() {
        out.push_str(&format!("{}\n", p.good.apply_to("No issues found.")));
        return out;
    }
    if report.mode == RunMode::Analyze {
        out.push_str("Run with --fix --target-user=<id> to repair.\n");
        return out;
    }

    write_actions(&mut out, &p, report.mode, &report.actions, "project");
    write_unfixed(&mut out, &p, &report.unfixed, "project");
    write_summary(&mut out, &p, report.mode, report.fixed_projects, &report.actions, "project");
    out
}

fn write_actions(out: &mut String, p: &Palette, mode: RunMode, actions: &[RepairAction], noun: &str) {
    if actions.is_empty() {
        return;
    }
    out.push_str("Repairs:\n");
    for action in actions {
        let verb = match (action.applied, mode) {
            (true, _) => p.good.apply_to("fixed"),
            // A fix run only leaves actions unapplied when a write failed.
            (false, RunMode::Fix) => p.warn.apply_to("not applied"),
            (false, _) => p.warn.apply_to("would fix"),
        };
        out.push_str(&format!("  {} {} {}: {}\n", verb, noun, action.record_id, describe(action)));
    }
}

fn describe(action: &RepairAction) -> String {
    let to = action.to.as_deref().unwrap_or("null");
    match action.kind {
        RepairKind::ReassignOwner => format!("user {} -> {}", action.from, to),
        RepairKind::ReassignProject => format!("project {} -> {}", action.from, to),
        RepairKind::ClearProject => format!("project {} -> null", action.from),
    }
}

fn write_unfixed(out: &mut String, p: &Palette, unfixed: &[UnfixedRecord], noun: &str) {
    if unfixed.is_empty() {
        return;
    }
    let title = "Unfixable (missing target: pass --target-user=<id>):";
    out.push_str(&format!("{}\n", p.warn.apply_to(title)));
    for record in unfixed {
        out.push_str(&format!("  {} {}: user {}\n", noun, record.record_id, record.owner_id));
    }
}

fn write_summary(
    out: &mut String,
    p: &Palette,
    mode: RunMode,
    fixed: usize,
    actions: &[RepairAction],
    noun: &str,
) {
    let pending = actions.iter().filter(|a| !a.applied).count();
    let line = match mode {
        RunMode::DryRun => {
            format!("Would fix {} {noun}(s); no changes written.", count_records(actions))
        }
        _ if pending > 0 => {
            format!("Fixed {fixed} {noun}(s) before a store error; {pending} repair(s) not applied.")
        }
        _ => format!("Fixed {fixed} {noun}(s)."),
    };
    out.push_str(&format!("{}\n", p.heading.apply_to(line)));
}
