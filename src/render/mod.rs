//! Report rendering (plain text, JSON)

pub mod text;

pub use text::{render_project_report_text, render_report_text};

use anyhow::Result;
use serde::Serialize;

/// Pretty JSON with a trailing newline.
pub fn render_json<T: Serialize>(report: &T) -> Result<String> {
    Ok(format!("{}\n", serde_json::to_string_pretty(report)?))
}

#[cfg(test)]
mod tests {
    use super::render_json;
    use crate::report::{Report, RunMode};

    #[test]
    fn json_uses_snake_case_fields() {
        let report = Report {
            mode: RunMode::DryRun,
            total_messages: 0,
            valid_owners: Vec::new(),
            valid_projects: Vec::new(),
            invalid_owner: Vec::new(),
            invalid_project: Vec::new(),
            actions: Vec::new(),
            unfixed: Vec::new(),
            fixed_messages: 0,
        };
        let rendered = render_json(&report).expect("json");
        let parsed: serde_json::Value = serde_json::from_str(&rendered).expect("parse");
        assert_eq!(parsed["mode"], "dry_run");
        assert_eq!(parsed["fixed_messages"], 0);
        assert!(parsed.get("generated_at").is_none());
        assert!(rendered.ends_with("}\n"));
    }
}
