//! Display markup for render actions. Everything here is a pure function of
//! its input.

use serde_json::Value;
use std::fmt::Write;

use crate::actions::ActionStatus;
use crate::area::AreaReport;

/// Table showing exactly what the dispatcher passed to a render action.
pub fn greet_table(action: &str, args: &Value, result: Option<&Value>, status: ActionStatus) -> String {
    let result = match result {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    let mut html = String::new();
    html.push_str(r#"<table class="min-w-full bg-white border border-gray-200">"#);
    let _ = write!(
        html,
        r#"<thead><tr><th class="px-4 py-2 border-b" colspan="2">{} called</th></tr></thead>"#,
        escape(action)
    );
    html.push_str("<tbody>");
    for (label, value) in [
        ("args", args.to_string()),
        ("result", result),
        ("status", status.as_str().to_string()),
    ] {
        let _ = write!(
            html,
            r#"<tr><td class="px-4 py-2 border-b">{}</td><td class="px-4 py-2 border-b">{}</td></tr>"#,
            label,
            escape(&value)
        );
    }
    html.push_str("</tbody></table>");
    html
}

/// The area report as a JSON paragraph.
pub fn area_report(report: &AreaReport) -> String {
    let json = serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string());
    format!("<p>{}</p>", escape(&json))
}

/// One-line summary for terminal output.
pub fn area_summary(report: &AreaReport) -> String {
    let mut line = format!(
        "{} polygon(s), {:.3} km² ({:.1} m²)",
        report.measured_count(),
        report.total_square_kilometers,
        report.total_square_meters
    );
    if !report.skipped.is_empty() {
        let _ = write!(line, ", {} skipped", report.skipped.len());
    }
    line
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
