//! HTML report shell shared by the run summary and the membership audit
//!
//! Reports are assembled as structured rows first and only turned into markup here.

use chrono::{DateTime, Utc};

/// Escape text for inclusion in HTML element content or attribute values
pub fn html_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Report header metadata
#[derive(Debug, Clone)]
pub struct ReportMetadata {
    pub title: String,
    pub tenant_name: String,
    pub generated_at: DateTime<Utc>,
}

/// A table: header cells and already-escaped row cells
#[derive(Debug, Clone, Default)]
pub struct HtmlTable {
    pub heading: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl HtmlTable {
    pub fn new(heading: &str, columns: &[&str]) -> Self {
        Self {
            heading: heading.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Add a row of plain text cells (escaped here)
    pub fn push_text_row(&mut self, cells: &[&str]) {
        self.rows
            .push(cells.iter().map(|c| html_escape(c)).collect());
    }

    fn render(&self) -> String {
        let head: String = self
            .columns
            .iter()
            .map(|c| format!("<th>{}</th>", html_escape(c)))
            .collect();

        let body: String = if self.rows.is_empty() {
            format!(
                r#"<tr><td colspan="{}" class="empty">No entries</td></tr>"#,
                self.columns.len().max(1)
            )
        } else {
            self.rows
                .iter()
                .map(|row| {
                    let cells: String = row.iter().map(|c| format!("<td>{}</td>", c)).collect();
                    format!("<tr>{}</tr>\n", cells)
                })
                .collect()
        };

        format!(
            "<section>\n<h2>{}</h2>\n<table>\n<thead><tr>{}</tr></thead>\n<tbody>\n{}</tbody>\n</table>\n</section>\n",
            html_escape(&self.heading),
            head,
            body
        )
    }
}

/// Render a complete report page
pub fn generate_html_report(
    metadata: &ReportMetadata,
    summary: &[(String, String)],
    tables: &[HtmlTable],
) -> String {
    let summary_items: String = summary
        .iter()
        .map(|(label, value)| {
            format!(
                r#"<div class="stat"><span class="value">{}</span><span class="label">{}</span></div>"#,
                html_escape(value),
                html_escape(label)
            )
        })
        .collect();

    let sections: String = tables.iter().map(HtmlTable::render).collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title} - {tenant}</title>
    <style>
{css}
    </style>
</head>
<body>
<div class="container">
<div class="header">
<h1>{title}</h1>
<div class="metadata">Tenant: {tenant} &middot; Generated {generated}</div>
</div>
<div class="summary">{summary}</div>
{sections}<div class="footer">Generated by reviewctl</div>
</div>
</body>
</html>"#,
        title = html_escape(&metadata.title),
        tenant = html_escape(&metadata.tenant_name),
        generated = metadata.generated_at.format("%Y-%m-%d %H:%M UTC"),
        css = CSS,
        summary = summary_items,
        sections = sections,
    )
}

const CSS: &str = r#"
        body { font-family: 'Segoe UI', system-ui, sans-serif; color: #1e293b; background: #f8fafc; margin: 0; }
        .container { max-width: 1200px; margin: 0 auto; padding: 2rem; background: white; }
        .header { border-bottom: 3px solid #1e40af; margin-bottom: 1.5rem; }
        .header h1 { color: #1e40af; font-weight: 600; }
        .metadata { color: #64748b; padding-bottom: 1rem; }
        .summary { display: flex; gap: 1rem; flex-wrap: wrap; margin-bottom: 2rem; }
        .stat { border: 1px solid #e2e8f0; border-radius: 8px; padding: 1rem 1.5rem; }
        .stat .value { display: block; font-size: 1.6rem; font-weight: 600; }
        .stat .label { color: #64748b; font-size: 0.85rem; }
        table { width: 100%; border-collapse: collapse; margin-bottom: 2rem; }
        th { background: #1e40af; color: white; text-align: left; padding: 0.5rem; }
        td { border-bottom: 1px solid #e2e8f0; padding: 0.5rem; }
        td.empty { color: #64748b; text-align: center; }
        .footer { color: #64748b; font-size: 0.8rem; text-align: center; }
"#;
