//! Static HTML report embedding the chart, the SQL and every result table.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context;

use crate::store::SCHEMA_DIAGRAM;
use crate::table::ResultTable;

pub const IMAGE_FILE_NAME: &str = "dental_analysis.png";
pub const HTML_FILE_NAME: &str = "dental_analysis.html";

const STYLE: &str = "
  body { font-family: 'DejaVu Sans', 'Segoe UI', sans-serif; max-width: 1100px; margin: auto;
         padding: 30px; background: #F8F9FA; color: #1A1A2E; }
  h1   { color: #2E86AB; border-bottom: 3px solid #2E86AB; padding-bottom: 8px; }
  h2   { color: #A23B72; margin-top: 40px; }
  h3   { color: #444; }
  pre  { background: #1A1A2E; color: #A8E6CF; padding: 16px; border-radius: 8px;
         overflow-x: auto; font-size: 13px; line-height: 1.5; }
  .table { border-collapse: collapse; width: 100%; margin: 12px 0; }
  .table th { background: #2E86AB; color: #fff; padding: 8px 12px; text-align: left; }
  .table td { padding: 7px 12px; border-bottom: 1px solid #ddd; }
  .table tr:nth-child(even) { background: #eaf4fb; }
  .insight { background: #fff3cd; border-left: 4px solid #F18F01;
             padding: 12px 16px; margin: 10px 0; border-radius: 4px; }
  img { width: 100%; border-radius: 10px; margin-top: 20px; box-shadow: 0 4px 12px rgba(0,0,0,.15); }
  footer { text-align: center; margin-top: 40px; color: #888; font-size: 12px; }
";

/// Fixed narrative blocks: (headline, body). Authored text, not computed.
const FINDINGS: [(&str, &str); 5] = [
    (
        "Caries dominates",
        "It is the most frequent diagnosis, followed by gingivitis and periodontitis, \
         mirroring the epidemiological pattern seen in Mexican clinics.",
    ),
    (
        "Implants and braces drive revenue",
        "Although they are less frequent procedures, they account for more than half \
         of the clinic's total revenue.",
    ),
    (
        "Smoking plus diabetes raises periodontal risk",
        "Patients with both risk factors show deeper probing depths (≥ 4 mm) and more \
         bleeding on probing, key indicators of active periodontitis.",
    ),
    (
        "Age aggravates periodontal disease",
        "The ≥ 65 group records the deepest probing depths, consistent with periodontal \
         damage accumulating over a lifetime.",
    ),
    (
        "Uninsured patients visit less often",
        "Visits per patient are lower for patients without coverage, suggesting an access \
         barrier that can delay diagnosis.",
    ),
];

const RECOMMENDATIONS: [(&str, &str, &str); 4] = [
    (
        "Establish differentiated ",
        "periodontal risk protocols",
        " for smokers and diabetic patients from their first visit.",
    ),
    (
        "Run ",
        "primary prevention programmes (prophylaxis and sealants)",
        " for patients under 18 to reduce caries incidence.",
    ),
    (
        "Design ",
        "accessible financing",
        " for uninsured patients, prioritising conservative treatment.",
    ),
    (
        "Monitor ",
        "annual probing depth",
        " in patients over 50 as a sentinel indicator of advanced periodontal disease.",
    ),
];

const FOOTER: &str = "Generated from anonymous synthetic data · SQLite · Rust · plotters<br>\n  \
    Academic model project. Contains no real patient data and is not clinical advice.";

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn html_table(table: &ResultTable) -> String {
    let mut html = String::from("<table class=\"table\">\n  <thead><tr>");
    for header in &table.headers {
        let _ = write!(html, "<th>{}</th>", escape_html(header));
    }
    html.push_str("</tr></thead>\n  <tbody>\n");
    for row in &table.rows {
        html.push_str("    <tr>");
        for cell in row {
            let _ = write!(html, "<td>{}</td>", escape_html(cell));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("  </tbody>\n</table>\n");
    html
}

/// Build the full HTML document
///
/// The chart is referenced by `image_file_name`, relative to the HTML file.
pub fn build(tables: &[ResultTable], image_file_name: &str, patients: usize) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <title>Dental Clinical Analysis with SQL</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\n\
         <h1>🦷 Dental Clinical Analysis with SQL</h1>\n\
         <p><em>Anonymous synthetic dataset · {patients} patients · SQLite + Rust</em></p>\n\n\
         <img src=\"{}\" alt=\"Dashboard\">\n\n\
         <h2>1. Database schema</h2>\n<pre>\n{}\n</pre>\n\n\
         <h2>2. SQL queries</h2>\n",
        escape_html(image_file_name),
        escape_html(SCHEMA_DIAGRAM),
    );

    for table in tables {
        let _ = write!(
            html,
            "\n<h3>{}</h3>\n<p>{}</p>\n<pre>\n{};\n</pre>\n{}",
            escape_html(table.title),
            escape_html(table.description),
            escape_html(&table.sql),
            html_table(table),
        );
    }

    html.push_str("\n<h2>3. Key clinical findings</h2>\n");
    for (headline, body) in FINDINGS {
        let _ = write!(
            html,
            "\n<div class=\"insight\">\n  <strong>{headline}</strong>: {body}\n</div>\n"
        );
    }

    html.push_str("\n<h2>4. Recommendations</h2>\n<ol>\n");
    for (before, emphasis, after) in RECOMMENDATIONS {
        let _ = writeln!(html, "  <li>{before}<strong>{emphasis}</strong>{after}</li>");
    }
    html.push_str("</ol>\n");

    let _ = write!(html, "\n<footer>\n  {FOOTER}\n</footer>\n</body>\n</html>\n");
    html
}

/// Write the report, failing if the parent directory does not exist.
pub async fn write(path: &Path, html: &str) -> anyhow::Result<()> {
    tokio::fs::write(path, html)
        .await
        .with_context(|| format!("failed to write report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tables() -> Vec<ResultTable> {
        vec![ResultTable {
            key: "age_brackets",
            title: "Q5 · Periodontal indicators by age bracket",
            description: "Patients per age bracket.",
            sql: "SELECT CASE WHEN p.age < 18 THEN '< 18' END".to_string(),
            headers: vec!["Age bracket".to_string(), "Patients".to_string()],
            rows: vec![vec!["< 18".to_string(), "12".to_string()]],
        }]
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b & c > \"d\""), "a &lt; b &amp; c &gt; &quot;d&quot;");
        assert_eq!(escape_html("≥ 65"), "≥ 65");
    }

    #[test]
    fn test_build_embeds_image_schema_and_tables() {
        let html = build(&sample_tables(), IMAGE_FILE_NAME, 200);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<img src=\"dental_analysis.png\""));
        assert!(html.contains("perio_exams(id, patient_id"));
        assert!(html.contains("<h3>Q5 · Periodontal indicators by age bracket</h3>"));
        assert!(html.contains("WHEN p.age &lt; 18"));
        assert!(html.contains("<td>&lt; 18</td><td>12</td>"));
        assert!(html.contains("200 patients"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_narrative_is_fixed() {
        let html = build(&sample_tables(), IMAGE_FILE_NAME, 200);
        let empty = build(&[], IMAGE_FILE_NAME, 200);
        assert_eq!(html.matches("class=\"insight\"").count(), 5);
        assert_eq!(html.matches("<li>").count(), 4);
        assert_eq!(empty.matches("class=\"insight\"").count(), 5);
        assert!(empty.contains("synthetic data"));
        assert!(!empty.contains("<table"));
    }

    #[tokio::test]
    async fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(HTML_FILE_NAME);
        write(&path, "<html></html>").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<html></html>");

        let missing = dir.path().join("missing").join(HTML_FILE_NAME);
        let err = write(&missing, "<html></html>").await.unwrap_err();
        assert!(err.to_string().contains("failed to write report"));
    }
}
