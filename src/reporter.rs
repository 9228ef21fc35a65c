use colored::Colorize;
use prettytable::format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR;
use prettytable::{Cell, Row, Table};

use crate::table::ResultTable;

/// Print every result table to stdout, each under a `=== TITLE ===` header.
pub fn print_tables(tables: &[ResultTable]) {
    for table in tables {
        println!("\n{}", section_header(table).bold().cyan());
        render_table(table).printstd();
    }
    println!();
}

fn section_header(table: &ResultTable) -> String {
    format!("=== {} ===", table.key.to_uppercase())
}

/// Build the console table for one query result.
pub fn render_table(table: &ResultTable) -> Table {
    let mut out = Table::new();
    out.set_format(*FORMAT_NO_BORDER_LINE_SEPARATOR);
    out.set_titles(Row::new(
        table.headers.iter().map(|h| Cell::new(h).style_spec("b")).collect(),
    ));
    for row in &table.rows {
        out.add_row(Row::new(row.iter().map(|c| Cell::new(c)).collect()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultTable {
        ResultTable {
            key: "visits_by_insurance",
            title: "Q4 · Visits by insurance type",
            description: "",
            sql: "SELECT 1".to_string(),
            headers: vec!["Insurance".to_string(), "Total visits".to_string()],
            rows: vec![
                vec!["IMSS".to_string(), "3".to_string()],
                vec!["Private".to_string(), "1".to_string()],
            ],
        }
    }

    #[test]
    fn test_section_header_uses_key() {
        assert_eq!(section_header(&sample()), "=== VISITS_BY_INSURANCE ===");
    }

    #[test]
    fn test_render_table_contains_headers_and_cells() {
        let rendered = render_table(&sample());
        assert_eq!(rendered.len(), 2);
        let text = rendered.to_string();
        assert!(text.contains("Insurance"));
        assert!(text.contains("Total visits"));
        assert!(text.contains("Private"));
    }

    #[test]
    fn test_render_empty_table() {
        let mut table = sample();
        table.rows.clear();
        let rendered = render_table(&table);
        assert_eq!(rendered.len(), 0);
        assert!(rendered.to_string().contains("Insurance"));
    }
}
