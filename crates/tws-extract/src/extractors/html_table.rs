use scraper::Html;

use super::table::{parse_grid, TABLES};
use super::{ExtractionError, Extractor};
use crate::item::{Cell, DataItem, Table};

/// Every `<table>` as raw text cells
pub struct HtmlTables;

impl Extractor for HtmlTables {
    fn name(&self) -> &'static str {
        "html-tables"
    }

    fn extract(&self, html: &str, base_url: &str) -> Result<Vec<DataItem>, ExtractionError> {
        let document = Html::parse_document(html);
        let mut items = Vec::new();

        for (i, table) in document.select(&TABLES).enumerate() {
            let grid = parse_grid(table);
            let width = grid.width();
            if width == 0 {
                continue;
            }
            let rows = grid
                .body
                .iter()
                .map(|row| (0..width).map(|c| row.get(c).map_or(Cell::Null, |s| Cell::text(s))).collect())
                .collect();

            items.push(DataItem::from(Table {
                label: grid.id.clone().unwrap_or_else(|| format!("table_{i}")),
                schema: grid.schema(),
                rows,
                source_method: "html".into(),
                source_url: base_url.to_string(),
                confidence: 0.98,
                period: None,
            }));
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_with_header() {
        let html = r#"<table id="t1"><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>2</td></tr></table>"#;
        let items = HtmlTables.extract(html, "https://example.test/").unwrap();
        assert_eq!(items.len(), 1);
        let table = items[0].as_table().unwrap();
        assert_eq!(table.label, "t1");
        assert_eq!(table.schema, ["A", "B"]);
        assert_eq!(table.rows, [[Cell::Text("1".into()), Cell::Text("2".into())]]);
        assert_eq!(table.source_method, "html");
    }

    #[test]
    fn ragged_rows_are_padded() {
        let html = "<p>no id</p><table><tr><th>X</th><th>Y</th></tr><tr><td>only</td></tr><tr><td></td><td>z</td></tr></table>";
        let items = HtmlTables.extract(html, "https://example.test/").unwrap();
        let table = items[0].as_table().unwrap();
        assert_eq!(table.label, "table_0");
        assert_eq!(
            table.rows,
            [[Cell::Text("only".into()), Cell::Null], [Cell::Null, Cell::Text("z".into())]]
        );
    }

    #[test]
    fn no_tables_no_items() {
        assert!(HtmlTables.extract("<p>hola</p>", "https://example.test/").unwrap().is_empty());
    }
}
