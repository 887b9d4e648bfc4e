use lazy_static::lazy_static;
use regex::Regex;
use scraper::Html;

use super::table::{document_title, parse_grid, Grid, TABLES};
use super::{ExtractionError, Extractor};
use crate::item::{Cell, DataItem, Table};
use crate::patterns::PERIOD;

/// Statistical tables in the Spanish locale: `1.234,5` style numbers and
/// headers spanning several rows.
pub struct DomainTables;

lazy_static! {
    static ref PLAIN_NUMBER: Regex = Regex::new(r"^[+-]?\d+(\.\d+)?$").unwrap();
}

/// `1.234,5` -> `1234.5`, `None` for a cell holding only separators
fn normalize_number(raw: &str) -> Option<String> {
    let n = raw.trim().replace('.', "").replace(',', ".");
    Some(n).filter(|n| !n.is_empty())
}

fn numeric_columns(grid: &Grid, width: usize) -> Vec<bool> {
    (0..width)
        .map(|col| {
            let mut values = grid
                .body
                .iter()
                .filter_map(|row| row.get(col))
                .filter_map(|cell| normalize_number(cell))
                .peekable();
            values.peek().is_some() && values.all(|v| PLAIN_NUMBER.is_match(&v))
        })
        .collect()
}

fn period(caption: Option<&str>, title: &str) -> Option<String> {
    let text = format!("{} {title}", caption.unwrap_or_default());
    PERIOD.find(&text).map(|m| m.as_str().to_string())
}

impl Extractor for DomainTables {
    fn name(&self) -> &'static str {
        "ine-html"
    }

    fn extract(&self, html: &str, base_url: &str) -> Result<Vec<DataItem>, ExtractionError> {
        let document = Html::parse_document(html);
        let title = document_title(&document);
        let mut items = Vec::new();

        for (i, table) in document.select(&TABLES).enumerate() {
            let grid = parse_grid(table);
            if grid.header.is_empty() || grid.body.is_empty() {
                continue;
            }
            let width = grid.width();
            let numeric = numeric_columns(&grid, width);
            if !numeric.contains(&true) {
                continue;
            }

            let rows = grid
                .body
                .iter()
                .map(|row| {
                    (0..width)
                        .map(|col| match (row.get(col), numeric[col]) {
                            (None, _) => Cell::Null,
                            (Some(raw), true) => normalize_number(raw)
                                .and_then(|n| n.parse().ok())
                                .map_or(Cell::Null, Cell::Number),
                            (Some(raw), false) => Cell::text(raw),
                        })
                        .collect()
                })
                .collect();

            items.push(DataItem::from(Table {
                label: format!("ine_table_{i}_0"),
                schema: grid.schema(),
                rows,
                source_method: "html-ine".into(),
                source_url: base_url.to_string(),
                confidence: 0.99,
                period: period(grid.caption.as_deref(), &title),
            }));
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>Coyuntura turística hotelera. Marzo 2024</title></head><body>
        <table><tr><td>Sin cabecera</td><td>1</td></tr></table>
        <table>
          <thead>
            <tr><th rowspan="2">Provincia</th><th colspan="2">Pernoctaciones</th></tr>
            <tr><th>Residentes</th><th>No residentes</th></tr>
          </thead>
          <tbody>
            <tr><td>Castellón/Castelló</td><td>1.234.567</td><td>89,5</td></tr>
            <tr><td>Valencia/València</td><td>2.000</td><td>..</td></tr>
          </tbody>
        </table>
        <table><caption>Plazas 2023/07</caption><tr><th>Tipo</th><th>Plazas</th></tr><tr><td>Hotel</td><td>12</td></tr></table>
        <table><tr><th>Nombre</th></tr><tr><td>C. Mayor</td></tr></table>
        </body></html>"#;

    #[test]
    fn normalizes_spanish_numbers() {
        let items = DomainTables.extract(PAGE, "https://www.ine.test/t.htm").unwrap();
        assert_eq!(items.len(), 2);

        let t = items[0].as_table().unwrap();
        assert_eq!(t.label, "ine_table_1_0");
        assert_eq!(t.schema, ["Provincia", "Pernoctaciones / Residentes", "Pernoctaciones / No residentes"]);
        assert_eq!(
            t.rows[0],
            [Cell::Text("Castellón/Castelló".into()), Cell::Number(1234567.0), Cell::Number(89.5)]
        );
        assert_eq!(t.rows[1][2], Cell::Null);
        assert_eq!(t.period.as_deref(), Some("2024"));
        assert_eq!(t.confidence, 0.99);
    }

    #[test]
    fn caption_period_comes_first() {
        let items = DomainTables.extract(PAGE, "https://www.ine.test/t.htm").unwrap();
        let t = items[1].as_table().unwrap();
        assert_eq!(t.label, "ine_table_2_0");
        assert_eq!(t.period.as_deref(), Some("2023/07"));
        assert_eq!(t.rows, [[Cell::Text("Hotel".into()), Cell::Number(12.0)]]);
    }

    #[test]
    fn float_spellings_are_not_numbers() {
        let page = r#"<table>
            <tr><th>Tipo</th><th>Plazas</th><th>Código</th></tr>
            <tr><td>Hotel</td><td>-12</td><td>inf</td></tr>
            <tr><td>Camping</td><td>+3,5</td><td>NaN</td></tr>
            <tr><td>Albergue</td><td>7</td><td>1e5</td></tr>
        </table>"#;
        let items = DomainTables.extract(page, "https://www.ine.test/t.htm").unwrap();
        let t = items[0].as_table().unwrap();
        assert_eq!(t.rows[0], [Cell::Text("Hotel".into()), Cell::Number(-12.0), Cell::Text("inf".into())]);
        assert_eq!(t.rows[1][1], Cell::Number(3.5));
        assert_eq!(t.rows[2][2], Cell::Text("1e5".into()));
    }
}
