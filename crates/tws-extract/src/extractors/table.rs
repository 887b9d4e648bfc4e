use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};

use crate::dom::element_text;

/// Spans larger than this are treated as this
const MAX_SPAN: usize = 64;

lazy_static! {
    pub(super) static ref TABLES: Selector = Selector::parse("table").unwrap();
    static ref ROWS: Selector = Selector::parse("tr").unwrap();
    static ref CAPTION: Selector = Selector::parse("caption").unwrap();
    static ref TITLE: Selector = Selector::parse("title").unwrap();
}

/// A `<table>` laid out on a grid, spanned cells repeated in every slot
/// they cover.
#[derive(Debug, Default)]
pub(super) struct Grid {
    pub id: Option<String>,
    pub caption: Option<String>,
    pub header: Vec<Vec<String>>,
    pub body: Vec<Vec<String>>,
}

impl Grid {
    pub fn width(&self) -> usize {
        self.header
            .iter()
            .chain(self.body.iter())
            .map(Vec::len)
            .max()
            .unwrap_or(0)
    }

    /// Column names with multi-row headers joined by `" / "`, consecutive
    /// repeats (from a colspan) and blanks dropped, the column index when
    /// no header names it.
    pub fn schema(&self) -> Vec<String> {
        (0..self.width())
            .map(|col| {
                let mut parts: Vec<&str> = Vec::new();
                for row in &self.header {
                    match row.get(col).map(|s| s.as_str()) {
                        Some(part) if !part.is_empty() && parts.last() != Some(&part) => parts.push(part),
                        _ => (),
                    }
                }
                if parts.is_empty() {
                    col.to_string()
                } else {
                    parts.join(" / ")
                }
            })
            .collect()
    }
}

fn span(cell: &ElementRef<'_>, attr: &str) -> usize {
    cell.value()
        .attr(attr)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_SPAN)
}

/// Rows of `table` itself, not those of tables nested in it
fn own_rows<'a>(table: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    let table_id = table.id();
    table.select(&ROWS).filter(move |tr| {
        tr.ancestors()
            .filter_map(ElementRef::wrap)
            .find(|a| a.value().name() == "table")
            .map(|a| a.id())
            == Some(table_id)
    })
}

fn in_thead(tr: &ElementRef<'_>) -> bool {
    tr.parent()
        .and_then(ElementRef::wrap)
        .map_or(false, |p| p.value().name() == "thead")
}

pub(super) fn parse_grid(table: ElementRef<'_>) -> Grid {
    // column -> (rows still covered, text)
    let mut pending: Vec<Option<(usize, String)>> = Vec::new();
    let mut rows: Vec<(bool, Vec<String>)> = Vec::new();

    for tr in own_rows(table) {
        let cells: Vec<ElementRef<'_>> = tr
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| matches!(c.value().name(), "td" | "th"))
            .collect();
        let is_header = in_thead(&tr) || (!cells.is_empty() && cells.iter().all(|c| c.value().name() == "th"));

        let mut row: Vec<String> = Vec::new();
        let mut cells = cells.into_iter().peekable();
        let mut col = 0;
        while cells.peek().is_some() || pending.iter().skip(col).any(Option::is_some) {
            if let Some((left, text)) = pending.get_mut(col).and_then(Option::as_mut) {
                row.push(text.clone());
                *left -= 1;
                let exhausted = *left == 0;
                if exhausted {
                    pending[col] = None;
                }
                col += 1;
                continue;
            }
            let cell = match cells.next() {
                Some(cell) => cell,
                None => {
                    row.push(String::new());
                    col += 1;
                    continue;
                }
            };
            let text = element_text(cell);
            let rowspan = span(&cell, "rowspan");
            for _ in 0..span(&cell, "colspan") {
                if rowspan > 1 {
                    if pending.len() <= col {
                        pending.resize(col + 1, None);
                    }
                    pending[col] = Some((rowspan - 1, text.clone()));
                }
                row.push(text.clone());
                col += 1;
            }
        }
        rows.push((is_header, row));
    }

    // header rows only count while they lead the table
    let leading = rows.iter().take_while(|(is_header, _)| *is_header).count();
    let mut grid = Grid {
        id: table.value().attr("id").map(String::from),
        caption: table.select(&CAPTION).next().map(element_text).filter(|c| !c.is_empty()),
        ..Default::default()
    };
    for (i, (_, row)) in rows.into_iter().enumerate() {
        if i < leading {
            grid.header.push(row);
        } else if row.iter().any(|c| !c.is_empty()) {
            grid.body.push(row);
        }
    }
    grid
}

pub(super) fn document_title(document: &Html) -> String {
    document.select(&TITLE).next().map(element_text).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(html: &str) -> Grid {
        let doc = Html::parse_document(html);
        let table = doc.select(&TABLES).next().unwrap();
        parse_grid(table)
    }

    #[test]
    fn simple_header() {
        let g = grid(r#"<table id="t1"><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>2</td></tr></table>"#);
        assert_eq!(g.id.as_deref(), Some("t1"));
        assert_eq!(g.schema(), ["A", "B"]);
        assert_eq!(g.body, [["1", "2"]]);
    }

    #[test]
    fn spans_fill_the_grid() {
        let g = grid(
            r#"<table><caption>Viajeros 2023</caption>
               <thead>
                 <tr><th rowspan="2">Provincia</th><th colspan="2">Viajeros</th></tr>
                 <tr><th>Residentes</th><th>Extranjeros</th></tr>
               </thead>
               <tbody>
                 <tr><td>Castellón</td><td>1.234</td><td>567</td></tr>
                 <tr><td>Valencia</td><td>8.901,5</td><td>..</td></tr>
               </tbody></table>"#,
        );
        assert_eq!(g.caption.as_deref(), Some("Viajeros 2023"));
        assert_eq!(g.schema(), ["Provincia", "Viajeros / Residentes", "Viajeros / Extranjeros"]);
        assert_eq!(g.body.len(), 2);
        assert_eq!(g.body[1], ["Valencia", "8.901,5", ".."]);
    }

    #[test]
    fn headerless_and_ragged() {
        let g = grid("<table><tr><td>a</td></tr><tr><td>b</td><td>c</td></tr></table>");
        assert!(g.header.is_empty());
        assert_eq!(g.schema(), ["0", "1"]);
        assert_eq!(g.body, vec![vec!["a".to_string()], vec!["b".to_string(), "c".to_string()]]);
    }

    #[test]
    fn nested_tables_keep_their_rows() {
        let g = grid("<table><tr><td>out<table><tr><td>in</td></tr></table></td></tr></table>");
        assert_eq!(g.body.len(), 1);
    }
}
