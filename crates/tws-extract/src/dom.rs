use scraper::node::Node;
use scraper::{ElementRef, Html};

use crate::patterns::collapse_whitespace;

fn is_hidden(elem: &ElementRef<'_>) -> bool {
    matches!(elem.value().name(), "script" | "style" | "noscript" | "template")
}

fn visible_texts<'a>(elem: ElementRef<'a>, out: &mut Vec<&'a str>) {
    for child in elem.children() {
        match child.value() {
            Node::Text(text) => out.push(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    if !is_hidden(&child) {
                        visible_texts(child, out);
                    }
                }
            }
            _ => (),
        }
    }
}

/// Rendered text of a whole document, scripts and styles left out
pub fn page_text(document: &Html) -> String {
    element_text(document.root_element())
}

pub fn element_text(elem: ElementRef<'_>) -> String {
    let mut texts = Vec::new();
    visible_texts(elem, &mut texts);
    collapse_whitespace(&texts.join(" "))
}

/// Visible text of an element as cleaned, non-empty lines: one per text node
/// and per embedded line break.
pub fn element_lines(elem: ElementRef<'_>) -> Vec<String> {
    let mut texts = Vec::new();
    visible_texts(elem, &mut texts);
    texts
        .iter()
        .flat_map(|t| t.split('\n'))
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Closest ancestor element whose tag is one of `names`
pub fn closest<'a>(elem: ElementRef<'a>, names: &[&str]) -> Option<ElementRef<'a>> {
    elem.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| names.contains(&a.value().name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_are_not_text() {
        let doc = Html::parse_document(
            "<html><head><title>T</title><script>var x = 1;</script></head>\
             <body><p>Hola\n  <b>mundo</b></p><style>p{}</style></body></html>",
        );
        assert_eq!(page_text(&doc), "T Hola mundo");
    }

    #[test]
    fn lines_follow_text_nodes() {
        let doc = Html::parse_fragment("<div>Hotel Sol<br>Calle Mayor 1\n12500 Vinaròs<br> </div>");
        let div = doc.root_element().child_elements().next().unwrap();
        assert_eq!(element_lines(div), ["Hotel Sol", "Calle Mayor 1", "12500 Vinaròs"]);
    }
}
