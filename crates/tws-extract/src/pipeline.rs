use crate::extractors::{DomainTables, Extractor, HtmlTables, Listings, StructuredEntities};
use crate::item::DataItem;
use crate::record::PageRecord;

/// Ordered extraction strategies run over every page.
///
/// A strategy failing only loses its own contribution, the others still run.
pub struct Pipeline {
    extractors: Vec<Box<dyn Extractor>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::with_extractors(vec![
            Box::new(StructuredEntities),
            Box::new(Listings::default()),
            Box::new(DomainTables),
            Box::new(HtmlTables),
        ])
    }
}

impl Pipeline {
    pub fn with_extractors(extractors: Vec<Box<dyn Extractor>>) -> Self {
        Self { extractors }
    }

    /// Items of all strategies in order, and the names of those that succeeded
    pub fn run(&self, html: &str, base_url: &str) -> (Vec<DataItem>, Vec<String>) {
        let mut items = Vec::new();
        let mut chain = Vec::new();
        for extractor in &self.extractors {
            match extractor.extract(html, base_url) {
                Ok(found) => {
                    items.extend(found);
                    chain.push(extractor.name().to_string());
                }
                Err(e) => log::debug!("Extractor {} failed on {base_url}: {e}", extractor.name()),
            }
        }
        (items, chain)
    }

    /// Record of a page, `origin` heads its method chain (`fetch` or `file`)
    pub fn process(&self, origin: &str, url: &str, html: &str) -> PageRecord {
        let (items, mut chain) = self.run(html, url);
        chain.insert(0, origin.to_string());
        PageRecord::new(url, items, chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::ExtractionError;

    struct Broken;

    impl Extractor for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn extract(&self, _html: &str, _base_url: &str) -> Result<Vec<DataItem>, ExtractionError> {
            Err(ExtractionError::Malformed("boom".into()))
        }
    }

    const PAGE: &str = r#"<html><head><script type="application/ld+json">{"@type":"Hotel","name":"Hotel X"}</script></head>
        <body><table id="t1"><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>2</td></tr></table></body></html>"#;

    #[test]
    fn default_chain() {
        let record = Pipeline::default().process("fetch", "https://example.test/", PAGE);
        assert_eq!(
            record.meta.method_chain,
            ["fetch", "tourism-jsonld", "tourism-listings", "ine-html", "html-tables"]
        );
        assert_eq!(record.entities().count(), 1);
        assert_eq!(record.tables().filter(|t| t.source_method == "html").count(), 1);
        assert_eq!(record.meta.count, record.data_items.len());
    }

    #[test]
    fn microdata_only_page() {
        let html = r#"<div itemscope itemtype="https://schema.org/Hotel">
            <span itemprop="name">Hotel Micro</span></div>"#;
        let record = Pipeline::default().process("file", "https://example.test/micro", html);
        let names: Vec<_> = record.entities().filter_map(|e| e.name.as_deref()).collect();
        assert_eq!(names, ["Hotel Micro"]);
    }

    #[test]
    fn failing_extractor_is_isolated() {
        let pipeline = Pipeline::with_extractors(vec![Box::new(Broken), Box::new(HtmlTables)]);
        let (items, chain) = pipeline.run(PAGE, "https://example.test/");
        assert_eq!(chain, ["html-tables"]);
        assert_eq!(items.len(), 1);
    }
}
