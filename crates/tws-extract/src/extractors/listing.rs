use std::collections::HashSet;

use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use tws_crawler::{netloc, normalize};
use url::Url;

use super::{ExtractionError, Extractor};
use crate::classify::{classify, url_hint, Classification, Signals};
use crate::dom::{closest, element_lines, element_text};
use crate::item::{DataItem, Entity};
use crate::patterns::{find_email, find_telephone, looks_like_address, looks_like_name};

pub const DEFAULT_CARD_SELECTOR: &str =
    "article, li.card, div.card, .ficha, .listing-item, .result-item, .establecimiento";

/// Repeated containers only count as a listing from this many matches
const MIN_CARDS: usize = 2;

lazy_static! {
    static ref MAIN: Selector = Selector::parse("main").unwrap();
    static ref EXTERNAL_LINKS: Selector = Selector::parse(r#"a[href^="http"]"#).unwrap();
    static ref LINKS: Selector = Selector::parse("a[href]").unwrap();
    static ref HEADINGS: Selector = Selector::parse("h1, h2, h3, h4, h5, strong, b").unwrap();
}

/// Cards of portal listing pages: each business linked to its own website,
/// or failing that, a repeated card-like container.
pub struct Listings {
    card_selector: String,
}

impl Default for Listings {
    fn default() -> Self {
        Self {
            card_selector: DEFAULT_CARD_SELECTOR.to_string(),
        }
    }
}

/// Fields read off the text lines of one card
#[derive(Debug, Default)]
struct CardFields {
    name: Option<String>,
    telephone: Option<String>,
    email: Option<String>,
    address: Vec<String>,
}

impl CardFields {
    fn read(lines: &[String], heading: Option<String>) -> Self {
        let mut fields = Self {
            name: heading,
            ..Default::default()
        };
        for line in lines {
            if fields.name.is_none() && looks_like_name(line) {
                fields.name = Some(line.clone());
                continue;
            }
            if fields.telephone.is_none() {
                fields.telephone = find_telephone(line);
            }
            if fields.email.is_none() {
                fields.email = find_email(line);
            }
            if looks_like_address(line) {
                fields.address.push(line.clone());
            }
        }
        fields
    }
}

/// `host` is the page host or one of its subdomains
fn same_site(host: &str, page_host: &str) -> bool {
    host == page_host
        || host
            .strip_suffix(page_host)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

impl Listings {
    pub fn with_card_selector(selector: impl Into<String>) -> Self {
        Self {
            card_selector: selector.into(),
        }
    }

    fn entity(&self, fields: CardFields, lines: &[String], card_url: &str, page_url: &str) -> Entity {
        let description = lines.join(" ");
        let mut classification = classify(&Signals {
            url: Some(card_url),
            name: fields.name.as_deref(),
            description: Some(&description),
            ..Default::default()
        });
        if classification.is_fallback() {
            classification = url_hint(page_url).unwrap_or_else(Classification::fallback);
        }

        let found_any = fields.name.is_some() || fields.telephone.is_some() || fields.email.is_some();
        let mut entity = Entity {
            entity_type: classification.subtype.clone().unwrap_or_else(|| "other".into()),
            name: fields.name,
            url: Some(card_url.to_string()),
            telephone: fields.telephone,
            email: fields.email,
            address_street: Some(fields.address.join(" ; ")).filter(|a| !a.is_empty()),
            address_country: Some("ES".into()),
            source_method: "portal-listing".into(),
            source_url: page_url.to_string(),
            confidence: if found_any { 0.85 } else { 0.7 },
            ..Default::default()
        };
        classification.apply(&mut entity);
        entity
    }

    fn external_cards(&self, scope: ElementRef<'_>, page_host: &str, page_url: &str) -> Vec<Entity> {
        let mut seen = HashSet::new();
        let mut entities = Vec::new();

        for a in scope.select(&EXTERNAL_LINKS) {
            let href = a.value().attr("href").unwrap_or_default().trim();
            let host = match Url::parse(href) {
                Ok(url) => netloc(&url),
                Err(_) => continue,
            };
            if host.is_empty() || same_site(&host, page_host) || !seen.insert(href.to_string()) {
                continue;
            }

            let container = closest(a, &["p", "li", "div", "article", "section"])
                .or_else(|| a.parent().and_then(ElementRef::wrap))
                .unwrap_or(a);
            let lines = element_lines(container);
            let fields = CardFields::read(&lines, None);
            entities.push(self.entity(fields, &lines, href, page_url));
        }
        entities
    }

    fn repeated_cards(&self, scope: ElementRef<'_>, page_url: &str) -> Result<Vec<Entity>, ExtractionError> {
        let selector = Selector::parse(&self.card_selector)
            .map_err(|e| ExtractionError::Selector(format!("{}: {e:?}", self.card_selector)))?;
        let cards: Vec<ElementRef<'_>> = scope.select(&selector).collect();
        if cards.len() < MIN_CARDS {
            return Ok(Vec::new());
        }

        let mut entities = Vec::new();
        for card in cards {
            let lines = element_lines(card);
            let heading = card
                .select(&HEADINGS)
                .map(element_text)
                .find(|h| looks_like_name(h));
            let fields = CardFields::read(&lines, heading);
            let has_contact =
                fields.telephone.is_some() || fields.email.is_some() || !fields.address.is_empty();
            if fields.name.is_none() || !has_contact {
                continue;
            }
            let card_url = card
                .select(&LINKS)
                .filter_map(|a| a.value().attr("href"))
                .find_map(|href| normalize(page_url, href))
                .unwrap_or_else(|| page_url.to_string());
            entities.push(self.entity(fields, &lines, &card_url, page_url));
        }
        Ok(entities)
    }
}

impl Extractor for Listings {
    fn name(&self) -> &'static str {
        "tourism-listings"
    }

    fn extract(&self, html: &str, base_url: &str) -> Result<Vec<DataItem>, ExtractionError> {
        let page = Url::parse(base_url).map_err(|e| ExtractionError::Malformed(format!("{base_url}: {e}")))?;
        let page_host = netloc(&page);
        let document = Html::parse_document(html);
        let scope = document.select(&MAIN).next().unwrap_or_else(|| document.root_element());

        let mut entities = self.external_cards(scope, &page_host, base_url);
        if entities.is_empty() {
            entities = self.repeated_cards(scope, base_url)?;
        }
        Ok(entities.into_iter().map(DataItem::from).collect())
    }
}
