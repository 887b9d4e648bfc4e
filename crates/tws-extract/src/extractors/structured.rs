use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Map, Value};

use super::{ExtractionError, Extractor};
use crate::classify::{classify, is_interesting, legacy_type, Signals};
use crate::dom::{element_text, page_text};
use crate::item::{DataItem, Entity};
use crate::patterns::{detect_ids, find_email, find_telephone};
use crate::fields::{as_list, first, first_str, geo, postal_address, rating, scalar};

lazy_static! {
    static ref LD_JSON: Selector = Selector::parse(r#"script[type="application/ld+json"]"#).unwrap();
    static ref TEL_LINKS: Selector = Selector::parse(r#"a[href^="tel:"]"#).unwrap();
    static ref MAILTO_LINKS: Selector = Selector::parse(r#"a[href^="mailto:"]"#).unwrap();
    static ref META: Selector = Selector::parse("meta[content]").unwrap();
    static ref ITEMSCOPE: Selector = Selector::parse("[itemscope][itemtype]").unwrap();
    static ref TRAILING_COMMA: Regex = Regex::new(r",\s*([\]}])").unwrap();
    static ref CONTROL: Regex = Regex::new(r"[\x00-\x1f]").unwrap();
}

const OPENGRAPH_CONFIDENCE: f32 = 0.6;

/// schema.org entities from JSON-LD blocks (`@graph` containers included) and
/// microdata items, contacts completed from the page, OpenGraph as a last
/// resort.
pub struct StructuredEntities;

/// Parses a JSON-LD block, retrying once after stripping what CMSs commonly
/// leave around or inside it: comment and CDATA markers, trailing commas and
/// raw control characters.
pub fn parse_loose(raw: &str) -> Result<Value, ExtractionError> {
    let raw = raw.trim();
    match serde_json::from_str(raw) {
        Ok(value) => Ok(value),
        Err(_) => {
            let cleaned = raw
                .trim_start_matches("<!--")
                .trim_end_matches("-->")
                .trim()
                .trim_start_matches("//<![CDATA[")
                .trim_end_matches("//]]>")
                .trim();
            let cleaned = CONTROL.replace_all(cleaned, " ");
            let cleaned = TRAILING_COMMA.replace_all(&cleaned, "$1");
            Ok(serde_json::from_str(&cleaned)?)
        }
    }
}

/// Declared type of a node, the first interesting one of a type list
fn declared_type(node: &Value) -> Option<String> {
    let types: Vec<String> = as_list(first(node, &["@type", "type"]))
        .into_iter()
        .filter_map(scalar)
        .collect();
    types
        .iter()
        .find(|t| is_interesting(t))
        .or_else(|| types.first())
        .cloned()
}

fn has_interesting_type(node: &Value) -> bool {
    as_list(node.get("@type"))
        .into_iter()
        .filter_map(Value::as_str)
        .any(is_interesting)
}

/// Interesting nodes of a parsed block: top-level objects or lists of them,
/// and the members of `@graph` containers.
fn interesting_nodes(data: &Value) -> Vec<&Value> {
    let mut nodes = Vec::new();
    for node in as_list(Some(data)) {
        if !node.is_object() {
            continue;
        }
        if let Some(Value::Array(graph)) = node.get("@graph") {
            nodes.extend(graph.iter().filter(|g| g.is_object() && has_interesting_type(g)));
        } else if has_interesting_type(node) {
            nodes.push(node);
        }
    }
    nodes
}

/// Value of an `itemprop` element: a nested item, the URL or machine-readable
/// attribute of the tag, or its text.
fn microdata_value(elem: ElementRef<'_>) -> Value {
    if elem.value().attr("itemscope").is_some() {
        return microdata_item(elem);
    }
    let v = elem.value();
    let attr = match v.name() {
        "meta" => v.attr("content"),
        "a" | "area" | "link" => v.attr("href"),
        "img" | "audio" | "video" | "source" | "track" | "iframe" | "embed" => v.attr("src"),
        "object" => v.attr("data"),
        "time" => v.attr("datetime"),
        "data" | "meter" => v.attr("value"),
        _ => None,
    };
    match attr {
        Some(attr) => Value::String(attr.trim().to_string()),
        None => Value::String(element_text(elem)),
    }
}

fn add_property(props: &mut Map<String, Value>, name: &str, value: Value) {
    match props.get_mut(name) {
        None => {
            props.insert(name.to_string(), value);
        }
        Some(Value::Array(values)) => values.push(value),
        Some(existing) => {
            let previous = existing.take();
            *existing = Value::Array(vec![previous, value]);
        }
    }
}

/// Properties below `elem` up to, but not inside, nested items
fn microdata_properties(elem: ElementRef<'_>, props: &mut Map<String, Value>) {
    for child in elem.children().filter_map(ElementRef::wrap) {
        if let Some(names) = child.value().attr("itemprop") {
            let value = microdata_value(child);
            for name in names.split_whitespace() {
                add_property(props, name, value.clone());
            }
        }
        if child.value().attr("itemscope").is_none() {
            microdata_properties(child, props);
        }
    }
}

/// JSON-LD shaped node of a microdata item, `https://schema.org/Hotel`
/// becoming `"@type": ["Hotel"]`
fn microdata_item(elem: ElementRef<'_>) -> Value {
    let mut props = Map::new();
    let types: Vec<Value> = elem
        .value()
        .attr("itemtype")
        .unwrap_or_default()
        .split_whitespace()
        .filter_map(|t| t.trim_end_matches('/').rsplit(['/', '#']).next())
        .filter(|t| !t.is_empty())
        .map(|t| Value::String(t.to_string()))
        .collect();
    if !types.is_empty() {
        props.insert("@type".into(), Value::Array(types));
    }
    microdata_properties(elem, &mut props);
    Value::Object(props)
}

/// Top-level microdata items with an interesting type
fn microdata_nodes(document: &Html) -> Vec<Value> {
    document
        .select(&ITEMSCOPE)
        .filter(|item| item.value().attr("itemprop").is_none())
        .map(microdata_item)
        .filter(has_interesting_type)
        .collect()
}

/// Page-level contact details used when a node lacks its own
#[derive(Debug, Default)]
struct PageContacts {
    telephone: Option<String>,
    email: Option<String>,
}

fn link_target(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| href.split_once(':'))
        .map(|(_, target)| target.split('?').next().unwrap_or(target).trim().to_string())
        .filter(|target| !target.is_empty())
}

fn meta_content(document: &Html, property: &str) -> Option<String> {
    document
        .select(&META)
        .find(|m| m.value().attr("property").or_else(|| m.value().attr("name")) == Some(property))
        .and_then(|m| m.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

impl PageContacts {
    fn collect(document: &Html, text: &str) -> Self {
        let telephone = link_target(document, &TEL_LINKS)
            .or_else(|| find_telephone(text))
            .or_else(|| meta_content(document, "og:phone_number"));
        let email = link_target(document, &MAILTO_LINKS).or_else(|| find_email(text));
        Self { telephone, email }
    }
}

fn normalize_entity(node: &Value, base_url: &str, contacts: &PageContacts, text: &str) -> Entity {
    let schema_type = declared_type(node);
    let entity_type = schema_type.as_deref().map_or("other", legacy_type);

    let name = first_str(node, &["name"]);
    let description = first_str(node, &["description"]);
    let url = first_str(node, &["url"]).unwrap_or_else(|| base_url.to_string());
    let address = postal_address(first(node, &["address"]));
    let (lat, lon) = geo(first(node, &["geo"]));
    let (rating, rating_count) = rating(node);
    let (tourism_license, tax_id) = detect_ids(text);

    let telephone = first_str(node, &["telephone", "phone"]).or_else(|| contacts.telephone.clone());
    let email = first_str(node, &["email"])
        .map(|e| e.trim_start_matches("mailto:").to_string())
        .or_else(|| contacts.email.clone());

    let is_event = entity_type == "event";
    let classification = classify(&Signals {
        declared_type: schema_type.as_deref(),
        url: Some(&url),
        name: name.as_deref(),
        description: description.as_deref(),
        page_text: Some(text),
    });

    let mut entity = Entity {
        entity_type: entity_type.to_string(),
        confidence: if name.is_some() { 0.95 } else { 0.8 },
        legal_name: first_str(node, &["legalName"]),
        same_as: as_list(first(node, &["sameAs"])).into_iter().filter_map(scalar).collect(),
        price_range: first_str(node, &["priceRange"]),
        checkin: first_str(node, &["checkinTime", "checkin"]),
        checkout: first_str(node, &["checkoutTime", "checkout"]),
        event_start: is_event.then(|| first_str(node, &["startDate"])).flatten(),
        event_end: is_event.then(|| first_str(node, &["endDate"])).flatten(),
        address_street: address.street,
        address_locality: address.locality,
        address_region: address.region,
        address_postal_code: address.postal_code,
        address_country: address.country,
        name,
        description,
        url: Some(url),
        telephone,
        email,
        rating,
        rating_count,
        lat,
        lon,
        tourism_license,
        tax_id,
        schema_type,
        source_method: "jsonld/heuristics".into(),
        source_url: base_url.to_string(),
        ..Default::default()
    };
    classification.apply(&mut entity);
    entity
}

fn opengraph_node(document: &Html, base_url: &str) -> Option<Value> {
    let title = meta_content(document, "og:title")?;
    Some(json!({
        "@type": "Organization",
        "name": title,
        "description": meta_content(document, "og:description"),
        "url": meta_content(document, "og:url").unwrap_or_else(|| base_url.to_string()),
    }))
}

impl Extractor for StructuredEntities {
    fn name(&self) -> &'static str {
        "tourism-jsonld"
    }

    fn extract(&self, html: &str, base_url: &str) -> Result<Vec<DataItem>, ExtractionError> {
        let document = Html::parse_document(html);
        let text = page_text(&document);
        let contacts = PageContacts::collect(&document, &text);

        let mut entities = Vec::new();
        for script in document.select(&LD_JSON) {
            let raw: String = script.text().collect();
            let data = match parse_loose(&raw) {
                Ok(data) => data,
                Err(e) => {
                    log::debug!("Ignoring JSON-LD block on {base_url}: {e}");
                    continue;
                }
            };
            for node in interesting_nodes(&data) {
                entities.push(normalize_entity(node, base_url, &contacts, &text));
            }
        }

        for node in microdata_nodes(&document) {
            let mut entity = normalize_entity(&node, base_url, &contacts, &text);
            entity.source_method = "microdata".into();
            entities.push(entity);
        }

        if entities.is_empty() {
            if let Some(node) = opengraph_node(&document, base_url) {
                let mut entity = normalize_entity(&node, base_url, &contacts, &text);
                entity.confidence = OPENGRAPH_CONFIDENCE;
                entity.source_method = "opengraph".into();
                entities.push(entity);
            }
        }

        // same entity described twice on one page
        let mut seen = HashSet::new();
        entities.retain(|e| seen.insert((e.name.clone(), e.entity_type.clone())));

        Ok(entities.into_iter().map(DataItem::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Segment, SegmentSource};

    fn entities(html: &str) -> Vec<Entity> {
        StructuredEntities
            .extract(html, "https://example.test/hotel-x")
            .unwrap()
            .into_iter()
            .filter_map(|item| item.as_entity().cloned())
            .collect()
    }

    #[test]
    fn hotel_json_ld() {
        let html = r#"<html><head><script type="application/ld+json">
            {"@type":"Hotel","name":"Hotel X","telephone":"123"}
        </script></head><body><p>Restaurante y museo junto a la playa</p></body></html>"#;
        let found = entities(html);
        assert_eq!(found.len(), 1);
        let hotel = &found[0];
        assert_eq!(hotel.name.as_deref(), Some("Hotel X"));
        assert_eq!(hotel.telephone.as_deref(), Some("123"));
        assert_eq!(hotel.segment, Some(Segment::Accommodation));
        assert_eq!(hotel.segment_source, SegmentSource::Schema);
        assert_eq!(hotel.entity_type, "hotel");
        assert_eq!(hotel.url.as_deref(), Some("https://example.test/hotel-x"));
        assert_eq!(hotel.confidence, 0.95);
    }

    #[test]
    fn graph_nodes_and_nested_fields() {
        let html = r#"<script type="application/ld+json">{
            "@context": "https://schema.org",
            "@graph": [
              {"@type": "WebSite", "name": "Turismo"},
              {"@type": ["Event", "Thing"], "name": "Festival de Jazz",
               "startDate": "2024-07-12", "endDate": "2024-07-14",
               "location": {"name": "Plaza"},
               "address": {"streetAddress": "Pl. Mayor 1", "addressLocality": "Peñíscola"},
               "geo": {"latitude": "40.35", "longitude": "0.40"},
               "sameAs": ["https://fb.test/jazz", "https://ig.test/jazz"]},
              {"@type": "Restaurant", "name": "El Puerto", "aggregateRating": {"ratingValue": "4,6", "ratingCount": 88}},
            ]
        }</script>
        <a href="tel:+34964000000">Llamar</a> <a href="mailto:info@example.test?subject=hola">Escribir</a>"#;
        let found = entities(html);
        assert_eq!(found.len(), 2);

        let event = &found[0];
        assert_eq!(event.entity_type, "event");
        assert_eq!(event.event_start.as_deref(), Some("2024-07-12"));
        assert_eq!(event.address_locality.as_deref(), Some("Peñíscola"));
        assert_eq!((event.lat, event.lon), (Some(40.35), Some(0.40)));
        assert_eq!(event.same_as.len(), 2);
        assert_eq!(event.telephone.as_deref(), Some("+34964000000"));
        assert_eq!(event.email.as_deref(), Some("info@example.test"));

        let restaurant = &found[1];
        assert_eq!(restaurant.segment, Some(Segment::Business));
        assert_eq!(restaurant.rating, Some(4.6));
        assert_eq!(restaurant.rating_count, Some(88));
        assert_eq!(restaurant.event_start, None);
    }

    #[test]
    fn opengraph_only_without_structured_entities() {
        let html = r#"<head>
            <meta property="og:title" content="Camping Las Dunas">
            <meta property="og:description" content="Parcelas junto al mar">
            <meta property="og:phone_number" content="+34 964 11 22 33">
        </head>"#;
        let found = entities(html);
        assert_eq!(found.len(), 1);
        let org = &found[0];
        assert_eq!(org.name.as_deref(), Some("Camping Las Dunas"));
        assert_eq!(org.entity_type, "organization");
        assert_eq!(org.telephone.as_deref(), Some("+34 964 11 22 33"));
        assert_eq!(org.confidence, 0.6);
        assert_eq!(org.source_method, "opengraph");
    }

    #[test]
    fn microdata_items() {
        let html = r#"<div itemscope itemtype="https://schema.org/Hotel">
              <h2 itemprop="name">Hotel Micro</h2>
              <p itemprop="description">Frente al puerto</p>
              <a itemprop="url" href="https://example.test/hotel-micro">web</a>
              <div itemprop="address" itemscope itemtype="https://schema.org/PostalAddress">
                <span itemprop="streetAddress">C/ Mayor 3</span>
                <span itemprop="addressLocality">Vinaròs</span>
              </div>
              <div itemprop="geo" itemscope itemtype="https://schema.org/GeoCoordinates">
                <meta itemprop="latitude" content="40.47">
                <meta itemprop="longitude" content="0.47">
              </div>
              <span itemprop="telephone">964 45 45 45</span>
              <link itemprop="sameAs" href="https://fb.test/micro">
              <link itemprop="sameAs" href="https://ig.test/micro">
            </div>
            <div itemscope itemtype="https://schema.org/BreadcrumbList">
              <span itemprop="name">Inicio</span>
            </div>"#;
        let found = entities(html);
        assert_eq!(found.len(), 1);
        let hotel = &found[0];
        assert_eq!(hotel.name.as_deref(), Some("Hotel Micro"));
        assert_eq!(hotel.entity_type, "hotel");
        assert_eq!(hotel.segment, Some(Segment::Accommodation));
        assert_eq!(hotel.source_method, "microdata");
        assert_eq!(hotel.url.as_deref(), Some("https://example.test/hotel-micro"));
        assert_eq!(hotel.address_street.as_deref(), Some("C/ Mayor 3"));
        assert_eq!(hotel.address_locality.as_deref(), Some("Vinaròs"));
        assert_eq!((hotel.lat, hotel.lon), (Some(40.47), Some(0.47)));
        assert_eq!(hotel.telephone.as_deref(), Some("964 45 45 45"));
        assert_eq!(hotel.same_as, ["https://fb.test/micro", "https://ig.test/micro"]);
    }

    #[test]
    fn microdata_repeating_json_ld_is_deduplicated() {
        let html = r#"<script type="application/ld+json">{"@type":"Museum","name":"Museu del Mar"}</script>
            <div itemscope itemtype="http://schema.org/Museum"><span itemprop="name">Museu del Mar</span></div>"#;
        let found = entities(html);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].source_method, "jsonld/heuristics");
    }

    #[test]
    fn malformed_blocks_are_skipped() {
        let html = r#"<script type="application/ld+json">{"@type": "Hotel", "name": </script>
            <script type="application/ld+json">{"@type": "Museum", "name": "Museu del Mar",}</script>"#;
        let found = entities(html);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].subtype.as_deref(), Some("museum"));
    }

    #[test]
    fn ids_detected_in_page_text() {
        let html = r#"<script type="application/ld+json">{"@type":"LodgingBusiness","name":"Apartamentos Sol"}</script>
            <footer>Registro VT-12345-CS? no: VT-4567-C · CIF B12345674</footer>"#;
        let e = &entities(html)[0];
        assert_eq!(e.tourism_license.as_deref(), Some("VT-4567-C"));
        assert_eq!(e.tax_id.as_deref(), Some("B12345674"));
    }
}
