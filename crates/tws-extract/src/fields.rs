//! Permissive lookups over loosely shaped JSON-LD nodes.
//!
//! Every logical field is looked up through an ordered list of candidate keys
//! and the first present, non-empty value wins.

use serde_json::Value;

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(_) => true,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

pub fn first<'a>(node: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let obj = node.as_object()?;
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| is_present(v))
}

/// Scalar rendering of a value, numbers included
pub fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn first_str(node: &Value, keys: &[&str]) -> Option<String> {
    first(node, keys).and_then(|v| match v {
        Value::Array(items) => items.iter().find_map(scalar),
        other => scalar(other),
    })
}

pub fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    }
}

/// An object, or the first element of a list when it is one
pub fn first_object(value: Option<&Value>) -> Option<&Value> {
    match value? {
        obj @ Value::Object(_) => Some(obj),
        Value::Array(items) => items.first().filter(|v| v.is_object()),
        _ => None,
    }
}

/// Number from a JSON number or a numeric string, decimal comma accepted
pub fn as_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    };
    n.filter(|f: &f64| f.is_finite())
}

pub fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct PostalAddress {
    pub street: Option<String>,
    pub locality: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// Address from a `PostalAddress` object, a list of them, or a bare string
pub fn postal_address(value: Option<&Value>) -> PostalAddress {
    if let Some(street @ Value::String(_)) = value {
        return PostalAddress {
            street: scalar(street),
            ..Default::default()
        };
    }
    let addr = match first_object(value) {
        Some(addr) => addr,
        None => return PostalAddress::default(),
    };
    let country = match first(addr, &["addressCountry", "country"]) {
        Some(obj @ Value::Object(_)) => first_str(obj, &["name"]),
        Some(other) => scalar(other),
        None => None,
    };
    PostalAddress {
        street: first_str(addr, &["streetAddress"]),
        locality: first_str(addr, &["addressLocality", "locality"]),
        region: first_str(addr, &["addressRegion", "region"]),
        postal_code: first_str(addr, &["postalCode", "zip"]),
        country,
    }
}

/// Latitude and longitude, both or neither
pub fn geo(value: Option<&Value>) -> (Option<f64>, Option<f64>) {
    let geo = match first_object(value) {
        Some(geo) => geo,
        None => return (None, None),
    };
    let lat = first(geo, &["latitude", "lat"]).and_then(as_f64);
    let lon = first(geo, &["longitude", "lng", "lon"]).and_then(as_f64);
    match (lat, lon) {
        (Some(lat), Some(lon)) => (Some(lat), Some(lon)),
        _ => (None, None),
    }
}

/// `aggregateRating` value and count
pub fn rating(node: &Value) -> (Option<f64>, Option<u64>) {
    match first(node, &["aggregateRating"]) {
        Some(agg @ Value::Object(_)) => (
            first(agg, &["ratingValue"]).and_then(as_f64),
            first(agg, &["ratingCount", "reviewCount"]).and_then(as_u64),
        ),
        _ => (None, None),
    }
}
