//! Byte to text decoding of fetched pages.
//!
//! The chain is: charset declared in `Content-Type`, then byte level
//! detection, then a mojibake repair pass. Identical input always yields
//! identical output.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

const MOJIBAKE_MARKERS: [&str; 4] = ["Ã", "â€", "√", "\u{FFFD}"];

pub fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    let text = match content_type.and_then(declared_charset) {
        Some(encoding) => encoding.decode(body).0.into_owned(),
        None => {
            let mut detector = EncodingDetector::new();
            detector.feed(body, true);
            let encoding = detector.guess(None, true);
            encoding.decode(body).0.into_owned()
        }
    };

    if has_mojibake(&text) {
        repair_mojibake(&text).unwrap_or(text)
    } else {
        text
    }
}

fn declared_charset(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("charset"))
        .and_then(|(_, v)| Encoding::for_label(v.trim().trim_matches('"').as_bytes()))
}

fn has_mojibake(text: &str) -> bool {
    MOJIBAKE_MARKERS.iter().any(|m| text.contains(m))
}

fn marker_count(text: &str) -> usize {
    MOJIBAKE_MARKERS
        .iter()
        .map(|m| text.matches(m).count())
        .sum()
}

/// Undo UTF-8 that was decoded as windows-1252, keeps the result only when it
/// strictly reduces the marker count.
pub fn repair_mojibake(text: &str) -> Option<String> {
    let (bytes, _, unmappable) = WINDOWS_1252.encode(text);
    if unmappable {
        return None;
    }
    let repaired = UTF_8.decode_without_bom_handling_and_without_replacement(&bytes)?;
    if marker_count(&repaired) < marker_count(text) {
        Some(repaired.into_owned())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_charset_wins() {
        let body = b"caf\xe9";
        let text = decode_body(body, Some("text/html; charset=ISO-8859-1"));
        assert_eq!(text, "café");
    }

    #[test]
    fn utf8_without_declaration() {
        let body = "Alojamiento en Peñíscola".as_bytes();
        assert_eq!(decode_body(body, Some("text/html")), "Alojamiento en Peñíscola");
    }

    #[test]
    fn repairs_double_encoded_text() {
        assert_eq!(repair_mojibake("CafÃ© del Mar").as_deref(), Some("Café del Mar"));
        assert_eq!(repair_mojibake("plain text"), None);
    }

    #[test]
    fn decoding_is_deterministic() {
        let body = b"<p>Hotel Pla\xe7a</p>";
        assert_eq!(decode_body(body, None), decode_body(body, None));
    }
}
