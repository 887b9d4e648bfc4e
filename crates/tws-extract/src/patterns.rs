use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

fn ci(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .unwrap()
}

lazy_static! {
    pub static ref EMAIL: Regex = ci(r"[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}");
    /// Spanish phone numbers, deliberately permissive
    pub static ref TELEPHONE: Regex = Regex::new(r"(?:(?:\+34|0034)\s*)?(?:\d[\s\-\.]?){9,11}").unwrap();
    static ref DNI: Regex = Regex::new(r"\b\d{8}[A-Z]\b").unwrap();
    static ref NIE: Regex = ci(r"\b[XYZ]\d{7}[A-Z]\b");
    static ref CIF: Regex = ci(r"\b[ABCDEFGHJKLMNPQRSUVW]\d{7}[0-9A-J]\b");
    /// Regional tourism registry numbers
    static ref LICENSE: Regex = ci(concat!(
        r"\b(?:VFT|VTAR|CTC|H|A|CR|CA|AL|AT|VFTAR)/[A-Z]{1,2}/\d{1,6}\b|",
        r"\bHU(?:TB|TG)-\d{4,6}\b|",
        r"\bVT-\d{1,5}-[A-Z]\b|",
        r"\bETV(?:PL)?/\d{1,6}\b|",
        r"\bVV-\d{1,6}\b"
    ));
    static ref ADDRESS: Regex = ci(
        r"\b(C\.|Calle|Carrer|Av\.|Avenida|Ctra\.|Passeig|Plaça|Plaza|Avinguda|Camino|Km|N-?\d+| \d{5} )"
    );
    static ref URL_LIKE: Regex = ci(r"https?://|www\.");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    pub static ref PERIOD: Regex = Regex::new(r"(20\d{2})(?:[-/](\d{1,2}))?").unwrap();
}

pub fn find_telephone(text: &str) -> Option<String> {
    TELEPHONE.find(text).map(|m| m.as_str().trim().to_string())
}

pub fn find_email(text: &str) -> Option<String> {
    EMAIL.find(text).map(|m| m.as_str().to_string())
}

/// Tourism license and tax id (CIF, then NIE, then DNI) found in `text`
pub fn detect_ids(text: &str) -> (Option<String>, Option<String>) {
    let license = LICENSE.find(text).map(|m| m.as_str().to_string());
    let tax_id = [&*CIF, &*NIE, &*DNI]
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| m.as_str().to_string());
    (license, tax_id)
}

pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").trim().to_string()
}

/// A short line that is neither an email, a URL nor a phone number
pub fn looks_like_name(line: &str) -> bool {
    !line.is_empty()
        && line.chars().count() <= 120
        && !EMAIL.is_match(line)
        && !URL_LIKE.is_match(line)
        && !TELEPHONE.is_match(line)
}

pub fn looks_like_address(line: &str) -> bool {
    ADDRESS.is_match(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_contacts() {
        let text = "Reservas: +34 964 45 12 34 o reservas@hotel-mar.es";
        assert_eq!(find_telephone(text).as_deref(), Some("+34 964 45 12 34"));
        assert_eq!(find_email(text).as_deref(), Some("reservas@hotel-mar.es"));
        assert_eq!(find_telephone("Abierto de 9 a 14"), None);
    }

    #[test]
    fn tax_id_prefers_cif() {
        let (license, tax_id) = detect_ids("NIF 12345678Z, CIF B12345678, registro HUTB-012345");
        assert_eq!(license.as_deref(), Some("HUTB-012345"));
        assert_eq!(tax_id.as_deref(), Some("B12345678"));

        let (license, tax_id) = detect_ids("Titular X1234567L");
        assert_eq!(license, None);
        assert_eq!(tax_id.as_deref(), Some("X1234567L"));
    }

    #[test]
    fn license_formats() {
        for lic in ["VT-12345-A", "ETVPL/1234", "VV-35", "AT/CS/1234"] {
            assert_eq!(detect_ids(&format!("Licencia {lic}.")).0.as_deref(), Some(lic));
        }
    }

    #[test]
    fn name_and_address_heuristics() {
        assert!(looks_like_name("Hotel Roca Mar"));
        assert!(!looks_like_name("www.rocamar.es"));
        assert!(!looks_like_name("info@rocamar.es"));
        assert!(!looks_like_name("964 45 12 34"));
        assert!(!looks_like_name(&"x".repeat(121)));
        assert!(looks_like_address("Avda. del Mar / Av. Colón 3"));
        assert!(looks_like_address("Calle Mayor 12"));
        assert!(!looks_like_address("Hotel Roca Mar"));
    }
}
