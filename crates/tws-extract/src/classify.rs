use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

use crate::item::{Entity, Segment, SegmentSource};

pub const FALLBACK_SCORE: u8 = 40;

/// schema.org type, legacy entity type, segment, subtype, score
type SchemaRow = (&'static str, &'static str, Segment, &'static str, u8);

const SCHEMA_TYPES: &[SchemaRow] = &[
    ("Hotel", "hotel", Segment::Accommodation, "hotel", 80),
    ("Hostel", "hotel", Segment::Accommodation, "hostel", 80),
    ("Motel", "hotel", Segment::Accommodation, "hotel", 78),
    ("Resort", "hotel", Segment::Accommodation, "resort", 78),
    ("BedAndBreakfast", "hotel", Segment::Accommodation, "bed_and_breakfast", 80),
    ("Campground", "hotel", Segment::Accommodation, "camping", 80),
    ("VacationRental", "hotel", Segment::Accommodation, "apartment", 78),
    ("LodgingBusiness", "hotel", Segment::Accommodation, "lodging", 75),
    ("TouristAttraction", "attraction", Segment::Experience, "attraction", 78),
    ("Museum", "attraction", Segment::Experience, "museum", 80),
    ("Beach", "attraction", Segment::Experience, "beach", 80),
    ("LandmarksOrHistoricalBuildings", "attraction", Segment::Experience, "monument", 78),
    ("TouristDestination", "destination", Segment::Experience, "destination", 72),
    ("Event", "event", Segment::Experience, "event", 78),
    ("Festival", "event", Segment::Experience, "event", 78),
    ("Restaurant", "restaurant", Segment::Business, "restaurant", 80),
    ("BarOrPub", "restaurant", Segment::Business, "bar", 78),
    ("CafeOrCoffeeShop", "restaurant", Segment::Business, "cafe", 78),
    ("FoodEstablishment", "restaurant", Segment::Business, "food", 75),
    ("TravelAgency", "travel_agency", Segment::Business, "travel_agency", 78),
    ("LocalBusiness", "local_business", Segment::Business, "local_business", 72),
    ("Organization", "organization", Segment::Business, "organization", 70),
];

/// segment, subtype (`None` for segment-wide terms), pattern
type KeywordRow = (Segment, Option<&'static str>, &'static str);

const KEYWORDS: &[KeywordRow] = &[
    (Segment::Accommodation, Some("hotel"), r"\bhotel|\bhostal|parador"),
    (Segment::Accommodation, Some("apartment"), r"apartament|apartment|vivienda(s)? (de uso )?tur[ií]stic|\bvut\b"),
    (Segment::Accommodation, Some("camping"), r"c[aá]mping|glamping|caravan"),
    (Segment::Accommodation, Some("rural"), r"casa rural|turismo rural|alojamiento rural|mas[ií]a"),
    (Segment::Accommodation, Some("hostel"), r"albergue|alberg\b|hostel"),
    (Segment::Accommodation, None, r"alojamiento|allotjament|accommodation|lodging|d[oó]nde dormir"),
    (Segment::Experience, Some("museum"), r"museo|museu|museum"),
    (Segment::Experience, Some("beach"), r"\bplaya|\bplatja|\bbeach|\bcala\b"),
    (Segment::Experience, Some("route"), r"\bruta|sender|itinerari|hiking|\bv[ií]a verde"),
    (Segment::Experience, Some("monument"), r"monumento|castillo|castell|ermita|catedral|iglesia"),
    (Segment::Experience, Some("event"), r"festival|fiesta|concierto|evento|\bfira\b|\bferia\b"),
    (Segment::Experience, Some("activity"), r"excursi|kayak|buceo|submarinismo|visita guiada|\bsurf"),
    (Segment::Experience, None, r"experiencia|experience|actividad|qu[eé][ -]ver|\bocio\b|turismo activo"),
    (Segment::Business, Some("restaurant"), r"restaurante|restaurant|gastronom|arrocer|marisquer"),
    (Segment::Business, Some("bar"), r"\bbar\b|cafeter[ií]a|\bpub\b|cervecer"),
    (Segment::Business, Some("shop"), r"\btienda|\bbotiga|\bshop\b|\bmercado"),
    (Segment::Business, Some("travel_agency"), r"agencia de viajes|travel agency|touroperador"),
    (Segment::Business, None, r"\bempresa|\bnegocio|\bcomercio|business"),
];

/// Coarse URL path hints
const URL_HINTS: &[(Segment, &[&str])] = &[
    (Segment::Accommodation, &["/alojamiento", "/allotjament", "/accommodation", "/hoteles", "/hotels", "/dormir"]),
    (Segment::Experience, &["/que-ver", "/que-hacer", "/experiencia", "/actividades", "/agenda", "/ocio", "/visitar"]),
    (Segment::Business, &["/empresas", "/comercio", "/directorio", "/servicios", "/gastronomia", "/restaurantes"]),
];

lazy_static! {
    static ref KEYWORD_RES: Vec<(Segment, Option<&'static str>, Regex)> = KEYWORDS
        .iter()
        .map(|(segment, subtype, pattern)| {
            let re = RegexBuilder::new(pattern).case_insensitive(true).build().unwrap();
            (*segment, *subtype, re)
        })
        .collect();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub segment: Option<Segment>,
    pub subtype: Option<String>,
    pub source: SegmentSource,
    pub score: u8,
}

impl Classification {
    pub fn fallback() -> Self {
        Self {
            segment: None,
            subtype: None,
            source: SegmentSource::Fallback,
            score: FALLBACK_SCORE,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == SegmentSource::Fallback
    }

    pub fn apply(self, entity: &mut Entity) {
        entity.segment = self.segment;
        entity.subtype = self.subtype;
        entity.segment_source = self.source;
        entity.segment_score = self.score;
    }
}

/// Signals available about one entity
#[derive(Debug, Clone, Copy, Default)]
pub struct Signals<'a> {
    pub declared_type: Option<&'a str>,
    pub url: Option<&'a str>,
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub page_text: Option<&'a str>,
}

fn schema_row(declared_type: &str) -> Option<&'static SchemaRow> {
    let declared = declared_type.trim().trim_start_matches("schema:");
    let declared = declared.rsplit('/').next().unwrap_or(declared);
    SCHEMA_TYPES.iter().find(|row| row.0 == declared)
}

/// Whether the schema.org type is one entities are extracted for
pub fn is_interesting(declared_type: &str) -> bool {
    schema_row(declared_type).is_some()
}

/// Legacy entity type of a schema.org type, `other` when unknown
pub fn legacy_type(declared_type: &str) -> &'static str {
    schema_row(declared_type).map(|row| row.1).unwrap_or("other")
}

fn by_schema(declared_type: &str) -> Option<Classification> {
    schema_row(declared_type).map(|&(_, _, segment, subtype, score)| Classification {
        segment: Some(segment),
        subtype: Some(subtype.to_string()),
        source: SegmentSource::Schema,
        score,
    })
}

/// Best keyword match: subtype terms beat segment-wide ones, and a match in
/// the URL or name beats one in the description or page text.
fn by_keywords(signals: &Signals<'_>) -> Option<Classification> {
    let strong: Vec<&str> = [signals.url, signals.name].into_iter().flatten().collect();
    let weak: Vec<&str> = [signals.description, signals.page_text].into_iter().flatten().collect();

    let mut best: Option<Classification> = None;
    for (segment, subtype, re) in KEYWORD_RES.iter() {
        let score = if strong.iter().any(|s| re.is_match(s)) {
            62
        } else if weak.iter().any(|s| re.is_match(s)) {
            60
        } else {
            continue;
        };
        let score = score + if subtype.is_some() { 3 } else { 0 };
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(Classification {
                segment: Some(*segment),
                subtype: subtype.map(String::from),
                source: SegmentSource::Keywords,
                score,
            });
        }
    }
    best
}

/// Segment suggested by the path of `url` alone
pub fn url_hint(url: &str) -> Option<Classification> {
    let lowered = url.to_lowercase();
    let path = url::Url::parse(&lowered)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| lowered.clone());

    URL_HINTS.iter().find_map(|(segment, hints)| {
        let score = if hints.iter().any(|h| path.contains(h)) {
            55
        } else if hints.iter().any(|h| lowered.contains(&h[1..])) {
            50
        } else {
            return None;
        };
        Some(Classification {
            segment: Some(*segment),
            subtype: None,
            source: SegmentSource::Url,
            score,
        })
    })
}

/// Assigns a segment from the strongest available signal: declared schema
/// type, then keywords, then URL path hints, else the fallback.
pub fn classify(signals: &Signals<'_>) -> Classification {
    signals
        .declared_type
        .and_then(by_schema)
        .or_else(|| by_keywords(signals))
        .or_else(|| signals.url.and_then(url_hint))
        .unwrap_or_else(Classification::fallback)
}
