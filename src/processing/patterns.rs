use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

/// One entry of an ordered extraction table: a capture pattern, a
/// post-processing step for the captured text, and an acceptance predicate
/// run on the post-processed candidate. Tables are walked in order and the
/// first accepted candidate wins.
pub struct FieldRule {
    pub pattern: Regex,
    pub post: fn(&str) -> String,
    pub accept: fn(&str) -> bool,
}

impl FieldRule {
    fn new(pattern: &str, post: fn(&str) -> String, accept: fn(&str) -> bool) -> Self {
        Self {
            pattern: Regex::new(pattern).unwrap(),
            post,
            accept,
        }
    }
}

pub fn post_trim(s: &str) -> String {
    s.trim().to_string()
}

/// Uppercase and drop interior whitespace, the normal form for document
/// numbers.
pub fn post_compact(s: &str) -> String {
    s.split_whitespace().collect::<String>().to_uppercase()
}

/// Collapse any accepted sex spelling to its leading letter.
pub fn post_sex(s: &str) -> String {
    s.chars()
        .next()
        .map(|c| c.to_ascii_uppercase().to_string())
        .unwrap_or_default()
}

pub fn post_nationality(s: &str) -> String {
    normalize_nationality(s)
}

pub fn accept_nonempty(s: &str) -> bool {
    !s.is_empty()
}

pub fn accept_passport_number(s: &str) -> bool {
    (6..=12).contains(&s.chars().count())
}

/// The bare alphanumeric fallback additionally demands a digit so it cannot
/// latch onto ordinary uppercase words.
pub fn accept_passport_number_with_digit(s: &str) -> bool {
    accept_passport_number(s) && s.chars().any(|c| c.is_ascii_digit())
}

pub fn accept_name(s: &str) -> bool {
    let tokens: Vec<&str> = s.split_whitespace().collect();
    if !(2..=4).contains(&tokens.len()) {
        return false;
    }
    if tokens.iter().any(|t| t.chars().count() < 2) {
        return false;
    }
    if !(5..=50).contains(&s.chars().count()) {
        return false;
    }
    if s.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    !NAME_STOPWORDS.is_match(&s.to_uppercase())
}

pub fn accept_sex(s: &str) -> bool {
    s == "M" || s == "F"
}

lazy_static! {
    // Passport number: national formats first, bare alphanumeric run last.
    pub static ref PASSPORT_NUMBER_RULES: Vec<FieldRule> = vec![
        FieldRule::new(
            r"(?i)passport\s*(?:no|number)\.?\s*[:#]?\s*([A-Z0-9]{5,15})",
            post_compact,
            accept_passport_number,
        ),
        FieldRule::new(
            r"(?i)document\s*(?:no|number)\.?\s*[:#]?\s*([A-Z0-9]{5,15})",
            post_compact,
            accept_passport_number,
        ),
        // One or two letters then a digit block, the widest-spread layout
        FieldRule::new(r"\b([A-Z]{1,2}[0-9]{6,9})\b", post_compact, accept_passport_number),
        // All-digit books
        FieldRule::new(r"\b([0-9]{9})\b", post_compact, accept_passport_number),
        FieldRule::new(r"\b([A-Z0-9]{6,12})\b", post_compact, accept_passport_number_with_digit),
    ];

    // Holder name: labeled forms, then bare all-caps lines, then a
    // mixed-case line heuristic.
    pub static ref NAME_RULES: Vec<FieldRule> = vec![
        FieldRule::new(
            r"(?i)\b(?:full\s+name|surname\s+and\s+given\s+names?|name)\s*[:#]?\s*([^\n]+)",
            post_trim,
            accept_name,
        ),
        FieldRule::new(
            r"(?i)\b(?:surname|family\s+name|given\s+names?)\s*[:#]?\s*([^\n]+)",
            post_trim,
            accept_name,
        ),
        FieldRule::new(
            r"(?m)^[ \t]*([A-Z]{2,}(?:[ \t]+[A-Z]{2,}){1,3})[ \t]*$",
            post_trim,
            accept_name,
        ),
        FieldRule::new(
            r"(?m)^[ \t]*([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+){1,3})[ \t]*$",
            post_trim,
            accept_name,
        ),
    ];

    pub static ref SEX_RULES: Vec<FieldRule> = vec![
        FieldRule::new(
            r"(?i)\b(?:sex|gender)\s*[:#]?\s*(MALE|FEMALE|[MF])\b",
            post_sex,
            accept_sex,
        ),
        // A lone uppercase letter on its own line
        FieldRule::new(r"(?m)^[ \t]*([MF])[ \t]*$", post_sex, accept_sex),
        FieldRule::new(r"(?i)\b(MALE|FEMALE)\b", post_sex, accept_sex),
    ];

    pub static ref NATIONALITY_RULES: Vec<FieldRule> = {
        let mut vocabulary: Vec<&str> = NATIONALITY_SYNONYMS.iter().map(|(k, _)| *k).collect();
        // Longest alternative first so "UNITED STATES" never shadows
        // "UNITED STATES OF AMERICA"
        vocabulary.sort_by_key(|k| std::cmp::Reverse(k.len()));
        vec![
            FieldRule::new(
                r"(?i)\b(?:nationality|citizenship|citizen\s+of)\s*[:#]?\s*([A-Za-z][A-Za-z .'-]*)",
                post_nationality,
                accept_nonempty,
            ),
            // Case-sensitive: short codes like US must not match lowercase words
            FieldRule::new(
                &format!(r"\b({})\b", vocabulary.join("|")),
                post_nationality,
                accept_nonempty,
            ),
        ]
    };

    pub static ref PLACE_OF_BIRTH_RULES: Vec<FieldRule> = vec![FieldRule::new(
        r"(?i)\bplace\s+of\s+birth\s*[:#]?\s*([^\n]+)",
        post_trim,
        accept_nonempty,
    )];

    pub static ref AUTHORITY_RULES: Vec<FieldRule> = vec![FieldRule::new(
        r"(?i)\b(?:issuing\s+authority|authority|issued\s+by)\s*[:#]?\s*([^\n]+)",
        post_trim,
        accept_nonempty,
    )];

    // Date shapes the collector scans for. Order matters: an earlier shape
    // claims its text span before a later one sees it.
    pub static ref DATE_SHAPES: Vec<Regex> = vec![
        Regex::new(r"\b(\d{2}/\d{2}/\d{4})\b").unwrap(),
        Regex::new(r"\b(\d{2}-\d{2}-\d{4})\b").unwrap(),
        // 12 June 1985, 3 Sep 2024
        Regex::new(r"(?i)\b(\d{1,2}\s+(?:JAN|FEB|MAR|APR|MAY|JUN|JUL|AUG|SEP|OCT|NOV|DEC)[A-Z]*\.?\s+\d{4})\b")
            .unwrap(),
        // June 12, 1985
        Regex::new(r"(?i)\b((?:JAN|FEB|MAR|APR|MAY|JUN|JUL|AUG|SEP|OCT|NOV|DEC)[A-Z]*\.?\s+\d{1,2},?\s+\d{4})\b")
            .unwrap(),
        // MRZ-style YYMMDD
        Regex::new(r"\b(\d{6})\b").unwrap(),
    ];

    static ref NAME_STOPWORDS: Regex = Regex::new(
        r"\b(?:PASSPORT|REPUBLIC|UNITED|KINGDOM|STATES|AMERICA|AUTHORITY|MINISTRY|DEPARTMENT|GOVERNMENT|NATIONALITY|SPECIMEN|DOCUMENT|INTERNATIONAL)\b",
    )
    .unwrap();

    static ref NATIONALITY_SYNONYMS: Vec<(&'static str, &'static str)> = vec![
        ("UNITED STATES OF AMERICA", "American"),
        ("UNITED STATES", "American"),
        ("USA", "American"),
        ("US", "American"),
        ("AMERICAN", "American"),
        ("UNITED KINGDOM", "British"),
        ("GREAT BRITAIN", "British"),
        ("GBR", "British"),
        ("GB", "British"),
        ("UK", "British"),
        ("BRITISH", "British"),
        ("CANADA", "Canadian"),
        ("CAN", "Canadian"),
        ("CANADIAN", "Canadian"),
        ("AUSTRALIA", "Australian"),
        ("AUS", "Australian"),
        ("AUSTRALIAN", "Australian"),
        ("NEW ZEALAND", "New Zealander"),
        ("NZL", "New Zealander"),
        ("NZ", "New Zealander"),
        ("NEW ZEALANDER", "New Zealander"),
        ("IRELAND", "Irish"),
        ("IRL", "Irish"),
        ("IRISH", "Irish"),
        ("FRANCE", "French"),
        ("FRA", "French"),
        ("FRENCH", "French"),
        ("GERMANY", "German"),
        ("DEU", "German"),
        ("GERMAN", "German"),
        ("SPAIN", "Spanish"),
        ("ESP", "Spanish"),
        ("SPANISH", "Spanish"),
        ("PORTUGAL", "Portuguese"),
        ("PRT", "Portuguese"),
        ("PORTUGUESE", "Portuguese"),
        ("ITALY", "Italian"),
        ("ITA", "Italian"),
        ("ITALIAN", "Italian"),
        ("NETHERLANDS", "Dutch"),
        ("NLD", "Dutch"),
        ("DUTCH", "Dutch"),
        ("BELGIUM", "Belgian"),
        ("BEL", "Belgian"),
        ("BELGIAN", "Belgian"),
        ("SWITZERLAND", "Swiss"),
        ("CHE", "Swiss"),
        ("SWISS", "Swiss"),
        ("AUSTRIA", "Austrian"),
        ("AUT", "Austrian"),
        ("AUSTRIAN", "Austrian"),
        ("SWEDEN", "Swedish"),
        ("SWE", "Swedish"),
        ("SWEDISH", "Swedish"),
        ("NORWAY", "Norwegian"),
        ("NOR", "Norwegian"),
        ("NORWEGIAN", "Norwegian"),
        ("DENMARK", "Danish"),
        ("DNK", "Danish"),
        ("DANISH", "Danish"),
        ("FINLAND", "Finnish"),
        ("FIN", "Finnish"),
        ("FINNISH", "Finnish"),
        ("POLAND", "Polish"),
        ("POL", "Polish"),
        ("POLISH", "Polish"),
        ("CHINA", "Chinese"),
        ("CHN", "Chinese"),
        ("CHINESE", "Chinese"),
        ("JAPAN", "Japanese"),
        ("JPN", "Japanese"),
        ("JAPANESE", "Japanese"),
        ("REPUBLIC OF KOREA", "Korean"),
        ("SOUTH KOREA", "Korean"),
        ("KOR", "Korean"),
        ("KOREAN", "Korean"),
        ("INDIA", "Indian"),
        ("IND", "Indian"),
        ("INDIAN", "Indian"),
        ("PAKISTAN", "Pakistani"),
        ("PAK", "Pakistani"),
        ("PAKISTANI", "Pakistani"),
        ("BRAZIL", "Brazilian"),
        ("BRA", "Brazilian"),
        ("BRAZILIAN", "Brazilian"),
        ("MEXICO", "Mexican"),
        ("MEX", "Mexican"),
        ("MEXICAN", "Mexican"),
        ("PHILIPPINES", "Filipino"),
        ("PHL", "Filipino"),
        ("FILIPINO", "Filipino"),
        ("NIGERIA", "Nigerian"),
        ("NGA", "Nigerian"),
        ("NIGERIAN", "Nigerian"),
        ("SOUTH AFRICA", "South African"),
        ("ZAF", "South African"),
        ("SOUTH AFRICAN", "South African"),
    ];

    static ref NATIONALITY_CANONICAL: HashMap<&'static str, &'static str> =
        NATIONALITY_SYNONYMS.iter().copied().collect();

    static ref NUMERIC_DMY_RE: Regex = Regex::new(r"^(\d{2})[/-](\d{2})[/-](\d{4})$").unwrap();
    static ref TEXT_DMY_RE: Regex = Regex::new(r"(?i)^(\d{1,2})\s+([A-Z]+)\.?\s+(\d{4})$").unwrap();
    static ref TEXT_MDY_RE: Regex = Regex::new(r"(?i)^([A-Z]+)\.?\s+(\d{1,2}),?\s+(\d{4})$").unwrap();
}

/// Map a captured nationality token onto its canonical demonym. Unknown
/// values pass through trimmed.
pub fn normalize_nationality(raw: &str) -> String {
    let trimmed = raw.trim();
    let key = trimmed.to_uppercase();
    match NATIONALITY_CANONICAL.get(key.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => trimmed.to_string(),
    }
}

/// Month token to number by its first three letters, so "SEP", "Sept" and
/// "September" all land on 9.
pub fn month_number(token: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
    ];
    let upper = token.to_uppercase();
    let prefix = upper.get(0..3)?;
    MONTHS.iter().position(|m| *m == prefix).map(|i| i as u32 + 1)
}

fn plausible_day_month(day: u32, month: u32) -> bool {
    (1..=31).contains(&day) && (1..=12).contains(&month)
}

/// Six-digit MRZ date to DD/MM/YYYY. Two-digit years 00-30 land in the
/// 2000s, 31-99 in the 1900s. Out-of-range month or day drops the date.
pub fn normalize_yymmdd(digits: &str) -> Option<String> {
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let yy: u32 = digits[0..2].parse().ok()?;
    let mm: u32 = digits[2..4].parse().ok()?;
    let dd: u32 = digits[4..6].parse().ok()?;
    if !plausible_day_month(dd, mm) {
        return None;
    }
    let year = if yy <= 30 { 2000 + yy } else { 1900 + yy };
    Some(format!("{:02}/{:02}/{}", dd, mm, year))
}

/// Normalize any collected date shape to DD/MM/YYYY. Numeric delimited
/// forms are read day-first. Day validation is a bare 1-31 range, not a
/// calendar lookup.
pub fn normalize_date_candidate(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Some(caps) = NUMERIC_DMY_RE.captures(raw) {
        let dd: u32 = caps[1].parse().ok()?;
        let mm: u32 = caps[2].parse().ok()?;
        if !plausible_day_month(dd, mm) {
            return None;
        }
        return Some(format!("{:02}/{:02}/{}", dd, mm, &caps[3]));
    }
    if let Some(caps) = TEXT_DMY_RE.captures(raw) {
        let dd: u32 = caps[1].parse().ok()?;
        let mm = month_number(&caps[2])?;
        if !plausible_day_month(dd, mm) {
            return None;
        }
        return Some(format!("{:02}/{:02}/{}", dd, mm, &caps[3]));
    }
    if let Some(caps) = TEXT_MDY_RE.captures(raw) {
        let mm = month_number(&caps[1])?;
        let dd: u32 = caps[2].parse().ok()?;
        if !plausible_day_month(dd, mm) {
            return None;
        }
        return Some(format!("{:02}/{:02}/{}", dd, mm, &caps[3]));
    }
    normalize_yymmdd(raw)
}
