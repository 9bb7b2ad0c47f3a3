use crate::models::ExtractedPassportData;
use crate::processing::patterns::{self, FieldRule};

/// Best-effort field recovery from raw OCR text. Pure function: the same
/// text always produces the same record. Fields with no accepted candidate
/// stay `None`; address and emergency-contact fields are manual-entry only
/// and are never populated here.
pub fn extract_passport_data(text: &str) -> ExtractedPassportData {
    let mut data = ExtractedPassportData::default();
    data.passport_number = first_accepted(&patterns::PASSPORT_NUMBER_RULES, text);
    data.full_name = first_accepted(&patterns::NAME_RULES, text);
    data.nationality = first_accepted(&patterns::NATIONALITY_RULES, text);
    data.sex = first_accepted(&patterns::SEX_RULES, text);
    data.place_of_birth = first_accepted(&patterns::PLACE_OF_BIRTH_RULES, text);
    data.issuing_authority = first_accepted(&patterns::AUTHORITY_RULES, text);
    assign_dates(&mut data, text);
    data
}

/// Walk a rule table in order. Within one rule, every match is considered
/// in document order; the first candidate the rule's predicate accepts ends
/// the whole search.
fn first_accepted(rules: &[FieldRule], text: &str) -> Option<String> {
    for rule in rules.iter() {
        for captures in rule.pattern.captures_iter(text) {
            if let Some(matched) = captures.get(1) {
                let candidate = (rule.post)(matched.as_str());
                if (rule.accept)(&candidate) {
                    return Some(candidate);
                }
            }
        }
    }
    None
}

struct DateCandidate {
    value: String,
    start: usize,
    end: usize,
}

enum DateClass {
    Birth,
    Expiry,
    Issue,
}

/// Every valid date in the text, in document order. Shapes are scanned in
/// table order and an earlier shape's span is never re-claimed by a later
/// one.
fn collect_dates(text: &str) -> Vec<DateCandidate> {
    let mut found: Vec<DateCandidate> = Vec::new();
    for shape in patterns::DATE_SHAPES.iter() {
        for m in shape.find_iter(text) {
            if found.iter().any(|c| m.start() < c.end && c.start < m.end()) {
                continue;
            }
            if let Some(value) = patterns::normalize_date_candidate(m.as_str()) {
                found.push(DateCandidate {
                    value,
                    start: m.start(),
                    end: m.end(),
                });
            }
        }
    }
    found.sort_by_key(|c| c.start);
    found
}

/// The classification context: up to 25 characters before the match and 50
/// after, match text included.
fn context_window(text: &str, start: usize, end: usize) -> &str {
    let window_start = text[..start]
        .char_indices()
        .rev()
        .nth(24)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let window_end = text[end..]
        .char_indices()
        .nth(50)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    &text[window_start..window_end]
}

fn classify(window: &str) -> Option<DateClass> {
    let lower = window.to_lowercase();
    if ["birth", "born", "dob"].iter().any(|k| lower.contains(k)) {
        return Some(DateClass::Birth);
    }
    if ["expir", "valid"].iter().any(|k| lower.contains(k)) {
        return Some(DateClass::Expiry);
    }
    if ["issue", "delivered"].iter().any(|k| lower.contains(k)) {
        return Some(DateClass::Issue);
    }
    None
}

fn assign_dates(data: &mut ExtractedPassportData, text: &str) {
    let candidates = collect_dates(text);

    let mut unclassified: Vec<&str> = Vec::new();
    for candidate in &candidates {
        match classify(context_window(text, candidate.start, candidate.end)) {
            Some(DateClass::Birth) => {
                if data.date_of_birth.is_none() {
                    data.date_of_birth = Some(candidate.value.clone());
                }
            }
            Some(DateClass::Expiry) => {
                if data.expiry_date.is_none() {
                    data.expiry_date = Some(candidate.value.clone());
                }
            }
            Some(DateClass::Issue) => {
                if data.issue_date.is_none() {
                    data.issue_date = Some(candidate.value.clone());
                }
            }
            None => unclassified.push(&candidate.value),
        }
    }

    // Positional fallback: leftover dates feed the slots by order of
    // appearance, duplicates and already-assigned values excluded. A slot
    // whose field was keyword-classified is not reassigned and its date is
    // dropped rather than shifted to the next slot.
    let mut unique: Vec<&str> = Vec::new();
    for value in unclassified {
        if unique.contains(&value) {
            continue;
        }
        let taken = [&data.date_of_birth, &data.issue_date, &data.expiry_date]
            .iter()
            .any(|f| f.as_deref() == Some(value));
        if taken {
            continue;
        }
        unique.push(value);
    }

    let mut slots = [
        &mut data.date_of_birth,
        &mut data.issue_date,
        &mut data.expiry_date,
    ];
    for (slot, value) in slots.iter_mut().zip(unique.iter()) {
        if slot.is_none() {
            **slot = Some((*value).to_string());
        }
    }
}
