use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fields recoverable from the visual inspection zone of a passport.
/// Every field is optional: `None` means the extractor found nothing it
/// was willing to accept, not that the document lacks the field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPassportData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passport_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuing_authority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact_relationship: Option<String>,
}

impl ExtractedPassportData {
    pub const FIELD_NAMES: [&'static str; 12] = [
        "passport_number",
        "full_name",
        "nationality",
        "date_of_birth",
        "expiry_date",
        "issue_date",
        "place_of_birth",
        "sex",
        "issuing_authority",
        "address",
        "emergency_contact_name",
        "emergency_contact_relationship",
    ];

    pub fn fields(&self) -> [(&'static str, Option<&str>); 12] {
        [
            ("passport_number", self.passport_number.as_deref()),
            ("full_name", self.full_name.as_deref()),
            ("nationality", self.nationality.as_deref()),
            ("date_of_birth", self.date_of_birth.as_deref()),
            ("expiry_date", self.expiry_date.as_deref()),
            ("issue_date", self.issue_date.as_deref()),
            ("place_of_birth", self.place_of_birth.as_deref()),
            ("sex", self.sex.as_deref()),
            ("issuing_authority", self.issuing_authority.as_deref()),
            ("address", self.address.as_deref()),
            ("emergency_contact_name", self.emergency_contact_name.as_deref()),
            (
                "emergency_contact_relationship",
                self.emergency_contact_relationship.as_deref(),
            ),
        ]
    }

    pub fn filled_count(&self) -> usize {
        self.fields().iter().filter(|(_, v)| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.filled_count() == 0
    }
}

/// One engine's raw output for a single run, scored by the text heuristic.
#[derive(Debug, Clone)]
pub struct OcrAttempt {
    pub engine: String,
    pub text: String,
    pub confidence: u8, // 0-100
    pub elapsed: Duration,
}

/// Outcome of a completed pipeline run: the extracted record plus every
/// engine attempt that produced text, with the index of the attempt whose
/// text was fed to the extractor.
#[derive(Debug)]
pub struct ExtractionReport {
    pub data: ExtractedPassportData,
    pub attempts: Vec<OcrAttempt>,
    pub best_attempt: Option<usize>,
}

impl ExtractionReport {
    pub fn best(&self) -> Option<&OcrAttempt> {
        self.best_attempt.and_then(|i| self.attempts.get(i))
    }

    /// Recognition ran but nothing usable came out. The caller should offer
    /// the manual entry form.
    pub fn suggests_manual_entry(&self) -> bool {
        self.data.is_empty()
    }
}
