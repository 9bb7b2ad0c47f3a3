use crate::models::ExtractedPassportData;
use crate::utils::error::ManualEntryError;

/// Operator-facing fallback for when recognition finds nothing usable.
/// Every field is free text; blank fields are dropped at submission.
#[derive(Debug, Clone, Default)]
pub struct ManualEntryForm {
    pub passport_number: String,
    pub full_name: String,
    pub nationality: String,
    pub date_of_birth: String,
    pub expiry_date: String,
    pub issue_date: String,
    pub place_of_birth: String,
    pub sex: String,
    pub issuing_authority: String,
    pub address: String,
    pub emergency_contact_name: String,
    pub emergency_contact_relationship: String,
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl ManualEntryForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-fill from a partial extraction so the operator only types what
    /// the engines missed.
    pub fn seeded(data: &ExtractedPassportData) -> Self {
        Self {
            passport_number: data.passport_number.clone().unwrap_or_default(),
            full_name: data.full_name.clone().unwrap_or_default(),
            nationality: data.nationality.clone().unwrap_or_default(),
            date_of_birth: data.date_of_birth.clone().unwrap_or_default(),
            expiry_date: data.expiry_date.clone().unwrap_or_default(),
            issue_date: data.issue_date.clone().unwrap_or_default(),
            place_of_birth: data.place_of_birth.clone().unwrap_or_default(),
            sex: data.sex.clone().unwrap_or_default(),
            issuing_authority: data.issuing_authority.clone().unwrap_or_default(),
            address: data.address.clone().unwrap_or_default(),
            emergency_contact_name: data.emergency_contact_name.clone().unwrap_or_default(),
            emergency_contact_relationship: data
                .emergency_contact_relationship
                .clone()
                .unwrap_or_default(),
        }
    }

    /// Validate and convert to the canonical record. At least one field
    /// must carry a non-blank value.
    pub fn submit(&self) -> Result<ExtractedPassportData, ManualEntryError> {
        let data = ExtractedPassportData {
            passport_number: non_blank(&self.passport_number),
            full_name: non_blank(&self.full_name),
            nationality: non_blank(&self.nationality),
            date_of_birth: non_blank(&self.date_of_birth),
            expiry_date: non_blank(&self.expiry_date),
            issue_date: non_blank(&self.issue_date),
            place_of_birth: non_blank(&self.place_of_birth),
            sex: non_blank(&self.sex),
            issuing_authority: non_blank(&self.issuing_authority),
            address: non_blank(&self.address),
            emergency_contact_name: non_blank(&self.emergency_contact_name),
            emergency_contact_relationship: non_blank(&self.emergency_contact_relationship),
        };
        if data.is_empty() {
            return Err(ManualEntryError::EmptySubmission);
        }
        Ok(data)
    }
}
