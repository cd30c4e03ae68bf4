//! Condition conversion.

use serde::Deserialize;

use crate::entry::Entry;
use crate::error::ConvertError;
use crate::patient::Patient;
use crate::resource::{self, Resource};
use crate::terminology::{ACT_STATUS, CodeMap, CodeableConcept, SNOMED_CT};

/// A condition (diagnosis/problem).
///
/// NOTE: HDS has inconsistent representations of severity; the only
/// working importer models it like a code map, so that's what we assume.
/// Note the difference from Allergy, whose severity is a single code.
#[derive(Debug, Default, Deserialize)]
pub struct Condition {
    #[serde(flatten)]
    pub entry: Entry,
    #[serde(default)]
    pub severity: CodeMap,
}

impl Condition {
    pub fn fhir_models(&self, patient: &Patient) -> Result<Vec<Resource>, ConvertError> {
        let condition = resource::Condition {
            id: self.entry.temp_id.get().to_string(),
            patient: Some(patient.reference()),
            code: Some(self.entry.codes.to_concept(self.entry.description.as_deref())),
            clinical_status: self.clinical_status().to_string(),
            verification_status: if self.entry.negation_ind {
                "refuted".to_string()
            } else {
                "confirmed".to_string()
            },
            severity: self.fhir_severity(),
            onset_date_time: self.entry.start_time.map(|t| t.fhir_datetime()),
            abatement_date_time: self.entry.end_time.map(|t| t.fhir_datetime()),
        };

        Ok(vec![Resource::Condition(condition)])
    }

    /// Maps the clinical status to the preferred condition-clinical value
    /// set. Unlike allergies there is no safe default, so a miss stays
    /// blank unless a real end date lets us infer "resolved".
    fn clinical_status(&self) -> &'static str {
        let concept = self.entry.status_code.to_concept(None);
        let mapped = if concept.matches_code(SNOMED_CT, "55561003") {
            "active"
        } else if concept.matches_code(SNOMED_CT, "73425007") {
            "remission"
        } else if concept.matches_code(SNOMED_CT, "413322009") {
            "resolved"
        } else if concept.matches_code(ACT_STATUS, "active") {
            "active"
        } else {
            ""
        };

        if mapped.is_empty() && self.entry.has_distinct_end() {
            return "resolved";
        }
        mapped
    }

    /// Carries the severity codes through unchanged, filling in display
    /// text for the six known SNOMED severity codes. The codes are kept
    /// as-is rather than forced into the smaller preferred value set.
    fn fhir_severity(&self) -> Option<CodeableConcept> {
        if self.severity.is_empty() {
            return None;
        }

        let mut severity = self.severity.to_concept(None);
        let text = if severity.matches_code(SNOMED_CT, "399166001") {
            "Fatal"
        } else if severity.matches_code(SNOMED_CT, "255604002") {
            "Mild"
        } else if severity.matches_code(SNOMED_CT, "371923003") {
            "Mild to moderate"
        } else if severity.matches_code(SNOMED_CT, "6736007") {
            "Moderate"
        } else if severity.matches_code(SNOMED_CT, "371924009") {
            "Moderate to severe"
        } else if severity.matches_code(SNOMED_CT, "24484000") {
            "Severe"
        } else {
            ""
        };
        if !text.is_empty() {
            severity.text = Some(text.to_string());
        }
        Some(severity)
    }
}
