//! Encounter conversion.

use serde::Deserialize;

use crate::entry::Entry;
use crate::error::ConvertError;
use crate::patient::Patient;
use crate::resource::{self, Resource};
use crate::terminology::{ACT_STATUS, CodeObject};

/// An encounter, optionally carrying a reason sub-entry and a discharge
/// disposition.
#[derive(Debug, Default, Deserialize)]
pub struct Encounter {
    #[serde(flatten)]
    pub entry: Entry,
    #[serde(default)]
    pub reason: Option<Entry>,
    #[serde(default, rename = "dischargeDisposition")]
    pub discharge_disposition: Option<CodeObject>,
}

impl Encounter {
    pub fn fhir_models(&self, patient: &Patient) -> Result<Vec<Resource>, ConvertError> {
        let mut encounter = resource::Encounter {
            id: self.entry.temp_id.get().to_string(),
            status: self.status().to_string(),
            encounter_type: vec![self.entry.codes.to_concept(self.entry.description.as_deref())],
            patient: Some(patient.reference()),
            period: self.entry.period(),
            reason: Vec::new(),
            hospitalization: None,
        };

        if let Some(reason) = &self.reason {
            if !reason.codes.is_empty() {
                encounter.reason = vec![reason.codes.to_concept(None)];
            }
        }
        if let Some(disposition) = &self.discharge_disposition {
            encounter.hospitalization = Some(resource::Hospitalization {
                discharge_disposition: Some(disposition.to_concept(None)),
            });
        }

        Ok(vec![Resource::Encounter(encounter)])
    }

    /// Maps the status to the required encounter-state value set,
    /// including some statuses HDS does not currently emit. Unmapped
    /// statuses are assumed "finished".
    fn status(&self) -> &'static str {
        // Negated encounters are rare, but if we run into one, call it
        // cancelled.
        if self.entry.negation_ind {
            return "cancelled";
        }

        let concept = self.entry.status_code.to_concept(None);
        if concept.matches_code(ACT_STATUS, "active") {
            "in-progress"
        } else if concept.matches_code(ACT_STATUS, "cancelled") {
            "cancelled"
        } else if concept.matches_code(ACT_STATUS, "held") {
            "planned"
        } else if concept.matches_code(ACT_STATUS, "new") {
            "planned"
        } else if concept.matches_code(ACT_STATUS, "suspended") {
            "onleave"
        } else if concept.matches_code(ACT_STATUS, "nullified") {
            "cancelled"
        } else if concept.matches_code(ACT_STATUS, "obsolete") {
            "cancelled"
        } else if concept.matches_code(ACT_STATUS, "ordered") {
            // Not a real ActStatus, but HDS uses it.
            "planned"
        } else if self.entry.is_request_mood() {
            "planned"
        } else {
            "finished"
        }
    }
}
