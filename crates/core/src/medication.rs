//! Medication conversion, including the vaccine disambiguation branch.

use serde::Deserialize;

use crate::entry::Entry;
use crate::error::ConvertError;
use crate::patient::Patient;
use crate::resource::{self, Resource};
use crate::terminology::ACT_STATUS;

/// A medication fact. Carries no fields beyond the common entry; whether
/// it is really an immunization is inferred from its code systems.
#[derive(Debug, Default, Deserialize)]
pub struct Medication {
    #[serde(flatten)]
    pub entry: Entry,
}

impl Medication {
    pub fn fhir_models(&self, patient: &Patient) -> Result<Vec<Resource>, ConvertError> {
        // Sometimes immunizations come across as medications, so we need
        // to support that.
        if self.entry.codes.has_system("CVX") {
            return self.convert_immunization(patient);
        }

        self.convert_medication(patient)
    }

    fn convert_medication(&self, patient: &Patient) -> Result<Vec<Resource>, ConvertError> {
        let mut statement = resource::MedicationStatement {
            id: self.entry.temp_id.get().to_string(),
            patient: Some(patient.reference()),
            status: self.medication_status().to_string(),
            was_not_taken: None,
            reason_not_taken: Vec::new(),
            effective_period: self.entry.period(),
            medication_codeable_concept: Some(
                self.entry.codes.to_concept(self.entry.description.as_deref()),
            ),
        };

        if self.entry.negation_ind {
            statement.was_not_taken = Some(true);
        }
        if let Some(reason) = &self.entry.negation_reason {
            statement.reason_not_taken = vec![reason.to_concept(None)];
        }

        // Ignoring dosage, route, etc.

        Ok(vec![Resource::MedicationStatement(statement)])
    }

    /// Maps the status to the required medication-statement-status value
    /// set.
    fn medication_status(&self) -> &'static str {
        let concept = self.entry.status_code.to_concept(None);
        if concept.matches_code(ACT_STATUS, "active") {
            "active"
        } else if concept.matches_code(ACT_STATUS, "cancelled") {
            "entered-in-error"
        } else if concept.matches_code(ACT_STATUS, "held") {
            "intended"
        } else if concept.matches_code(ACT_STATUS, "new") {
            "intended"
        } else if concept.matches_code(ACT_STATUS, "suspended") {
            "completed"
        } else if concept.matches_code(ACT_STATUS, "nullified") {
            "entered-in-error"
        } else if concept.matches_code(ACT_STATUS, "obsolete") {
            "cancelled"
        } else if concept.matches_code(ACT_STATUS, "ordered") {
            // Not a real ActStatus, but HDS uses it.
            "intended"
        } else if concept.matches_code(ACT_STATUS, "discharge") {
            // Not a real ActStatus, but HDS uses it.
            "intended"
        } else if concept.matches_code(ACT_STATUS, "dispensed") {
            // Not a real ActStatus, but HDS uses it.
            "intended"
        } else if self.entry.is_request_mood() {
            "intended"
        } else if self.entry.status_code.is_empty() && self.entry.end_time.is_none() {
            "active"
        } else {
            "completed"
        }
    }

    fn convert_immunization(&self, patient: &Patient) -> Result<Vec<Resource>, ConvertError> {
        let mut immunization = resource::Immunization {
            id: self.entry.temp_id.get().to_string(),
            status: self.immunization_status().to_string(),
            date: self.entry.start_time.map(|t| t.fhir_datetime()),
            vaccine_code: Some(self.entry.codes.to_concept(self.entry.description.as_deref())),
            patient: Some(patient.reference()),
            was_not_given: None,
            explanation: None,
            vaccination_protocol: Vec::new(),
        };

        if self.entry.negation_ind {
            immunization.was_not_given = Some(true);
        }
        if let Some(reason) = &self.entry.negation_reason {
            immunization.explanation = Some(resource::ImmunizationExplanation {
                reason_not_given: vec![reason.to_concept(None)],
            });
        }

        // Ignoring dosage, route, etc.

        Ok(vec![Resource::Immunization(immunization)])
    }

    /// Maps the status to the required medication-admin-status value set,
    /// which differs from the statement table above in several rows.
    fn immunization_status(&self) -> &'static str {
        let concept = self.entry.status_code.to_concept(None);
        if concept.matches_code(ACT_STATUS, "aborted") {
            "stopped"
        } else if concept.matches_code(ACT_STATUS, "active") {
            "in-progress"
        } else if concept.matches_code(ACT_STATUS, "cancelled") {
            "entered-in-error"
        } else if concept.matches_code(ACT_STATUS, "held") {
            "on-hold"
        } else if concept.matches_code(ACT_STATUS, "new") {
            "intended"
        } else if concept.matches_code(ACT_STATUS, "suspended") {
            "on-hold"
        } else if concept.matches_code(ACT_STATUS, "nullified") {
            "entered-in-error"
        } else if concept.matches_code(ACT_STATUS, "obsolete") {
            "entered-in-error"
        } else if concept.matches_code(ACT_STATUS, "ordered") {
            // Not a real ActStatus, but HDS uses it.
            "intended"
        } else if self.entry.is_request_mood() {
            "intended"
        } else if self.entry.status_code.is_empty() && self.entry.end_time.is_none() {
            "in-progress"
        } else {
            "completed"
        }
    }
}
