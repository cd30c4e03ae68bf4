//! Allergy conversion to AllergyIntolerance.

use serde::Deserialize;

use crate::entry::Entry;
use crate::error::ConvertError;
use crate::patient::Patient;
use crate::resource::{self, Resource};
use crate::terminology::{CodeObject, SNOMED_CT};

/// An allergy or intolerance, with its optional reaction and severity.
#[derive(Debug, Default, Deserialize)]
pub struct Allergy {
    #[serde(flatten)]
    pub entry: Entry,
    #[serde(default)]
    pub reaction: Option<CodeObject>,
    #[serde(default)]
    pub severity: Option<CodeObject>,
}

impl Allergy {
    pub fn fhir_models(&self, patient: &Patient) -> Result<Vec<Resource>, ConvertError> {
        let onset = self
            .entry
            .start_time
            .or(self.entry.time)
            .map(|t| t.fhir_datetime());
        let substance = self.entry.codes.to_concept(self.entry.description.as_deref());

        let mut allergy = resource::AllergyIntolerance {
            id: self.entry.temp_id.get().to_string(),
            onset,
            patient: Some(patient.reference()),
            substance: Some(substance.clone()),
            status: self.status().to_string(),
            criticality: self.criticality().to_string(),
            reaction: Vec::new(),
        };

        if let Some(reaction) = &self.reaction {
            allergy.reaction = vec![resource::AllergyReaction {
                substance: Some(substance),
                manifestation: vec![reaction.to_concept(None)],
                onset,
                severity: self.severity().to_string(),
            }];
        }

        Ok(vec![Resource::AllergyIntolerance(allergy)])
    }

    /// Maps the status to the required allergy-intolerance-status value
    /// set. Negation wins outright; an unmapped status falls back to
    /// "resolved" when the end date is a real end, otherwise "active".
    fn status(&self) -> &'static str {
        if self.entry.negation_ind {
            return "refuted";
        }

        let concept = self.entry.status_code.to_concept(None);
        if concept.matches_code(SNOMED_CT, "55561003") {
            "active"
        } else if concept.matches_code(SNOMED_CT, "73425007") {
            "inactive"
        } else if concept.matches_code(SNOMED_CT, "413322009") {
            "resolved"
        } else if self.entry.has_distinct_end() {
            "resolved"
        } else {
            "active"
        }
    }

    /// Maps the severity to the required criticality value set. Moderate
    /// is too close to call either way (CRITU); moderate-to-severe errs
    /// toward the higher criticality. Unmappable severity stays blank.
    fn criticality(&self) -> &'static str {
        let Some(severity) = &self.severity else {
            return "";
        };

        let concept = severity.to_concept(None);
        if concept.matches_code(SNOMED_CT, "399166001") {
            "CRITH"
        } else if concept.matches_code(SNOMED_CT, "255604002") {
            "CRITL"
        } else if concept.matches_code(SNOMED_CT, "371923003") {
            // Mild to moderate
            "CRITL"
        } else if concept.matches_code(SNOMED_CT, "6736007") {
            // Moderate
            "CRITU"
        } else if concept.matches_code(SNOMED_CT, "371924009") {
            // Moderate to severe
            "CRITH"
        } else if concept.matches_code(SNOMED_CT, "24484000") {
            "CRITH"
        } else {
            ""
        }
    }

    /// Maps the severity to the required reaction-event-severity value
    /// set; the two in-between codes collapse toward the more severe end.
    /// Unmappable severity stays blank.
    fn severity(&self) -> &'static str {
        let Some(severity) = &self.severity else {
            return "";
        };

        let concept = severity.to_concept(None);
        if concept.matches_code(SNOMED_CT, "399166001") {
            "severe"
        } else if concept.matches_code(SNOMED_CT, "255604002") {
            "mild"
        } else if concept.matches_code(SNOMED_CT, "371923003") {
            "moderate"
        } else if concept.matches_code(SNOMED_CT, "6736007") {
            "moderate"
        } else if concept.matches_code(SNOMED_CT, "371924009") {
            "severe"
        } else if concept.matches_code(SNOMED_CT, "24484000") {
            "severe"
        } else {
            ""
        }
    }
}
