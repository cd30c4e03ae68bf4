//! Immunization conversion.

use serde::Deserialize;

use crate::entry::Entry;
use crate::error::ConvertError;
use crate::patient::Patient;
use crate::resource::{self, Resource};

/// An administered (or refused) immunization.
#[derive(Debug, Default, Deserialize)]
pub struct Immunization {
    #[serde(flatten)]
    pub entry: Entry,
    #[serde(default, rename = "seriesNumber")]
    pub series_number: Option<u32>,
}

impl Immunization {
    pub fn fhir_models(&self, patient: &Patient) -> Result<Vec<Resource>, ConvertError> {
        let mut immunization = resource::Immunization {
            id: self.entry.temp_id.get().to_string(),
            status: "completed".to_string(),
            date: self.entry.time.map(|t| t.fhir_datetime()),
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
        if let Some(series) = self.series_number {
            immunization.vaccination_protocol = vec![resource::VaccinationProtocol {
                dose_sequence: series,
            }];
        }

        // Ignoring dosage, route, etc.

        Ok(vec![Resource::Immunization(immunization)])
    }
}
