//! Vital sign conversion.

use serde::Deserialize;

use crate::entry::Entry;
use crate::error::ConvertError;
use crate::patient::Patient;
use crate::resource::{self, Resource};
use crate::result_value::ResultValue;
use crate::terminology::CodeObject;

/// A vital sign with at most one result value.
#[derive(Debug, Default, Deserialize)]
pub struct VitalSign {
    #[serde(flatten)]
    pub entry: Entry,
    #[serde(default)]
    pub interpretation: Option<CodeObject>,
    #[serde(default)]
    pub values: Vec<ResultValue>,
}

impl VitalSign {
    pub fn fhir_models(&self, patient: &Patient) -> Result<Vec<Resource>, ConvertError> {
        // An observation can hold only one value. More than one means the
        // record violates the contract and must be rejected, not trimmed.
        let mut observation = match self.values.as_slice() {
            [] => resource::Observation {
                id: self.entry.temp_id.get().to_string(),
                ..Default::default()
            },
            [value] => value.observation(),
            more => return Err(ConvertError::TooManyResultValues(more.len())),
        };

        observation.code = Some(self.entry.codes.to_concept(self.entry.description.as_deref()));
        observation.encounter = patient.matching_encounter_reference(&self.entry);
        observation.effective_period = self.entry.period();
        if let Some(interpretation) = &self.interpretation {
            observation.interpretation = Some(interpretation.to_concept(None));
        }
        observation.subject = Some(patient.reference());

        Ok(vec![Resource::Observation(observation)])
    }
}
