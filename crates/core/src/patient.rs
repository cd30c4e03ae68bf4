//! The patient record and its aggregate conversion.

use serde::Deserialize;

use crate::allergy::Allergy;
use crate::condition::Condition;
use crate::encounter::Encounter;
use crate::entry::Entry;
use crate::error::ConvertError;
use crate::immunization::Immunization;
use crate::medication::Medication;
use crate::procedure::Procedure;
use crate::resource::{self, Resource};
use crate::temp_id::TempId;
use crate::terminology::{CodeableConcept, Coding};
use crate::time::UnixTime;
use crate::vital_sign::VitalSign;

/// A patient with their dated clinical facts. Owns every fact; facts
/// reach back to the patient through the conversion context rather than
/// a stored pointer.
#[derive(Debug, Default, Deserialize)]
pub struct Patient {
    #[serde(skip)]
    pub temp_id: TempId,
    #[serde(default)]
    pub medical_record_number: String,
    #[serde(default, rename = "first")]
    pub first_name: String,
    #[serde(default, rename = "last")]
    pub last_name: String,
    #[serde(default, rename = "birthdate")]
    pub birth_time: Option<UnixTime>,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub encounters: Vec<Encounter>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub vital_signs: Vec<VitalSign>,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub immunizations: Vec<Immunization>,
    #[serde(default)]
    pub allergies: Vec<Allergy>,
}

impl Patient {
    /// Parse a single serialized patient record. A malformed document
    /// fails the whole conversion, there are no partial results.
    pub fn from_json(data: &[u8]) -> Result<Patient, ConvertError> {
        Ok(serde_json::from_slice(data)?)
    }

    /// A same-submission reference to the patient resource.
    pub fn reference(&self) -> resource::Reference {
        self.temp_id.reference()
    }

    /// The first declared encounter whose interval overlaps the fact's
    /// interval (inclusive on both ends). Missing bounds compare as the
    /// epoch. No closest-match heuristic; first declared overlap wins.
    pub fn matching_encounter_reference(&self, entry: &Entry) -> Option<resource::Reference> {
        let start = entry.start_time.unwrap_or(UnixTime(0));
        let end = entry.end_time.unwrap_or(UnixTime(0));
        self.encounters
            .iter()
            .find(|encounter| {
                encounter.entry.start_time.unwrap_or(UnixTime(0)) <= end
                    && encounter.entry.end_time.unwrap_or(UnixTime(0)) >= start
            })
            .map(|encounter| encounter.entry.reference())
    }

    /// The patient resource itself, demographics only.
    pub fn fhir_model(&self) -> resource::Patient {
        let mut fhir_patient = resource::Patient {
            id: self.temp_id.get().to_string(),
            identifier: Vec::new(),
            name: vec![resource::HumanName {
                given: vec![self.first_name.clone()],
                family: vec![self.last_name.clone()],
            }],
            gender: match self.gender.as_str() {
                "M" => "male".to_string(),
                "F" => "female".to_string(),
                _ => "unknown".to_string(),
            },
            birth_date: self.birth_time.map(|t| t.fhir_date()),
        };

        if !self.medical_record_number.is_empty() {
            fhir_patient.identifier = vec![resource::Identifier {
                identifier_type: Some(CodeableConcept {
                    coding: vec![Coding {
                        system: "http://hl7.org/fhir/v2/0203".to_string(),
                        code: "MR".to_string(),
                        display: Some("Medical Record Number".to_string()),
                    }],
                    text: Some("Medical Record Number".to_string()),
                }),
                value: self.medical_record_number.clone(),
            }];
        }

        fhir_patient
    }

    /// Converts the whole record into a flat resource list: the patient
    /// first, then each fact category in a fixed order so repeated
    /// conversions produce identical bundles.
    pub fn fhir_models(&self) -> Result<Vec<Resource>, ConvertError> {
        let mut models = vec![Resource::Patient(self.fhir_model())];
        for encounter in &self.encounters {
            models.extend(encounter.fhir_models(self)?);
        }
        for condition in &self.conditions {
            models.extend(condition.fhir_models(self)?);
        }
        for vital_sign in &self.vital_signs {
            models.extend(vital_sign.fhir_models(self)?);
        }
        for procedure in &self.procedures {
            models.extend(procedure.fhir_models(self)?);
        }
        for medication in &self.medications {
            models.extend(medication.fhir_models(self)?);
        }
        for immunization in &self.immunizations {
            models.extend(immunization.fhir_models(self)?);
        }
        for allergy in &self.allergies {
            models.extend(allergy.fhir_models(self)?);
        }

        Ok(models)
    }
}
