//! Procedure conversion: performed procedures (optionally fanning out
//! into a diagnostic report plus observations) and procedure requests.

use serde::Deserialize;

use crate::entry::Entry;
use crate::error::ConvertError;
use crate::patient::Patient;
use crate::resource::{self, Resource};
use crate::result_value::ResultValue;
use crate::temp_id::TempId;
use crate::terminology::{ACT_STATUS, CodeObject, CodeableConcept, Coding, LOINC};

/// A procedure, possibly with an anatomical target and result values.
#[derive(Debug, Default, Deserialize)]
pub struct Procedure {
    #[serde(flatten)]
    pub entry: Entry,
    #[serde(default, rename = "anatomical_target")]
    pub anatomical_target: Option<CodeObject>,
    #[serde(default)]
    pub values: Vec<ResultValue>,
}

impl Procedure {
    pub fn fhir_models(&self, patient: &Patient) -> Result<Vec<Resource>, ConvertError> {
        if self.is_request() {
            return self.convert_request(patient);
        }

        self.convert_performed(patient)
    }

    /// A procedure that was merely ordered or otherwise never happened
    /// converts to a ProcedureRequest instead of a Procedure.
    fn is_request(&self) -> bool {
        let concept = self.entry.status_code.to_concept(None);
        concept.matches_code(ACT_STATUS, "cancelled")
            || concept.matches_code(ACT_STATUS, "held")
            || concept.matches_code(ACT_STATUS, "new")
            || concept.matches_code(ACT_STATUS, "suspended")
            || concept.matches_code(ACT_STATUS, "nullified")
            // "ordered" and "recommended" are not real ActStatuses, but
            // HDS uses them.
            || concept.matches_code(ACT_STATUS, "ordered")
            || concept.matches_code(ACT_STATUS, "recommended")
            || self.entry.is_request_mood()
    }

    fn convert_performed(&self, patient: &Patient) -> Result<Vec<Resource>, ConvertError> {
        let code = self.entry.codes.to_concept(self.entry.description.as_deref());
        let encounter = patient.matching_encounter_reference(&self.entry);

        let mut procedure = resource::Procedure {
            id: self.entry.temp_id.get().to_string(),
            subject: Some(patient.reference()),
            status: self.performed_status().to_string(),
            code: Some(code.clone()),
            not_performed: self.entry.negation_ind.then_some(true),
            reason_not_performed: Vec::new(),
            body_site: Vec::new(),
            performed_period: self.entry.period(),
            encounter: encounter.clone(),
            report: Vec::new(),
        };
        if let Some(reason) = &self.entry.negation_reason {
            procedure.reason_not_performed = vec![reason.to_concept(None)];
        }
        if let Some(target) = &self.anatomical_target {
            procedure.body_site = vec![target.to_concept(None)];
        }

        if self.values.is_empty() {
            return Ok(vec![Resource::Procedure(procedure)]);
        }

        // Result values fan out into a diagnostic report plus one
        // observation per value. The report identifier must exist before
        // the report itself so the procedure can point at it.
        let report_id = TempId::default();
        procedure.report = vec![report_id.reference()];

        let mut report = resource::DiagnosticReport {
            id: report_id.get().to_string(),
            status: "final".to_string(),
            code: Some(CodeableConcept {
                coding: vec![Coding {
                    system: LOINC.to_string(),
                    code: "59776-5".to_string(),
                    display: Some("Procedure findings narrative".to_string()),
                }],
                text: Some("Procedure findings narrative".to_string()),
            }),
            subject: Some(patient.reference()),
            encounter: encounter.clone(),
            effective_period: self.entry.period(),
            // Not perfect, but issued is a required field.
            issued: self.entry.end_time.map(|t| t.fhir_datetime()),
            result: Vec::new(),
        };

        let mut observations = Vec::with_capacity(self.values.len());
        for value in &self.values {
            let mut observation = value.observation();
            observation.code = Some(code.clone());
            observation.subject = Some(patient.reference());
            observation.encounter = encounter.clone();
            observation.effective_period = self.entry.period();
            report.result.push(value.reference());
            observations.push(Resource::Observation(observation));
        }

        let mut models = vec![
            Resource::Procedure(procedure),
            Resource::DiagnosticReport(report),
        ];
        models.extend(observations);
        Ok(models)
    }

    /// Maps the status to the required procedure-status value set.
    fn performed_status(&self) -> &'static str {
        let concept = self.entry.status_code.to_concept(None);
        if concept.matches_code(ACT_STATUS, "aborted") {
            "aborted"
        } else if concept.matches_code(ACT_STATUS, "active") {
            "in-progress"
        } else if concept.matches_code(ACT_STATUS, "obsolete") {
            "entered-in-error"
        } else if self.entry.status_code.is_empty() && self.entry.end_time.is_none() {
            "in-progress"
        } else {
            "completed"
        }
    }

    fn convert_request(&self, patient: &Patient) -> Result<Vec<Resource>, ConvertError> {
        let mut request = resource::ProcedureRequest {
            id: self.entry.temp_id.get().to_string(),
            subject: Some(patient.reference()),
            status: self.request_status().to_string(),
            code: Some(self.entry.codes.to_concept(self.entry.description.as_deref())),
            body_site: Vec::new(),
            ordered_on: self
                .entry
                .time
                .or(self.entry.start_time)
                .or(self.entry.end_time)
                .map(|t| t.fhir_datetime()),
            encounter: patient.matching_encounter_reference(&self.entry),
        };
        if let Some(target) = &self.anatomical_target {
            request.body_site = vec![target.to_concept(None)];
        }

        Ok(vec![Resource::ProcedureRequest(request)])
    }

    /// Maps the status to the required procedure-request-status value
    /// set. Unmapped statuses are assumed "accepted".
    fn request_status(&self) -> &'static str {
        if self.entry.negation_ind {
            return "rejected";
        }

        let concept = self.entry.status_code.to_concept(None);
        if concept.matches_code(ACT_STATUS, "cancelled") {
            "rejected"
        } else if concept.matches_code(ACT_STATUS, "held") {
            "suspended"
        } else if concept.matches_code(ACT_STATUS, "suspended") {
            "suspended"
        } else if concept.matches_code(ACT_STATUS, "nullified") {
            "rejected"
        } else if concept.matches_code(ACT_STATUS, "recommended") {
            // Not a real ActStatus, but HDS uses it.
            "proposed"
        } else {
            "accepted"
        }
    }
}
