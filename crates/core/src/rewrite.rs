//! Conditional-update rewriting.
//!
//! Turns a create-only transaction bundle into an idempotent upsert by
//! replacing POST requests with conditional PUTs keyed on each resource
//! type's natural-key search query. A query is only emitted when every
//! required field is populated; otherwise the entry stays a create.

use chrono::TimeDelta;
use url::form_urlencoded;

use crate::bundle::{Bundle, Method};
use crate::resource::{Period, Quantity, Reference, Resource};
use crate::terminology::CodeableConcept;
use crate::time::FhirDateTime;

/// Rewrites every create entry whose natural key is fully populated into
/// a conditional update. Patient entries are keyed on their business
/// identifier; other types combine the patient reference, the principal
/// code, and a temporal anchor. ProcedureRequest has no sufficiently
/// discriminating search parameters and is never rewritten.
pub fn convert_to_conditional_updates(bundle: &mut Bundle) {
    for entry in &mut bundle.entry {
        if entry.request.method != Method::Post {
            continue;
        }

        let mut params: Vec<(&'static str, String)> = Vec::new();
        match &entry.resource {
            Resource::AllergyIntolerance(a) => {
                if let (Some(patient), Some(substance), Some(onset)) =
                    (present_ref(&a.patient), present_concept(&a.substance), a.onset)
                {
                    params.push(("patient", patient.reference.clone()));
                    params.push(("substance", concept_param(substance)));
                    params.push(("onset", date_param(onset)));
                }
            }
            Resource::Condition(c) => {
                if let (Some(patient), Some(code), Some(onset)) =
                    (present_ref(&c.patient), present_concept(&c.code), c.onset_date_time)
                {
                    params.push(("patient", patient.reference.clone()));
                    params.push(("code", concept_param(code)));
                    params.push(("onset", date_param(onset)));
                }
            }
            Resource::DiagnosticReport(d) => {
                if let (Some(patient), Some(code), Some(start)) = (
                    present_ref(&d.subject),
                    present_concept(&d.code),
                    period_start(&d.effective_period),
                ) {
                    params.push(("patient", patient.reference.clone()));
                    params.push(("code", concept_param(code)));
                    push_period_params(&mut params, "date", start);
                }
            }
            Resource::Encounter(e) => {
                let types_present = e
                    .encounter_type
                    .first()
                    .is_some_and(|t| !t.coding.is_empty());
                if let (Some(patient), true, Some(start)) =
                    (present_ref(&e.patient), types_present, period_start(&e.period))
                {
                    params.push(("patient", patient.reference.clone()));
                    // One query parameter occurrence per type concept.
                    for concept in &e.encounter_type {
                        params.push(("type", concept_param(concept)));
                    }
                    push_period_params(&mut params, "date", start);
                }
            }
            Resource::Immunization(i) => {
                if let (Some(patient), Some(code), Some(date)) =
                    (present_ref(&i.patient), present_concept(&i.vaccine_code), i.date)
                {
                    params.push(("patient", patient.reference.clone()));
                    params.push(("vaccine-code", concept_param(code)));
                    params.push(("date", date_param(date)));
                }
            }
            Resource::MedicationStatement(m) => {
                if let (Some(patient), Some(code), Some(start)) = (
                    present_ref(&m.patient),
                    present_concept(&m.medication_codeable_concept),
                    period_start(&m.effective_period),
                ) {
                    params.push(("patient", patient.reference.clone()));
                    params.push(("code", concept_param(code)));
                    push_period_params(&mut params, "effectivedate", start);
                }
            }
            Resource::Observation(o) => {
                if let (Some(patient), Some(code), Some(start)) = (
                    present_ref(&o.subject),
                    present_concept(&o.code),
                    period_start(&o.effective_period),
                ) {
                    params.push(("patient", patient.reference.clone()));
                    params.push(("code", concept_param(code)));
                    push_period_params(&mut params, "date", start);
                    // First populated value wins: concept, quantity, string.
                    if let Some(concept) = present_concept(&o.value_codeable_concept) {
                        params.push(("value-concept", concept_param(concept)));
                    } else if let Some(quantity) = present_quantity(&o.value_quantity) {
                        params.push(("value-quantity", quantity_param(quantity)));
                    } else if let Some(s) = o.value_string.as_deref().filter(|s| !s.is_empty()) {
                        params.push(("value-string", s.to_string()));
                    }
                }
            }
            Resource::Procedure(p) => {
                if let (Some(patient), Some(code), Some(start)) = (
                    present_ref(&p.subject),
                    present_concept(&p.code),
                    period_start(&p.performed_period),
                ) {
                    params.push(("patient", patient.reference.clone()));
                    params.push(("code", concept_param(code)));
                    push_period_params(&mut params, "date", start);
                }
            }
            // ProcedureRequest has no search params for code or orderedOn;
            // we can't get precise enough for a conditional update.
            Resource::ProcedureRequest(_) => {}
            Resource::Patient(p) => {
                if let Some(identifier) = p.identifier.first().filter(|i| !i.value.is_empty()) {
                    params.push(("identifier", identifier.value.clone()));
                }
            }
        }

        if params.is_empty() {
            continue;
        }
        entry.request.method = Method::Put;
        entry.request.url.push('?');
        entry.request.url.push_str(&encode(params));
    }
}

/// A reference counts as present only if non-empty.
fn present_ref(reference: &Option<Reference>) -> Option<&Reference> {
    reference.as_ref().filter(|r| !r.reference.is_empty())
}

/// A concept counts as present only if it has at least one coding.
fn present_concept(concept: &Option<CodeableConcept>) -> Option<&CodeableConcept> {
    concept.as_ref().filter(|c| !c.coding.is_empty())
}

/// A period counts as present only if its start is set.
fn period_start(period: &Option<Period>) -> Option<FhirDateTime> {
    period.as_ref().and_then(|p| p.start)
}

/// A quantity counts as present only if its numeric value is set.
fn present_quantity(quantity: &Option<Quantity>) -> Option<&Quantity> {
    quantity.as_ref().filter(|q| q.value.is_some())
}

/// Comma-joined, lexicographically sorted `system|code` list, so the
/// emitted query is deterministic.
fn concept_param(concept: &CodeableConcept) -> String {
    let mut codes: Vec<String> = concept
        .coding
        .iter()
        .map(|c| format!("{}|{}", c.system, c.code))
        .collect();
    codes.sort();
    codes.join(",")
}

fn date_param(date: FhirDateTime) -> String {
    date.time.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// Period searching has no exact-equality form, so match the start with
/// a ±1-second window: starts-after (lower−1s) and less-than (lower+1s).
fn push_period_params(params: &mut Vec<(&'static str, String)>, name: &'static str, start: FhirDateTime) {
    let lower = FhirDateTime {
        time: start.time - TimeDelta::seconds(1),
        ..start
    };
    let upper = FhirDateTime {
        time: start.time + TimeDelta::seconds(1),
        ..start
    };
    params.push((name, format!("sa{}", date_param(lower))));
    params.push((name, format!("lt{}", date_param(upper))));
}

fn quantity_param(quantity: &Quantity) -> String {
    let value = quantity.value.unwrap_or_default();
    let unit_or_code = if !quantity.code.is_empty() {
        &quantity.code
    } else {
        &quantity.unit
    };
    format!("{}|{}|{}", value, quantity.system, unit_or_code)
}

/// Percent-encodes the query with keys sorted lexicographically (values
/// for a repeated key keep their insertion order).
fn encode(mut params: Vec<(&'static str, String)>) -> String {
    params.sort_by(|a, b| a.0.cmp(b.0));
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in &params {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{BundleEntry, BundleRequest};
    use crate::resource::{self, Identifier};
    use crate::terminology::{CodeableConcept, Coding};
    use crate::time::UnixTime;

    fn concept(system: &str, code: &str) -> CodeableConcept {
        CodeableConcept {
            coding: vec![Coding {
                system: system.to_string(),
                code: code.to_string(),
                display: None,
            }],
            text: None,
        }
    }

    fn patient_ref() -> Option<Reference> {
        Some(Reference {
            reference: "urn:uuid:pat".to_string(),
        })
    }

    fn period_at(seconds: i64) -> Option<Period> {
        Some(Period {
            start: Some(UnixTime(seconds).fhir_datetime()),
            end: None,
        })
    }

    fn bundle_of(resource: Resource) -> Bundle {
        let url = resource.type_name().to_string();
        Bundle {
            resource_type: "Bundle".to_string(),
            bundle_type: "transaction".to_string(),
            entry: vec![BundleEntry {
                full_url: format!("urn:uuid:{}", resource.local_id()),
                resource,
                request: BundleRequest {
                    method: Method::Post,
                    url,
                },
            }],
        }
    }

    fn query_pairs(url: &str) -> Vec<(String, String)> {
        let (_, query) = url.split_once('?').expect("expected a query string");
        form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    }

    #[test]
    fn observation_rewrite_includes_all_four_components() {
        let observation = resource::Observation {
            id: "obs".to_string(),
            subject: patient_ref(),
            code: Some(concept("http://loinc.org", "8480-6")),
            effective_period: period_at(1_136_214_245),
            value_quantity: Some(Quantity {
                value: Some(5.0),
                unit: "mg".to_string(),
                system: "http://unitsofmeasure.org".to_string(),
                code: String::new(),
            }),
            ..Default::default()
        };
        let mut bundle = bundle_of(Resource::Observation(observation));
        convert_to_conditional_updates(&mut bundle);

        let entry = &bundle.entry[0];
        assert_eq!(entry.request.method, Method::Put);
        let pairs = query_pairs(&entry.request.url);
        assert_eq!(
            pairs,
            vec![
                ("code".to_string(), "http://loinc.org|8480-6".to_string()),
                ("date".to_string(), "sa2006-01-02T15:04:04+00:00".to_string()),
                ("date".to_string(), "lt2006-01-02T15:04:06+00:00".to_string()),
                ("patient".to_string(), "urn:uuid:pat".to_string()),
                (
                    "value-quantity".to_string(),
                    "5|http://unitsofmeasure.org|mg".to_string()
                ),
            ]
        );
    }

    #[test]
    fn observation_without_period_stays_a_create() {
        let observation = resource::Observation {
            id: "obs".to_string(),
            subject: patient_ref(),
            code: Some(concept("http://loinc.org", "8480-6")),
            value_quantity: Some(Quantity {
                value: Some(5.0),
                unit: "mg".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut bundle = bundle_of(Resource::Observation(observation));
        convert_to_conditional_updates(&mut bundle);

        assert_eq!(bundle.entry[0].request.method, Method::Post);
        assert_eq!(bundle.entry[0].request.url, "Observation");
    }

    #[test]
    fn encounter_emits_one_type_param_per_concept() {
        let encounter = resource::Encounter {
            id: "enc".to_string(),
            patient: patient_ref(),
            encounter_type: vec![
                CodeableConcept {
                    coding: vec![
                        Coding {
                            system: "http://snomed.info/sct".to_string(),
                            code: "99201".to_string(),
                            display: None,
                        },
                        Coding {
                            system: "http://www.ama-assn.org/go/cpt".to_string(),
                            code: "99201".to_string(),
                            display: None,
                        },
                    ],
                    text: None,
                },
                concept("http://snomed.info/sct", "183452005"),
            ],
            period: period_at(1_136_214_245),
            ..Default::default()
        };
        let mut bundle = bundle_of(Resource::Encounter(encounter));
        convert_to_conditional_updates(&mut bundle);

        let pairs = query_pairs(&bundle.entry[0].request.url);
        let types: Vec<&str> = pairs
            .iter()
            .filter(|(k, _)| k == "type")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(
            types,
            vec![
                "http://snomed.info/sct|99201,http://www.ama-assn.org/go/cpt|99201",
                "http://snomed.info/sct|183452005",
            ]
        );
    }

    #[test]
    fn procedure_request_is_never_rewritten() {
        let request = resource::ProcedureRequest {
            id: "req".to_string(),
            subject: patient_ref(),
            code: Some(concept("http://snomed.info/sct", "428191000124101")),
            ordered_on: Some(UnixTime(1_136_214_245).fhir_datetime()),
            ..Default::default()
        };
        let mut bundle = bundle_of(Resource::ProcedureRequest(request));
        convert_to_conditional_updates(&mut bundle);

        assert_eq!(bundle.entry[0].request.method, Method::Post);
        assert_eq!(bundle.entry[0].request.url, "ProcedureRequest");
    }

    #[test]
    fn patient_rewrite_uses_only_the_identifier() {
        let patient = resource::Patient {
            id: "pat".to_string(),
            identifier: vec![Identifier {
                identifier_type: None,
                value: "123456".to_string(),
            }],
            ..Default::default()
        };
        let mut bundle = bundle_of(Resource::Patient(patient));
        convert_to_conditional_updates(&mut bundle);

        assert_eq!(bundle.entry[0].request.method, Method::Put);
        assert_eq!(bundle.entry[0].request.url, "Patient?identifier=123456");
    }

    #[test]
    fn existing_put_entries_are_untouched() {
        let patient = resource::Patient {
            id: "pat".to_string(),
            identifier: vec![Identifier {
                identifier_type: None,
                value: "123456".to_string(),
            }],
            ..Default::default()
        };
        let mut bundle = bundle_of(Resource::Patient(patient));
        bundle.entry[0].request.method = Method::Put;
        bundle.entry[0].request.url = "Patient?identifier=123456".to_string();
        convert_to_conditional_updates(&mut bundle);

        // No second query string appended.
        assert_eq!(bundle.entry[0].request.url, "Patient?identifier=123456");
    }

    #[test]
    fn multi_codings_are_sorted_and_comma_joined() {
        let mut condition = resource::Condition {
            id: "cond".to_string(),
            patient: patient_ref(),
            onset_date_time: Some(UnixTime(1_136_214_245).fhir_datetime()),
            ..Default::default()
        };
        condition.code = Some(CodeableConcept {
            coding: vec![
                Coding {
                    system: "http://snomed.info/sct".to_string(),
                    code: "16356006".to_string(),
                    display: None,
                },
                Coding {
                    system: "http://hl7.org/fhir/sid/icd-9".to_string(),
                    code: "313.1".to_string(),
                    display: None,
                },
            ],
            text: None,
        });
        let mut bundle = bundle_of(Resource::Condition(condition));
        convert_to_conditional_updates(&mut bundle);

        let pairs = query_pairs(&bundle.entry[0].request.url);
        let code = pairs.iter().find(|(k, _)| k == "code").unwrap();
        assert_eq!(
            code.1,
            "http://hl7.org/fhir/sid/icd-9|313.1,http://snomed.info/sct|16356006"
        );
    }
}
