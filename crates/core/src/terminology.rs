//! Terminology mapping: HDS code-system names to canonical URIs, and the
//! coded-concept types built from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const SNOMED_CT: &str = "http://snomed.info/sct";
pub const LOINC: &str = "http://loinc.org";
pub const ACT_STATUS: &str = "http://hl7.org/fhir/ValueSet/v3-ActStatus";

/// Resolve an HDS code-system name to its canonical URI.
///
/// Unknown names resolve to an empty URI rather than failing: an
/// unmappable vocabulary must never abort a conversion.
pub fn code_system_uri(name: &str) -> &'static str {
    match name {
        "CPT" => "http://www.ama-assn.org/go/cpt",
        "LOINC" => LOINC,
        "SNOMED-CT" => SNOMED_CT,
        "RxNorm" => "http://www.nlm.nih.gov/research/umls/rxnorm",
        "ICD-9-CM" => "http://hl7.org/fhir/sid/icd-9",
        "ICD-10-CM" => "http://hl7.org/fhir/sid/icd-10",
        "ICD-9-PCS" => "http://hl7.org/fhir/sid/icd-9",
        "ICD-10-PCS" => "http://hl7.org/fhir/sid/icd-10",
        "NDC" => "http://www.fda.gov/Drugs/InformationOnDrugs",
        "CVX" => "http://www2a.cdc.gov/vaccines/iis/iisstandards/vaccines.asp?rpt=cvx",
        "HCP" => "urn:oid:2.16.840.1.113883.6.14",
        "HCPCS" => "urn:oid:2.16.840.1.113883.6.285",
        "HL7 Marital Status" => "http://hl7.org/fhir/ValueSet/v3-MaritalStatus",
        "HITSP C80 Observation Status" => "http://hl7.org/fhir/ValueSet/v3-ObservationInterpretation",
        "NCI Thesaurus" => "urn:oid:2.16.840.1.113883.3.26.1.1",
        "FDA SPL" => "urn:oid:2.16.840.1.113883.3.26.1.1",
        "FDA" => "urn:oid:2.16.840.1.113883.3.88.12.80.20",
        "UNII" => "http://fdasis.nlm.nih.gov",
        "HL7 ActStatus" => ACT_STATUS,
        "HL7 Healthcare Service Location" => "urn:oid:2.16.840.1.113883.6.259",
        "HSLOC" => "urn:oid:2.16.840.1.113883.6.259",
        "DischargeDisposition" => "urn:oid:2.16.840.1.113883.12.112",
        "HL7 Act Code" => "http://hl7.org/fhir/ValueSet/v3-ActCode",
        "HL7 Relationship Code" => "urn:oid:2.16.840.1.113883.1.11.18877",
        "CDC Race" => "urn:oid:2.16.840.1.113883.6.238",
        "NLM Mesh" => "urn:oid:2.16.840.1.113883.6.177",
        "Religious Affiliation" => "http://hl7.org/fhir/ValueSet/v3-ReligiousAffiliation",
        "HL7 ActNoImmunicationReason" => "urn:oid:2.16.840.1.113883.1.11.19717",
        "NUBC" => "urn:oid:2.16.840.1.113883.3.88.12.80.33",
        "HL7 Observation Interpretation" => "urn:oid:2.16.840.1.113883.1.11.78",
        "Source of Payment Typology" => "urn:oid:2.16.840.1.113883.3.221.5",
        "SOP" => "urn:oid:2.16.840.1.113883.3.221.5",
        "CDT" => "urn:oid:2.16.840.1.113883.6.13",
        "AdministrativeSex" => "urn:oid:2.16.840.1.113883.18.2",
        _ => "",
    }
}

/// A single (system, code) pair in a coded concept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coding {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub system: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// A set of codings plus optional display text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    /// First-match predicate used by every status/severity mapping table.
    pub fn matches_code(&self, system: &str, code: &str) -> bool {
        self.coding
            .iter()
            .any(|c| c.system == system && c.code == code)
    }
}

/// A multi-valued code map, keyed by HDS code-system name.
///
/// A `BTreeMap` keeps coding order deterministic so repeated conversions
/// of the same record produce byte-identical bundles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeMap(pub BTreeMap<String, Vec<String>>);

impl CodeMap {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any code under the named system is present.
    pub fn has_system(&self, system: &str) -> bool {
        self.0.contains_key(system)
    }

    pub fn to_concept(&self, text: Option<&str>) -> CodeableConcept {
        let mut coding = Vec::new();
        for (system, codes) in &self.0 {
            let uri = code_system_uri(system);
            for code in codes {
                coding.push(Coding {
                    system: uri.to_string(),
                    code: code.clone(),
                    display: None,
                });
            }
        }
        CodeableConcept {
            coding,
            text: text.filter(|t| !t.is_empty()).map(str::to_string),
        }
    }
}

/// A single code with its code-system name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeObject {
    #[serde(default)]
    pub code: String,
    #[serde(default, rename = "codeSystem")]
    pub code_system: String,
}

impl CodeObject {
    pub fn to_concept(&self, text: Option<&str>) -> CodeableConcept {
        CodeableConcept {
            coding: vec![Coding {
                system: code_system_uri(&self.code_system).to_string(),
                code: self.code.clone(),
                display: None,
            }],
            text: text.filter(|t| !t.is_empty()).map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_known_code_systems() {
        assert_eq!(code_system_uri("SNOMED-CT"), "http://snomed.info/sct");
        assert_eq!(code_system_uri("LOINC"), "http://loinc.org");
        assert_eq!(
            code_system_uri("CVX"),
            "http://www2a.cdc.gov/vaccines/iis/iisstandards/vaccines.asp?rpt=cvx"
        );
    }

    #[test]
    fn unknown_code_system_resolves_to_empty_uri() {
        assert_eq!(code_system_uri("Completely Made Up"), "");
    }

    #[test]
    fn code_map_builds_concept_with_all_codings() {
        let map: CodeMap = serde_json::from_value(json!({
            "SNOMED-CT": ["1234", "5678"],
            "LOINC": ["8480-6"]
        }))
        .unwrap();
        let concept = map.to_concept(Some("Systolic BP"));
        assert_eq!(concept.coding.len(), 3);
        assert!(concept.matches_code(SNOMED_CT, "5678"));
        assert!(concept.matches_code(LOINC, "8480-6"));
        assert!(!concept.matches_code(SNOMED_CT, "8480-6"));
        assert_eq!(concept.text.as_deref(), Some("Systolic BP"));
    }

    #[test]
    fn code_map_concept_order_is_deterministic() {
        let map: CodeMap = serde_json::from_value(json!({
            "SNOMED-CT": ["1234"],
            "LOINC": ["8480-6"]
        }))
        .unwrap();
        // BTreeMap ordering: LOINC before SNOMED-CT.
        let concept = map.to_concept(None);
        assert_eq!(concept.coding[0].code, "8480-6");
        assert_eq!(concept.coding[1].code, "1234");
    }

    #[test]
    fn code_object_builds_single_coding() {
        let obj = CodeObject {
            code: "55561003".to_string(),
            code_system: "SNOMED-CT".to_string(),
        };
        let concept = obj.to_concept(None);
        assert_eq!(concept.coding.len(), 1);
        assert!(concept.matches_code(SNOMED_CT, "55561003"));
    }
}
