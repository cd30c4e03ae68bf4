//! Transaction bundle assembly.

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::error::ConvertError;
use crate::patient::Patient;
use crate::resource::Resource;

/// HTTP request method for a bundle entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Post,
    Put,
}

/// Per-entry request semantics: create (POST to the type URL) or update
/// (PUT to a conditional query URL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleRequest {
    pub method: Method,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    pub full_url: String,
    pub resource: Resource,
    pub request: BundleRequest,
}

/// A single atomic submission unit. Built once per patient conversion
/// and never mutated after the conditional-update rewrite pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub resource_type: String,
    #[serde(rename = "type")]
    pub bundle_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<BundleEntry>,
}

impl Patient {
    /// Builds a transaction bundle posting all of the patient's data to
    /// a server. Every entry defaults to a create request; when
    /// `conditional_update` is set the patient resource alone is keyed
    /// on its business identifier at build time (everything else is the
    /// rewriter's job).
    pub fn transaction_bundle(&self, conditional_update: bool) -> Result<Bundle, ConvertError> {
        let entry = self
            .fhir_models()?
            .into_iter()
            .map(|resource| {
                let full_url = format!("urn:uuid:{}", resource.local_id());
                let request = match &resource {
                    Resource::Patient(p)
                        if conditional_update
                            && p.identifier.first().is_some_and(|i| !i.value.is_empty()) =>
                    {
                        let query: String = form_urlencoded::Serializer::new(String::new())
                            .append_pair("identifier", &p.identifier[0].value)
                            .finish();
                        BundleRequest {
                            method: Method::Put,
                            url: format!("Patient?{query}"),
                        }
                    }
                    _ => BundleRequest {
                        method: Method::Post,
                        url: resource.type_name().to_string(),
                    },
                };
                BundleEntry {
                    full_url,
                    resource,
                    request,
                }
            })
            .collect();

        Ok(Bundle {
            resource_type: "Bundle".to_string(),
            bundle_type: "transaction".to_string(),
            entry,
        })
    }
}
