//! hds-fhir-core: converts health-data-standards patient records into
//! FHIR transaction bundles.
//!
//! A record is parsed into [`Patient`] and its dated clinical facts,
//! converted fact-by-fact into a flat resource list with stable
//! cross-references, wrapped into a single atomic [`Bundle`], and
//! optionally rewritten so every sufficiently-keyed entry becomes an
//! idempotent conditional update.

pub mod allergy;
pub mod bundle;
pub mod condition;
pub mod encounter;
pub mod entry;
pub mod error;
pub mod immunization;
pub mod medication;
pub mod patient;
pub mod procedure;
pub mod resource;
pub mod result_value;
pub mod rewrite;
pub mod temp_id;
pub mod terminology;
pub mod time;
pub mod vital_sign;

pub use bundle::{Bundle, BundleEntry, BundleRequest, Method};
pub use entry::Entry;
pub use error::ConvertError;
pub use patient::Patient;
pub use resource::Resource;
pub use rewrite::convert_to_conditional_updates;
pub use temp_id::TempId;
pub use time::{FhirDateTime, Precision, UnixTime};
