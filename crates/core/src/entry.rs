//! The common shape shared by every dated clinical fact.

use serde::Deserialize;

use crate::resource::{Period, Reference};
use crate::temp_id::TempId;
use crate::terminology::{CodeMap, CodeObject};
use crate::time::UnixTime;

/// Mood code marking a fact as a request/order rather than something
/// that happened.
pub const REQUEST_MOOD: &str = "RQO";

/// A single dated clinical fact: time bounds, codes, status, negation,
/// mood, and free-text description. Specialized facts flatten this in.
#[derive(Debug, Default, Deserialize)]
pub struct Entry {
    #[serde(skip)]
    pub temp_id: TempId,
    #[serde(default)]
    pub start_time: Option<UnixTime>,
    #[serde(default)]
    pub end_time: Option<UnixTime>,
    #[serde(default)]
    pub time: Option<UnixTime>,
    #[serde(default)]
    pub oid: String,
    #[serde(default)]
    pub codes: CodeMap,
    #[serde(default)]
    pub mood_code: String,
    #[serde(default, rename = "negationInd")]
    pub negation_ind: bool,
    #[serde(default, rename = "negationReason")]
    pub negation_reason: Option<CodeObject>,
    #[serde(default)]
    pub status_code: CodeMap,
    #[serde(default)]
    pub description: Option<String>,
}

impl Entry {
    /// The fact's time bounds as a FHIR period, if any bound is set.
    pub fn period(&self) -> Option<Period> {
        if self.start_time.is_none() && self.end_time.is_none() {
            return None;
        }
        Some(Period {
            start: self.start_time.map(|t| t.fhir_datetime()),
            end: self.end_time.map(|t| t.fhir_datetime()),
        })
    }

    /// A same-submission reference to the resource this fact becomes.
    pub fn reference(&self) -> Reference {
        self.temp_id.reference()
    }

    /// Whether the fact is a request/order rather than a performed act.
    pub fn is_request_mood(&self) -> bool {
        self.mood_code == REQUEST_MOOD
    }

    /// True when both start and end are present and differ, i.e. the end
    /// date is a real end and not just a copy of the start.
    pub fn has_distinct_end(&self) -> bool {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => start != end,
            _ => false,
        }
    }
}
