//! Time representations for HDS input and FHIR output.
//!
//! HDS records carry times as Unix-epoch seconds; FHIR wants ISO 8601
//! strings whose precision depends on the element (full timestamps for
//! onsets and periods, bare dates for birth dates).

use chrono::{DateTime, Months, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A point in time as Unix-epoch seconds, the HDS wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnixTime(pub i64);

impl UnixTime {
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// This time at full timestamp precision.
    pub fn fhir_datetime(&self) -> FhirDateTime {
        FhirDateTime {
            time: self.datetime(),
            precision: Precision::Timestamp,
        }
    }

    /// This time at date precision.
    pub fn fhir_date(&self) -> FhirDateTime {
        FhirDateTime {
            time: self.datetime(),
            precision: Precision::Date,
        }
    }

    /// Shift this time by whole calendar years, used to age synthetic
    /// records at upload time.
    pub fn offset_years(self, years: i32) -> UnixTime {
        let dt = self.datetime();
        let shifted = if years >= 0 {
            dt.checked_add_months(Months::new(years.unsigned_abs() * 12))
        } else {
            dt.checked_sub_months(Months::new(years.unsigned_abs() * 12))
        };
        UnixTime(shifted.unwrap_or(dt).timestamp())
    }
}

/// How precisely a [`FhirDateTime`] serializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Timestamp,
    Date,
}

/// A FHIR dateTime element with its serialization precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FhirDateTime {
    pub time: DateTime<Utc>,
    pub precision: Precision,
}

impl Serialize for FhirDateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let formatted = match self.precision {
            Precision::Timestamp => self.time.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
            Precision::Date => self.time.format("%Y-%m-%d").to_string(),
        };
        serializer.serialize_str(&formatted)
    }
}

impl<'de> Deserialize<'de> for FhirDateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(FhirDateTime {
                time: parsed.with_timezone(&Utc),
                precision: Precision::Timestamp,
            });
        }
        let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(serde::de::Error::custom)?;
        let time = date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or(DateTime::UNIX_EPOCH);
        Ok(FhirDateTime {
            time,
            precision: Precision::Date,
        })
    }
}
