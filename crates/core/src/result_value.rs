//! Result values: physical quantities or coded results attached to vital
//! signs and procedures.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer};

use crate::resource::{self, Quantity};
use crate::temp_id::TempId;
use crate::terminology::CodeMap;

/// A tagged result value. The serialized form carries an explicit
/// `_type` discriminator; anything unrecognized is treated as physical.
#[derive(Debug, Default)]
pub struct ResultValue {
    pub temp_id: TempId,
    pub physical: Option<PhysicalQuantityResult>,
    pub coded: Option<CodedResult>,
}

/// A numeric scalar with a unit. The scalar arrives as a string and may
/// not parse as a number.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhysicalQuantityResult {
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub scalar: String,
}

/// A terminology-coded result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodedResult {
    #[serde(default)]
    pub codes: CodeMap,
    #[serde(default)]
    pub description: String,
}

impl ResultValue {
    /// Builds the bare observation for this value. A scalar that fails
    /// numeric parsing degrades to a string value rather than failing
    /// the conversion.
    pub fn observation(&self) -> resource::Observation {
        let mut observation = resource::Observation {
            id: self.temp_id.get().to_string(),
            status: "final".to_string(),
            ..Default::default()
        };

        if let Some(physical) = &self.physical {
            match physical.scalar.parse::<f64>() {
                Ok(value) => {
                    observation.value_quantity = Some(Quantity {
                        value: Some(value),
                        unit: physical.unit.clone(),
                        ..Default::default()
                    });
                }
                Err(_) => observation.value_string = Some(physical.scalar.clone()),
            }
        } else if let Some(coded) = &self.coded {
            let text = (!coded.description.is_empty()).then_some(coded.description.as_str());
            observation.value_codeable_concept = Some(coded.codes.to_concept(text));
        }

        observation
    }

    /// A same-submission reference to this value's observation.
    pub fn reference(&self) -> resource::Reference {
        self.temp_id.reference()
    }
}

impl<'de> Deserialize<'de> for ResultValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        let tag = raw.get("_type").and_then(|t| t.as_str()).unwrap_or("");

        let mut value = ResultValue::default();
        match tag {
            "CodedResultValue" => {
                value.coded = Some(CodedResult::deserialize(&raw).map_err(D::Error::custom)?);
            }
            // PhysicalQuantityResultValue, and the default for anything
            // without a recognized tag.
            _ => {
                value.physical =
                    Some(PhysicalQuantityResult::deserialize(&raw).map_err(D::Error::custom)?);
            }
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tag_selects_the_variant() {
        let value: ResultValue = serde_json::from_value(json!({
            "_type": "CodedResultValue",
            "codes": { "SNOMED-CT": ["260385009"] },
            "description": "Negative"
        }))
        .unwrap();
        assert!(value.coded.is_some());
        assert!(value.physical.is_none());

        let value: ResultValue = serde_json::from_value(json!({
            "_type": "PhysicalQuantityResultValue",
            "scalar": "120",
            "unit": "mmHg"
        }))
        .unwrap();
        assert!(value.physical.is_some());
    }

    #[test]
    fn missing_tag_defaults_to_physical() {
        let value: ResultValue =
            serde_json::from_value(json!({ "scalar": "98.6", "unit": "degF" })).unwrap();
        assert_eq!(value.physical.unwrap().scalar, "98.6");
    }

    #[test]
    fn numeric_scalar_becomes_a_quantity() {
        let value: ResultValue =
            serde_json::from_value(json!({ "scalar": "120", "unit": "mmHg" })).unwrap();
        let observation = value.observation();
        let quantity = observation.value_quantity.unwrap();
        assert_eq!(quantity.value, Some(120.0));
        assert_eq!(quantity.unit, "mmHg");
        assert!(observation.value_string.is_none());
    }

    #[test]
    fn non_numeric_scalar_degrades_to_a_string() {
        let value: ResultValue =
            serde_json::from_value(json!({ "scalar": "trace", "unit": "" })).unwrap();
        let observation = value.observation();
        assert!(observation.value_quantity.is_none());
        assert_eq!(observation.value_string.as_deref(), Some("trace"));
    }
}
