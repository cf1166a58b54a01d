//! Blood-gas panel values as received from clients or the OCR path.
//!
//! `ClinicalInputs` keeps absent values distinct from zero: a field is
//! either `Some(finite)` or `None`. Construction is the only place values
//! are checked, so everything downstream can rely on finiteness.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use super::enums::SampleType;

/// kPa → mmHg conversion factor for partial pressures.
pub const KPA_TO_MMHG: f64 = 7.5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("Blood gas data is required")]
    MissingPanel,

    #[error("Required value missing: {0}")]
    MissingRequired(&'static str),

    #[error("Value for {field} is not numeric: {value}")]
    NotNumeric { field: &'static str, value: String },

    #[error("Value for {field} is not a finite number")]
    NonFinite { field: &'static str },

    #[error("Value for {field} is out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("Invalid {field}: {value}")]
    InvalidEnum { field: String, value: String },
}

// ═══════════════════════════════════════════════════════════
// Fields
// ═══════════════════════════════════════════════════════════

/// Every numeric field a panel may carry, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Ph,
    Pco2,
    Po2,
    Hco3,
    Be,
    Sodium,
    Potassium,
    Chloride,
    Lactate,
    Glucose,
    Albumin,
    Calcium,
    Hb,
    Fio2,
}

impl Field {
    pub const ALL: [Field; 14] = [
        Field::Ph,
        Field::Pco2,
        Field::Po2,
        Field::Hco3,
        Field::Be,
        Field::Sodium,
        Field::Potassium,
        Field::Chloride,
        Field::Lactate,
        Field::Glucose,
        Field::Albumin,
        Field::Calcium,
        Field::Hb,
        Field::Fio2,
    ];

    /// Wire name used by clients and the OCR prompt.
    pub fn key(&self) -> &'static str {
        match self {
            Field::Ph => "ph",
            Field::Pco2 => "pco2",
            Field::Po2 => "po2",
            Field::Hco3 => "hco3",
            Field::Be => "be",
            Field::Sodium => "sodium",
            Field::Potassium => "potassium",
            Field::Chloride => "chloride",
            Field::Lactate => "lactate",
            Field::Glucose => "glucose",
            Field::Albumin => "albumin",
            Field::Calcium => "calcium",
            Field::Hb => "hb",
            Field::Fio2 => "fio2",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Field::Ph => "pH",
            Field::Pco2 => "pCO2",
            Field::Po2 => "pO2",
            Field::Hco3 => "HCO3-",
            Field::Be => "Base excess",
            Field::Sodium => "Na+",
            Field::Potassium => "K+",
            Field::Chloride => "Cl-",
            Field::Lactate => "Lactate",
            Field::Glucose => "Glucose",
            Field::Albumin => "Albumin",
            Field::Calcium => "Ca2+",
            Field::Hb => "Haemoglobin",
            Field::Fio2 => "FiO2",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Field::Ph => "",
            Field::Pco2 | Field::Po2 => "kPa",
            Field::Albumin | Field::Hb => "g/L",
            Field::Fio2 => "%",
            _ => "mmol/L",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

// ═══════════════════════════════════════════════════════════
// ClinicalInputs
// ═══════════════════════════════════════════════════════════

/// Validated numeric panel. Immutable once built.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClinicalInputs {
    values: [Option<f64>; 14],
}

impl ClinicalInputs {
    /// Build from explicit pairs. Rejects non-finite numbers and an
    /// impossible FiO2.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, InputError>
    where
        I: IntoIterator<Item = (Field, f64)>,
    {
        let mut inputs = Self::default();
        for (field, value) in pairs {
            inputs.values[field.index()] = Some(check_value(field, value)?);
        }
        Ok(inputs)
    }

    /// Strict construction from a JSON object of values.
    ///
    /// Numbers and numeric strings are accepted; `null`, `""` and missing
    /// keys are absent; anything else is an error naming the field.
    pub fn from_json_strict(values: &Value) -> Result<Self, InputError> {
        let map = values.as_object().ok_or(InputError::MissingPanel)?;
        let mut inputs = Self::default();
        for field in Field::ALL {
            let Some(raw) = map.get(field.key()) else {
                continue;
            };
            if let Some(number) = coerce_number(field, raw)? {
                inputs.values[field.index()] = Some(check_value(field, number)?);
            }
        }
        Ok(inputs)
    }

    /// Lenient construction for OCR output: invalid values are dropped.
    pub fn from_json_lenient(values: &Value) -> Self {
        let mut inputs = Self::default();
        let Some(map) = values.as_object() else {
            return inputs;
        };
        for field in Field::ALL {
            let parsed = map
                .get(field.key())
                .and_then(|raw| coerce_number(field, raw).ok().flatten())
                .and_then(|n| check_value(field, n).ok());
            if parsed.is_none() && map.get(field.key()).is_some_and(|v| !v.is_null()) {
                tracing::debug!(field = field.key(), "Dropping unusable OCR value");
            }
            inputs.values[field.index()] = parsed;
        }
        inputs
    }

    /// The analysis entry point needs at least pH and pCO2.
    pub fn require_core(&self) -> Result<(), InputError> {
        if self.ph().is_none() {
            return Err(InputError::MissingRequired("ph"));
        }
        if self.pco2().is_none() {
            return Err(InputError::MissingRequired("pco2"));
        }
        Ok(())
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        self.values[field.index()]
    }

    /// Present fields in display order.
    pub fn present(&self) -> impl Iterator<Item = (Field, f64)> + '_ {
        Field::ALL
            .into_iter()
            .filter_map(|f| self.get(f).map(|v| (f, v)))
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    pub fn ph(&self) -> Option<f64> {
        self.get(Field::Ph)
    }
    pub fn pco2(&self) -> Option<f64> {
        self.get(Field::Pco2)
    }
    pub fn po2(&self) -> Option<f64> {
        self.get(Field::Po2)
    }
    pub fn hco3(&self) -> Option<f64> {
        self.get(Field::Hco3)
    }
    pub fn be(&self) -> Option<f64> {
        self.get(Field::Be)
    }
    pub fn sodium(&self) -> Option<f64> {
        self.get(Field::Sodium)
    }
    pub fn potassium(&self) -> Option<f64> {
        self.get(Field::Potassium)
    }
    pub fn chloride(&self) -> Option<f64> {
        self.get(Field::Chloride)
    }
    pub fn lactate(&self) -> Option<f64> {
        self.get(Field::Lactate)
    }
    pub fn glucose(&self) -> Option<f64> {
        self.get(Field::Glucose)
    }
    pub fn albumin(&self) -> Option<f64> {
        self.get(Field::Albumin)
    }
    pub fn calcium(&self) -> Option<f64> {
        self.get(Field::Calcium)
    }
    pub fn hb(&self) -> Option<f64> {
        self.get(Field::Hb)
    }

    /// FiO2 as a fraction. Values above 1 are read as percentages.
    pub fn fio2_fraction(&self) -> Option<f64> {
        self.get(Field::Fio2)
            .map(|v| if v > 1.0 { v / 100.0 } else { v })
    }

    pub fn pco2_mmhg(&self) -> Option<f64> {
        self.pco2().map(|v| v * KPA_TO_MMHG)
    }

    pub fn po2_mmhg(&self) -> Option<f64> {
        self.po2().map(|v| v * KPA_TO_MMHG)
    }
}

impl Serialize for ClinicalInputs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Field::ALL.len()))?;
        for field in Field::ALL {
            map.serialize_entry(field.key(), &self.get(field))?;
        }
        map.end()
    }
}

fn coerce_number(field: Field, raw: &Value) -> Result<Option<f64>, InputError> {
    match raw {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or(InputError::NonFinite { field: field.key() }),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| InputError::NotNumeric {
                field: field.key(),
                value: s.clone(),
            }),
        other => Err(InputError::NotNumeric {
            field: field.key(),
            value: other.to_string(),
        }),
    }
}

fn check_value(field: Field, value: f64) -> Result<f64, InputError> {
    if !value.is_finite() {
        return Err(InputError::NonFinite { field: field.key() });
    }
    if field == Field::Fio2 && (value <= 0.0 || value > 100.0) {
        return Err(InputError::OutOfRange {
            field: field.key(),
            value,
        });
    }
    Ok(value)
}

// ═══════════════════════════════════════════════════════════
// BloodGasPanel — one analysis request's clinical payload
// ═══════════════════════════════════════════════════════════

/// Numeric inputs plus the non-numeric context sent with them.
#[derive(Debug, Clone, PartialEq)]
pub struct BloodGasPanel {
    pub inputs: ClinicalInputs,
    pub sample_type: SampleType,
    pub clinical_history: Option<String>,
}

impl BloodGasPanel {
    /// Accepts `{bloodGasData: {values, ...}}` or the inner object directly.
    pub fn from_request(body: &Value) -> Result<Self, InputError> {
        let data = body.get("bloodGasData").unwrap_or(body);
        let values = data.get("values").ok_or(InputError::MissingPanel)?;

        let inputs = ClinicalInputs::from_json_strict(values)?;
        inputs.require_core()?;

        let sample_type = data
            .get("sampleType")
            .and_then(Value::as_str)
            .map(SampleType::from_label)
            .unwrap_or_default();
        let clinical_history = data
            .get("clinicalHistory")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            inputs,
            sample_type,
            clinical_history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strict_parse_accepts_numbers_and_numeric_strings() {
        let inputs = ClinicalInputs::from_json_strict(&json!({
            "ph": 7.31,
            "pco2": "4.2",
            "sodium": " 139 ",
            "lactate": null,
            "glucose": ""
        }))
        .unwrap();
        assert_eq!(inputs.ph(), Some(7.31));
        assert_eq!(inputs.pco2(), Some(4.2));
        assert_eq!(inputs.sodium(), Some(139.0));
        assert_eq!(inputs.lactate(), None);
        assert_eq!(inputs.glucose(), None);
    }

    #[test]
    fn strict_parse_rejects_text_values() {
        let err = ClinicalInputs::from_json_strict(&json!({"ph": "acidotic"})).unwrap_err();
        assert!(matches!(err, InputError::NotNumeric { field: "ph", .. }));

        let err = ClinicalInputs::from_json_strict(&json!({"hco3": [24]})).unwrap_err();
        assert!(matches!(err, InputError::NotNumeric { field: "hco3", .. }));
    }

    #[test]
    fn strict_parse_rejects_non_finite_strings() {
        let err = ClinicalInputs::from_json_strict(&json!({"ph": "NaN"})).unwrap_err();
        assert_eq!(err, InputError::NonFinite { field: "ph" });
        let err = ClinicalInputs::from_json_strict(&json!({"be": "inf"})).unwrap_err();
        assert_eq!(err, InputError::NonFinite { field: "be" });
    }

    #[test]
    fn zero_is_kept_distinct_from_absent() {
        let inputs = ClinicalInputs::from_json_strict(&json!({"be": 0})).unwrap();
        assert_eq!(inputs.be(), Some(0.0));
        assert_eq!(inputs.hco3(), None);
    }

    #[test]
    fn fio2_percentage_is_normalised() {
        let inputs = ClinicalInputs::from_pairs([(Field::Fio2, 40.0)]).unwrap();
        assert!((inputs.fio2_fraction().unwrap() - 0.4).abs() < 1e-9);
        let inputs = ClinicalInputs::from_pairs([(Field::Fio2, 0.21)]).unwrap();
        assert!((inputs.fio2_fraction().unwrap() - 0.21).abs() < 1e-9);
        assert!(ClinicalInputs::from_pairs([(Field::Fio2, 0.0)]).is_err());
        assert!(ClinicalInputs::from_pairs([(Field::Fio2, 140.0)]).is_err());
    }

    #[test]
    fn lenient_parse_drops_bad_values() {
        let inputs = ClinicalInputs::from_json_lenient(&json!({
            "ph": 7.4,
            "pco2": "n/a",
            "hb": {"value": 120}
        }));
        assert_eq!(inputs.ph(), Some(7.4));
        assert_eq!(inputs.pco2(), None);
        assert_eq!(inputs.hb(), None);
    }

    #[test]
    fn require_core_names_missing_field() {
        let inputs = ClinicalInputs::from_pairs([(Field::Ph, 7.4)]).unwrap();
        assert_eq!(
            inputs.require_core().unwrap_err(),
            InputError::MissingRequired("pco2")
        );
        let inputs = ClinicalInputs::from_pairs([(Field::Pco2, 5.0)]).unwrap();
        assert_eq!(
            inputs.require_core().unwrap_err(),
            InputError::MissingRequired("ph")
        );
    }

    #[test]
    fn serializes_every_field_with_nulls() {
        let inputs = ClinicalInputs::from_pairs([(Field::Ph, 7.4)]).unwrap();
        let json = serde_json::to_value(inputs).unwrap();
        assert_eq!(json["ph"], json!(7.4));
        assert!(json["pco2"].is_null());
        assert_eq!(json.as_object().unwrap().len(), 14);
    }

    #[test]
    fn panel_accepts_wrapped_and_bare_bodies() {
        let wrapped = json!({
            "bloodGasData": {
                "values": {"ph": 7.2, "pco2": 8.1},
                "sampleType": "Venous",
                "clinicalHistory": "  COPD exacerbation "
            }
        });
        let panel = BloodGasPanel::from_request(&wrapped).unwrap();
        assert_eq!(panel.sample_type, SampleType::Venous);
        assert_eq!(panel.clinical_history.as_deref(), Some("COPD exacerbation"));

        let bare = json!({"values": {"ph": 7.2, "pco2": 8.1}});
        let panel = BloodGasPanel::from_request(&bare).unwrap();
        assert_eq!(panel.sample_type, SampleType::Unknown);
        assert!(panel.clinical_history.is_none());
    }

    #[test]
    fn panel_without_values_is_rejected() {
        let err = BloodGasPanel::from_request(&json!({"sampleType": "arterial"})).unwrap_err();
        assert_eq!(err, InputError::MissingPanel);
    }

    #[test]
    fn panel_requires_ph_and_pco2() {
        let err = BloodGasPanel::from_request(&json!({"values": {"ph": 7.3}})).unwrap_err();
        assert_eq!(err, InputError::MissingRequired("pco2"));
    }
}
