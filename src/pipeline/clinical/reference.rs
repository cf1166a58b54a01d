//! Reference ranges for every categorical judgment.
//!
//! One canonical set is compiled in; a JSON file with the same shape can
//! replace it at startup (`ABG_REFERENCE_RANGES`). Call sites never carry
//! their own thresholds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AbnormalFlag, Field};

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("Failed to read reference ranges from {0}: {1}")]
    Load(String, String),

    #[error("Failed to parse reference ranges: {0}")]
    Parse(String),

    #[error("Invalid range for {0}: low must be below high")]
    Inverted(&'static str),
}

/// Normal band with optional critical limits outside it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    pub low: f64,
    pub high: f64,
    #[serde(default)]
    pub critical_low: Option<f64>,
    #[serde(default)]
    pub critical_high: Option<f64>,
}

impl Range {
    pub const fn new(low: f64, high: f64) -> Self {
        Self {
            low,
            high,
            critical_low: None,
            critical_high: None,
        }
    }

    pub const fn with_critical(low: f64, high: f64, critical_low: f64, critical_high: f64) -> Self {
        Self {
            low,
            high,
            critical_low: Some(critical_low),
            critical_high: Some(critical_high),
        }
    }

    pub const fn with_critical_high(low: f64, high: f64, critical_high: f64) -> Self {
        Self {
            low,
            high,
            critical_low: None,
            critical_high: Some(critical_high),
        }
    }

    pub const fn with_critical_low(low: f64, high: f64, critical_low: f64) -> Self {
        Self {
            low,
            high,
            critical_low: Some(critical_low),
            critical_high: None,
        }
    }

    /// Classify a value. Critical limits are exclusive: lactate 4.0 is
    /// high, 4.1 is critical.
    pub fn classify(&self, value: f64) -> AbnormalFlag {
        if self.critical_low.is_some_and(|c| value < c) {
            AbnormalFlag::CriticalLow
        } else if self.critical_high.is_some_and(|c| value > c) {
            AbnormalFlag::CriticalHigh
        } else if value < self.low {
            AbnormalFlag::Low
        } else if value > self.high {
            AbnormalFlag::High
        } else {
            AbnormalFlag::Normal
        }
    }

    fn check(&self, name: &'static str) -> Result<(), ReferenceError> {
        if self.low >= self.high {
            return Err(ReferenceError::Inverted(name));
        }
        Ok(())
    }
}

/// Versioned reference data set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceRanges {
    pub version: String,
    pub ph: Range,
    /// kPa.
    pub pco2: Range,
    /// kPa, arterial.
    pub po2: Range,
    pub hco3: Range,
    pub be: Range,
    pub sodium: Range,
    pub potassium: Range,
    pub chloride: Range,
    pub lactate: Range,
    pub glucose: Range,
    /// g/L.
    pub albumin: Range,
    /// Ionised, mmol/L.
    pub calcium: Range,
    /// g/L.
    pub hb: Range,
    pub anion_gap: Range,
    pub sid_apparent: Range,
    /// mmHg / fraction.
    pub pf_ratio: Range,
    /// kPa.
    pub aa_gradient: Range,
}

impl ReferenceRanges {
    /// The compiled-in adult reference set.
    pub fn canonical() -> Self {
        Self {
            version: "adult-2026.1".into(),
            ph: Range::with_critical(7.35, 7.45, 7.20, 7.60),
            pco2: Range::with_critical(4.7, 6.0, 2.5, 10.0),
            po2: Range::with_critical_low(10.6, 13.3, 6.0),
            hco3: Range::with_critical(22.0, 26.0, 10.0, 40.0),
            be: Range::new(-2.0, 2.0),
            sodium: Range::with_critical(135.0, 145.0, 120.0, 160.0),
            potassium: Range::with_critical(3.5, 5.3, 2.5, 6.5),
            chloride: Range::new(98.0, 107.0),
            lactate: Range::with_critical_high(0.5, 2.0, 4.0),
            glucose: Range::with_critical(4.0, 11.0, 3.0, 25.0),
            albumin: Range::new(35.0, 50.0),
            calcium: Range::with_critical(1.15, 1.30, 0.90, 1.60),
            hb: Range::with_critical(120.0, 170.0, 70.0, 200.0),
            anion_gap: Range::new(8.0, 16.0),
            sid_apparent: Range::new(38.0, 44.0),
            pf_ratio: Range::with_critical_low(300.0, 700.0, 100.0),
            aa_gradient: Range::new(0.0, 2.6),
        }
    }

    /// Range for a measured field. FiO2 is a setting, not a result.
    pub fn for_field(&self, field: Field) -> Option<&Range> {
        Some(match field {
            Field::Ph => &self.ph,
            Field::Pco2 => &self.pco2,
            Field::Po2 => &self.po2,
            Field::Hco3 => &self.hco3,
            Field::Be => &self.be,
            Field::Sodium => &self.sodium,
            Field::Potassium => &self.potassium,
            Field::Chloride => &self.chloride,
            Field::Lactate => &self.lactate,
            Field::Glucose => &self.glucose,
            Field::Albumin => &self.albumin,
            Field::Calcium => &self.calcium,
            Field::Hb => &self.hb,
            Field::Fio2 => return None,
        })
    }

    /// Load an override set from a JSON file.
    pub fn load(path: &std::path::Path) -> Result<Self, ReferenceError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ReferenceError::Load(path.display().to_string(), e.to_string()))?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ReferenceError> {
        let ranges: Self =
            serde_json::from_str(json).map_err(|e| ReferenceError::Parse(e.to_string()))?;
        ranges.check()?;
        Ok(ranges)
    }

    fn check(&self) -> Result<(), ReferenceError> {
        let named: [(&'static str, &Range); 17] = [
            ("ph", &self.ph),
            ("pco2", &self.pco2),
            ("po2", &self.po2),
            ("hco3", &self.hco3),
            ("be", &self.be),
            ("sodium", &self.sodium),
            ("potassium", &self.potassium),
            ("chloride", &self.chloride),
            ("lactate", &self.lactate),
            ("glucose", &self.glucose),
            ("albumin", &self.albumin),
            ("calcium", &self.calcium),
            ("hb", &self.hb),
            ("anionGap", &self.anion_gap),
            ("sidApparent", &self.sid_apparent),
            ("pfRatio", &self.pf_ratio),
            ("aaGradient", &self.aa_gradient),
        ];
        for (name, range) in named {
            range.check(name)?;
        }
        Ok(())
    }
}

impl Default for ReferenceRanges {
    fn default() -> Self {
        Self::canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_respects_normal_band() {
        let ph = ReferenceRanges::canonical().ph;
        assert_eq!(ph.classify(7.40), AbnormalFlag::Normal);
        assert_eq!(ph.classify(7.35), AbnormalFlag::Normal);
        assert_eq!(ph.classify(7.30), AbnormalFlag::Low);
        assert_eq!(ph.classify(7.50), AbnormalFlag::High);
    }

    #[test]
    fn classify_flags_critical_limits() {
        let ranges = ReferenceRanges::canonical();
        assert_eq!(ranges.ph.classify(7.15), AbnormalFlag::CriticalLow);
        assert_eq!(ranges.lactate.classify(4.0), AbnormalFlag::High);
        assert_eq!(ranges.lactate.classify(9.0), AbnormalFlag::CriticalHigh);
        assert_eq!(ranges.potassium.classify(6.8), AbnormalFlag::CriticalHigh);
    }

    #[test]
    fn canonical_anion_gap_band_is_8_to_16() {
        let ag = ReferenceRanges::canonical().anion_gap;
        assert_eq!((ag.low, ag.high), (8.0, 16.0));
        assert_eq!(ag.classify(16.0), AbnormalFlag::Normal);
        assert_eq!(ag.classify(35.0), AbnormalFlag::High);
    }

    #[test]
    fn json_override_round_trips() {
        let mut ranges = ReferenceRanges::canonical();
        ranges.version = "local-1".into();
        ranges.anion_gap = Range::new(8.0, 12.0);
        let json = serde_json::to_string(&ranges).unwrap();
        let loaded = ReferenceRanges::from_json(&json).unwrap();
        assert_eq!(loaded, ranges);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let mut ranges = ReferenceRanges::canonical();
        ranges.sodium = Range::new(145.0, 135.0);
        let json = serde_json::to_string(&ranges).unwrap();
        assert!(matches!(
            ReferenceRanges::from_json(&json),
            Err(ReferenceError::Inverted("sodium"))
        ));
    }

    #[test]
    fn load_missing_file_reports_path() {
        let err = ReferenceRanges::load(std::path::Path::new("/nonexistent/ranges.json"))
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/ranges.json"));
    }
}
