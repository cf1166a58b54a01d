use serde::{Deserialize, Serialize};

use super::inputs::InputError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = InputError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InputError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(SampleType {
    Arterial => "arterial",
    Venous => "venous",
    Capillary => "capillary",
    Unknown => "unknown",
});

str_enum!(AnalysisMode {
    Brief => "brief",
    Comprehensive => "comprehensive",
});

str_enum!(AbnormalFlag {
    Normal => "normal",
    Low => "low",
    High => "high",
    CriticalLow => "critical_low",
    CriticalHigh => "critical_high",
});

impl SampleType {
    /// Lenient parse for free-form client values ("ABG", "Venous blood gas", ...).
    pub fn from_label(label: &str) -> Self {
        let lower = label.trim().to_lowercase();
        if lower.starts_with("art") || lower == "abg" {
            SampleType::Arterial
        } else if lower.starts_with("ven") || lower == "vbg" {
            SampleType::Venous
        } else if lower.starts_with("cap") || lower == "cbg" {
            SampleType::Capillary
        } else {
            SampleType::Unknown
        }
    }

    /// Human label used in narrative text.
    pub fn describe(&self) -> &'static str {
        match self {
            SampleType::Arterial => "arterial",
            SampleType::Venous => "venous",
            SampleType::Capillary => "capillary",
            SampleType::Unknown => "unspecified",
        }
    }
}

impl Default for SampleType {
    fn default() -> Self {
        SampleType::Unknown
    }
}

impl Default for AnalysisMode {
    fn default() -> Self {
        AnalysisMode::Comprehensive
    }
}

impl AbnormalFlag {
    pub fn is_critical(&self) -> bool {
        matches!(self, AbnormalFlag::CriticalLow | AbnormalFlag::CriticalHigh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn analysis_mode_round_trips_through_str() {
        assert_eq!(AnalysisMode::from_str("brief").unwrap(), AnalysisMode::Brief);
        assert_eq!(AnalysisMode::Comprehensive.as_str(), "comprehensive");
        assert!(AnalysisMode::from_str("exhaustive").is_err());
    }

    #[test]
    fn sample_type_label_is_lenient() {
        assert_eq!(SampleType::from_label("Arterial"), SampleType::Arterial);
        assert_eq!(SampleType::from_label("VBG"), SampleType::Venous);
        assert_eq!(SampleType::from_label(" capillary "), SampleType::Capillary);
        assert_eq!(SampleType::from_label("mixed"), SampleType::Unknown);
    }

    #[test]
    fn abnormal_flag_serializes_snake_case() {
        let json = serde_json::to_string(&AbnormalFlag::CriticalHigh).unwrap();
        assert_eq!(json, "\"critical_high\"");
        assert!(AbnormalFlag::CriticalLow.is_critical());
        assert!(!AbnormalFlag::High.is_critical());
    }
}
