//! Versioned section schemas, one per analysis mode.
//!
//! A schema is the whole contract between the pipeline stages: which keys
//! exist, in which order, how long each must be, which header labels and
//! JSON names map onto it, and which optional formulas the composer may
//! use. The extractor, section parser, composer and validator all read the
//! same schema, so adding a mode means adding a constant here.

use crate::models::AnalysisMode;
use crate::pipeline::clinical::FormulaSet;

/// What the fallback composer writes for a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionRole {
    Summary,
    Interpretation,
    Compensation,
    HendersonHasselbalch,
    Stewart,
    /// Anion gap, Henderson-Hasselbalch and Stewart together.
    Calculations,
    /// Anion gap, oxygenation and gas exchange.
    AdditionalCalculations,
    Differentials,
    CriticalCare,
    Biochemistry,
}

/// One header family feeding a section. A section with several sources
/// is composite: each found source is labelled in the joined text.
#[derive(Debug, Clone, Copy)]
pub struct HeaderSource {
    pub label: &'static str,
    /// Regex alternatives, matched case-insensitively at line start.
    pub patterns: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct SectionSpec {
    pub key: &'static str,
    /// Canonical header text, used in prompts.
    pub title: &'static str,
    /// Minimum trimmed length in characters.
    pub min_len: usize,
    /// Extra JSON names accepted for this key (compared normalised).
    pub aliases: &'static [&'static str],
    pub sources: &'static [HeaderSource],
    pub role: SectionRole,
}

impl SectionSpec {
    pub fn is_composite(&self) -> bool {
        self.sources.len() > 1
    }
}

#[derive(Debug)]
pub struct SectionSchema {
    pub version: &'static str,
    pub mode: AnalysisMode,
    pub sections: &'static [SectionSpec],
    /// Receives the first paragraph when no header is found.
    pub summary_key: &'static str,
    /// Receives the remainder when no header is found.
    pub catch_all_key: &'static str,
    pub formulas: FormulaSet,
    pub max_tokens: u32,
}

impl SectionSchema {
    pub fn for_mode(mode: AnalysisMode) -> &'static SectionSchema {
        match mode {
            AnalysisMode::Brief => &BRIEF,
            AnalysisMode::Comprehensive => &COMPREHENSIVE,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sections.iter().map(|s| s.key)
    }

    pub fn spec(&self, key: &str) -> Option<&'static SectionSpec> {
        self.sections.iter().find(|s| s.key == key)
    }

    /// Map a JSON object key onto a section key. Matching ignores case
    /// and any non-alphanumeric characters, so `key_findings`,
    /// `KeyFindings` and `key-findings` are the same name.
    pub fn resolve_json_key(&self, name: &str) -> Option<&'static str> {
        let wanted = normalise_name(name);
        self.sections
            .iter()
            .find(|s| {
                normalise_name(s.key) == wanted
                    || s.aliases.iter().any(|a| normalise_name(a) == wanted)
            })
            .map(|s| s.key)
    }

    /// Longest minimum length across keys.
    pub fn max_threshold(&self) -> usize {
        self.sections.iter().map(|s| s.min_len).max().unwrap_or(0)
    }
}

fn normalise_name(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

// ═══════════════════════════════════════════════════════════
// Shared header families
// ═══════════════════════════════════════════════════════════

const SUMMARY: HeaderSource = HeaderSource {
    label: "Summary",
    patterns: &[r"executive\s+summary", r"clinical\s+summary", r"summary", r"bottom\s+line"],
};

const DIFFERENTIALS: HeaderSource = HeaderSource {
    label: "Differentials",
    patterns: &[
        r"(?:top\s+\d+\s+)?differential\s+diagnos[ie]s",
        r"differentials?",
    ],
};

const HENDERSON_HASSELBALCH: HeaderSource = HeaderSource {
    label: "Henderson-Hasselbalch",
    patterns: &[
        r"henderson[\s\-–]+hasselbalch(?:\s+(?:approach|analysis|method))?",
        r"traditional\s+(?:approach|analysis)",
        r"bicarbonate[\s\-]+(?:centred|centered|based)\s+(?:approach|analysis)",
    ],
};

const STEWART: HeaderSource = HeaderSource {
    label: "Stewart",
    patterns: &[
        r"stewart(?:\s+physicochemical)?(?:\s+(?:approach|analysis|method))?",
        r"physicochemical\s+(?:approach|analysis)",
        r"strong\s+ion\s+(?:difference\s+)?analysis",
    ],
};

// ═══════════════════════════════════════════════════════════
// Brief mode
// ═══════════════════════════════════════════════════════════

pub static BRIEF: SectionSchema = SectionSchema {
    version: "brief-2",
    mode: AnalysisMode::Brief,
    sections: &[
        SectionSpec {
            key: "summary",
            title: "Executive Summary",
            min_len: 40,
            aliases: &["executiveSummary", "bottomLine"],
            sources: &[SUMMARY],
            role: SectionRole::Summary,
        },
        SectionSpec {
            key: "primaryInterpretation",
            title: "Primary Interpretation",
            min_len: 40,
            aliases: &["interpretation", "primaryFindings"],
            sources: &[HeaderSource {
                label: "Primary Interpretation",
                patterns: &[r"primary\s+interpretation", r"primary\s+findings?", r"interpretation"],
            }],
            role: SectionRole::Interpretation,
        },
        SectionSpec {
            key: "keyCalculations",
            title: "Key Calculations",
            min_len: 30,
            aliases: &["calculations"],
            sources: &[
                HeaderSource {
                    label: "Key Calculations",
                    patterns: &[r"key\s+calculations", r"calculations"],
                },
                HENDERSON_HASSELBALCH,
                STEWART,
            ],
            role: SectionRole::Calculations,
        },
        SectionSpec {
            key: "differentials",
            title: "Top 3 Differential Diagnoses",
            min_len: 30,
            aliases: &["differentialDiagnoses", "topDifferentials"],
            sources: &[DIFFERENTIALS],
            role: SectionRole::Differentials,
        },
        SectionSpec {
            key: "recommendations",
            title: "Immediate Actions",
            min_len: 30,
            aliases: &["actions", "immediateActions", "clinicalRecommendations"],
            sources: &[HeaderSource {
                label: "Immediate Actions",
                patterns: &[
                    r"immediate\s+actions",
                    r"clinical\s+recommendations?",
                    r"recommendations?",
                    r"next\s+steps",
                ],
            }],
            role: SectionRole::CriticalCare,
        },
    ],
    summary_key: "summary",
    catch_all_key: "primaryInterpretation",
    formulas: FormulaSet {
        delta_ratio: true,
        stewart: true,
        sid_subtracts_lactate: false,
        oxygenation: true,
    },
    max_tokens: 1500,
};

// ═══════════════════════════════════════════════════════════
// Comprehensive mode
// ═══════════════════════════════════════════════════════════

pub static COMPREHENSIVE: SectionSchema = SectionSchema {
    version: "comprehensive-2",
    mode: AnalysisMode::Comprehensive,
    sections: &[
        SectionSpec {
            key: "summary",
            title: "Executive Summary",
            min_len: 40,
            aliases: &["executiveSummary", "bottomLine"],
            sources: &[SUMMARY],
            role: SectionRole::Summary,
        },
        SectionSpec {
            key: "keyFindings",
            title: "Key Findings",
            min_len: 40,
            aliases: &["findings", "primaryInterpretation", "primaryFindings"],
            sources: &[HeaderSource {
                label: "Key Findings",
                patterns: &[r"key\s+findings", r"primary\s+interpretation", r"primary\s+findings?"],
            }],
            role: SectionRole::Interpretation,
        },
        SectionSpec {
            key: "compensationAnalysis",
            title: "Compensation Analysis",
            min_len: 40,
            aliases: &["compensation"],
            sources: &[HeaderSource {
                label: "Compensation Analysis",
                patterns: &[r"compensation(?:\s+(?:analysis|assessment))?", r"compensatory\s+response"],
            }],
            role: SectionRole::Compensation,
        },
        SectionSpec {
            key: "hhAnalysis",
            title: "Henderson-Hasselbalch Analysis",
            min_len: 40,
            aliases: &["hendersonHasselbalch", "hendersonHasselbalchAnalysis", "traditionalAnalysis"],
            sources: &[HENDERSON_HASSELBALCH],
            role: SectionRole::HendersonHasselbalch,
        },
        SectionSpec {
            key: "stewartAnalysis",
            title: "Stewart Analysis",
            min_len: 40,
            aliases: &["stewart", "stewartApproach", "physicochemicalAnalysis"],
            sources: &[STEWART],
            role: SectionRole::Stewart,
        },
        SectionSpec {
            key: "additionalCalculations",
            title: "Additional Calculations",
            min_len: 30,
            aliases: &["calculations", "keyCalculations", "otherCalculations"],
            sources: &[HeaderSource {
                label: "Additional Calculations",
                patterns: &[
                    r"additional\s+calculations",
                    r"other\s+calculations",
                    r"key\s+calculations",
                    r"oxygenation(?:\s+assessment)?",
                ],
            }],
            role: SectionRole::AdditionalCalculations,
        },
        SectionSpec {
            key: "differentials",
            title: "Differential Diagnoses",
            min_len: 30,
            aliases: &["differentialDiagnoses", "topDifferentials"],
            sources: &[DIFFERENTIALS],
            role: SectionRole::Differentials,
        },
        SectionSpec {
            key: "criticalCareAssessment",
            title: "Critical Care Assessment",
            min_len: 40,
            aliases: &["criticalCare", "immediateActions", "recommendations", "actions"],
            sources: &[HeaderSource {
                label: "Critical Care Assessment",
                patterns: &[
                    r"critical\s+care(?:\s+(?:assessment|considerations))?",
                    r"immediate\s+actions",
                    r"clinical\s+recommendations?",
                    r"recommendations?",
                ],
            }],
            role: SectionRole::CriticalCare,
        },
        SectionSpec {
            key: "biochemicalInterpretation",
            title: "Biochemical Interpretation",
            min_len: 40,
            aliases: &["biochemistry", "detailedAnalysis", "biochemicalAnalysis"],
            sources: &[HeaderSource {
                label: "Biochemical Interpretation",
                patterns: &[
                    r"biochemical\s+(?:interpretation|analysis)",
                    r"detailed\s+analysis",
                    r"electrolytes?(?:\s+and\s+metabolites)?",
                ],
            }],
            role: SectionRole::Biochemistry,
        },
    ],
    summary_key: "summary",
    catch_all_key: "biochemicalInterpretation",
    formulas: FormulaSet::ALL,
    max_tokens: 4000,
};
