//! Free-text section segmentation.
//!
//! An ordered-token scanner: every header match for every section is
//! collected, sorted by position, and walked by a small state machine.
//! A section's body runs from the end of its header to the start of the
//! next header of any section, or to the end of the text.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use super::parser::strip_fences;
use super::schema::{SectionSchema, SectionSpec, BRIEF, COMPREHENSIVE};
use crate::models::{AnalysisMode, SectionedRecord};

static BRIEF_PARSER: LazyLock<SectionParser> =
    LazyLock::new(|| SectionParser::new(&BRIEF).unwrap());
static COMPREHENSIVE_PARSER: LazyLock<SectionParser> =
    LazyLock::new(|| SectionParser::new(&COMPREHENSIVE).unwrap());

static BLANK_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n[ \t]*\n").unwrap());

/// Header line: optional Markdown heading marks, list numbering and
/// emphasis around the label, an optional parenthetical, then either a
/// delimiter or the end of the line.
///
/// Position in the text does not matter. A body line that opens with a
/// known label followed by a delimiter (`Compensation: appropriate`)
/// starts that label's section; the same label used in a sentence does
/// not.
fn header_regex(alternatives: &[&str]) -> Result<Regex, regex::Error> {
    let labels = alternatives.join("|");
    Regex::new(&format!(
        r"(?im)^[ \t]*(?:#{{1,6}}[ \t]*)?(?:\d{{1,2}}[.)][ \t]*)?(?:[*_]{{1,3}})?[ \t]*(?:{labels})(?:[ \t]*\([^)\n]*\))?[ \t]*(?:[*_]{{1,3}})?[ \t]*(?:[:\-–—][ \t]*(?:[*_]{{1,3}})?|$)"
    ))
}

struct HeaderPattern {
    section: usize,
    source: usize,
    regex: Regex,
}

/// One header occurrence in the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Token {
    start: usize,
    end: usize,
    section: usize,
    source: usize,
}

enum ScanState {
    Preamble,
    InSection { section: usize, source: usize, body_start: usize },
}

pub struct SectionParser {
    schema: &'static SectionSchema,
    headers: Vec<HeaderPattern>,
}

impl SectionParser {
    pub fn new(schema: &'static SectionSchema) -> Result<Self, regex::Error> {
        let mut headers = Vec::new();
        for (section, spec) in schema.sections.iter().enumerate() {
            for (source, header) in spec.sources.iter().enumerate() {
                headers.push(HeaderPattern {
                    section,
                    source,
                    regex: header_regex(header.patterns)?,
                });
            }
        }
        Ok(Self { schema, headers })
    }

    /// Shared parser for a built-in schema.
    pub fn for_mode(mode: AnalysisMode) -> &'static SectionParser {
        match mode {
            AnalysisMode::Brief => &BRIEF_PARSER,
            AnalysisMode::Comprehensive => &COMPREHENSIVE_PARSER,
        }
    }

    /// Segment narrative text into sections.
    ///
    /// Returns `None` for empty text and for text that looks like
    /// structured data (possibly truncated JSON), which must not be
    /// degraded into prose sections. Without any header, the first
    /// paragraph becomes the summary and the remainder the catch-all.
    pub fn parse(&self, text: &str) -> Option<SectionedRecord> {
        let text = text.replace("\r\n", "\n");
        if text.trim().is_empty() || looks_structured(&text) {
            return None;
        }

        let tokens = self.scan(&text);
        if tokens.is_empty() {
            tracing::debug!(schema = self.schema.version, "No section headers found");
            return Some(self.paragraph_fallback(&text));
        }

        let mut bodies: BTreeMap<usize, Vec<(usize, &str)>> = BTreeMap::new();
        let mut state = ScanState::Preamble;
        for token in tokens.iter().copied().chain(std::iter::once(end_token(&text))) {
            if let ScanState::InSection {
                section,
                source,
                body_start,
            } = state
            {
                let body = text[body_start..token.start].trim();
                if !body.is_empty() {
                    bodies.entry(section).or_default().push((source, body));
                }
            }
            state = ScanState::InSection {
                section: token.section,
                source: token.source,
                body_start: token.end,
            };
        }

        let mut record = SectionedRecord::new();
        for (section, parts) in bodies {
            let spec = &self.schema.sections[section];
            record.insert(spec.key, join_parts(spec, &parts));
        }
        Some(record)
    }

    /// All header matches, ordered by position. At a shared start the
    /// longest match wins; matches inside an accepted header are dropped.
    fn scan(&self, text: &str) -> Vec<Token> {
        let mut found: Vec<Token> = self
            .headers
            .iter()
            .flat_map(|h| {
                h.regex.find_iter(text).map(|m| Token {
                    start: m.start(),
                    end: m.end(),
                    section: h.section,
                    source: h.source,
                })
            })
            .collect();
        found.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

        let mut tokens: Vec<Token> = Vec::with_capacity(found.len());
        for token in found {
            if tokens.last().is_some_and(|last| token.start < last.end) {
                continue;
            }
            tokens.push(token);
        }
        tokens
    }

    fn paragraph_fallback(&self, text: &str) -> SectionedRecord {
        let trimmed = text.trim();
        let mut record = SectionedRecord::new();
        match BLANK_LINE.find(trimmed) {
            Some(m) => {
                record.insert(self.schema.summary_key, &trimmed[..m.start()]);
                record.insert(self.schema.catch_all_key, &trimmed[m.end()..]);
            }
            None => record.insert(self.schema.summary_key, trimmed),
        }
        record
    }
}

/// Sentinel closing the last open section.
fn end_token(text: &str) -> Token {
    Token {
        start: text.len(),
        end: text.len(),
        section: usize::MAX,
        source: usize::MAX,
    }
}

/// Join the bodies found for one section. Composite sections label each
/// source only when more than one source contributed.
fn join_parts(spec: &SectionSpec, parts: &[(usize, &str)]) -> String {
    let mut sources: Vec<usize> = parts.iter().map(|(s, _)| *s).collect();
    sources.sort_unstable();
    sources.dedup();

    if !spec.is_composite() || sources.len() < 2 {
        return parts
            .iter()
            .map(|(_, body)| *body)
            .collect::<Vec<_>>()
            .join("\n\n");
    }

    sources
        .iter()
        .map(|source| {
            let body = parts
                .iter()
                .filter(|(s, _)| s == source)
                .map(|(_, body)| *body)
                .collect::<Vec<_>>()
                .join("\n\n");
            format!("{}:\n{}", spec.sources[*source].label, body)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn looks_structured(text: &str) -> bool {
    let unfenced = strip_fences(text);
    let start = unfenced.trim_start();
    start.starts_with('{') || start.starts_with('[')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brief() -> &'static SectionParser {
        SectionParser::for_mode(AnalysisMode::Brief)
    }

    fn comprehensive() -> &'static SectionParser {
        SectionParser::for_mode(AnalysisMode::Comprehensive)
    }

    #[test]
    fn builtin_patterns_compile() {
        assert!(SectionParser::new(&BRIEF).is_ok());
        assert!(SectionParser::new(&COMPREHENSIVE).is_ok());
    }

    #[test]
    fn canonical_headers_yield_exact_bodies() {
        let bodies = [
            "pH 7.15 with a low bicarbonate: severe metabolic acidosis.",
            "High anion gap metabolic acidosis with respiratory compensation.",
            "Anion gap 35 mmol/L, corrected 40 mmol/L.",
            "1. Lactic acidosis\n2. Diabetic ketoacidosis\n3. Toxic alcohol ingestion",
            "- Repeat lactate\n- Senior review",
        ];
        let mut text = String::new();
        for (spec, body) in BRIEF.sections.iter().zip(bodies) {
            text.push_str(&format!("{}:\n{}\n\n", spec.title, body));
        }

        let record = brief().parse(&text).unwrap();
        for (spec, body) in BRIEF.sections.iter().zip(bodies) {
            assert_eq!(record.get(spec.key), Some(body), "{}", spec.key);
            assert!(!record.get(spec.key).unwrap().contains(spec.title));
        }
    }

    #[test]
    fn canonical_comprehensive_headers_yield_exact_bodies() {
        let bodies: Vec<String> = (1..=COMPREHENSIVE.sections.len())
            .map(|i| format!("Narrative body {i}, written as plain prose.\nSecond line of body {i}."))
            .collect();
        let mut text = String::new();
        for (spec, body) in COMPREHENSIVE.sections.iter().zip(&bodies) {
            text.push_str(&format!("{}:\n{}\n\n", spec.title, body));
        }

        let record = comprehensive().parse(&text).unwrap();
        assert_eq!(record.len(), COMPREHENSIVE.sections.len());
        for (spec, body) in COMPREHENSIVE.sections.iter().zip(&bodies) {
            assert_eq!(record.get(spec.key), Some(body.as_str()), "{}", spec.key);
        }
    }

    #[test]
    fn tolerates_markdown_numbering_and_emphasis() {
        let text = "## 1. **Executive Summary**\nAcidaemia.\n\n\
                    **Primary Interpretation:** Metabolic.\n\n\
                    3) Key Calculations -\nAG 20\n\n\
                    ### Top 3 Differential Diagnoses (most likely first)\nDKA\n\n\
                    __Immediate Actions__:\nFluids";
        let record = brief().parse(text).unwrap();
        assert_eq!(record.get("summary"), Some("Acidaemia."));
        assert_eq!(record.get("primaryInterpretation"), Some("Metabolic."));
        assert_eq!(record.get("keyCalculations"), Some("AG 20"));
        assert_eq!(record.get("differentials"), Some("DKA"));
        assert_eq!(record.get("recommendations"), Some("Fluids"));
    }

    #[test]
    fn headers_are_case_insensitive_and_line_anchored() {
        let text = "SUMMARY: the summary mentions differential diagnoses: inline.\n\
                    differentials: sepsis";
        let record = brief().parse(text).unwrap();
        assert_eq!(
            record.get("summary"),
            Some("the summary mentions differential diagnoses: inline.")
        );
        assert_eq!(record.get("differentials"), Some("sepsis"));
    }

    #[test]
    fn body_ends_at_next_header_of_any_section() {
        let text = "Key Findings:\nLactate high.\nCompensation Analysis:\nWinter's inadequate.\nKey Findings:\nPotassium low.";
        let record = comprehensive().parse(text).unwrap();
        assert_eq!(
            record.get("keyFindings"),
            Some("Lactate high.\n\nPotassium low.")
        );
        assert_eq!(record.get("compensationAnalysis"), Some("Winter's inadequate."));
    }

    #[test]
    fn labelled_body_line_opens_its_own_section() {
        let text = "Henderson-Hasselbalch Approach:\nHCO3 8 mmol/L, pH 7.15.\n\
                    Compensation: Winter's band 18-22 mmHg.\n\
                    Compensation is excessive.";
        let record = comprehensive().parse(text).unwrap();
        assert_eq!(record.get("hhAnalysis"), Some("HCO3 8 mmol/L, pH 7.15."));
        assert_eq!(
            record.get("compensationAnalysis"),
            Some("Winter's band 18-22 mmHg.\nCompensation is excessive.")
        );
    }

    #[test]
    fn composite_section_labels_each_method() {
        let text = "Henderson-Hasselbalch Approach:\nLow HCO3.\n\nStewart Approach:\nSIDa 38.\n\nDifferentials:\nSepsis";
        let record = brief().parse(text).unwrap();
        assert_eq!(
            record.get("keyCalculations"),
            Some("Henderson-Hasselbalch:\nLow HCO3.\n\nStewart:\nSIDa 38.")
        );
    }

    #[test]
    fn composite_with_one_source_is_unlabelled() {
        let text = "Stewart analysis:\nSIDa 38 mmol/L.";
        let record = brief().parse(text).unwrap();
        assert_eq!(record.get("keyCalculations"), Some("SIDa 38 mmol/L."));
    }

    #[test]
    fn summary_label_variants_share_a_section() {
        let text = "Executive Summary:\nA\n\nSummary:\nB";
        let record = brief().parse(text).unwrap();
        assert_eq!(record.get("summary"), Some("A\n\nB"));
    }

    #[test]
    fn preamble_before_first_header_is_dropped() {
        let text = "Here is my interpretation of the gas.\n\nSummary: Normal gas.";
        let record = brief().parse(text).unwrap();
        assert_eq!(record.get("summary"), Some("Normal gas."));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn no_headers_degrades_to_paragraphs() {
        let text = "A mixed picture overall.\n\nThe bicarbonate is low.\n\nConsider sepsis.";
        let record = comprehensive().parse(text).unwrap();
        assert_eq!(record.get("summary"), Some("A mixed picture overall."));
        assert_eq!(
            record.get("biochemicalInterpretation"),
            Some("The bicarbonate is low.\n\nConsider sepsis.")
        );

        let single = brief().parse("Just one paragraph.").unwrap();
        assert_eq!(single.get("summary"), Some("Just one paragraph."));
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn structured_looking_text_is_not_parsed_as_prose() {
        assert!(brief().parse("{\"summary\": \"trunc").is_none());
        assert!(brief().parse("```json\n[{\"a\": 1").is_none());
        assert!(brief().parse("   \n ").is_none());
    }

    #[test]
    fn crlf_line_endings_are_normalised() {
        let record = brief().parse("Summary:\r\nLine one.\r\nDifferentials:\r\nDKA").unwrap();
        assert_eq!(record.get("summary"), Some("Line one."));
        assert_eq!(record.get("differentials"), Some("DKA"));
    }
}
