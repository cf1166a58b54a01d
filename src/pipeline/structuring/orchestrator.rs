use std::sync::Arc;

use serde::Serialize;

use super::fallback::FallbackComposer;
use super::parser::extract_sections;
use super::prompt::{build_analysis_prompt, build_system_prompt};
use super::schema::SectionSchema;
use super::sections::SectionParser;
use super::types::{GenerateOptions, LlmClient};
use super::validation::SchemaValidator;
use super::StructuringError;
use crate::models::{AnalysisMode, BloodGasPanel, SectionedRecord, ValidatedRecord};
use crate::pipeline::clinical::{DerivedCalculations, ReferenceRanges};

/// Per-request pipeline states. Each request passes through them once,
/// in order: Received, one of Extracted/Parsed/Unparsed, Composed when
/// anything had to be filled in, then Validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Extracted,
    Parsed,
    Unparsed,
    Composed,
    Validated,
}

/// Schema-complete analysis result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interpretation {
    pub mode: AnalysisMode,
    pub schema_version: &'static str,
    /// How the upstream text was read: extracted, parsed or unparsed.
    pub source: Stage,
    pub sections: ValidatedRecord,
    pub composed_sections: Vec<&'static str>,
    pub unavailable_sections: Vec<&'static str>,
    pub critical_flags: Vec<String>,
    pub calculations: DerivedCalculations,
    /// Raw upstream text, when there was any.
    pub analysis: Option<String>,
    pub model: Option<String>,
    /// Upstream token accounting, when the service reported it.
    pub usage: Option<serde_json::Value>,
}

/// Turn upstream text (or none) into a validated interpretation. Never
/// fails: malformed text degrades to the section parser, then to the
/// composer.
pub fn interpret(
    raw: Option<&str>,
    panel: &BloodGasPanel,
    mode: AnalysisMode,
    ranges: &ReferenceRanges,
) -> Interpretation {
    let schema = SectionSchema::for_mode(mode);
    let _span = tracing::info_span!("interpret", mode = %mode, schema = schema.version).entered();
    tracing::debug!(stage = ?Stage::Received, has_text = raw.is_some());

    let (record, source) = read_upstream(raw, schema);
    tracing::debug!(stage = ?source, sections = record.len());

    let composer = FallbackComposer::new(&panel.inputs, panel.sample_type, ranges, schema.formulas);
    let validation = SchemaValidator::new(schema).validate(record, Some(&composer));
    if !validation.composed.is_empty() || !validation.generic.is_empty() {
        tracing::debug!(
            stage = ?Stage::Composed,
            composed = ?validation.composed,
            generic = ?validation.generic,
        );
    }
    tracing::info!(
        stage = ?Stage::Validated,
        source = ?source,
        composed = validation.composed.len(),
        generic = validation.generic.len(),
        "Analysis validated"
    );

    Interpretation {
        mode,
        schema_version: schema.version,
        source,
        sections: validation.record,
        composed_sections: validation.composed,
        unavailable_sections: validation.generic,
        critical_flags: composer.critical_flags(),
        calculations: composer.calculations().clone(),
        analysis: raw.map(str::to_string),
        model: None,
        usage: None,
    }
}

fn read_upstream(raw: Option<&str>, schema: &'static SectionSchema) -> (SectionedRecord, Stage) {
    let Some(text) = raw.filter(|t| !t.trim().is_empty()) else {
        return (SectionedRecord::new(), Stage::Unparsed);
    };
    match extract_sections(text, schema) {
        Ok(record) => (record, Stage::Extracted),
        Err(e) => {
            tracing::debug!(error = %e, "JSON extraction failed, trying section headers");
            match SectionParser::for_mode(schema.mode).parse(text) {
                Some(record) if !record.is_empty() => (record, Stage::Parsed),
                _ => (SectionedRecord::new(), Stage::Unparsed),
            }
        }
    }
}

/// Prompt → text generation → interpretation.
pub struct AnalysisOrchestrator {
    llm: Arc<dyn LlmClient + Send + Sync>,
    ranges: Arc<ReferenceRanges>,
}

impl AnalysisOrchestrator {
    pub fn new(llm: Arc<dyn LlmClient + Send + Sync>, ranges: Arc<ReferenceRanges>) -> Self {
        Self { llm, ranges }
    }

    /// Transport failures are returned; anything the service says is
    /// recovered into a complete interpretation.
    pub fn analyze(
        &self,
        panel: &BloodGasPanel,
        mode: AnalysisMode,
    ) -> Result<Interpretation, StructuringError> {
        let schema = SectionSchema::for_mode(mode);
        let system = build_system_prompt(schema);
        let prompt = build_analysis_prompt(panel, schema);
        let options = GenerateOptions {
            max_tokens: schema.max_tokens,
            ..GenerateOptions::default()
        };

        let start = std::time::Instant::now();
        let generation = self.llm.generate(&system, &prompt, options)?;
        tracing::info!(
            model = %generation.model,
            elapsed_ms = %start.elapsed().as_millis(),
            text_len = generation.text.len(),
            truncated = generation.truncated,
            "Text generation complete"
        );
        if generation.truncated {
            tracing::warn!(max_tokens = schema.max_tokens, "Upstream response hit the token limit");
        }

        let mut interpretation = interpret(Some(&generation.text), panel, mode, &self.ranges);
        interpretation.model = Some(generation.model);
        interpretation.usage = generation.usage;
        Ok(interpretation)
    }
}
