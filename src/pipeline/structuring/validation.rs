//! Completeness enforcement: the only way to obtain a `ValidatedRecord`.

use super::fallback::FallbackComposer;
use super::schema::SectionSchema;
use crate::models::{SectionedRecord, ValidatedRecord};

/// Used when nothing better can be said for a section. Longer than every
/// section threshold, so appending it always satisfies the minimum.
pub const RETRY_MESSAGE: &str = "Analysis for this section is currently unavailable. \
Please retry the request; if the problem persists, interpret the results manually.";

/// Validated record plus which keys had to be filled in.
#[derive(Debug, Clone)]
pub struct Validation {
    pub record: ValidatedRecord,
    /// Keys replaced with composer text.
    pub composed: Vec<&'static str>,
    /// Keys that fell back to the retry message.
    pub generic: Vec<&'static str>,
}

pub struct SchemaValidator<'s> {
    schema: &'s SectionSchema,
}

impl<'s> SchemaValidator<'s> {
    pub fn new(schema: &'s SectionSchema) -> Self {
        Self { schema }
    }

    /// Fill every absent or short section.
    ///
    /// Composer text is used when a composer with at least one input
    /// value is supplied; otherwise the retry message. A replacement still
    /// below threshold gets the retry message appended.
    pub fn validate(
        &self,
        record: SectionedRecord,
        composer: Option<&FallbackComposer<'_>>,
    ) -> Validation {
        let composer = composer.filter(|c| c.has_inputs());
        let mut sections = Vec::with_capacity(self.schema.sections.len());
        let mut composed = Vec::new();
        let mut generic = Vec::new();

        for spec in self.schema.sections {
            if let Some(text) = record.get(spec.key) {
                if meets(text, spec.min_len) {
                    sections.push((spec.key, text.trim().to_string()));
                    continue;
                }
                tracing::debug!(
                    section = spec.key,
                    len = text.trim().chars().count(),
                    min = spec.min_len,
                    "Section below threshold"
                );
            }

            let mut replacement = match composer {
                Some(c) => {
                    composed.push(spec.key);
                    c.compose(spec.role)
                }
                None => {
                    generic.push(spec.key);
                    RETRY_MESSAGE.to_string()
                }
            };
            if !meets(&replacement, spec.min_len) {
                tracing::warn!(section = spec.key, "Composed section still short, appending retry message");
                replacement.push(' ');
                replacement.push_str(RETRY_MESSAGE);
            }
            sections.push((spec.key, replacement.trim().to_string()));
        }

        Validation {
            record: ValidatedRecord::from_ordered(sections),
            composed,
            generic,
        }
    }
}

fn meets(text: &str, min_len: usize) -> bool {
    text.trim().chars().count() >= min_len
}
