//! Deterministic narrative from the numeric panel alone.
//!
//! The composer never fails: every role yields text for any
//! `ClinicalInputs`, including an empty one. Where a formula cannot be
//! computed the text names the missing inputs instead of a number.

use super::schema::{SectionRole, SectionSchema};
use crate::models::{AbnormalFlag, ClinicalInputs, Field, SampleType, SectionedRecord};
use crate::pipeline::clinical::{
    kpa_to_mmhg, CompensationAssessment, DeltaInterpretation, DerivedCalculations, FormulaSet,
    PrimaryDisorder, Range, ReferenceRanges,
};

/// Most differentials listed for one disorder.
const MAX_DIFFERENTIALS: usize = 4;

pub struct FallbackComposer<'a> {
    inputs: &'a ClinicalInputs,
    sample_type: SampleType,
    ranges: &'a ReferenceRanges,
    calc: DerivedCalculations,
}

impl<'a> FallbackComposer<'a> {
    pub fn new(
        inputs: &'a ClinicalInputs,
        sample_type: SampleType,
        ranges: &'a ReferenceRanges,
        formulas: FormulaSet,
    ) -> Self {
        Self {
            inputs,
            sample_type,
            ranges,
            calc: DerivedCalculations::compute(inputs, ranges, formulas),
        }
    }

    pub fn calculations(&self) -> &DerivedCalculations {
        &self.calc
    }

    /// Whether any input value is present at all.
    pub fn has_inputs(&self) -> bool {
        !self.inputs.is_empty()
    }

    /// Compose every section of a schema.
    pub fn compose_record(&self, schema: &SectionSchema) -> SectionedRecord {
        let mut record = SectionedRecord::new();
        for spec in schema.sections {
            record.insert(spec.key, self.compose(spec.role));
        }
        record
    }

    pub fn compose(&self, role: SectionRole) -> String {
        match role {
            SectionRole::Summary => self.summary(),
            SectionRole::Interpretation => self.interpretation(),
            SectionRole::Compensation => self.compensation(),
            SectionRole::HendersonHasselbalch => self.henderson_hasselbalch(),
            SectionRole::Stewart => self.stewart(),
            SectionRole::Calculations => [
                self.anion_gap(),
                self.compensation(),
                self.stewart(),
                self.oxygenation(),
            ]
            .join("\n"),
            SectionRole::AdditionalCalculations => {
                [self.anion_gap(), self.oxygenation()].join("\n")
            }
            SectionRole::Differentials => self.differentials(),
            SectionRole::CriticalCare => self.critical_care(),
            SectionRole::Biochemistry => self.biochemistry(),
        }
    }

    /// Values beyond their critical limits, plus a critical P/F ratio.
    pub fn critical_flags(&self) -> Vec<String> {
        let mut flags: Vec<String> = self
            .inputs
            .present()
            .filter_map(|(field, value)| {
                let range = self.ranges.for_field(field)?;
                match range.classify(value) {
                    AbnormalFlag::CriticalLow => Some(format!(
                        "{} {} — critically low (below {})",
                        field.label(),
                        with_unit(field, value),
                        num(range.critical_low.unwrap_or(range.low)),
                    )),
                    AbnormalFlag::CriticalHigh => Some(format!(
                        "{} {} — critically high (above {})",
                        field.label(),
                        with_unit(field, value),
                        num(range.critical_high.unwrap_or(range.high)),
                    )),
                    _ => None,
                }
            })
            .collect();

        if let Some(pf) = self.calc.pf_ratio {
            if self.ranges.pf_ratio.classify(pf) == AbnormalFlag::CriticalLow {
                flags.push(format!(
                    "P/F ratio {pf:.0} mmHg — critically impaired oxygenation (below {})",
                    num(self.ranges.pf_ratio.critical_low.unwrap_or(self.ranges.pf_ratio.low)),
                ));
            }
        }
        flags
    }

    // ═══════════════════════════════════════════════════════════
    // Sections
    // ═══════════════════════════════════════════════════════════

    fn summary(&self) -> String {
        let sample = match self.sample_type {
            SampleType::Unknown => "Blood gas".to_string(),
            other => format!("{} blood gas", capitalise(other.describe())),
        };
        let Some(disorder) = self.calc.primary_disorder else {
            return format!(
                "{sample}: the acid-base state cannot be classified because {}.",
                missing_phrase(self.inputs, &[Field::Ph, Field::Pco2])
            );
        };

        let mut text = format!(
            "{sample} showing {} ({}).",
            disorder.describe(),
            self.ph_statement()
        );
        if let Some(assessment) = &self.calc.compensation {
            text.push(' ');
            text.push_str(&capitalise(&compensation_phrase(assessment)));
            text.push('.');
        }
        let flags = self.critical_flags();
        if !flags.is_empty() {
            text.push_str(&format!(
                " {} critical value{} present.",
                flags.len(),
                if flags.len() == 1 { "" } else { "s" }
            ));
        }
        text
    }

    fn interpretation(&self) -> String {
        let mut lines = vec![
            format!("{}.", self.ph_statement()),
            self.value_statement(Field::Pco2, "hypocapnia", "normocapnia", "hypercapnia"),
            self.value_statement(Field::Hco3, "low bicarbonate", "normal bicarbonate", "raised bicarbonate"),
        ];
        if self.inputs.be().is_some() {
            lines.push(self.value_statement(Field::Be, "base deficit", "normal base excess", "base excess"));
        }
        lines.push(match self.calc.primary_disorder {
            Some(disorder) => format!("Primary process: {}.", disorder.describe()),
            None => "Primary process cannot be identified without pH and pCO2.".to_string(),
        });
        if let Some(ag) = self.calc.anion_gap {
            lines.push(format!(
                "Anion gap {ag:.1} mmol/L ({}).",
                level_word(self.ranges.anion_gap.classify(ag), "low", "normal", "raised")
            ));
        }
        if let Some(lactate) = self.inputs.lactate() {
            lines.push(self.value_statement_for(Field::Lactate, lactate, "low lactate", "normal lactate", "hyperlactataemia"));
        }
        lines.join("\n")
    }

    fn compensation(&self) -> String {
        if let Some(assessment) = &self.calc.compensation {
            let mut text = capitalise(&compensation_phrase(assessment));
            text.push('.');
            return text;
        }
        match self.calc.primary_disorder {
            None => format!(
                "Compensation cannot be assessed because {}.",
                missing_phrase(self.inputs, &[Field::Ph, Field::Pco2])
            ),
            Some(PrimaryDisorder::Normal) => {
                "No primary acid-base disturbance, so no compensatory response is expected.".to_string()
            }
            Some(PrimaryDisorder::CompensatedOrMixed) => {
                "pH is normal despite abnormal pCO2 and HCO3-: consider a fully compensated or mixed disorder.".to_string()
            }
            Some(disorder) => format!(
                "Expected compensation for {} cannot be calculated because {}.",
                disorder.describe(),
                missing_phrase(self.inputs, &[Field::Hco3, Field::Pco2])
            ),
        }
    }

    fn henderson_hasselbalch(&self) -> String {
        let mut lines = vec![
            format!("Henderson-Hasselbalch approach: {}.", self.ph_statement()),
            self.value_statement(Field::Pco2, "hypocapnia", "normocapnia", "hypercapnia"),
            self.value_statement(Field::Hco3, "low bicarbonate", "normal bicarbonate", "raised bicarbonate"),
        ];
        if let Some(disorder) = self.calc.primary_disorder {
            lines.push(format!("Primary process: {}.", disorder.describe()));
        }
        lines.push(self.compensation());
        lines.join("\n")
    }

    fn stewart(&self) -> String {
        let mut lines = Vec::new();
        match self.calc.sid_apparent {
            Some(sid) => {
                let judgment = match self.ranges.sid_apparent.classify(sid.value) {
                    AbnormalFlag::Low | AbnormalFlag::CriticalLow => {
                        "low, supporting a strong ion (metabolic) acidosis"
                    }
                    AbnormalFlag::High | AbnormalFlag::CriticalHigh => {
                        "raised, supporting a strong ion (metabolic) alkalosis"
                    }
                    AbnormalFlag::Normal => "within range",
                };
                lines.push(format!(
                    "Stewart approach: apparent strong ion difference {:.1} mmol/L{} (reference {}–{}) — {judgment}.",
                    sid.value,
                    if sid.lactate_adjusted { " after subtracting lactate" } else { "" },
                    num(self.ranges.sid_apparent.low),
                    num(self.ranges.sid_apparent.high),
                ));
            }
            None => lines.push(format!(
                "Stewart approach: apparent strong ion difference not calculable because {}.",
                missing_phrase(self.inputs, &[Field::Sodium, Field::Potassium, Field::Chloride])
            )),
        }
        match self.inputs.albumin() {
            Some(albumin) if albumin < self.ranges.albumin.low => lines.push(format!(
                "Hypoalbuminaemia (albumin {} g/L) lowers the weak acid load, an alkalinising effect that can mask an acidosis.",
                num(albumin)
            )),
            Some(albumin) => lines.push(format!(
                "Albumin {} g/L: no significant weak acid effect.",
                num(albumin)
            )),
            None => lines.push("Albumin not provided, so the weak acid contribution is unknown.".to_string()),
        }
        lines.join("\n")
    }

    fn anion_gap(&self) -> String {
        let Some(ag) = self.calc.anion_gap else {
            return format!(
                "Anion gap not calculable because {}.",
                missing_phrase(self.inputs, &[Field::Sodium, Field::Chloride, Field::Hco3])
            );
        };
        let range = &self.ranges.anion_gap;
        let mut text = format!(
            "Anion gap {ag:.1} mmol/L (reference {}–{}) — {}.",
            num(range.low),
            num(range.high),
            level_word(range.classify(ag), "low", "normal", "raised")
        );
        match (self.inputs.albumin(), self.calc.corrected_anion_gap) {
            (Some(albumin), Some(corrected)) => text.push_str(&format!(
                " Albumin-corrected anion gap {corrected:.1} mmol/L (albumin {} g/L) — {}.",
                num(albumin),
                level_word(range.classify(corrected), "low", "normal", "raised")
            )),
            _ => text.push_str(" Albumin not provided, so the gap is uncorrected."),
        }
        if let Some(ratio) = self.calc.delta_ratio {
            text.push_str(&format!(
                " Delta ratio {ratio:.2}: {}.",
                DeltaInterpretation::from_ratio(ratio).describe()
            ));
        }
        text
    }

    fn oxygenation(&self) -> String {
        let mut lines = Vec::new();
        if self.sample_type == SampleType::Venous {
            lines.push("Venous sample: pO2 does not reflect arterial oxygenation.".to_string());
        }
        match self.calc.pf_ratio {
            Some(pf) => lines.push(format!(
                "P/F ratio {pf:.0} mmHg — {}.",
                match self.ranges.pf_ratio.classify(pf) {
                    AbnormalFlag::CriticalLow => "severely impaired oxygenation",
                    AbnormalFlag::Low => "impaired oxygenation",
                    _ => "adequate oxygenation",
                }
            )),
            None => lines.push(format!(
                "P/F ratio not calculable because {}.",
                missing_phrase(self.inputs, &[Field::Po2, Field::Fio2])
            )),
        }
        if let Some(aa) = self.calc.aa_gradient {
            lines.push(format!(
                "A–a gradient {aa:.1} kPa — {}.",
                level_word(self.ranges.aa_gradient.classify(aa), "normal", "normal", "raised, suggesting a gas exchange defect")
            ));
        }
        lines.join("\n")
    }

    fn differentials(&self) -> String {
        let Some(disorder) = self.calc.primary_disorder else {
            return format!(
                "A differential diagnosis cannot be offered because {}.",
                missing_phrase(self.inputs, &[Field::Ph, Field::Pco2])
            );
        };

        match disorder {
            PrimaryDisorder::Normal => {
                return "No acid-base disorder identified; interpret any electrolyte or oxygenation abnormality in clinical context.".to_string();
            }
            PrimaryDisorder::CompensatedOrMixed => {
                return "Normal pH with abnormal pCO2 and HCO3-: consider chronic respiratory disease with renal compensation, or opposing metabolic and respiratory processes.".to_string();
            }
            _ => {}
        }

        let mut causes: Vec<&str> = Vec::new();
        if disorder.is_metabolic_acidosis() {
            causes.extend(self.metabolic_acidosis_causes());
        }
        match disorder {
            PrimaryDisorder::RespiratoryAcidosis | PrimaryDisorder::MixedAcidosis => causes.extend([
                "COPD or asthma exacerbation with ventilatory failure",
                "Opioid or sedative induced hypoventilation",
                "Neuromuscular weakness or chest wall disease",
            ]),
            PrimaryDisorder::MetabolicAlkalosis | PrimaryDisorder::MixedAlkalosis => causes.extend([
                "Vomiting or nasogastric losses",
                "Diuretic therapy",
                "Mineralocorticoid excess or severe hypokalaemia",
            ]),
            _ => {}
        }
        if matches!(
            disorder,
            PrimaryDisorder::RespiratoryAlkalosis | PrimaryDisorder::MixedAlkalosis
        ) {
            causes.extend([
                "Pain, anxiety or hyperventilation",
                "Pulmonary embolism or early pneumonia",
                "Early sepsis",
                "Salicylate toxicity",
            ]);
        }

        causes.dedup();
        causes
            .iter()
            .take(MAX_DIFFERENTIALS)
            .enumerate()
            .map(|(i, cause)| format!("{}. {cause}", i + 1))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn metabolic_acidosis_causes(&self) -> Vec<&'static str> {
        let lactate_raised = self
            .inputs
            .lactate()
            .is_some_and(|l| l > self.ranges.lactate.high);
        let gap_raised = self
            .calc
            .corrected_anion_gap
            .map(|ag| ag > self.ranges.anion_gap.high);

        let mut causes = Vec::new();
        match gap_raised {
            Some(false) => causes.extend([
                "Diarrhoea or other gastrointestinal bicarbonate loss",
                "Renal tubular acidosis",
                "Hyperchloraemia from saline resuscitation",
            ]),
            _ => {
                if lactate_raised {
                    causes.push("Lactic acidosis from sepsis or tissue hypoperfusion");
                }
                causes.extend([
                    "Diabetic or alcoholic ketoacidosis",
                    "Acute kidney injury with uraemic acidosis",
                    "Toxic ingestion (methanol, ethylene glycol, salicylate)",
                ]);
                if !lactate_raised {
                    causes.push("Lactic acidosis (lactate not raised or not measured)");
                }
            }
        }
        causes
    }

    fn critical_care(&self) -> String {
        let flags = self.critical_flags();
        let mut text = if flags.is_empty() {
            "No critical values identified among the supplied results.".to_string()
        } else {
            let mut text = "Critical values:".to_string();
            for flag in &flags {
                text.push_str("\n- ");
                text.push_str(flag);
            }
            text
        };

        let action = match self.calc.primary_disorder {
            Some(d) if d.is_metabolic_acidosis() => {
                "Assess perfusion and volume status, check ketones and renal function, and treat the underlying cause; repeat the gas after intervention."
            }
            Some(PrimaryDisorder::RespiratoryAcidosis) => {
                "Assess airway, conscious level and ventilation; consider non-invasive ventilation if hypercapnia persists."
            }
            Some(PrimaryDisorder::RespiratoryAlkalosis) => {
                "Look for hypoxaemia, pain or sepsis driving hyperventilation."
            }
            Some(PrimaryDisorder::MetabolicAlkalosis) | Some(PrimaryDisorder::MixedAlkalosis) => {
                "Check volume status, potassium and chloride; review diuretics and gastrointestinal losses."
            }
            _ => "Correlate with the clinical picture and repeat the blood gas if the condition changes.",
        };
        text.push('\n');
        text.push_str(action);
        text
    }

    fn biochemistry(&self) -> String {
        const PANEL: [Field; 8] = [
            Field::Sodium,
            Field::Potassium,
            Field::Chloride,
            Field::Lactate,
            Field::Glucose,
            Field::Albumin,
            Field::Calcium,
            Field::Hb,
        ];
        let lines: Vec<String> = PANEL
            .iter()
            .filter_map(|&field| {
                let value = self.inputs.get(field)?;
                let range = self.ranges.for_field(field)?;
                Some(format!(
                    "{} {} — {}",
                    field.label(),
                    with_unit(field, value),
                    flag_word(range, value)
                ))
            })
            .collect();

        let missing: Vec<&str> = PANEL
            .iter()
            .filter(|f| self.inputs.get(**f).is_none())
            .map(|f| f.label())
            .collect();

        if lines.is_empty() {
            return "No electrolyte, metabolite or haemoglobin values were supplied; biochemical interpretation is limited to the blood gas itself.".to_string();
        }
        let mut text = lines.join("\n");
        if !missing.is_empty() {
            text.push_str(&format!("\nNot provided: {}.", missing.join(", ")));
        }
        text
    }

    // ═══════════════════════════════════════════════════════════
    // Statements
    // ═══════════════════════════════════════════════════════════

    fn ph_statement(&self) -> String {
        match self.inputs.ph() {
            Some(ph) => format!(
                "pH {ph:.2} — {}",
                match self.ranges.ph.classify(ph) {
                    AbnormalFlag::CriticalLow => "severe acidaemia",
                    AbnormalFlag::Low => "acidaemia",
                    AbnormalFlag::High => "alkalaemia",
                    AbnormalFlag::CriticalHigh => "severe alkalaemia",
                    AbnormalFlag::Normal => "normal",
                }
            ),
            None => "pH not provided".to_string(),
        }
    }

    fn value_statement(&self, field: Field, low: &str, normal: &str, high: &str) -> String {
        match self.inputs.get(field) {
            Some(value) => self.value_statement_for(field, value, low, normal, high),
            None => format!("{} not provided.", field.label()),
        }
    }

    fn value_statement_for(&self, field: Field, value: f64, low: &str, normal: &str, high: &str) -> String {
        let flag = self
            .ranges
            .for_field(field)
            .map(|r| r.classify(value))
            .unwrap_or(AbnormalFlag::Normal);
        let mmhg = match field {
            Field::Pco2 | Field::Po2 => format!(" ({:.1} mmHg)", kpa_to_mmhg(value)),
            _ => String::new(),
        };
        format!(
            "{} {}{mmhg} — {}{}.",
            field.label(),
            with_unit(field, value),
            level_word(flag, low, normal, high),
            if flag.is_critical() { " (critical)" } else { "" }
        )
    }
}

fn compensation_phrase(assessment: &CompensationAssessment) -> String {
    let measured = if assessment.band.unit == "mmHg" { "pCO2" } else { "HCO3-" };
    let mut text = format!(
        "{} expected {measured} {:.1}–{:.1} {unit} vs actual {:.1} {unit} — {}",
        assessment.rule,
        assessment.band.low,
        assessment.band.high,
        assessment.actual,
        assessment.judgment.describe(),
        unit = assessment.band.unit,
    );
    if let Some(chronicity) = assessment.chronicity {
        text.push_str(&format!(", consistent with {} compensation", chronicity.describe()));
    }
    if let Some(implication) = assessment.implication {
        text.push_str(&format!(", suggesting {implication}"));
    }
    text
}

/// "because pH and pCO2 were not provided" for the missing subset.
fn missing_phrase(inputs: &ClinicalInputs, needed: &[Field]) -> String {
    let missing: Vec<&str> = needed
        .iter()
        .filter(|f| inputs.get(**f).is_none())
        .map(|f| f.label())
        .collect();
    match missing.as_slice() {
        [] => "the supplied values do not fit the calculation".to_string(),
        [one] => format!("{one} was not provided"),
        many => format!("{} were not provided", join_and(many)),
    }
}

fn join_and(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [one] => one.to_string(),
        [head @ .., last] => format!("{} and {last}", head.join(", ")),
    }
}

fn level_word<'s>(flag: AbnormalFlag, low: &'s str, normal: &'s str, high: &'s str) -> &'s str {
    match flag {
        AbnormalFlag::Low | AbnormalFlag::CriticalLow => low,
        AbnormalFlag::High | AbnormalFlag::CriticalHigh => high,
        AbnormalFlag::Normal => normal,
    }
}

fn flag_word(range: &Range, value: f64) -> &'static str {
    match range.classify(value) {
        AbnormalFlag::Normal => "normal",
        AbnormalFlag::Low => "low",
        AbnormalFlag::High => "high",
        AbnormalFlag::CriticalLow => "critically low",
        AbnormalFlag::CriticalHigh => "critically high",
    }
}

fn with_unit(field: Field, value: f64) -> String {
    match field.unit() {
        "" => num(value),
        "%" => format!("{}%", num(value)),
        unit => format!("{} {unit}", num(value)),
    }
}

/// Up to two decimals, trailing zeros dropped.
fn num(value: f64) -> String {
    let text = format!("{value:.2}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn capitalise(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::structuring::schema::{BRIEF, COMPREHENSIVE};

    fn scenario() -> ClinicalInputs {
        ClinicalInputs::from_pairs([
            (Field::Ph, 7.15),
            (Field::Pco2, 2.0),
            (Field::Hco3, 8.0),
            (Field::Sodium, 138.0),
            (Field::Chloride, 95.0),
            (Field::Albumin, 20.0),
            (Field::Lactate, 9.0),
        ])
        .unwrap()
    }

    #[test]
    fn scenario_reports_acidaemia_gap_and_critical_lactate() {
        let inputs = scenario();
        let ranges = ReferenceRanges::canonical();
        let composer =
            FallbackComposer::new(&inputs, SampleType::Arterial, &ranges, COMPREHENSIVE.formulas);
        let record = composer.compose_record(&COMPREHENSIVE);

        assert!(record.get("summary").unwrap().contains("acidaemia"));
        assert!(record.get("keyFindings").unwrap().contains("acidaemia"));
        let calcs = record.get("additionalCalculations").unwrap();
        assert!(calcs.contains("Anion gap 35.0 mmol/L"), "{calcs}");
        assert!(calcs.contains("Albumin-corrected anion gap 40.0 mmol/L"), "{calcs}");
        let critical = record.get("criticalCareAssessment").unwrap();
        assert!(critical.contains("Lactate 9 mmol/L — critically high"), "{critical}");
        assert_eq!(record.len(), COMPREHENSIVE.sections.len());
    }

    #[test]
    fn blood_gas_tensions_carry_mmhg_equivalent() {
        let inputs = scenario();
        let ranges = ReferenceRanges::canonical();
        let composer =
            FallbackComposer::new(&inputs, SampleType::Arterial, &ranges, FormulaSet::ALL);
        let text = composer.compose(SectionRole::Interpretation);
        assert!(text.contains("pCO2 2 kPa (15.0 mmHg) — hypocapnia"), "{text}");
        assert_eq!(kpa_to_mmhg(2.0), 15.0);
    }

    #[test]
    fn winters_text_shows_band_and_judgment() {
        let inputs = scenario();
        let ranges = ReferenceRanges::canonical();
        let composer =
            FallbackComposer::new(&inputs, SampleType::Arterial, &ranges, FormulaSet::ALL);
        let text = composer.compose(SectionRole::Compensation);
        assert!(
            text.contains("expected pCO2 18.0–22.0 mmHg vs actual 15.0 mmHg — excessive compensation (mixed disorder)"),
            "{text}"
        );
        assert!(text.contains("respiratory alkalosis"));
    }

    #[test]
    fn critical_flags_cover_listed_thresholds() {
        let inputs = ClinicalInputs::from_pairs([
            (Field::Ph, 7.65),
            (Field::Pco2, 3.0),
            (Field::Potassium, 2.2),
            (Field::Sodium, 118.0),
            (Field::Glucose, 2.5),
            (Field::Po2, 6.5),
            (Field::Fio2, 60.0),
        ])
        .unwrap();
        let ranges = ReferenceRanges::canonical();
        let composer = FallbackComposer::new(&inputs, SampleType::Arterial, &ranges, FormulaSet::ALL);
        let flags = composer.critical_flags();
        for needle in ["pH", "K+", "Na+", "Glucose", "P/F ratio"] {
            assert!(flags.iter().any(|f| f.starts_with(needle)), "{needle}: {flags:?}");
        }
    }

    #[test]
    fn missing_inputs_are_named_not_invented() {
        let inputs = ClinicalInputs::from_pairs([(Field::Ph, 7.30), (Field::Pco2, 6.5)]).unwrap();
        let ranges = ReferenceRanges::canonical();
        let composer = FallbackComposer::new(&inputs, SampleType::Unknown, &ranges, FormulaSet::ALL);
        let ag = composer.compose(SectionRole::AdditionalCalculations);
        assert!(ag.contains("Anion gap not calculable because Na+, Cl- and HCO3- were not provided"), "{ag}");
        assert!(ag.contains("P/F ratio not calculable because pO2 and FiO2 were not provided"), "{ag}");
        let stewart = composer.compose(SectionRole::Stewart);
        assert!(stewart.contains("not calculable"));
    }

    #[test]
    fn every_role_meets_thresholds_with_core_inputs_only() {
        let inputs = ClinicalInputs::from_pairs([(Field::Ph, 7.40), (Field::Pco2, 5.3)]).unwrap();
        let ranges = ReferenceRanges::canonical();
        for schema in [&BRIEF, &COMPREHENSIVE] {
            let composer = FallbackComposer::new(&inputs, SampleType::Unknown, &ranges, schema.formulas);
            let record = composer.compose_record(schema);
            for spec in schema.sections {
                let text = record.get(spec.key).unwrap();
                assert!(text.len() >= spec.min_len, "{}: {text}", spec.key);
            }
        }
    }

    #[test]
    fn empty_inputs_still_compose() {
        let inputs = ClinicalInputs::default();
        let ranges = ReferenceRanges::canonical();
        let composer = FallbackComposer::new(&inputs, SampleType::Unknown, &ranges, FormulaSet::ALL);
        assert!(!composer.has_inputs());
        let record = composer.compose_record(&COMPREHENSIVE);
        assert_eq!(record.len(), COMPREHENSIVE.sections.len());
        assert!(record.get("summary").unwrap().contains("cannot be classified"));
    }

    #[test]
    fn differentials_follow_primary_disorder() {
        let ranges = ReferenceRanges::canonical();
        let resp = ClinicalInputs::from_pairs([(Field::Ph, 7.25), (Field::Pco2, 8.5), (Field::Hco3, 27.0)]).unwrap();
        let composer = FallbackComposer::new(&resp, SampleType::Arterial, &ranges, FormulaSet::ALL);
        let text = composer.compose(SectionRole::Differentials);
        assert!(text.starts_with("1. COPD"), "{text}");

        let scenario = scenario();
        let composer = FallbackComposer::new(&scenario, SampleType::Arterial, &ranges, FormulaSet::ALL);
        let text = composer.compose(SectionRole::Differentials);
        assert!(text.starts_with("1. Lactic acidosis from sepsis"), "{text}");
        assert!(text.lines().count() <= MAX_DIFFERENTIALS);
    }

    #[test]
    fn venous_sample_is_noted_in_oxygenation() {
        let inputs = ClinicalInputs::from_pairs([(Field::Ph, 7.35), (Field::Pco2, 6.0), (Field::Po2, 5.0)]).unwrap();
        let ranges = ReferenceRanges::canonical();
        let composer = FallbackComposer::new(&inputs, SampleType::Venous, &ranges, FormulaSet::ALL);
        assert!(composer
            .compose(SectionRole::AdditionalCalculations)
            .contains("Venous sample"));
    }

    #[test]
    fn number_formatting_drops_trailing_zeros() {
        assert_eq!(num(9.0), "9");
        assert_eq!(num(7.15), "7.15");
        assert_eq!(num(41.25), "41.25");
        assert_eq!(num(0.5), "0.5");
    }
}
