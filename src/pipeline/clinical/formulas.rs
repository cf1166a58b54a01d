//! Deterministic acid-base and gas-exchange calculations.
//!
//! Every function returns `None` when one of its inputs is absent. A
//! missing input never turns into a zero.

use serde::Serialize;

use super::reference::{Range, ReferenceRanges};
use crate::models::{AbnormalFlag, ClinicalInputs, KPA_TO_MMHG};

/// Normal anion gap used as the delta-ratio baseline (mmol/L).
const NORMAL_ANION_GAP: f64 = 12.0;

/// Normal bicarbonate used as the delta-ratio baseline (mmol/L).
const NORMAL_HCO3: f64 = 24.0;

/// Normal albumin used by the anion gap correction (g/L).
const NORMAL_ALBUMIN: f64 = 40.0;

/// Anion gap rise per g/L of albumin below normal.
const ALBUMIN_GAP_FACTOR: f64 = 0.25;

/// Tolerance on every expected-compensation estimate (mmHg or mmol/L).
const COMPENSATION_TOLERANCE: f64 = 2.0;

/// Normal pCO2 in mmHg, the reference point for respiratory rules.
const NORMAL_PCO2_MMHG: f64 = 40.0;

/// Barometric and water vapour pressure at sea level (kPa).
const ATMOSPHERIC_KPA: f64 = 101.3;
const WATER_VAPOUR_KPA: f64 = 6.3;

/// Respiratory quotient for the alveolar gas equation.
const RESPIRATORY_QUOTIENT: f64 = 0.8;

// ═══════════════════════════════════════════════════════════
// Formula set — which optional calculations a schema enables
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaSet {
    pub delta_ratio: bool,
    pub stewart: bool,
    /// Subtract lactate from the apparent SID when it is present.
    pub sid_subtracts_lactate: bool,
    pub oxygenation: bool,
}

impl FormulaSet {
    pub const ALL: FormulaSet = FormulaSet {
        delta_ratio: true,
        stewart: true,
        sid_subtracts_lactate: true,
        oxygenation: true,
    };
}

// ═══════════════════════════════════════════════════════════
// Single formulas
// ═══════════════════════════════════════════════════════════

/// Na − (Cl + HCO3).
pub fn anion_gap(inputs: &ClinicalInputs) -> Option<f64> {
    Some(inputs.sodium()? - (inputs.chloride()? + inputs.hco3()?))
}

/// Albumin-corrected anion gap. Falls back to the raw gap when albumin
/// was not measured.
pub fn corrected_anion_gap(inputs: &ClinicalInputs) -> Option<f64> {
    let gap = anion_gap(inputs)?;
    Some(match inputs.albumin() {
        Some(albumin) => gap + ALBUMIN_GAP_FACTOR * (NORMAL_ALBUMIN - albumin),
        None => gap,
    })
}

/// (AG − 12) / (24 − HCO3), only for a raised gap and HCO3 ≠ 24.
pub fn delta_ratio(inputs: &ClinicalInputs) -> Option<f64> {
    let gap = anion_gap(inputs)?;
    let hco3 = inputs.hco3()?;
    if gap <= NORMAL_ANION_GAP || (NORMAL_HCO3 - hco3).abs() < f64::EPSILON {
        return None;
    }
    Some((gap - NORMAL_ANION_GAP) / (NORMAL_HCO3 - hco3))
}

/// Na + K − Cl, optionally minus lactate.
pub fn sid_apparent(inputs: &ClinicalInputs, subtract_lactate: bool) -> Option<SidApparent> {
    let base = inputs.sodium()? + inputs.potassium()? - inputs.chloride()?;
    let lactate = inputs.lactate().filter(|_| subtract_lactate);
    Some(SidApparent {
        value: base - lactate.unwrap_or(0.0),
        lactate_adjusted: lactate.is_some(),
    })
}

/// pO2 (mmHg) / FiO2 (fraction).
pub fn pf_ratio(inputs: &ClinicalInputs) -> Option<f64> {
    Some(inputs.po2_mmhg()? / inputs.fio2_fraction()?)
}

/// Alveolar–arterial oxygen gradient in kPa.
pub fn aa_gradient(inputs: &ClinicalInputs) -> Option<f64> {
    let fio2 = inputs.fio2_fraction()?;
    let alveolar =
        fio2 * (ATMOSPHERIC_KPA - WATER_VAPOUR_KPA) - inputs.pco2()? / RESPIRATORY_QUOTIENT;
    Some(alveolar - inputs.po2()?)
}

/// Winter's formula: expected pCO2 = 1.5 × HCO3 + 8 ± 2 mmHg.
pub fn winters_band(inputs: &ClinicalInputs) -> Option<ExpectedBand> {
    let hco3 = inputs.hco3()?;
    Some(ExpectedBand::around(1.5 * hco3 + 8.0, "mmHg"))
}

/// Metabolic alkalosis: expected pCO2 = 0.7 × HCO3 + 21 ± 2 mmHg.
pub fn alkalosis_pco2_band(inputs: &ClinicalInputs) -> Option<ExpectedBand> {
    let hco3 = inputs.hco3()?;
    Some(ExpectedBand::around(0.7 * hco3 + 21.0, "mmHg"))
}

// ═══════════════════════════════════════════════════════════
// Result types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SidApparent {
    pub value: f64,
    pub lactate_adjusted: bool,
}

/// An expected value with its tolerance band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedBand {
    pub expected: f64,
    pub low: f64,
    pub high: f64,
    pub unit: &'static str,
}

impl ExpectedBand {
    fn around(expected: f64, unit: &'static str) -> Self {
        Self {
            expected,
            low: expected - COMPENSATION_TOLERANCE,
            high: expected + COMPENSATION_TOLERANCE,
            unit,
        }
    }

    fn spanning(low: f64, high: f64, unit: &'static str) -> Self {
        Self {
            expected: (low + high) / 2.0,
            low: low - COMPENSATION_TOLERANCE,
            high: high + COMPENSATION_TOLERANCE,
            unit,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryDisorder {
    Normal,
    MetabolicAcidosis,
    RespiratoryAcidosis,
    MixedAcidosis,
    MetabolicAlkalosis,
    RespiratoryAlkalosis,
    MixedAlkalosis,
    /// Normal pH with abnormal pCO2 and HCO3.
    CompensatedOrMixed,
}

impl PrimaryDisorder {
    pub fn describe(&self) -> &'static str {
        match self {
            PrimaryDisorder::Normal => "no primary acid-base disturbance",
            PrimaryDisorder::MetabolicAcidosis => "metabolic acidosis",
            PrimaryDisorder::RespiratoryAcidosis => "respiratory acidosis",
            PrimaryDisorder::MixedAcidosis => "mixed metabolic and respiratory acidosis",
            PrimaryDisorder::MetabolicAlkalosis => "metabolic alkalosis",
            PrimaryDisorder::RespiratoryAlkalosis => "respiratory alkalosis",
            PrimaryDisorder::MixedAlkalosis => "mixed metabolic and respiratory alkalosis",
            PrimaryDisorder::CompensatedOrMixed => {
                "fully compensated or mixed disorder with a normal pH"
            }
        }
    }

    pub fn is_metabolic_acidosis(&self) -> bool {
        matches!(
            self,
            PrimaryDisorder::MetabolicAcidosis | PrimaryDisorder::MixedAcidosis
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompensationJudgment {
    Appropriate,
    /// Actual value beyond the band in the direction of the primary
    /// disorder: a second process is adding to it.
    Inadequate,
    /// Actual value beyond the band in the opposite direction.
    Excessive,
}

impl CompensationJudgment {
    pub fn describe(&self) -> &'static str {
        match self {
            CompensationJudgment::Appropriate => "appropriate compensation",
            CompensationJudgment::Inadequate => "compensation inadequacy (mixed disorder)",
            CompensationJudgment::Excessive => "excessive compensation (mixed disorder)",
        }
    }
}

/// Respiratory disorders only: where the HCO3 sits between the acute
/// and chronic expectations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Chronicity {
    Acute,
    Chronic,
    AcuteOnChronic,
}

impl Chronicity {
    pub fn describe(&self) -> &'static str {
        match self {
            Chronicity::Acute => "acute",
            Chronicity::Chronic => "chronic",
            Chronicity::AcuteOnChronic => "acute-on-chronic or partially compensated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompensationAssessment {
    pub rule: &'static str,
    pub band: ExpectedBand,
    pub actual: f64,
    pub judgment: CompensationJudgment,
    pub chronicity: Option<Chronicity>,
    /// What an out-of-band value implies.
    pub implication: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaInterpretation {
    NormalGapAcidosis,
    CombinedGapAndNormalGap,
    PureHighGap,
    HighGapWithAlkalosis,
}

impl DeltaInterpretation {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < 0.4 {
            DeltaInterpretation::NormalGapAcidosis
        } else if ratio < 0.8 {
            DeltaInterpretation::CombinedGapAndNormalGap
        } else if ratio <= 2.0 {
            DeltaInterpretation::PureHighGap
        } else {
            DeltaInterpretation::HighGapWithAlkalosis
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            DeltaInterpretation::NormalGapAcidosis => {
                "predominantly hyperchloraemic (normal anion gap) acidosis"
            }
            DeltaInterpretation::CombinedGapAndNormalGap => {
                "combined high and normal anion gap metabolic acidosis"
            }
            DeltaInterpretation::PureHighGap => "uncomplicated high anion gap metabolic acidosis",
            DeltaInterpretation::HighGapWithAlkalosis => {
                "high anion gap acidosis with a coexisting metabolic alkalosis or pre-existing raised bicarbonate"
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Classification
// ═══════════════════════════════════════════════════════════

/// Primary disorder from pH, pCO2 and (when present) HCO3.
pub fn classify_primary(inputs: &ClinicalInputs, ranges: &ReferenceRanges) -> Option<PrimaryDisorder> {
    let ph = direction(&ranges.ph, inputs.ph()?);
    let pco2 = direction(&ranges.pco2, inputs.pco2()?);
    let hco3 = inputs.hco3().map(|v| direction(&ranges.hco3, v));

    let disorder = match ph {
        Level::Low => match (pco2, hco3) {
            (Level::High, Some(Level::Low)) => PrimaryDisorder::MixedAcidosis,
            (Level::High, _) => PrimaryDisorder::RespiratoryAcidosis,
            _ => PrimaryDisorder::MetabolicAcidosis,
        },
        Level::High => match (pco2, hco3) {
            (Level::Low, Some(Level::High)) => PrimaryDisorder::MixedAlkalosis,
            (Level::Low, _) => PrimaryDisorder::RespiratoryAlkalosis,
            _ => PrimaryDisorder::MetabolicAlkalosis,
        },
        Level::Normal => match (pco2, hco3) {
            (Level::Normal, None | Some(Level::Normal)) => PrimaryDisorder::Normal,
            (_, Some(Level::Normal)) | (Level::Normal, _) => PrimaryDisorder::CompensatedOrMixed,
            _ => PrimaryDisorder::CompensatedOrMixed,
        },
    };
    Some(disorder)
}

/// Expected compensation for the primary disorder, when the inputs allow.
pub fn assess_compensation(
    inputs: &ClinicalInputs,
    disorder: PrimaryDisorder,
) -> Option<CompensationAssessment> {
    match disorder {
        PrimaryDisorder::MetabolicAcidosis | PrimaryDisorder::MixedAcidosis => {
            let band = winters_band(inputs)?;
            let actual = inputs.pco2_mmhg()?;
            let judgment = judge(&band, actual, Direction::Up);
            Some(CompensationAssessment {
                rule: "Winter's formula",
                band,
                actual,
                judgment,
                chronicity: None,
                implication: match judgment {
                    CompensationJudgment::Appropriate => None,
                    CompensationJudgment::Inadequate => Some("coexisting respiratory acidosis"),
                    CompensationJudgment::Excessive => Some("coexisting respiratory alkalosis"),
                },
            })
        }
        PrimaryDisorder::MetabolicAlkalosis | PrimaryDisorder::MixedAlkalosis => {
            let band = alkalosis_pco2_band(inputs)?;
            let actual = inputs.pco2_mmhg()?;
            let judgment = judge(&band, actual, Direction::Down);
            Some(CompensationAssessment {
                rule: "metabolic alkalosis rule (0.7 × HCO3 + 21)",
                band,
                actual,
                judgment,
                chronicity: None,
                implication: match judgment {
                    CompensationJudgment::Appropriate => None,
                    CompensationJudgment::Inadequate => Some("coexisting respiratory alkalosis"),
                    CompensationJudgment::Excessive => Some("coexisting respiratory acidosis"),
                },
            })
        }
        PrimaryDisorder::RespiratoryAcidosis => {
            let delta = (inputs.pco2_mmhg()? - NORMAL_PCO2_MMHG) / 10.0;
            respiratory_assessment(inputs.hco3()?, NORMAL_HCO3 + delta, NORMAL_HCO3 + 3.5 * delta, true)
        }
        PrimaryDisorder::RespiratoryAlkalosis => {
            let delta = (NORMAL_PCO2_MMHG - inputs.pco2_mmhg()?) / 10.0;
            respiratory_assessment(
                inputs.hco3()?,
                NORMAL_HCO3 - 2.0 * delta,
                NORMAL_HCO3 - 5.0 * delta,
                false,
            )
        }
        PrimaryDisorder::Normal | PrimaryDisorder::CompensatedOrMixed => None,
    }
}

fn respiratory_assessment(
    hco3: f64,
    acute: f64,
    chronic: f64,
    acidosis: bool,
) -> Option<CompensationAssessment> {
    let (low, high) = if acute <= chronic { (acute, chronic) } else { (chronic, acute) };
    let band = ExpectedBand::spanning(low, high, "mmol/L");

    let chronicity = if (hco3 - acute).abs() <= COMPENSATION_TOLERANCE {
        Some(Chronicity::Acute)
    } else if (hco3 - chronic).abs() <= COMPENSATION_TOLERANCE {
        Some(Chronicity::Chronic)
    } else if band.contains(hco3) {
        Some(Chronicity::AcuteOnChronic)
    } else {
        None
    };

    // For a respiratory acidosis HCO3 should rise; a lower value means an
    // added metabolic acidosis, a higher one an added metabolic alkalosis.
    let judgment = if band.contains(hco3) {
        CompensationJudgment::Appropriate
    } else if (hco3 < band.low) == acidosis {
        CompensationJudgment::Inadequate
    } else {
        CompensationJudgment::Excessive
    };
    let implication = match (judgment, hco3 < band.low) {
        (CompensationJudgment::Appropriate, _) => None,
        (_, true) => Some("coexisting metabolic acidosis"),
        (_, false) => Some("coexisting metabolic alkalosis"),
    };

    Some(CompensationAssessment {
        rule: if acidosis {
            "respiratory acidosis rule (acute +1, chronic +3.5 per 10 mmHg)"
        } else {
            "respiratory alkalosis rule (acute −2, chronic −5 per 10 mmHg)"
        },
        band,
        actual: hco3,
        judgment,
        chronicity,
        implication,
    })
}

#[derive(Clone, Copy)]
enum Direction {
    /// Compensation pushes the value down; a value above the band means
    /// it fell short.
    Up,
    Down,
}

fn judge(band: &ExpectedBand, actual: f64, shortfall: Direction) -> CompensationJudgment {
    if band.contains(actual) {
        return CompensationJudgment::Appropriate;
    }
    let above = actual > band.high;
    match (shortfall, above) {
        (Direction::Up, true) | (Direction::Down, false) => CompensationJudgment::Inadequate,
        _ => CompensationJudgment::Excessive,
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Level {
    Low,
    Normal,
    High,
}

fn direction(range: &Range, value: f64) -> Level {
    match range.classify(value) {
        AbnormalFlag::Low | AbnormalFlag::CriticalLow => Level::Low,
        AbnormalFlag::High | AbnormalFlag::CriticalHigh => Level::High,
        AbnormalFlag::Normal => Level::Normal,
    }
}

// ═══════════════════════════════════════════════════════════
// DerivedCalculations — everything computable for one request
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedCalculations {
    pub anion_gap: Option<f64>,
    pub corrected_anion_gap: Option<f64>,
    pub delta_ratio: Option<f64>,
    pub winters: Option<ExpectedBand>,
    pub sid_apparent: Option<SidApparent>,
    pub pf_ratio: Option<f64>,
    pub aa_gradient: Option<f64>,
    pub primary_disorder: Option<PrimaryDisorder>,
    pub compensation: Option<CompensationAssessment>,
}

impl DerivedCalculations {
    pub fn compute(inputs: &ClinicalInputs, ranges: &ReferenceRanges, formulas: FormulaSet) -> Self {
        let primary_disorder = classify_primary(inputs, ranges);
        Self {
            anion_gap: anion_gap(inputs),
            corrected_anion_gap: corrected_anion_gap(inputs),
            delta_ratio: delta_ratio(inputs).filter(|_| formulas.delta_ratio),
            winters: winters_band(inputs),
            sid_apparent: sid_apparent(inputs, formulas.sid_subtracts_lactate)
                .filter(|_| formulas.stewart),
            pf_ratio: pf_ratio(inputs).filter(|_| formulas.oxygenation),
            aa_gradient: aa_gradient(inputs).filter(|_| formulas.oxygenation),
            primary_disorder,
            compensation: primary_disorder.and_then(|d| assess_compensation(inputs, d)),
        }
    }
}

/// kPa → mmHg.
pub fn kpa_to_mmhg(kpa: f64) -> f64 {
    kpa * KPA_TO_MMHG
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Field;

    fn inputs(pairs: &[(Field, f64)]) -> ClinicalInputs {
        ClinicalInputs::from_pairs(pairs.iter().copied()).unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn anion_gap_and_albumin_correction() {
        let base = [(Field::Sodium, 140.0), (Field::Chloride, 100.0), (Field::Hco3, 24.0)];
        assert_eq!(anion_gap(&inputs(&base)), Some(16.0));
        assert_eq!(corrected_anion_gap(&inputs(&base)), Some(16.0));

        let mut with_albumin = base.to_vec();
        with_albumin.push((Field::Albumin, 30.0));
        assert!(approx(corrected_anion_gap(&inputs(&with_albumin)).unwrap(), 18.5));
    }

    #[test]
    fn anion_gap_needs_all_three_inputs() {
        let partial = inputs(&[(Field::Sodium, 140.0), (Field::Chloride, 100.0)]);
        assert_eq!(anion_gap(&partial), None);
        assert_eq!(corrected_anion_gap(&partial), None);
    }

    #[test]
    fn delta_ratio_only_for_raised_gap() {
        let normal_gap = inputs(&[(Field::Sodium, 140.0), (Field::Chloride, 110.0), (Field::Hco3, 18.0)]);
        assert_eq!(delta_ratio(&normal_gap), None);

        let raised = inputs(&[(Field::Sodium, 140.0), (Field::Chloride, 100.0), (Field::Hco3, 12.0)]);
        // AG 28 → (28 − 12) / (24 − 12)
        assert!(approx(delta_ratio(&raised).unwrap(), 16.0 / 12.0));
        assert_eq!(
            DeltaInterpretation::from_ratio(16.0 / 12.0),
            DeltaInterpretation::PureHighGap
        );

        let hco3_24 = inputs(&[(Field::Sodium, 150.0), (Field::Chloride, 100.0), (Field::Hco3, 24.0)]);
        assert_eq!(delta_ratio(&hco3_24), None);
    }

    #[test]
    fn winters_band_converts_kpa_before_comparing() {
        let panel = inputs(&[(Field::Ph, 7.20), (Field::Hco3, 10.0), (Field::Pco2, 5.5)]);
        let band = winters_band(&panel).unwrap();
        assert!(approx(band.expected, 23.0));
        assert!(approx(band.low, 21.0));
        assert!(approx(band.high, 25.0));

        let ranges = ReferenceRanges::canonical();
        let disorder = classify_primary(&panel, &ranges).unwrap();
        assert_eq!(disorder, PrimaryDisorder::MetabolicAcidosis);
        let assessment = assess_compensation(&panel, disorder).unwrap();
        assert!(approx(assessment.actual, 41.25));
        assert_eq!(assessment.judgment, CompensationJudgment::Inadequate);
        assert_eq!(assessment.implication, Some("coexisting respiratory acidosis"));
        assert!(assessment.judgment.describe().contains("compensation inadequacy"));
    }

    #[test]
    fn winters_within_band_is_appropriate() {
        // HCO3 12 → expected 26 ± 2 mmHg; 3.5 kPa = 26.25 mmHg
        let panel = inputs(&[(Field::Ph, 7.25), (Field::Hco3, 12.0), (Field::Pco2, 3.5)]);
        let assessment =
            assess_compensation(&panel, PrimaryDisorder::MetabolicAcidosis).unwrap();
        assert_eq!(assessment.judgment, CompensationJudgment::Appropriate);
        assert!(assessment.implication.is_none());
    }

    #[test]
    fn sid_apparent_with_and_without_lactate() {
        let panel = inputs(&[
            (Field::Sodium, 140.0),
            (Field::Potassium, 4.0),
            (Field::Chloride, 104.0),
            (Field::Lactate, 3.0),
        ]);
        let plain = sid_apparent(&panel, false).unwrap();
        assert!(approx(plain.value, 40.0));
        assert!(!plain.lactate_adjusted);
        let adjusted = sid_apparent(&panel, true).unwrap();
        assert!(approx(adjusted.value, 37.0));
        assert!(adjusted.lactate_adjusted);
    }

    #[test]
    fn sid_apparent_requires_potassium() {
        let panel = inputs(&[(Field::Sodium, 140.0), (Field::Chloride, 104.0)]);
        assert!(sid_apparent(&panel, true).is_none());
    }

    #[test]
    fn pf_ratio_uses_mmhg_and_fraction() {
        // 12 kPa = 90 mmHg, FiO2 30 % → 300
        let panel = inputs(&[(Field::Po2, 12.0), (Field::Fio2, 30.0)]);
        assert!(approx(pf_ratio(&panel).unwrap(), 300.0));
        assert!(pf_ratio(&inputs(&[(Field::Po2, 12.0)])).is_none());
    }

    #[test]
    fn aa_gradient_on_room_air() {
        let panel = inputs(&[(Field::Po2, 12.0), (Field::Pco2, 5.0), (Field::Fio2, 21.0)]);
        // 0.21 × 95 − 5 / 0.8 − 12 = 19.95 − 6.25 − 12
        assert!(approx(aa_gradient(&panel).unwrap(), 1.7));
    }

    #[test]
    fn classifies_primary_disorders() {
        let ranges = ReferenceRanges::canonical();
        let resp_acid = inputs(&[(Field::Ph, 7.28), (Field::Pco2, 8.0), (Field::Hco3, 27.0)]);
        assert_eq!(
            classify_primary(&resp_acid, &ranges),
            Some(PrimaryDisorder::RespiratoryAcidosis)
        );
        let mixed = inputs(&[(Field::Ph, 7.10), (Field::Pco2, 7.5), (Field::Hco3, 15.0)]);
        assert_eq!(classify_primary(&mixed, &ranges), Some(PrimaryDisorder::MixedAcidosis));
        let resp_alk = inputs(&[(Field::Ph, 7.52), (Field::Pco2, 3.6)]);
        assert_eq!(
            classify_primary(&resp_alk, &ranges),
            Some(PrimaryDisorder::RespiratoryAlkalosis)
        );
        let met_alk = inputs(&[(Field::Ph, 7.50), (Field::Pco2, 6.2), (Field::Hco3, 34.0)]);
        assert_eq!(
            classify_primary(&met_alk, &ranges),
            Some(PrimaryDisorder::MetabolicAlkalosis)
        );
        let normal = inputs(&[(Field::Ph, 7.40), (Field::Pco2, 5.3), (Field::Hco3, 24.0)]);
        assert_eq!(classify_primary(&normal, &ranges), Some(PrimaryDisorder::Normal));
        assert_eq!(classify_primary(&inputs(&[(Field::Ph, 7.4)]), &ranges), None);
    }

    #[test]
    fn respiratory_acidosis_chronicity() {
        // pCO2 8 kPa = 60 mmHg → acute HCO3 26, chronic 31
        let acute = inputs(&[(Field::Ph, 7.25), (Field::Pco2, 8.0), (Field::Hco3, 26.0)]);
        let assessment =
            assess_compensation(&acute, PrimaryDisorder::RespiratoryAcidosis).unwrap();
        assert_eq!(assessment.chronicity, Some(Chronicity::Acute));
        assert_eq!(assessment.judgment, CompensationJudgment::Appropriate);

        let chronic = inputs(&[(Field::Ph, 7.34), (Field::Pco2, 8.0), (Field::Hco3, 31.0)]);
        let assessment =
            assess_compensation(&chronic, PrimaryDisorder::RespiratoryAcidosis).unwrap();
        assert_eq!(assessment.chronicity, Some(Chronicity::Chronic));

        let low = inputs(&[(Field::Ph, 7.10), (Field::Pco2, 8.0), (Field::Hco3, 18.0)]);
        let assessment =
            assess_compensation(&low, PrimaryDisorder::RespiratoryAcidosis).unwrap();
        assert_eq!(assessment.judgment, CompensationJudgment::Inadequate);
        assert_eq!(assessment.implication, Some("coexisting metabolic acidosis"));
    }

    #[test]
    fn derived_calculations_respect_formula_set() {
        let panel = inputs(&[
            (Field::Ph, 7.3),
            (Field::Pco2, 4.0),
            (Field::Po2, 10.0),
            (Field::Fio2, 21.0),
            (Field::Hco3, 15.0),
            (Field::Sodium, 140.0),
            (Field::Potassium, 4.0),
            (Field::Chloride, 100.0),
        ]);
        let ranges = ReferenceRanges::canonical();
        let all = DerivedCalculations::compute(&panel, &ranges, FormulaSet::ALL);
        assert!(all.sid_apparent.is_some());
        assert!(all.pf_ratio.is_some());
        assert!(all.delta_ratio.is_some());

        let reduced = FormulaSet {
            delta_ratio: false,
            stewart: false,
            sid_subtracts_lactate: false,
            oxygenation: false,
        };
        let some = DerivedCalculations::compute(&panel, &ranges, reduced);
        assert!(some.sid_apparent.is_none());
        assert!(some.pf_ratio.is_none());
        assert!(some.delta_ratio.is_none());
        assert_eq!(some.anion_gap, Some(25.0));
    }

    #[test]
    fn empty_inputs_compute_nothing() {
        let calc = DerivedCalculations::compute(
            &ClinicalInputs::default(),
            &ReferenceRanges::canonical(),
            FormulaSet::ALL,
        );
        assert!(calc.anion_gap.is_none());
        assert!(calc.winters.is_none());
        assert!(calc.primary_disorder.is_none());
        assert!(calc.compensation.is_none());
    }
}
