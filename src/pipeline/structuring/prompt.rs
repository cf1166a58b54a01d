use super::schema::SectionSchema;
use crate::models::{AnalysisMode, BloodGasPanel, Field};

const SYSTEM_PREAMBLE: &str = r#"
You are an expert consultant providing clinically focused blood gas interpretation.

RULES:
1. Base every statement on the values supplied. Do not invent values.
2. If a calculation needs a value that was not supplied, say so.
3. Partial pressures are given in kPa; convert to mmHg (x 7.5) where a formula needs it.
4. Use clear medical terminology. Be systematic and focus on clinical utility.
"#;

const BRIEF_STYLE: &str = "Be concise: two to four sentences per section.";
const COMPREHENSIVE_STYLE: &str = "Be thorough: cover Henderson-Hasselbalch and Stewart \
approaches separately and state the expected compensation with its formula.";

const VALUE_GROUPS: [(&str, &[Field]); 3] = [
    (
        "ESSENTIAL VALUES",
        &[Field::Ph, Field::Pco2, Field::Po2, Field::Hco3, Field::Be],
    ),
    (
        "ELECTROLYTES",
        &[Field::Sodium, Field::Potassium, Field::Chloride],
    ),
    (
        "OTHER VALUES",
        &[
            Field::Lactate,
            Field::Glucose,
            Field::Albumin,
            Field::Calcium,
            Field::Hb,
            Field::Fio2,
        ],
    ),
];

/// System prompt for a schema: rules plus the exact JSON shape expected.
pub fn build_system_prompt(schema: &SectionSchema) -> String {
    let style = match schema.mode {
        AnalysisMode::Brief => BRIEF_STYLE,
        AnalysisMode::Comprehensive => COMPREHENSIVE_STYLE,
    };
    let fields: Vec<String> = schema
        .sections
        .iter()
        .map(|s| format!("  \"{}\": \"{} text\"", s.key, s.title))
        .collect();

    format!(
        "{SYSTEM_PREAMBLE}\n{style}\n\nOUTPUT FORMAT:\nRespond with a single JSON object and nothing else, \
         using exactly these keys with string values:\n{{\n{}\n}}\n",
        fields.join(",\n")
    )
}

/// User prompt carrying the panel values and clinical context.
pub fn build_analysis_prompt(panel: &BloodGasPanel, schema: &SectionSchema) -> String {
    let mut text = format!("Sample type: {}\n", panel.sample_type.describe());

    for (heading, fields) in VALUE_GROUPS {
        let lines: Vec<String> = fields
            .iter()
            .filter_map(|&f| prompt_value(panel, f).map(|v| format_value(f, v)))
            .collect();
        if lines.is_empty() {
            continue;
        }
        text.push_str(&format!("\n{heading}:\n{}\n", lines.join("\n")));
    }

    if let Some(history) = &panel.clinical_history {
        text.push_str(&format!(
            "\n<clinical_context>\n{history}\n</clinical_context>\n"
        ));
    }

    let titles: Vec<&str> = schema.sections.iter().map(|s| s.title).collect();
    format!(
        "Analyse these blood gas results:\n\n{text}\nProvide: {}.",
        titles.join(", ")
    )
}

/// FiO2 is sent as a percentage of its normalised fraction, so the
/// narrative reads the same value the formulas use.
fn prompt_value(panel: &BloodGasPanel, field: Field) -> Option<f64> {
    match field {
        Field::Fio2 => panel
            .inputs
            .fio2_fraction()
            .map(|fraction| (fraction * 1000.0).round() / 10.0),
        _ => panel.inputs.get(field),
    }
}

fn format_value(field: Field, value: f64) -> String {
    match field.unit() {
        "" => format!("{}: {value}", field.label()),
        "%" => format!("{}: {value}%", field.label()),
        unit => format!("{}: {value} {unit}", field.label()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClinicalInputs, SampleType};
    use crate::pipeline::structuring::schema::{BRIEF, COMPREHENSIVE};

    fn panel() -> BloodGasPanel {
        BloodGasPanel {
            inputs: ClinicalInputs::from_pairs([
                (Field::Ph, 7.31),
                (Field::Pco2, 4.2),
                (Field::Be, 0.0),
                (Field::Fio2, 28.0),
            ])
            .unwrap(),
            sample_type: SampleType::Arterial,
            clinical_history: Some("Vomiting for three days".into()),
        }
    }

    #[test]
    fn prompt_lists_present_values_with_units() {
        let prompt = build_analysis_prompt(&panel(), &BRIEF);
        assert!(prompt.contains("pH: 7.31"));
        assert!(prompt.contains("pCO2: 4.2 kPa"));
        assert!(prompt.contains("FiO2: 28%"));
        assert!(prompt.contains("Sample type: arterial"));
        assert!(!prompt.contains("ELECTROLYTES"));
    }

    #[test]
    fn fio2_fraction_is_sent_as_percentage() {
        let mut panel = panel();
        panel.inputs =
            ClinicalInputs::from_pairs([(Field::Ph, 7.31), (Field::Pco2, 4.2), (Field::Fio2, 0.4)])
                .unwrap();
        let prompt = build_analysis_prompt(&panel, &BRIEF);
        assert!(prompt.lines().any(|line| line == "FiO2: 40%"), "{prompt}");
        assert!(!prompt.contains("0.4%"));
    }

    #[test]
    fn zero_values_are_still_sent() {
        let prompt = build_analysis_prompt(&panel(), &BRIEF);
        assert!(prompt.contains("Base excess: 0 mmol/L"));
    }

    #[test]
    fn clinical_history_is_delimited() {
        let prompt = build_analysis_prompt(&panel(), &COMPREHENSIVE);
        assert!(prompt.contains("<clinical_context>\nVomiting for three days\n</clinical_context>"));
        assert!(prompt.contains("Stewart Analysis"));
    }

    #[test]
    fn system_prompt_names_every_key() {
        for schema in [&BRIEF, &COMPREHENSIVE] {
            let system = build_system_prompt(schema);
            for key in schema.keys() {
                assert!(system.contains(&format!("\"{key}\"")), "{key}");
            }
            assert!(system.contains("single JSON object"));
        }
    }
}
