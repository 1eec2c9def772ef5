use serde::Serialize;

use crate::calc::MarkLookup;
use crate::sheets::Workbook;

pub const CO_IDS: [&str; 4] = ["CO1", "CO2", "CO3", "CO4"];

/// Attainment is reported on a 0–3 scale; 3 corresponds to a 100% class
/// average.
pub const ATTAINMENT_SCALE: f64 = 3.0;
pub const STRONG_MIN: f64 = 2.5;
pub const MODERATE_MIN: f64 = 1.5;

/// Target used for a CO id that is missing from the configured table.
pub const FALLBACK_CO_TARGET: f64 = 60.0;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoTarget {
    pub co_number: String,
    pub target: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoMapping {
    pub program_outcome: String,
    pub contributing_cos: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionMapping {
    pub co_number: String,
    pub questions: Vec<String>,
}

/// Outcome tables held by the sidecar between runs. Order is significant:
/// CO and PO results are emitted in table order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeConfig {
    pub co_targets: Vec<CoTarget>,
    pub po_map: Vec<PoMapping>,
    /// Exam-paper question tagging per CO, kept for the setup screens. The
    /// attainment computation works from component totals and does not read
    /// it.
    pub question_map: Vec<QuestionMapping>,
}

fn co_target(co_number: &str, target: f64) -> CoTarget {
    CoTarget {
        co_number: co_number.to_string(),
        target,
    }
}

fn po_mapping(program_outcome: &str, contributing_cos: &[&str]) -> PoMapping {
    PoMapping {
        program_outcome: program_outcome.to_string(),
        contributing_cos: contributing_cos.iter().map(|c| c.to_string()).collect(),
    }
}

impl Default for OutcomeConfig {
    fn default() -> Self {
        OutcomeConfig {
            co_targets: vec![
                co_target("CO1", 52.0),
                co_target("CO2", 53.0),
                co_target("CO3", 52.0),
                co_target("CO4", 50.0),
            ],
            po_map: vec![
                po_mapping("PO1", &["CO1", "CO2"]),
                po_mapping("PO2", &["CO2", "CO3"]),
                po_mapping("PO3", &["CO3", "CO4"]),
                po_mapping("PO4", &["CO1", "CO4"]),
                po_mapping("PO5", &["CO1", "CO2", "CO3", "CO4"]),
            ],
            question_map: vec![
                QuestionMapping {
                    co_number: "CO1".to_string(),
                    questions: vec!["Q1".to_string(), "Q2".to_string()],
                },
                QuestionMapping {
                    co_number: "CO2".to_string(),
                    questions: vec!["Q3".to_string(), "Q4".to_string()],
                },
                QuestionMapping {
                    co_number: "CO3".to_string(),
                    questions: vec!["Q5".to_string(), "Q6".to_string()],
                },
                QuestionMapping {
                    co_number: "CO4".to_string(),
                    questions: vec!["Q7".to_string(), "Q8".to_string()],
                },
            ],
        }
    }
}

impl OutcomeConfig {
    pub fn target_for(&self, co_number: &str) -> f64 {
        self.co_targets
            .iter()
            .find(|t| t.co_number == co_number)
            .map(|t| t.target)
            .unwrap_or(FALLBACK_CO_TARGET)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoAttainment {
    pub subject_code: String,
    pub co_number: String,
    pub attainment_level: f64,
    pub achievement_percentage: f64,
    pub target_achieved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StrengthLevel {
    Strong,
    Moderate,
    Weak,
}

impl StrengthLevel {
    pub fn from_level(level: f64) -> Self {
        if level >= STRONG_MIN {
            StrengthLevel::Strong
        } else if level >= MODERATE_MIN {
            StrengthLevel::Moderate
        } else {
            StrengthLevel::Weak
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoAttainment {
    pub program_outcome: String,
    pub attainment_level: f64,
    pub contributing_cos: Vec<String>,
    pub strength_level: StrengthLevel,
}

/// Direct-assessment CO attainment: four rows per subject, CO1..CO4. A
/// student qualifies for a subject when their component rows' own maximum
/// marks sum above zero; their percent is taken against that per-row sum.
pub fn analyze_cos(wb: &Workbook, lookup: &MarkLookup, config: &OutcomeConfig) -> Vec<CoAttainment> {
    let mut out = Vec::with_capacity(wb.subjects.len() * CO_IDS.len());
    for subject in &wb.subjects {
        // The per-student percent is shared by the four COs; only the target
        // varies per CO.
        let mut percents = Vec::with_capacity(wb.students.len());
        for student in &wb.students {
            let (raw, out_of) = lookup.row_totals(&student.prn, &subject.code);
            if out_of > 0.0 {
                percents.push(100.0 * raw / out_of);
            }
        }
        for co_number in CO_IDS {
            let target = config.target_for(co_number);
            let (attainment_level, achievement_percentage) = if percents.is_empty() {
                (0.0, 0.0)
            } else {
                let count = percents.len() as f64;
                let mean = percents.iter().sum::<f64>() / count;
                let met = percents.iter().filter(|p| **p >= target).count() as f64;
                (mean / 100.0 * ATTAINMENT_SCALE, 100.0 * met / count)
            };
            // The cohort check reuses the per-student score target as its
            // threshold; the two share one configured number.
            let target_achieved = achievement_percentage >= target;
            out.push(CoAttainment {
                subject_code: subject.code.clone(),
                co_number: co_number.to_string(),
                attainment_level,
                achievement_percentage,
                target_achieved,
            });
        }
    }
    out
}

/// Roll CO attainment up into program outcomes: each PO averages the
/// attainment levels of its mapped COs across every subject's rows.
pub fn analyze_pos(co_rows: &[CoAttainment], config: &OutcomeConfig) -> Vec<PoAttainment> {
    config
        .po_map
        .iter()
        .map(|mapping| {
            let levels: Vec<f64> = co_rows
                .iter()
                .filter(|c| {
                    mapping
                        .contributing_cos
                        .iter()
                        .any(|id| *id == c.co_number)
                })
                .map(|c| c.attainment_level)
                .collect();
            let attainment_level = if levels.is_empty() {
                0.0
            } else {
                levels.iter().sum::<f64>() / levels.len() as f64
            };
            PoAttainment {
                program_outcome: mapping.program_outcome.clone(),
                attainment_level,
                contributing_cos: mapping.contributing_cos.clone(),
                strength_level: StrengthLevel::from_level(attainment_level),
            }
        })
        .collect()
}
