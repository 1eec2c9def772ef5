use serde::Serialize;
use std::collections::HashMap;

use crate::outcomes::{self, OutcomeConfig};
use crate::sheets::{MarkRow, StudentRow, SubjectRow, Workbook};

pub const EXCELLENT_MIN: f64 = 90.0;
pub const GOOD_MIN: f64 = 75.0;
pub const AVERAGE_MIN: f64 = 60.0;

/// Student-analysis thresholds. A subject scoring in [50, 60) lands in
/// neither list; the gap is part of the contract.
pub const STRENGTH_MIN: f64 = 60.0;
pub const IMPROVEMENT_MAX: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkCell {
    pub score: f64,
    pub out_of: f64,
}

type MarkIndex = HashMap<(String, String), MarkCell>;

fn index_marks(rows: &[MarkRow]) -> MarkIndex {
    let mut out = MarkIndex::new();
    for r in rows {
        // First row wins when a (student, subject) pair appears twice.
        out.entry((r.prn.clone(), r.subject_code.clone()))
            .or_insert(MarkCell {
                score: r.score,
                out_of: r.out_of,
            });
    }
    out
}

/// Per-component (PRN, Subject Code) lookup over the four mark sheets.
/// Built once per analysis run and shared by every analyzer.
pub struct MarkLookup {
    mse: MarkIndex,
    ese: MarkIndex,
    ca: MarkIndex,
    ia: MarkIndex,
}

impl MarkLookup {
    pub fn build(wb: &Workbook) -> Self {
        MarkLookup {
            mse: index_marks(&wb.mse),
            ese: index_marks(&wb.ese),
            ca: index_marks(&wb.ca),
            ia: index_marks(&wb.ia),
        }
    }

    fn components(&self, prn: &str, code: &str) -> [Option<MarkCell>; 4] {
        let key = (prn.to_string(), code.to_string());
        [
            self.mse.get(&key).copied(),
            self.ese.get(&key).copied(),
            self.ca.get(&key).copied(),
            self.ia.get(&key).copied(),
        ]
    }

    /// Sum of obtained marks across the four components; a component with no
    /// row contributes 0 (a student may legitimately have no IA record).
    pub fn raw_total(&self, prn: &str, code: &str) -> f64 {
        self.components(prn, code)
            .iter()
            .flatten()
            .map(|c| c.score)
            .sum()
    }

    /// Obtained and maximum marks summed over the rows the student actually
    /// has, using each row's own "Maximum Marks" column. This is the CO
    /// denominator; subject-level percentages use the schema maxima instead.
    pub fn row_totals(&self, prn: &str, code: &str) -> (f64, f64) {
        let mut raw = 0.0;
        let mut out_of = 0.0;
        for cell in self.components(prn, code).iter().flatten() {
            raw += cell.score;
            out_of += cell.out_of;
        }
        (raw, out_of)
    }

    pub fn has_mse(&self, prn: &str, code: &str) -> bool {
        self.mse.contains_key(&(prn.to_string(), code.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatedScore {
    pub raw_total: f64,
    pub max_total: f64,
}

impl AggregatedScore {
    /// None when the subject schema's maxima sum to zero; such pairs are
    /// excluded from every percentage-based aggregate.
    pub fn percentage(&self) -> Option<f64> {
        if self.max_total > 0.0 {
            Some(100.0 * self.raw_total / self.max_total)
        } else {
            None
        }
    }
}

pub type ScoreMap = HashMap<(String, String), AggregatedScore>;

/// Combine the four components into a total per (student, subject) pair,
/// against the subject schema's maximum marks.
pub fn aggregate(wb: &Workbook, lookup: &MarkLookup) -> ScoreMap {
    let mut out = ScoreMap::new();
    for subject in &wb.subjects {
        let max_total = subject.max_total();
        for student in &wb.students {
            let raw_total = lookup.raw_total(&student.prn, &subject.code);
            out.insert(
                (student.prn.clone(), subject.code.clone()),
                AggregatedScore {
                    raw_total,
                    max_total,
                },
            );
        }
    }
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreDistribution {
    pub excellent: usize,
    pub good: usize,
    pub average: usize,
    pub poor: usize,
}

impl ScoreDistribution {
    /// Bands partition [0, 100]: lower bound inclusive, upper exclusive, so
    /// exactly 90.0 is excellent and exactly 60.0 is average.
    fn record(&mut self, percentage: f64) {
        if percentage >= EXCELLENT_MIN {
            self.excellent += 1;
        } else if percentage >= GOOD_MIN {
            self.good += 1;
        } else if percentage >= AVERAGE_MIN {
            self.average += 1;
        } else {
            self.poor += 1;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPerformance {
    pub subject_code: String,
    pub subject_name: String,
    pub total_students: usize,
    pub pass_rate: f64,
    pub average_score: f64,
    pub highest_score: f64,
    pub lowest_score: f64,
    pub distribution: ScoreDistribution,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPerformance {
    pub prn: String,
    pub name: String,
    pub overall_performance: f64,
    pub strength_subjects: Vec<String>,
    pub improvement_areas: Vec<String>,
    /// Always null for now: attendance is an external feed this engine does
    /// not receive yet, and the value is never synthesized.
    pub attendance: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResults {
    pub performance: Vec<SubjectPerformance>,
    pub co_analysis: Vec<outcomes::CoAttainment>,
    pub po_analysis: Vec<outcomes::PoAttainment>,
    pub student_wise_analysis: Vec<StudentPerformance>,
}

fn subject_performance(
    subject: &SubjectRow,
    students: &[StudentRow],
    lookup: &MarkLookup,
    scores: &ScoreMap,
) -> SubjectPerformance {
    // The counted population is the students with an MSE row for this
    // subject; ESE/CA/IA-only students are not counted.
    let mut total_students = 0_usize;
    let mut passed = 0_usize;
    let mut sum = 0.0_f64;
    let mut graded = 0_usize;
    let mut highest = f64::NEG_INFINITY;
    let mut lowest = f64::INFINITY;
    let mut distribution = ScoreDistribution::default();

    for student in students {
        if !lookup.has_mse(&student.prn, &subject.code) {
            continue;
        }
        total_students += 1;
        let Some(pct) = scores
            .get(&(student.prn.clone(), subject.code.clone()))
            .and_then(|s| s.percentage())
        else {
            continue;
        };
        graded += 1;
        sum += pct;
        highest = highest.max(pct);
        lowest = lowest.min(pct);
        if pct >= subject.pass_percentage {
            passed += 1;
        }
        distribution.record(pct);
    }

    // An empty cohort or a zero-max schema yields zeroed aggregates rather
    // than a division by zero; the subject entry itself is kept.
    let (average_score, highest_score, lowest_score) = if graded > 0 {
        (sum / graded as f64, highest, lowest)
    } else {
        (0.0, 0.0, 0.0)
    };
    let pass_rate = if total_students > 0 {
        100.0 * passed as f64 / total_students as f64
    } else {
        0.0
    };

    SubjectPerformance {
        subject_code: subject.code.clone(),
        subject_name: subject.name.clone(),
        total_students,
        pass_rate,
        average_score,
        highest_score,
        lowest_score,
        distribution,
    }
}

pub fn analyze_subjects(wb: &Workbook, lookup: &MarkLookup, scores: &ScoreMap) -> Vec<SubjectPerformance> {
    wb.subjects
        .iter()
        .map(|subject| subject_performance(subject, &wb.students, lookup, scores))
        .collect()
}

pub fn analyze_students(wb: &Workbook, scores: &ScoreMap) -> Vec<StudentPerformance> {
    wb.students
        .iter()
        .map(|student| {
            let mut sum = 0.0_f64;
            let mut strength_subjects = Vec::new();
            let mut improvement_areas = Vec::new();
            for subject in &wb.subjects {
                let pct = scores
                    .get(&(student.prn.clone(), subject.code.clone()))
                    .and_then(|s| s.percentage())
                    .unwrap_or(0.0);
                sum += pct;
                if pct >= STRENGTH_MIN {
                    strength_subjects.push(subject.code.clone());
                } else if pct < IMPROVEMENT_MAX {
                    improvement_areas.push(subject.code.clone());
                }
            }
            // Every subject stays in the denominator; an ungraded subject
            // contributes 0 instead of being skipped.
            let overall_performance = if wb.subjects.is_empty() {
                0.0
            } else {
                sum / wb.subjects.len() as f64
            };
            StudentPerformance {
                prn: student.prn.clone(),
                name: student.name.clone(),
                overall_performance,
                strength_subjects,
                improvement_areas,
                attendance: None,
            }
        })
        .collect()
}

/// Full analysis pass over a normalized workbook: aggregation, subject and
/// student summaries, CO attainment and its PO roll-up. Pure and
/// deterministic; identical input produces identical output.
pub fn analyze_workbook(wb: &Workbook, config: &OutcomeConfig) -> AnalysisResults {
    let lookup = MarkLookup::build(wb);
    let scores = aggregate(wb, &lookup);
    let performance = analyze_subjects(wb, &lookup, &scores);
    let student_wise_analysis = analyze_students(wb, &scores);
    let co_analysis = outcomes::analyze_cos(wb, &lookup, config);
    let po_analysis = outcomes::analyze_pos(&co_analysis, config);
    AnalysisResults {
        performance,
        co_analysis,
        po_analysis,
        student_wise_analysis,
    }
}
