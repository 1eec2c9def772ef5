use serde::Serialize;
use serde_json::Value;

pub const SHEET_STUDENTS: &str = "Students";
pub const SHEET_MSE: &str = "MSE Marks";
pub const SHEET_ESE: &str = "ESE Marks";
pub const SHEET_CA: &str = "CA Marks";
pub const SHEET_IA: &str = "IA Marks";
pub const SHEET_SUBJECTS: &str = "Subjects";

pub const REQUIRED_SHEETS: [&str; 6] = [
    SHEET_STUDENTS,
    SHEET_MSE,
    SHEET_ESE,
    SHEET_CA,
    SHEET_IA,
    SHEET_SUBJECTS,
];

/// Marks below this percentage of the subject maximum fail the subject when
/// the Subjects sheet omits "Pass Percentage Required".
pub const DEFAULT_PASS_PERCENTAGE: f64 = 40.0;

#[derive(Debug, Clone)]
pub struct StudentRow {
    pub prn: String,
    pub name: String,
    pub course: String,
    pub semester: i64,
}

/// One scored component for one (student, subject) pair. `out_of` is the
/// per-row "Maximum Marks" column, which the CO computation reads instead of
/// the subject schema maxima.
#[derive(Debug, Clone)]
pub struct MarkRow {
    pub prn: String,
    pub subject_code: String,
    pub score: f64,
    pub out_of: f64,
}

#[derive(Debug, Clone)]
pub struct SubjectRow {
    pub code: String,
    pub name: String,
    pub max_mse: f64,
    pub max_ese: f64,
    pub max_ca: f64,
    pub max_ia: f64,
    pub pass_percentage: f64,
}

impl SubjectRow {
    pub fn max_total(&self) -> f64 {
        self.max_mse + self.max_ese + self.max_ca + self.max_ia
    }
}

/// Typed view of the six required sheets. Everything downstream of the
/// normalizer works on this; raw JSON never crosses into the analyzers.
#[derive(Debug, Clone)]
pub struct Workbook {
    pub students: Vec<StudentRow>,
    pub mse: Vec<MarkRow>,
    pub ese: Vec<MarkRow>,
    pub ca: Vec<MarkRow>,
    pub ia: Vec<MarkRow>,
    pub subjects: Vec<SubjectRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetError {
    pub sheet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

/// Everything wrong with an uploaded workbook in one pass: every absent sheet
/// by name, and for each present-but-broken sheet the first offending record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub missing_sheets: Vec<String>,
    pub sheet_errors: Vec<SheetError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.missing_sheets.is_empty() && self.sheet_errors.is_empty()
    }
}

fn bad_record(sheet: &str, row: usize, field: &str, message: impl Into<String>) -> SheetError {
    SheetError {
        sheet: sheet.to_string(),
        row: Some(row),
        field: Some(field.to_string()),
        message: message.into(),
    }
}

fn bad_sheet(sheet: &str, message: impl Into<String>) -> SheetError {
    SheetError {
        sheet: sheet.to_string(),
        row: None,
        field: None,
        message: message.into(),
    }
}

/// Join-key cell (PRN, Subject Code). Spreadsheet decoders emit these as
/// strings or as bare numbers depending on the cell format; both spellings of
/// the same key must land on the same student, so numbers are canonicalized
/// through their JSON rendering.
fn key_field(rec: &Value, field: &str) -> Option<String> {
    match rec.get(field)? {
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_field(rec: &Value, field: &str) -> Option<String> {
    let s = rec.get(field)?.as_str()?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn numeric_field(rec: &Value, field: &str) -> Option<f64> {
    rec.get(field)?.as_f64()
}

fn integer_field(rec: &Value, field: &str) -> Option<i64> {
    let v = rec.get(field)?;
    v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))
}

fn parse_students(rows: &[Value]) -> Result<Vec<StudentRow>, SheetError> {
    let mut out = Vec::with_capacity(rows.len());
    for (row, rec) in rows.iter().enumerate() {
        let Some(prn) = key_field(rec, "PRN") else {
            return Err(bad_record(SHEET_STUDENTS, row, "PRN", "missing or empty PRN"));
        };
        let Some(name) = text_field(rec, "Name") else {
            return Err(bad_record(SHEET_STUDENTS, row, "Name", "missing or empty Name"));
        };
        let Some(course) = text_field(rec, "Course") else {
            return Err(bad_record(
                SHEET_STUDENTS,
                row,
                "Course",
                "missing or empty Course",
            ));
        };
        let Some(semester) = integer_field(rec, "Semester") else {
            return Err(bad_record(
                SHEET_STUDENTS,
                row,
                "Semester",
                "Semester must be a number",
            ));
        };
        out.push(StudentRow {
            prn,
            name,
            course,
            semester,
        });
    }
    Ok(out)
}

fn parse_marks(sheet: &str, score_field: &str, rows: &[Value]) -> Result<Vec<MarkRow>, SheetError> {
    let mut out = Vec::with_capacity(rows.len());
    for (row, rec) in rows.iter().enumerate() {
        let Some(prn) = key_field(rec, "PRN") else {
            return Err(bad_record(sheet, row, "PRN", "missing or empty PRN"));
        };
        let Some(subject_code) = key_field(rec, "Subject Code") else {
            return Err(bad_record(
                sheet,
                row,
                "Subject Code",
                "missing or empty Subject Code",
            ));
        };
        let Some(score) = numeric_field(rec, score_field) else {
            return Err(bad_record(
                sheet,
                row,
                score_field,
                format!("{} must be numeric", score_field),
            ));
        };
        let Some(out_of) = numeric_field(rec, "Maximum Marks") else {
            return Err(bad_record(
                sheet,
                row,
                "Maximum Marks",
                "Maximum Marks must be numeric",
            ));
        };
        out.push(MarkRow {
            prn,
            subject_code,
            score,
            out_of,
        });
    }
    Ok(out)
}

fn parse_subjects(rows: &[Value]) -> Result<Vec<SubjectRow>, SheetError> {
    let max_fields = [
        "Maximum Marks (MSE)",
        "Maximum Marks (ESE)",
        "Maximum Marks (CA)",
        "Maximum Marks (IA)",
    ];
    let mut out = Vec::with_capacity(rows.len());
    for (row, rec) in rows.iter().enumerate() {
        let Some(code) = key_field(rec, "Subject Code") else {
            return Err(bad_record(
                SHEET_SUBJECTS,
                row,
                "Subject Code",
                "missing or empty Subject Code",
            ));
        };
        let Some(name) = text_field(rec, "Subject Name") else {
            return Err(bad_record(
                SHEET_SUBJECTS,
                row,
                "Subject Name",
                "missing or empty Subject Name",
            ));
        };
        let mut maxima = [0.0_f64; 4];
        for (i, field) in max_fields.iter().enumerate() {
            let Some(v) = numeric_field(rec, field) else {
                return Err(bad_record(
                    SHEET_SUBJECTS,
                    row,
                    field,
                    format!("{} must be numeric", field),
                ));
            };
            maxima[i] = v;
        }
        let pass_percentage = match rec.get("Pass Percentage Required") {
            None => DEFAULT_PASS_PERCENTAGE,
            Some(v) => match v.as_f64() {
                Some(p) => p,
                None => {
                    return Err(bad_record(
                        SHEET_SUBJECTS,
                        row,
                        "Pass Percentage Required",
                        "Pass Percentage Required must be numeric",
                    ));
                }
            },
        };
        out.push(SubjectRow {
            code,
            name,
            max_mse: maxima[0],
            max_ese: maxima[1],
            max_ca: maxima[2],
            max_ia: maxima[3],
            pass_percentage,
        });
    }
    Ok(out)
}

fn sheet_rows<'a>(
    sheets: &'a Value,
    name: &str,
    report: &mut ValidationReport,
) -> Option<&'a Vec<Value>> {
    match sheets.get(name) {
        // Absence is reported once, from the presence pass.
        None => None,
        Some(Value::Array(rows)) => Some(rows),
        Some(_) => {
            report
                .sheet_errors
                .push(bad_sheet(name, "sheet must be an array of records"));
            None
        }
    }
}

/// Check all six sheets in one pass and produce the typed workbook. On
/// failure the report covers every broken sheet, so one upload round trip is
/// enough to see all problems. Unknown columns are ignored.
pub fn normalize(sheets: &Value) -> Result<Workbook, ValidationReport> {
    let mut report = ValidationReport {
        missing_sheets: Vec::new(),
        sheet_errors: Vec::new(),
    };

    for name in REQUIRED_SHEETS {
        if sheets.get(name).is_none() {
            report.missing_sheets.push(name.to_string());
        }
    }

    let students_rows = sheet_rows(sheets, SHEET_STUDENTS, &mut report);
    let mse_rows = sheet_rows(sheets, SHEET_MSE, &mut report);
    let ese_rows = sheet_rows(sheets, SHEET_ESE, &mut report);
    let ca_rows = sheet_rows(sheets, SHEET_CA, &mut report);
    let ia_rows = sheet_rows(sheets, SHEET_IA, &mut report);
    let subjects_rows = sheet_rows(sheets, SHEET_SUBJECTS, &mut report);

    let mut collect = |parsed: Option<Result<Vec<MarkRow>, SheetError>>| match parsed {
        Some(Ok(rows)) => Some(rows),
        Some(Err(e)) => {
            report.sheet_errors.push(e);
            None
        }
        None => None,
    };

    let mse = collect(mse_rows.map(|r| parse_marks(SHEET_MSE, "Marks Obtained", r)));
    let ese = collect(ese_rows.map(|r| parse_marks(SHEET_ESE, "Marks Obtained", r)));
    let ca = collect(ca_rows.map(|r| parse_marks(SHEET_CA, "Total CA", r)));
    let ia = collect(ia_rows.map(|r| parse_marks(SHEET_IA, "Total IA", r)));

    let students = match students_rows.map(|r| parse_students(r)) {
        Some(Ok(rows)) => Some(rows),
        Some(Err(e)) => {
            report.sheet_errors.push(e);
            None
        }
        None => None,
    };
    let subjects = match subjects_rows.map(|r| parse_subjects(r)) {
        Some(Ok(rows)) => Some(rows),
        Some(Err(e)) => {
            report.sheet_errors.push(e);
            None
        }
        None => None,
    };

    match (students, mse, ese, ca, ia, subjects) {
        (Some(students), Some(mse), Some(ese), Some(ca), Some(ia), Some(subjects))
            if report.is_valid() =>
        {
            Ok(Workbook {
                students,
                mse,
                ese,
                ca,
                ia,
                subjects,
            })
        }
        _ => Err(report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_sheets() -> Value {
        json!({
            "Students": [
                { "PRN": "P1", "Name": "Asha", "Course": "CSE", "Semester": 4 }
            ],
            "MSE Marks": [
                { "PRN": "P1", "Subject Code": "CS401", "Marks Obtained": 25, "Maximum Marks": 30 }
            ],
            "ESE Marks": [
                { "PRN": "P1", "Subject Code": "CS401", "Marks Obtained": 40, "Maximum Marks": 50 }
            ],
            "CA Marks": [
                { "PRN": "P1", "Subject Code": "CS401", "Total CA": 8, "Maximum Marks": 10 }
            ],
            "IA Marks": [
                { "PRN": "P1", "Subject Code": "CS401", "Total IA": 9, "Maximum Marks": 10 }
            ],
            "Subjects": [
                {
                    "Subject Code": "CS401",
                    "Subject Name": "Algorithms",
                    "Maximum Marks (MSE)": 30,
                    "Maximum Marks (ESE)": 50,
                    "Maximum Marks (CA)": 10,
                    "Maximum Marks (IA)": 10,
                    "Pass Percentage Required": 40
                }
            ]
        })
    }

    #[test]
    fn normalize_accepts_minimal_workbook() {
        let wb = normalize(&minimal_sheets()).expect("valid workbook");
        assert_eq!(wb.students.len(), 1);
        assert_eq!(wb.students[0].prn, "P1");
        assert_eq!(wb.subjects[0].max_total(), 100.0);
        assert_eq!(wb.subjects[0].pass_percentage, 40.0);
    }

    #[test]
    fn empty_workbook_reports_every_sheet_missing() {
        let report = normalize(&json!({})).expect_err("all sheets missing");
        assert_eq!(report.missing_sheets, REQUIRED_SHEETS.to_vec());
        assert!(report.sheet_errors.is_empty());
    }

    #[test]
    fn missing_sheets_are_all_reported() {
        let mut sheets = minimal_sheets();
        sheets.as_object_mut().unwrap().remove("CA Marks");
        sheets.as_object_mut().unwrap().remove("Subjects");
        let report = normalize(&sheets).expect_err("missing sheets");
        assert_eq!(report.missing_sheets, vec!["CA Marks", "Subjects"]);
        assert!(report.sheet_errors.is_empty());
    }

    #[test]
    fn broken_sheets_each_report_first_offending_record() {
        let mut sheets = minimal_sheets();
        sheets["Students"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "PRN": "P2", "Name": "", "Course": "CSE", "Semester": 4 }));
        sheets["IA Marks"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "PRN": "P2", "Subject Code": "CS401", "Total IA": "nine", "Maximum Marks": 10 }));
        let report = normalize(&sheets).expect_err("invalid workbook");
        assert!(report.missing_sheets.is_empty());
        assert_eq!(report.sheet_errors.len(), 2);

        let ia = report
            .sheet_errors
            .iter()
            .find(|e| e.sheet == SHEET_IA)
            .expect("IA error");
        assert_eq!(ia.row, Some(1));
        assert_eq!(ia.field.as_deref(), Some("Total IA"));

        let students = report
            .sheet_errors
            .iter()
            .find(|e| e.sheet == SHEET_STUDENTS)
            .expect("Students error");
        assert_eq!(students.row, Some(1));
        assert_eq!(students.field.as_deref(), Some("Name"));
    }

    #[test]
    fn numeric_join_keys_are_canonicalized() {
        let mut sheets = minimal_sheets();
        sheets["Students"][0]["PRN"] = json!(22010987);
        sheets["MSE Marks"][0]["PRN"] = json!(22010987);
        let wb = normalize(&sheets).expect("valid workbook");
        assert_eq!(wb.students[0].prn, "22010987");
        assert_eq!(wb.mse[0].prn, "22010987");
    }

    #[test]
    fn pass_percentage_defaults_when_absent() {
        let mut sheets = minimal_sheets();
        sheets["Subjects"][0]
            .as_object_mut()
            .unwrap()
            .remove("Pass Percentage Required");
        let wb = normalize(&sheets).expect("valid workbook");
        assert_eq!(wb.subjects[0].pass_percentage, DEFAULT_PASS_PERCENTAGE);
    }

    #[test]
    fn unknown_columns_are_ignored() {
        let mut sheets = minimal_sheets();
        sheets["CA Marks"][0]
            .as_object_mut()
            .unwrap()
            .insert("Assignment 1".to_string(), json!(4));
        sheets["MSE Marks"][0]
            .as_object_mut()
            .unwrap()
            .insert("Date".to_string(), json!("2026-03-02"));
        assert!(normalize(&sheets).is_ok());
    }

    #[test]
    fn non_array_sheet_is_a_sheet_error() {
        let mut sheets = minimal_sheets();
        sheets["ESE Marks"] = json!({ "oops": true });
        let report = normalize(&sheets).expect_err("invalid workbook");
        assert!(report.missing_sheets.is_empty());
        assert_eq!(report.sheet_errors.len(), 1);
        assert_eq!(report.sheet_errors[0].sheet, SHEET_ESE);
        assert_eq!(report.sheet_errors[0].row, None);
    }
}
