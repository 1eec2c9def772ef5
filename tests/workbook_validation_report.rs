use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attaind");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attaind");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn full_sheets() -> serde_json::Value {
    json!({
        "Students": [
            { "PRN": "A", "Name": "Asha Kulkarni", "Course": "CSE", "Semester": 4 }
        ],
        "MSE Marks": [
            { "PRN": "A", "Subject Code": "CS401", "Marks Obtained": 25, "Maximum Marks": 30 }
        ],
        "ESE Marks": [
            { "PRN": "A", "Subject Code": "CS401", "Marks Obtained": 40, "Maximum Marks": 50 }
        ],
        "CA Marks": [
            { "PRN": "A", "Subject Code": "CS401", "Total CA": 8, "Maximum Marks": 10 }
        ],
        "IA Marks": [
            { "PRN": "A", "Subject Code": "CS401", "Total IA": 9, "Maximum Marks": 10 }
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
fn missing_sheets_are_listed_together() {
    let mut sheets = full_sheets();
    sheets.as_object_mut().unwrap().remove("IA Marks");
    sheets.as_object_mut().unwrap().remove("Subjects");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "workbook.validate",
        json!({ "sheets": sheets }),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(true));
    let result = resp.get("result").expect("result");
    assert_eq!(result.get("valid").and_then(|v| v.as_bool()), Some(false));
    let missing: Vec<&str> = result
        .get("missingSheets")
        .and_then(|v| v.as_array())
        .expect("missingSheets")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(missing, vec!["IA Marks", "Subjects"]);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn broken_records_report_every_offending_sheet() {
    let mut sheets = full_sheets();
    sheets["Students"]
        .as_array_mut()
        .unwrap()
        .push(json!({ "PRN": "", "Name": "Ghost", "Course": "CSE", "Semester": 4 }));
    sheets["CA Marks"].as_array_mut().unwrap().push(
        json!({ "PRN": "A", "Subject Code": "CS402", "Total CA": "eight", "Maximum Marks": 10 }),
    );

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "workbook.validate",
        json!({ "sheets": sheets }),
    );
    let result = resp.get("result").expect("result");
    assert_eq!(result.get("valid").and_then(|v| v.as_bool()), Some(false));
    let errors = result
        .get("sheetErrors")
        .and_then(|v| v.as_array())
        .expect("sheetErrors");
    let sheets_with_errors: Vec<&str> = errors
        .iter()
        .filter_map(|e| e.get("sheet").and_then(|v| v.as_str()))
        .collect();
    assert!(sheets_with_errors.contains(&"Students"));
    assert!(sheets_with_errors.contains(&"CA Marks"));
    for e in errors {
        assert_eq!(e.get("row").and_then(|v| v.as_u64()), Some(1));
        assert!(e.get("field").and_then(|v| v.as_str()).is_some());
    }

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn analysis_refuses_invalid_workbooks_before_aggregation() {
    let mut sheets = full_sheets();
    sheets.as_object_mut().unwrap().remove("Students");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "analysis.run",
        json!({ "sheets": sheets }),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
    let error = resp.get("error").expect("error");
    assert_eq!(
        error.get("code").and_then(|v| v.as_str()),
        Some("invalid_workbook")
    );
    let details = error.get("details").expect("details");
    assert_eq!(
        details
            .get("missingSheets")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );

    // The same sidecar keeps serving valid workbooks afterwards.
    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "analysis.run",
        json!({ "sheets": full_sheets() }),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(true));

    drop(stdin);
    let _ = child.wait();
}
