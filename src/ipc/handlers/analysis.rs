use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::sheets;
use serde_json::json;

fn sheets_param<'a>(req: &'a Request) -> Result<&'a serde_json::Value, serde_json::Value> {
    let Some(v) = req.params.get("sheets") else {
        return Err(err(&req.id, "bad_params", "missing params.sheets", None));
    };
    if !v.is_object() {
        return Err(err(
            &req.id,
            "bad_params",
            "params.sheets must be an object of sheet name to record array",
            None,
        ));
    }
    Ok(v)
}

/// Dry-run check of an uploaded workbook. Invalid data is a successful
/// response carrying the report, so the caller can surface every problem in
/// one pass.
fn handle_workbook_validate(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let sheets = match sheets_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match sheets::normalize(sheets) {
        Ok(_) => ok(
            &req.id,
            json!({ "valid": true, "missingSheets": [], "sheetErrors": [] }),
        ),
        Err(report) => ok(
            &req.id,
            json!({
                "valid": false,
                "missingSheets": report.missing_sheets,
                "sheetErrors": report.sheet_errors
            }),
        ),
    }
}

fn handle_analysis_run(state: &mut AppState, req: &Request) -> serde_json::Value {
    let sheets = match sheets_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let workbook = match sheets::normalize(sheets) {
        Ok(wb) => wb,
        // Fail before aggregation: no partial results for a broken workbook.
        Err(report) => {
            return err(
                &req.id,
                "invalid_workbook",
                "workbook failed validation",
                Some(json!(report)),
            );
        }
    };
    let results = calc::analyze_workbook(&workbook, &state.config);
    ok(&req.id, json!(results))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "workbook.validate" => Some(handle_workbook_validate(state, req)),
        "analysis.run" => Some(handle_analysis_run(state, req)),
        _ => None,
    }
}
