use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::outcomes::{OutcomeConfig, PoMapping, CO_IDS};
use serde_json::json;

fn handle_health(_state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION")
        }),
    )
}

fn handle_config_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "coTargets": state.config.co_targets,
            "poMap": state.config.po_map,
            "questionMap": state.config.question_map,
            "bands": {
                "excellent": crate::calc::EXCELLENT_MIN,
                "good": crate::calc::GOOD_MIN,
                "average": crate::calc::AVERAGE_MIN
            },
            "strength": {
                "strong": crate::outcomes::STRONG_MIN,
                "moderate": crate::outcomes::MODERATE_MIN
            }
        }),
    )
}

fn apply_co_targets(
    next: &mut OutcomeConfig,
    raw: &serde_json::Value,
) -> Result<(), (String, Option<serde_json::Value>)> {
    let Some(obj) = raw.as_object() else {
        return Err((
            "coTargets must be an object of CO id to numeric target".to_string(),
            None,
        ));
    };
    for (co_number, value) in obj {
        if !CO_IDS.contains(&co_number.as_str()) {
            return Err((
                format!("unknown CO id: {}", co_number),
                Some(json!({ "knownCoIds": CO_IDS })),
            ));
        }
        let Some(target) = value.as_f64() else {
            return Err((format!("coTargets.{} must be numeric", co_number), None));
        };
        if let Some(entry) = next
            .co_targets
            .iter_mut()
            .find(|t| t.co_number == *co_number)
        {
            entry.target = target;
        }
    }
    Ok(())
}

fn apply_po_map(
    next: &mut OutcomeConfig,
    raw: &serde_json::Value,
) -> Result<(), (String, Option<serde_json::Value>)> {
    let Some(rows) = raw.as_array() else {
        return Err(("poMap must be an array of mappings".to_string(), None));
    };
    let mut po_map = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(program_outcome) = row
            .get("programOutcome")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return Err((
                "poMap entries need a non-empty programOutcome".to_string(),
                None,
            ));
        };
        let Some(raw_cos) = row.get("contributingCos").and_then(|v| v.as_array()) else {
            return Err((
                format!("poMap.{} needs a contributingCos array", program_outcome),
                None,
            ));
        };
        let mut contributing_cos = Vec::with_capacity(raw_cos.len());
        for co in raw_cos {
            let Some(id) = co.as_str().filter(|id| CO_IDS.contains(id)) else {
                return Err((
                    format!("poMap.{} lists an unknown CO id", program_outcome),
                    Some(json!({ "knownCoIds": CO_IDS })),
                ));
            };
            contributing_cos.push(id.to_string());
        }
        if contributing_cos.is_empty() {
            return Err((
                format!("poMap.{} must map at least one CO", program_outcome),
                None,
            ));
        }
        po_map.push(PoMapping {
            program_outcome: program_outcome.to_string(),
            contributing_cos,
        });
    }
    if po_map.is_empty() {
        return Err(("poMap must contain at least one mapping".to_string(), None));
    }
    next.po_map = po_map;
    Ok(())
}

/// Patch the CO target table and/or the PO→CO mapping. The update is
/// all-or-nothing: a bad patch leaves the active configuration untouched.
fn handle_config_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let mut next = state.config.clone();

    if let Some(raw) = req.params.get("coTargets") {
        if let Err((message, details)) = apply_co_targets(&mut next, raw) {
            return err(&req.id, "bad_params", message, details);
        }
    }
    if let Some(raw) = req.params.get("poMap") {
        if let Err((message, details)) = apply_po_map(&mut next, raw) {
            return err(&req.id, "bad_params", message, details);
        }
    }

    state.config = next;
    ok(
        &req.id,
        json!({
            "coTargets": state.config.co_targets,
            "poMap": state.config.po_map
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "config.open" => Some(handle_config_open(state, req)),
        "config.update" => Some(handle_config_update(state, req)),
        _ => None,
    }
}
