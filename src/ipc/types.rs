use serde::Deserialize;

use crate::outcomes::OutcomeConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The sidecar carries no workspace and no storage; the only state between
/// requests is the outcome configuration.
pub struct AppState {
    pub config: OutcomeConfig,
}
