use serde::Deserialize;

/// Success body from the expert endpoint. Fields beyond `class_name` and
/// `confidence` vary between server versions and are kept opaque.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpertResponse {
    pub class_name: String,
    pub confidence: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
