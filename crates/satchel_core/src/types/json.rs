/// Plugin-facing metadata bag. Opaque to the core.
pub type JSONObject = serde_json::Map<String, serde_json::Value>;
