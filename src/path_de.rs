use serde::de::DeserializeOwned;
use serde_json::Value;

/// Deserialize an already-parsed document, naming the JSON path on error.
pub fn from_value_with_path<T: DeserializeOwned>(value: Value) -> Result<T, String> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(|err| {
        let path = err.path().to_string();
        format!("at JSON path {path} → {}", err.into_inner())
    })
}
