//! Test fixtures.

use serde_json::Value;
use signaling_service::types::UserData;

/// userData with just a display name.
pub fn user_data(name: &str) -> UserData {
    user_data_with(&[("name", Value::String(name.to_string()))])
}

/// userData from key/value pairs.
pub fn user_data_with(pairs: &[(&str, Value)]) -> UserData {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_data_builders() {
        assert_eq!(user_data("Alice")["name"], "Alice");

        let data = user_data_with(&[("name", json!("Bob")), ("audioEnabled", json!(false))]);
        assert_eq!(data.len(), 2);
        assert_eq!(data["audioEnabled"], false);
    }
}
