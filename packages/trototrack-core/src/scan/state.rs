use serde::Serialize;

/// Message used when a failure carries nothing more specific.
pub const FALLBACK_ERROR_MESSAGE: &str = "An error occurred";

/// Progress of an asynchronous operation as seen by a UI layer.
///
/// One scan yields `Loading` followed by exactly one of `Success` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum OperationState<T> {
    Loading,
    Success(T),
    Error(String),
}

impl<T> OperationState<T> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationState::Loading)
    }

    pub(crate) fn error_or_fallback(message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string());
        OperationState::Error(message)
    }
}

/// Turn an `Error` message into the text shown to the user.
///
/// Servers answer rejections with a JSON envelope such as
/// `{"message":"too blurry"}`. When the body is a JSON object with a
/// `message` key, that value is shown: strings as is, `null` as `"null"`,
/// anything else as its JSON text. Any other body is shown verbatim.
pub fn display_error_message(raw: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => match map.get("message") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(value) => value.to_string(),
            None => raw.to_string(),
        },
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_error_message_extracts_nested() {
        assert_eq!(display_error_message(r#"{"message":"too blurry"}"#), "too blurry");
        assert_eq!(
            display_error_message(r#"{"status":"fail","message":"no sidewalk found"}"#),
            "no sidewalk found"
        );
    }

    #[test]
    fn test_display_error_message_keeps_raw() {
        assert_eq!(display_error_message("plain text"), "plain text");
        assert_eq!(display_error_message(r#"{"error":"nope"}"#), r#"{"error":"nope"}"#);
        assert_eq!(display_error_message(r#"["message"]"#), r#"["message"]"#);
    }

    #[test]
    fn test_display_error_message_stringifies_other_values() {
        assert_eq!(display_error_message(r#"{"message":null}"#), "null");
        assert_eq!(display_error_message(r#"{"message":42}"#), "42");
        assert_eq!(display_error_message(r#"{"message":false}"#), "false");
        assert_eq!(
            display_error_message(r#"{"message":{"code":7}}"#),
            r#"{"code":7}"#
        );
        assert_eq!(display_error_message(r#"{"message":["a","b"]}"#), r#"["a","b"]"#);
    }

    #[test]
    fn test_error_or_fallback() {
        assert_eq!(
            OperationState::<()>::error_or_fallback(None),
            OperationState::Error("An error occurred".to_string())
        );
        assert_eq!(
            OperationState::<()>::error_or_fallback(Some(String::new())),
            OperationState::Error("An error occurred".to_string())
        );
        assert_eq!(
            OperationState::<()>::error_or_fallback(Some("boom".into())),
            OperationState::Error("boom".to_string())
        );
    }

    #[test]
    fn test_serialize_state() {
        let json = serde_json::to_value(OperationState::<u8>::Error("boom".into())).unwrap();
        assert_eq!(json, serde_json::json!({"state": "error", "value": "boom"}));
        let json = serde_json::to_value(OperationState::<u8>::Loading).unwrap();
        assert_eq!(json, serde_json::json!({"state": "loading"}));
    }
}
