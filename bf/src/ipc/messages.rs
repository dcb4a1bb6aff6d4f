//! IPC message types
//!
//! Simple JSON-over-lines protocol: every command and every completion event
//! is a single JSON object on its own line.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::tags::CorrelationTag;

/// Entity family a command targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Budget,
    Stock,
    Sale,
}

/// Operation requested from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    CreateBudget,
    ReadBudgets,
    UpdateBudget,
    DeleteBudget,
    StockTakeAway,
    StockUpdate,
    StockReturn,
    CreateSale,
}

/// Per-invocation correlation identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh, time-ordered request id
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outbound one-way command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub entity: EntityKind,
    pub operation: Operation,
    pub tag: CorrelationTag,
    #[serde(rename = "request-id")]
    pub request_id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Inbound completion event
///
/// Carries either `result` or `error`. Events without a `request-id` are
/// paired with the oldest waiter on the same tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub tag: CorrelationTag,
    #[serde(rename = "request-id", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompletionEvent {
    /// Successful completion
    pub fn success(tag: CorrelationTag, request_id: Option<RequestId>, result: Value) -> Self {
        Self {
            tag,
            request_id,
            result: Some(result),
            error: None,
        }
    }

    /// Failed completion
    pub fn failure(tag: CorrelationTag, request_id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self {
            tag,
            request_id,
            result: None,
            error: Some(message.into()),
        }
    }

    /// Collapse into the result the waiter resumes with
    ///
    /// A missing `result` on a non-failed event resumes with `null`.
    pub fn into_outcome(self) -> Result<Value, String> {
        match self.error {
            Some(message) => Err(message),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_serialize() {
        let request_id = RequestId::new();
        let envelope = CommandEnvelope {
            entity: EntityKind::Budget,
            operation: Operation::CreateBudget,
            tag: CorrelationTag::CreateBudget,
            request_id,
            payload: Some(json!({"total": 21.0})),
        };

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["entity"], json!("BUDGET"));
        assert_eq!(value["operation"], json!("CREATE_BUDGET"));
        assert_eq!(value["tag"], json!("BUDGET_CREATE"));
        assert_eq!(value["request-id"], json!(request_id.to_string()));
        assert_eq!(value["payload"]["total"], json!(21.0));
    }

    #[test]
    fn test_envelope_without_payload_omits_field() {
        let envelope = CommandEnvelope {
            entity: EntityKind::Budget,
            operation: Operation::ReadBudgets,
            tag: CorrelationTag::ReadAll,
            request_id: RequestId::new(),
            payload: None,
        };

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(!json.contains("payload"));
    }

    #[test]
    fn test_stock_operations_wire_names() {
        assert_eq!(serde_json::to_string(&Operation::StockTakeAway).unwrap(), r#""STOCK_TAKE_AWAY""#);
        assert_eq!(serde_json::to_string(&Operation::StockUpdate).unwrap(), r#""STOCK_UPDATE""#);
        assert_eq!(serde_json::to_string(&Operation::StockReturn).unwrap(), r#""STOCK_RETURN""#);
    }

    #[test]
    fn test_completion_success_outcome() {
        let json = r#"{"tag":"BUDGET_CREATE","result":"b1"}"#;
        let event: CompletionEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.request_id, None);
        assert_eq!(event.into_outcome(), Ok(json!("b1")));
    }

    #[test]
    fn test_completion_error_outcome() {
        let event = CompletionEvent::failure(CorrelationTag::UpdateBudget, None, "disk full");
        let json = serde_json::to_string(&event).unwrap();
        let parsed: CompletionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.into_outcome(), Err("disk full".to_string()));
    }

    #[test]
    fn test_completion_null_result_is_success() {
        let json = r#"{"tag":"BUDGET_REMOVE","result":null}"#;
        let event: CompletionEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.into_outcome(), Ok(Value::Null));
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let json = r#"{"tag":"CUSTOMER_CREATE","result":1}"#;
        assert!(serde_json::from_str::<CompletionEvent>(json).is_err());
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }
}
