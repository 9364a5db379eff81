//! Messages exchanged between the popup, background and content contexts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{ProductRecord, SearchResult};

/// A request to another context. JSON form: `{"action": "toggleChat", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Backend call, performed by the background relay.
    ApiRequest {
        endpoint: String,
        #[serde(default)]
        data: Value,
    },
    ToggleChat,
    Ping,
    ExtractProducts {
        #[serde(default)]
        query: Option<String>,
    },
    FindProducts,
    ProcessUserQuery {
        query: String,
    },
    /// Sent by the results view's back link.
    FocusChat,
}

impl Request {
    pub fn action(&self) -> &'static str {
        match self {
            Request::ApiRequest { .. } => "apiRequest",
            Request::ToggleChat => "toggleChat",
            Request::Ping => "ping",
            Request::ExtractProducts { .. } => "extractProducts",
            Request::FindProducts => "findProducts",
            Request::ProcessUserQuery { .. } => "processUserQuery",
            Request::FocusChat => "focusChat",
        }
    }
}

/// `{success, data|error}` reply to an `apiRequest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiReply {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Visibility of the injected chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatInterfaceState {
    pub initialized: bool,
    pub visible: bool,
}

/// Outcome of one product search, as re-dispatched to the chat UI.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub products: Vec<ProductRecord>,
    pub recommendations: Vec<ProductRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

impl From<SearchResult> for SearchOutcome {
    fn from(result: SearchResult) -> Self {
        Self {
            products: result.products,
            recommendations: result.recommendations,
            total_price: result.total_price,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Response {
    Pong,
    Toggled { state: ChatInterfaceState },
    Products { products: Vec<ProductRecord>, query: String },
    Api(ApiReply),
    Search(SearchOutcome),
    Failed { error: String },
}

impl Response {
    pub fn failed(error: impl Into<String>) -> Self {
        Response::Failed { error: error.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_names() {
        let toggle: Request = serde_json::from_value(json!({ "action": "toggleChat" })).unwrap();
        assert_eq!(toggle, Request::ToggleChat);

        let api: Request = serde_json::from_value(json!({
            "action": "apiRequest",
            "endpoint": "search",
            "data": { "query": "mouse" }
        }))
        .unwrap();
        assert_eq!(api.action(), "apiRequest");

        let extract: Request = serde_json::from_value(json!({ "action": "extractProducts" })).unwrap();
        assert_eq!(extract, Request::ExtractProducts { query: None });
    }

    #[test]
    fn test_unknown_action_rejected() {
        let parsed = serde_json::from_value::<Request>(json!({ "action": "launchRockets" }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_api_reply_shape() {
        let ok = serde_json::to_value(ApiReply::ok(json!({ "status": "success" }))).unwrap();
        assert_eq!(ok, json!({ "success": true, "data": { "status": "success" } }));
        let err = serde_json::to_value(ApiReply::err("HTTP error! status: 500")).unwrap();
        assert_eq!(err, json!({ "success": false, "error": "HTTP error! status: 500" }));
    }
}
