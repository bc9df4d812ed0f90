//! JSON-RPC request handlers, split by domain.

mod artwork;
mod items;

use crate::server::AppState;
use crate::wrapper::wrap_response;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use marquee_library::{ArtworkKind, ItemRef, MarqueeError, MediaCategory};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

// ============================================================================
// JSON-RPC types
// ============================================================================

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Standard JSON-RPC code for an unknown method.
const METHOD_NOT_FOUND: i32 = -32601;

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self::error_with_data(id, code, message, None)
    }

    pub fn error_with_data(
        id: Option<Value>,
        code: i32,
        message: String,
        data: Option<Value>,
    ) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data,
            }),
            id,
        }
    }
}

// ============================================================================
// Parameter extraction helpers
// ============================================================================

/// Extract an optional string parameter, supporting both snake_case and camelCase.
pub(crate) fn get_str_param<'a>(params: &'a Value, snake: &str, camel: &str) -> Option<&'a str> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_str())
}

/// Extract a required string parameter or return an error.
pub(crate) fn require_str_param(
    params: &Value,
    snake: &str,
    camel: &str,
) -> marquee_library::Result<String> {
    get_str_param(params, snake, camel)
        .map(String::from)
        .ok_or_else(|| MarqueeError::InvalidParams {
            message: format!("Missing required parameter: {}", snake),
        })
}

pub(crate) fn require_category(params: &Value) -> marquee_library::Result<MediaCategory> {
    require_str_param(params, "category", "category")?.parse()
}

pub(crate) fn require_kind(params: &Value) -> marquee_library::Result<ArtworkKind> {
    require_str_param(params, "kind", "artworkKind")?.parse()
}

/// `{category, folder}` naming one media item.
pub(crate) fn require_item(params: &Value) -> marquee_library::Result<ItemRef> {
    let category = require_category(params)?;
    let folder = require_str_param(params, "folder", "folderName")?;
    Ok(ItemRef::new(category, folder))
}

// ============================================================================
// HTTP endpoints
// ============================================================================

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Main JSON-RPC handler.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let method = &request.method;
    let params = request.params.unwrap_or(Value::Object(Default::default()));
    let id = request.id.clone();

    debug!("RPC call: {}({:?})", method, params);

    let Some(result) = dispatch_method(&state, method, &params).await else {
        warn!("Method not found: {}", method);
        return (
            StatusCode::OK,
            Json(JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
            )),
        );
    };

    match result {
        Ok(value) => {
            let wrapped = wrap_response(method, value);
            (StatusCode::OK, Json(JsonRpcResponse::success(id, wrapped)))
        }
        Err(e) => {
            error!("RPC error for {}: {}", method, e);
            let code = e.to_rpc_error_code();
            let data = json!({ "retryable": e.is_retryable() });
            (
                StatusCode::OK,
                Json(JsonRpcResponse::error_with_data(
                    id,
                    code,
                    e.to_string(),
                    Some(data),
                )),
            )
        }
    }
}

// ============================================================================
// Method dispatcher
// ============================================================================

/// Dispatch a method call to the appropriate domain handler.
///
/// Returns `None` for an unknown method.
async fn dispatch_method(
    state: &AppState,
    method: &str,
    params: &Value,
) -> Option<marquee_library::Result<Value>> {
    let result = match method {
        "health_check" => Ok(json!({"status": "ok"})),

        // Inventory
        "list_items" => items::list_items(state, params).await,
        "get_item_status" => items::get_item_status(state, params).await,
        "get_roots" => items::get_roots(state, params).await,
        "ledger_health" => items::ledger_health(state, params).await,

        // Artwork
        "search_artwork" => artwork::search_artwork(state, params).await,
        "download_artwork" => artwork::download_artwork(state, params).await,
        "mark_unavailable" => artwork::mark_unavailable(state, params).await,
        "clear_unavailable" => artwork::clear_unavailable(state, params).await,

        _ => return None,
    };
    Some(result)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_rpc_response_success() {
        let response = JsonRpcResponse::success(Some(json!(1)), json!({"data": "test"}));
        assert!(response.error.is_none());
        assert!(response.result.is_some());
    }

    #[test]
    fn test_json_rpc_response_error() {
        let response = JsonRpcResponse::error(Some(json!(1)), -32600, "Test error".into());
        assert!(response.error.is_some());
        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().code, -32600);
    }

    #[test]
    fn test_params_accept_both_casings() {
        let snake = json!({"category": "tv", "folder": "The Wire (2002)", "kind": "logo"});
        let camel = json!({"category": "movies", "folderName": "Heat (1995)", "artworkKind": "fanart"});

        let item = require_item(&snake).unwrap();
        assert_eq!(item.category, MediaCategory::Tv);
        assert_eq!(item.folder, "The Wire (2002)");
        assert_eq!(require_kind(&snake).unwrap(), ArtworkKind::Logo);

        let item = require_item(&camel).unwrap();
        assert_eq!(item.folder, "Heat (1995)");
        assert_eq!(require_kind(&camel).unwrap(), ArtworkKind::Backdrop);
    }

    #[test]
    fn test_missing_and_invalid_params() {
        assert!(matches!(
            require_item(&json!({"category": "movies"})),
            Err(MarqueeError::InvalidParams { .. })
        ));
        assert!(matches!(
            require_category(&json!({"category": "music"})),
            Err(MarqueeError::InvalidParams { .. })
        ));
    }
}
