//! Inventory listing handlers.

use super::{get_str_param, require_category, require_item};
use crate::server::AppState;
use marquee_library::MediaCategory;
use serde_json::{json, Value};

pub async fn list_items(state: &AppState, params: &Value) -> marquee_library::Result<Value> {
    let category = require_category(params)?;
    let listing = state.api.list_items(category).await?;
    Ok(serde_json::to_value(listing)?)
}

pub async fn get_item_status(state: &AppState, params: &Value) -> marquee_library::Result<Value> {
    let item = require_item(params)?;
    let status = state.api.item_status(&item).await?;
    Ok(serde_json::to_value(status)?)
}

/// Configured roots, for one category or all of them.
pub async fn get_roots(state: &AppState, params: &Value) -> marquee_library::Result<Value> {
    let categories = match get_str_param(params, "category", "category") {
        Some(category) => vec![category.parse::<MediaCategory>()?],
        None => MediaCategory::ALL.to_vec(),
    };
    let mut roots = serde_json::Map::new();
    for category in categories {
        roots.insert(
            category.as_str().to_string(),
            json!(state.api.roots(category)),
        );
    }
    Ok(json!({ "roots": roots }))
}

pub async fn ledger_health(state: &AppState, _params: &Value) -> marquee_library::Result<Value> {
    Ok(serde_json::to_value(state.api.ledger_health().await)?)
}
