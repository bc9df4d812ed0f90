//! Artwork search, download and ledger handlers.

use super::{require_item, require_kind, require_str_param};
use crate::server::AppState;
use serde_json::Value;

pub async fn search_artwork(state: &AppState, params: &Value) -> marquee_library::Result<Value> {
    let item = require_item(params)?;
    let kind = require_kind(params)?;
    let search = state.api.search_artwork(&item, kind).await?;
    Ok(serde_json::to_value(search)?)
}

pub async fn download_artwork(state: &AppState, params: &Value) -> marquee_library::Result<Value> {
    let item = require_item(params)?;
    let kind = require_kind(params)?;
    let url = require_str_param(params, "url", "imageUrl")?;
    let outcome = state.api.download_artwork(&item, kind, &url).await?;
    Ok(serde_json::to_value(outcome)?)
}

pub async fn mark_unavailable(state: &AppState, params: &Value) -> marquee_library::Result<Value> {
    let item = require_item(params)?;
    let kind = require_kind(params)?;
    let change = state.api.mark_unavailable(&item, kind).await?;
    Ok(serde_json::to_value(change)?)
}

pub async fn clear_unavailable(state: &AppState, params: &Value) -> marquee_library::Result<Value> {
    let item = require_item(params)?;
    let kind = require_kind(params)?;
    let change = state.api.clear_unavailable(&item, kind).await?;
    Ok(serde_json::to_value(change)?)
}
