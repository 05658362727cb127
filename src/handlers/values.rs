use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::{json, ApiErr, ApiResp, Ctx, Result};
use crate::{db, suggest::FieldKey};

/// Record-value request.
#[derive(Debug, serde::Deserialize)]
pub struct RecordValueReq {
    pub value: String,
}

/// POST /api/values/{collection}/{field} - record a raw value entered
/// into a field and invalidate that field's cached index.
pub async fn record_value(
    State(ctx): State<Arc<Ctx>>,
    Path((collection, field)): Path<(String, String)>,
    Json(req): Json<RecordValueReq>,
) -> Result<ApiResp<bool>> {
    if collection.trim().is_empty() || field.trim().is_empty() {
        return Err(ApiErr::new(
            "collection and field are required",
            StatusCode::BAD_REQUEST,
        ));
    }

    let value = req.value.trim();
    if value.is_empty() {
        return Err(ApiErr::new("value is required", StatusCode::BAD_REQUEST));
    }

    let key = FieldKey::new(collection, field);
    db::record_value(&ctx.db, &key, value).await?;

    // The corpus changed; the index rebuilds lazily on the next query.
    ctx.suggester.invalidate(&key);

    Ok(json(true))
}
