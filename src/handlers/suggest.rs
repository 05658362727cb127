use std::sync::Arc;

use axum::extract::{Path, Query, State};

use super::{json, ApiResp, Ctx, Result};
use crate::db;
use crate::suggest::{completion_suffix, FieldKey, SuggestConfig, Suggestion};

/// Suggest query params.
#[derive(Debug, serde::Deserialize, Default)]
pub struct SuggestParams {
    /// The text typed so far.
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
}

/// Ranked suggestions for a typed prefix (public API). Loads the field's
/// index on first use; a degraded corpus shows up as an empty list, never
/// an error.
pub async fn get_suggestions(
    State(ctx): State<Arc<Ctx>>,
    Path((collection, field)): Path<(String, String)>,
    Query(params): Query<SuggestParams>,
) -> Result<ApiResp<Vec<Suggestion>>> {
    let key = FieldKey::new(collection, field);
    ctx.suggester.ensure_loaded(&key).await;

    Ok(json(ctx.suggester.suggestions(&key, &params.q, params.limit)))
}

/// Top suggestion plus the inline-overlay remainder.
#[derive(serde::Serialize)]
pub struct CompletionResp {
    pub suggestion: Option<Suggestion>,
    /// Raw-text suffix to render as the ghost overlay; null when no
    /// overlay applies.
    pub completion: Option<String>,
}

/// Single best completion for a typed prefix, for ghost overlays.
pub async fn get_completion(
    State(ctx): State<Arc<Ctx>>,
    Path((collection, field)): Path<(String, String)>,
    Query(params): Query<SuggestParams>,
) -> Result<ApiResp<CompletionResp>> {
    let key = FieldKey::new(collection, field);
    ctx.suggester.ensure_loaded(&key).await;

    let suggestion = ctx.suggester.top_suggestion(&key, &params.q);
    let completion = suggestion
        .as_ref()
        .and_then(|s| completion_suffix(&params.q, &s.text, ctx.normalizer.as_ref()));

    Ok(json(CompletionResp {
        suggestion,
        completion,
    }))
}

/// Drop the cached index for one field. The next query rebuilds it from
/// the corpus.
pub async fn invalidate_index(
    State(ctx): State<Arc<Ctx>>,
    Path((collection, field)): Path<(String, String)>,
) -> Result<ApiResp<bool>> {
    ctx.suggester.invalidate(&FieldKey::new(collection, field));
    Ok(json(true))
}

/// Drop every cached index (bulk imports, restores, context switches).
pub async fn invalidate_all(State(ctx): State<Arc<Ctx>>) -> Result<ApiResp<bool>> {
    ctx.suggester.invalidate_all();
    Ok(json(true))
}

/// Effective suggest limits, for UI clients that want to honor the
/// minimum prefix length without a round trip.
pub async fn get_config(State(ctx): State<Arc<Ctx>>) -> Result<ApiResp<SuggestConfig>> {
    Ok(json(ctx.suggester.config().clone()))
}

/// Corpus and index counters.
#[derive(serde::Serialize)]
pub struct StatsResp {
    pub num_values: i64,
    pub num_fields: i64,
    pub loaded_indexes: usize,
    pub indexed_entries: usize,
}

pub async fn get_stats(State(ctx): State<Arc<Ctx>>) -> Result<ApiResp<StatsResp>> {
    let corpus = db::corpus_stats(&ctx.db).await?;
    let index = ctx.suggester.stats();

    Ok(json(StatsResp {
        num_values: corpus.num_values,
        num_fields: corpus.num_fields,
        loaded_indexes: index.loaded_indexes,
        indexed_entries: index.indexed_entries,
    }))
}
