use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers::{suggest, values, Ctx};

/// Initialize HTTP routes.
pub fn init_handlers(ctx: Arc<Ctx>) -> Router {
    Router::new()
        .route(
            "/api/suggest/{collection}/{field}",
            get(suggest::get_suggestions).delete(suggest::invalidate_index),
        )
        .route(
            "/api/complete/{collection}/{field}",
            get(suggest::get_completion),
        )
        .route(
            "/api/values/{collection}/{field}",
            post(values::record_value),
        )
        .route("/api/suggest", delete(suggest::invalidate_all))
        .route("/api/stats", get(suggest::get_stats))
        .route("/api/config", get(suggest::get_config))
        .with_state(ctx)
}
