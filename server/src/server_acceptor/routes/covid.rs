use crate::error::AppError;
use crate::restrictions::{lookup, normalize_city};
use crate::server_acceptor::responses::{ApiResult, ok};
use crate::state::AppState;
use axum::Router;
use axum::extract::Query;
use axum::routing::get;
use common::types::covid::{RestrictionQuery, RestrictionResponse};

pub fn router() -> Router<AppState> {
    Router::new().route("/restriction/", get(restriction))
}

async fn restriction(Query(query): Query<RestrictionQuery>) -> ApiResult {
    let country = query
        .country
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("country is required".to_string()))?
        .to_uppercase();
    let state = query
        .state
        .as_deref()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty());
    let city = normalize_city(query.city.as_deref());

    let level = lookup(&country, state.as_deref(), city.as_deref());
    ok(
        RestrictionResponse {
            restriction_level: level,
            country,
            state,
            city,
        },
        "Restriction level retrieved",
    )
}
