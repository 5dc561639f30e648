use crate::messages::internal_messages::{GetService, ListServices};
use crate::server_acceptor::responses::{ApiResult, ok};
use crate::server_acceptor::routes::parse_id;
use crate::state::AppState;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::get;

/// Catalog routes, merged into `/api` rather than nested so the listing
/// answers at `/services/` as well as `/services`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/services/", get(list_services))
        .route("/services", get(list_services))
        .route("/services/{id}/", get(get_service))
}

async fn list_services(State(state): State<AppState>) -> ApiResult {
    let services = state.storage.send(ListServices).await?;
    ok(services, "Services retrieved")
}

async fn get_service(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let service_id = parse_id(&id, "Service")?;
    let service = state.storage.send(GetService { service_id }).await??;
    ok(service, "Service retrieved")
}
