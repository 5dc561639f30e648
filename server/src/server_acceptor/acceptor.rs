use crate::error::AppError;
use crate::server_acceptor::request_log::{REQUEST_ID_HEADER, log_requests};
use crate::server_acceptor::routes::{auth, bookings, covid, payments, services};
use crate::state::AppState;
use axum::Router;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware;
use colored::Color;
use common::logger::Logger;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Serves the REST API on the configured address until Ctrl-C.
pub struct Acceptor {
    state: AppState,
    logger: Logger,
}

impl Acceptor {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            logger: Logger::new("Acceptor", Color::Cyan),
        }
    }

    pub async fn start(self) -> std::io::Result<()> {
        let addr = self.state.config.bind_address();
        let listener = TcpListener::bind(&addr).await?;
        self.logger.info(format!("API listening on http://{addr}/api"));

        let app = build_router(self.state);
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal(self.logger.clone()))
        .await?;

        self.logger.info("API stopped");
        Ok(())
    }
}

async fn shutdown_signal(logger: Logger) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        logger.error(format!("Failed to listen for Ctrl-C: {e}"));
        std::future::pending::<()>().await;
    }
    logger.info("Shutdown requested, draining connections");
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let origins = match HeaderValue::from_str(state.config.frontend_url.trim_end_matches('/')) {
        Ok(origin) => vec![origin],
        Err(e) => {
            Logger::new("Acceptor", Color::Cyan)
                .warn(format!("Ignoring invalid FRONTEND_URL for CORS: {e}"));
            Vec::new()
        }
    };
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, request_id.clone()])
        .expose_headers([request_id])
        .max_age(Duration::from_secs(60 * 60))
}

async fn not_found() -> AppError {
    AppError::NotFound("Endpoint not found".to_string())
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/auth", auth::router())
        .nest("/bookings", bookings::router())
        .merge(services::router())
        .nest("/payments", payments::router())
        .nest("/covid", covid::router());

    Router::new()
        .nest("/api", api)
        .fallback(not_found)
        .layer(cors_layer(&state))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}
