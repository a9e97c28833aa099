use std::net::SocketAddr;

use axum::{
    extract::{Request, State},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::{accounts, auth, categories, error::AppError, state::AppState, transactions, users};

/// Every resource router, mounted at its singular and plural path.
fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/user", users::router())
        .nest("/users", users::router())
        .nest("/account", accounts::router())
        .nest("/accounts", accounts::router())
        .nest("/category", categories::router())
        .nest("/categories", categories::router())
        .nest("/transaction", transactions::router())
        .nest("/transactions", transactions::router())
}

/// Fails the request with an enveloped 408 once it outlives `REQUEST_TIMEOUT_SECS`.
async fn enforce_deadline(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let deadline = state.config.request_timeout();
    tokio::time::timeout(deadline, next.run(req))
        .await
        .map_err(|_| {
            tracing::warn!(?deadline, "request timed out");
            AppError::Timeout
        })
}

pub fn build_app(state: AppState) -> Router {
    let protected =
        api_routes().route_layer(from_fn_with_state(state.clone(), auth::middleware::require_session));

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(auth::router())
        .nest("/api", protected)
        .layer(from_fn_with_state(state.clone(), enforce_deadline))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    let request_id = Uuid::new_v4();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        %request_id,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
