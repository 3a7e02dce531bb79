//! JSON-over-HTTP surface for the booking service.

mod handlers;
mod response;

pub use response::{success, ApiError, Envelope};

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, FromRef, MatchedPath};
use axum::http::Request;
use axum::middleware::{from_fn, Next};
use axum::response::Response;
use axum::routing::{get, patch, post};
use axum::Router;
use tracing::Instrument;

use crate::auth::TokenDirectory;
use crate::booking::BookingService;
use crate::limits::MAX_BODY_BYTES;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BookingService>,
    pub tokens: Arc<TokenDirectory>,
}

impl FromRef<AppState> for Arc<TokenDirectory> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

async fn request_tracing(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string());
    let span = tracing::info_span!("http.request", method = %method, route = %route);

    let started = Instant::now();
    let response = next.run(request).instrument(span).await;
    let status = response.status().as_u16().to_string();
    metrics::counter!(
        crate::observability::HTTP_REQUESTS_TOTAL,
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        crate::observability::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.clone(),
        "route" => route.clone()
    )
    .record(started.elapsed().as_secs_f64());
    tracing::debug!("{method} {route} -> {}", response.status());
    response
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/bookings",
            post(handlers::create_booking).get(handlers::list_mine),
        )
        .route("/api/bookings/court-bookings", get(handlers::list_court_bookings))
        .route("/api/bookings/all", get(handlers::list_all))
        .route(
            "/api/bookings/:id",
            get(handlers::get_booking)
                .put(handlers::update_booking)
                .delete(handlers::cancel_booking),
        )
        .route("/api/bookings/:id/confirm", patch(handlers::confirm_booking))
        .layer(from_fn(request_tracing))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
