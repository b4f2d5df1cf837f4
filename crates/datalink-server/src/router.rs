//! Axum router construction for the data link.
//!
//! There are no routes. Every plain request falls through to the
//! [`ResponsibilityChain`](crate::responsibility::ResponsibilityChain);
//! stream upgrades are taken before that by
//! [`steal_upgrade`](crate::stream::steal_upgrade).
//!
//! Layers, innermost first: upgrade stealing, the request length guard,
//! panic recovery, rate accounting, CORS, the `Server` header, tracing.

use std::any::Any;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{HeaderValue, header};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::DataLinkError;
use crate::layers::{account_rates, limit_request_length};
use crate::state::AppState;
use crate::stream::steal_upgrade;

/// Build the complete Axum router for one run of the data link.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    let settings = state.context.settings();
    let banner = HeaderValue::from_str(&settings.banner())
        .unwrap_or_else(|_invalid| HeaderValue::from_static("datalink"));
    let body_limit = settings.max_request_length;

    Router::new()
        .fallback(respond)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(state.clone(), steal_upgrade))
        .layer(middleware::from_fn_with_state(state.clone(), limit_request_length))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(state.clone(), account_rates))
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(header::SERVER, banner))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Hand a plain request to the responsibility chain.
async fn respond(State(state): State<AppState>, request: Request) -> Response {
    let (parts, _body) = request.into_parts();
    state.chain.respond(&parts)
}

/// A panicking responsibility answers `500` instead of dropping the connection.
fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(%detail, "request handler panicked");
    DataLinkError::Internal(detail.to_owned()).into_response()
}
