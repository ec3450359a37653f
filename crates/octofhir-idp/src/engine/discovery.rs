//! Provider metadata HTTP handler.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::header;
use axum::response::IntoResponse;

use super::local::LocalEngine;
use crate::http::RequestOrigin;

/// Handler for `GET /.well-known/openid-configuration`.
///
/// Endpoint URLs follow the origin resolved for the request, so they honour
/// forwarded headers exactly when the deployment trusts its proxy. The
/// `issuer` value is always the configured one.
pub async fn openid_configuration_handler(
    State(engine): State<Arc<LocalEngine>>,
    req: Request,
) -> impl IntoResponse {
    let origin = req.extensions().get::<RequestOrigin>();
    let doc = engine.discovery_document(origin);
    ([(header::CONTENT_TYPE, "application/json")], Json(doc))
}
