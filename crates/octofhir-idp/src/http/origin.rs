//! Effective request origin.
//!
//! Behind a TLS-terminating proxy the engine only sees plain http and the
//! proxy's internal host. When proxy trust is on, `X-Forwarded-Proto` and
//! `X-Forwarded-Host` replace the connection-level values. When it is off
//! those headers are ignored, since any client can send them.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, header};
use axum::middleware::Next;
use axum::response::Response;

const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// How the origin of a request is determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPolicy {
    /// Honour `X-Forwarded-*` headers.
    pub trust_proxy: bool,
    /// Host used when the request carries no `Host` header.
    pub fallback_host: String,
}

/// Scheme and host a request was addressed to, as the engine should see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    /// `http` or `https`, without `://`.
    pub scheme: String,
    /// Host, with port if one was given.
    pub host: String,
}

impl RequestOrigin {
    /// Resolves the origin from request headers under a policy.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap, policy: &OriginPolicy) -> Self {
        let forwarded = |name: &HeaderName| {
            if policy.trust_proxy {
                first_value(headers, name)
            } else {
                None
            }
        };

        let scheme = forwarded(&X_FORWARDED_PROTO)
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_else(|| "http".to_string());
        let host = forwarded(&X_FORWARDED_HOST)
            .or_else(|| first_value(headers, &header::HOST))
            .unwrap_or_else(|| policy.fallback_host.clone());

        Self { scheme, host }
    }

    /// `scheme://host`, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

fn first_value(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

/// Middleware storing the resolved [`RequestOrigin`] in request extensions.
pub async fn resolve_origin(
    State(policy): State<OriginPolicy>,
    mut req: Request,
    next: Next,
) -> Response {
    let origin = RequestOrigin::from_headers(req.headers(), &policy);
    req.extensions_mut().insert(origin);
    next.run(req).await
}
