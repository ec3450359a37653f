use std::net::{Ipv4Addr, SocketAddr};

use axum::Router;
use octofhir_idp::{IdpConfig, IdpResult, LocalEngine, ProviderAssembly};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub struct IdpServer {
    addr: SocketAddr,
    app: Router,
}

/// Assembles the provider and wraps it in the HTTP middleware stack.
pub fn build_app(cfg: &IdpConfig) -> IdpResult<Router> {
    let mounted = ProviderAssembly::from_config(cfg)?.build::<LocalEngine>()?;

    let app = mounted.router.layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(|req: &axum::http::Request<_>| {
                        use tracing::field::Empty;
                        tracing::info_span!(
                            "http.request",
                            http.method = %req.method(),
                            http.target = %req.uri(),
                            http.status_code = Empty,
                        )
                    })
                    .on_response(
                        |res: &axum::http::Response<_>,
                         latency: std::time::Duration,
                         span: &tracing::Span| {
                            span.record(
                                "http.status_code",
                                tracing::field::display(res.status().as_u16()),
                            );
                            tracing::info!(
                                http.status = %res.status().as_u16(),
                                elapsed_ms = %latency.as_millis(),
                                "request handled"
                            );
                        },
                    ),
            )
            .layer(CorsLayer::permissive())
            .layer(CompressionLayer::new()),
    );
    Ok(app)
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: IdpConfig,
}

impl ServerBuilder {
    /// Binds all interfaces on the configured port.
    pub fn new(config: IdpConfig) -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port)),
            config,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn build(self) -> IdpResult<IdpServer> {
        let app = build_app(&self.config)?;
        Ok(IdpServer {
            addr: self.addr,
            app,
        })
    }
}

impl IdpServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
