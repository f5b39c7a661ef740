//! pdflock server
//!
//! Watermarks and password-protects contract PDFs. Provides REST API
//! endpoints for:
//!
//! - Full processing: watermark, metadata and AES-256 encryption
//! - Encryption only, with optional permission overrides
//! - Watermark only
//!
//! ## Architecture
//!
//! Handlers validate and decode requests, then hand the PDF to
//! `pdflock-core`, which derives the per-contract password and drives qpdf.
//! The /api/pdf routes sit behind an API key check and per-IP rate limiting
//! via tower-governor.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use clap::Parser;
use governor::middleware::NoOpMiddleware;
use pdflock_core::{CoreConfig, PdfEncryptor, PdfProtector, QpdfEncryptor};
use tower_governor::{
    governor::{GovernorConfig, GovernorConfigBuilder},
    key_extractor::PeerIpKeyExtractor,
    GovernorLayer,
};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    sensitive_headers::SetSensitiveRequestHeadersLayer,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, warn, Level, Span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod auth;
mod config;
mod error;
mod models;
mod request_id;

use api::{
    handle_encrypt_pdf, handle_health, handle_not_found, handle_process_pdf, handle_ready,
    handle_watermark_pdf,
};
use config::Args;
use request_id::{MakePrefixedRequestId, REQUEST_ID_HEADER};

/// Request bodies above this are rejected before JSON parsing
const BODY_LIMIT_BYTES: usize = 20 * 1024 * 1024;

pub type RateLimitConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Shared application state
pub struct AppState {
    pub protector: PdfProtector,
    /// Expected X-API-Key value
    pub api_key: Option<String>,
    pub environment: String,
    /// Scratch directory checked by the readiness probe
    pub temp_dir: PathBuf,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: &CoreConfig,
        environment: impl Into<String>,
        api_key: Option<String>,
        encryptor: Arc<dyn PdfEncryptor>,
    ) -> Self {
        Self {
            protector: PdfProtector::new(config, encryptor),
            api_key: api_key.filter(|key| !key.is_empty()),
            environment: environment.into(),
            temp_dir: config.temp_dir.clone(),
            started_at: Instant::now(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Per-IP limiter allowing `per_minute` requests in any one-minute window.
pub fn rate_limit_config(per_minute: u32) -> anyhow::Result<Arc<RateLimitConfig>> {
    let replenish_ms = (60_000 / u64::from(per_minute.max(1))).max(1);
    GovernorConfigBuilder::default()
        .per_millisecond(replenish_ms)
        .burst_size(per_minute.max(1))
        .finish()
        .map(Arc::new)
        .ok_or_else(|| anyhow::anyhow!("invalid rate limit: {} per minute", per_minute))
}

/// Build the full router. `rate_limit: None` disables per-IP limiting.
pub fn build_router(state: Arc<AppState>, rate_limit: Option<Arc<RateLimitConfig>>) -> Router {
    let api_key_header = HeaderName::from_static(auth::API_KEY_HEADER);
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    let mut pdf_routes = Router::new()
        .route("/process", post(handle_process_pdf))
        .route("/encrypt", post(handle_encrypt_pdf))
        .route("/watermark", post(handle_watermark_pdf))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));
    if let Some(config) = rate_limit {
        pdf_routes = pdf_routes.layer(GovernorLayer { config });
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            api_key_header.clone(),
            request_id_header.clone(),
        ]);

    Router::new()
        .route("/health", get(handle_health))
        .route("/health/ready", get(handle_ready))
        .nest("/api/pdf", pdf_routes)
        .fallback(handle_not_found)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(SetRequestIdLayer::new(request_id_header, MakePrefixedRequestId))
        .layer(SetSensitiveRequestHeadersLayer::new([api_key_header]))
        .layer(cors)
        .with_state(state)
}

/// Per-request span carrying the request id, so every log line of the
/// request can be correlated.
fn request_span(request: &Request) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");
    info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    register_panic_logger();

    if let Err(e) = args.validate() {
        error!("{}", e);
        return Err(e.into());
    }
    info!("Configuration validated successfully");

    let core = args.core_config();
    if core.uses_default_salt() {
        warn!("PDF_ENCRYPTION_SALT is not set; using the built-in default salt");
    }
    if args.api_key.is_none() {
        warn!("API_KEY is not set; /api/pdf is unauthenticated");
    }

    let encryptor: Arc<dyn PdfEncryptor> = Arc::new(QpdfEncryptor::from_config(&core));
    let state = Arc::new(AppState::new(
        &core,
        args.environment.clone(),
        args.api_key.clone(),
        encryptor,
    ));

    let governor_conf = rate_limit_config(args.rate_limit_per_minute)?;
    let limiter = governor_conf.limiter().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            limiter.retain_recent();
        }
    });

    let app = build_router(state, Some(governor_conf));

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        port = args.port,
        environment = %args.environment,
        "PDF service started on http://{}",
        addr
    );
    info!(
        "Rate limit: {} requests/minute per IP",
        args.rate_limit_per_minute
    );
    info!("Temp directory: {}", core.temp_dir.display());

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down gracefully"),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully"),
    }
}

/// Route panics through tracing so they reach the same log sink.
fn register_panic_logger() {
    std::panic::set_hook(Box::new(|panic| match panic.location() {
        Some(loc) => error!(
            message = %panic,
            panic.file = loc.file(),
            panic.line = loc.line(),
            "Unhandled panic"
        ),
        None => error!(message = %panic, "Unhandled panic"),
    }));
}
