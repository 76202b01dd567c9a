use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use axum::{Router, middleware};
use axum_server::tls_rustls::RustlsConfig;
use clap::{Parser, Subcommand};
use http::{
    HeaderName, Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tokio::net::TcpListener;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use anyhow::anyhow;

use echovoice_server::{
    CreditOrchestrator, GatewayClient, LedgerStore, Reconciler, RemoteSpeechClient, ServerConfig,
    SpeechBackend, init, middleware::auth_middleware, routes, state::AppState,
};

/// Outbound HTTP timeout for payment gateway calls
const GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

/// Outbound HTTP timeout for inference calls. Generation jobs run for
/// minutes on cold backends.
const SPEECH_TIMEOUT: Duration = Duration::from_secs(300);

/// EchoVoice - Credit-metered voice generation server
#[derive(Parser, Debug)]
#[command(name = "echovoice-server")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a ledger account seeded with the signup credit grants
    CreateAccount {
        /// Account identifier, as referenced by the API secret mapping
        #[arg(long = "account-id")]
        account_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Handle subcommands
    if let Some(command) = cli.command {
        match command {
            Commands::CreateAccount { account_id } => {
                init::run(&account_id)?;
                return Ok(());
            }
        }
    }

    // Load configuration from environment
    let config = ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?;

    let address = config.address();
    let tls_config = config.tls.clone();
    let is_tls_enabled = config.is_tls_enabled();
    let rate_limit_rps = config.rate_limit_requests_per_second;
    let rate_limit_burst = config.rate_limit_burst_size;
    let cors_origins = config.cors_allowed_origins.clone();
    println!("Starting server on {address}");

    // Create application state
    let config = Arc::new(config);
    let ledger = LedgerStore::open(&config.database_path)
        .map_err(|e| anyhow!("Failed to open ledger database: {e}"))?;
    let gateway = GatewayClient::new(GATEWAY_TIMEOUT).map_err(|e| anyhow!(e.to_string()))?;
    let orchestrator = Arc::new(CreditOrchestrator::new(
        config.clone(),
        ledger.clone(),
        gateway,
    ));

    let speech: Option<Arc<dyn SpeechBackend>> = match config.speech_api_url {
        Some(ref url) => {
            let client =
                RemoteSpeechClient::new(url.clone(), config.speech_api_key.clone(), SPEECH_TIMEOUT)
                    .map_err(|e| anyhow!(e.to_string()))?;
            Some(Arc::new(client))
        }
        None => {
            tracing::warn!(
                "SPEECH_API_URL not set; generation routes will answer with a configuration error"
            );
            None
        }
    };

    let app_state = Arc::new(AppState::new(
        config.clone(),
        ledger.clone(),
        orchestrator.clone(),
        speech,
    ));

    // Start the reconciliation sweep for stale pending transactions
    if config.reconcile_enabled() {
        let reconciler = Reconciler::new(
            orchestrator,
            ledger,
            config.reconcile_interval_seconds,
            config.reconcile_min_age_seconds,
        );
        let _ = reconciler.spawn();
        info!(
            interval_seconds = config.reconcile_interval_seconds,
            min_age_seconds = config.reconcile_min_age_seconds,
            "Reconciliation sweep started"
        );
    } else {
        info!("Reconciliation sweep disabled (RECONCILE_INTERVAL_SECONDS=0)");
    }

    // Create protected API routes with authentication middleware
    let protected_routes = routes::api::create_api_router().layer(middleware::from_fn_with_state(
        app_state.clone(),
        auth_middleware,
    ));

    // Create gateway callback routes (no bearer auth - each request is
    // authenticated by its X-VERIFY checksum)
    let callback_routes = routes::callbacks::create_callback_router();

    // Create public health check route (no auth)
    let public_routes = Router::new().route(
        "/",
        axum::routing::get(echovoice_server::handlers::api::health_check),
    );

    // Configure rate limiting (disabled when rate >= 100000 for performance testing)
    let governor_layer = if rate_limit_rps < 100000 {
        let governor_config = GovernorConfigBuilder::default()
            .per_second(rate_limit_rps as u64)
            .burst_size(rate_limit_burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("Failed to build rate limiter config");
        Some(GovernorLayer::new(governor_config))
    } else {
        println!("Rate limiting disabled (rate >= 100000/s)");
        None
    };

    // Configure CORS
    let cors_layer = if let Some(ref origins) = cors_origins {
        if origins == "*" {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    AUTHORIZATION,
                    CONTENT_TYPE,
                    HeaderName::from_static("x-verify"),
                ])
                .allow_credentials(false)
        } else {
            // Parse comma-separated origins
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    AUTHORIZATION,
                    CONTENT_TYPE,
                    HeaderName::from_static("x-verify"),
                ])
                .allow_credentials(true)
        }
    } else {
        // No CORS configured - strict same-origin only for production security
        // Cross-origin requests will be blocked. To enable CORS, set CORS_ALLOWED_ORIGINS
        // environment variable.
        info!(
            "CORS not configured, defaulting to same-origin only. \
             Set CORS_ALLOWED_ORIGINS to enable cross-origin access."
        );
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([
                AUTHORIZATION,
                CONTENT_TYPE,
                HeaderName::from_static("x-verify"),
            ])
            .allow_credentials(false)
        // No allow_origin = same-origin only (browsers block cross-origin requests)
    };

    // Security headers
    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_CONTENT_TYPE_OPTIONS,
            http::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_FRAME_OPTIONS,
            http::HeaderValue::from_static("DENY"),
        ));

    // Combine all routes: public health check at the root, everything
    // else under /api
    let app = public_routes
        .nest("/api", protected_routes.merge(callback_routes))
        .with_state(app_state)
        .layer(cors_layer)
        .layer(tower::util::option_layer(governor_layer))
        .layer(security_headers);

    // Parse socket address
    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    // Start server with or without TLS
    if is_tls_enabled {
        let tls = tls_config.expect("TLS config must be present when TLS is enabled");

        // Load TLS configuration from certificate and key files
        let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to load TLS certificates from {} and {}: {}",
                    tls.cert_path.display(),
                    tls.key_path.display(),
                    e
                )
            })?;

        println!("Server listening on https://{} (TLS enabled)", socket_addr);

        axum_server::bind_rustls(socket_addr, rustls_config)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|e| anyhow!("TLS server error: {}", e))?;
    } else {
        println!("Server listening on http://{}", socket_addr);

        let listener = TcpListener::bind(&socket_addr).await?;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
    }

    Ok(())
}
