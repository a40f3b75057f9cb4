use clap::Parser; // for cli
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use estimate_gateway::config::Args;
use estimate_gateway::handlers::create_router;
use estimate_gateway::state::AppState;
use estimate_gateway::{Gateway, GeminiClient, JobPoller};

fn init_tracing() {
    // colored output for dev, JSON when LOG_FORMAT=json
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("estimate_gateway=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(env_filter)
            .init();
    }
}

// this is main async function with tokio
#[tokio::main]
async fn main() {
    // parse cli arguments
    let args = Args::parse();
    init_tracing();

    if args.api_key.is_none() {
        // requests will fail with config_error until a key is provided
        error!("GEMINI_API_KEY is not set");
    }

    let client = match GeminiClient::new(args.gemini_config()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to build model client: {}", e);
            std::process::exit(1);
        }
    };

    // creating shared state
    let state = Arc::new(AppState {
        gateway: Arc::new(Gateway::new(client.clone(), args.gateway_config())),
        poller: Arc::new(JobPoller::new(client, args.backoff_policy())),
        rate_limiter: args.rate_limiter(),
    });

    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Gateway running on http://localhost:{}", args.port);
    info!("Models: {} / {} at {}", args.analysis_model, args.video_model, args.api_base);
    info!(
        "Cache TTL: {} seconds, max entries: {}",
        args.cache_ttl,
        args.cache_max_entries
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unbounded".to_string())
    );
    info!(
        "Rate limit: {} requests per {} seconds (trust x-forwarded-for: {})",
        args.rate_limit, args.rate_window, args.trust_forwarded_for
    );

    // peer addresses feed the rate limiter
    let service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, service).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
