mod api;
mod config;
mod dispatcher;
mod duplicate;
mod events;
mod message;
mod processor;
mod queue;
mod ratelimit;
mod templates;
mod tokens;
mod transport;
mod tts;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use config::Config;
use dispatcher::{Dispatcher, RateLimiters};
use processor::EventProcessor;
use queue::PriorityQueue;
use ratelimit::RateLimiter;
use tokens::TokenStore;
use transport::Outbound;
use tts::Synthesizer;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared application state accessible from all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub synthesizer: Arc<Synthesizer>,
    pub queue: Arc<PriorityQueue>,
    pub dispatcher: Arc<Dispatcher>,
    pub outbound: Arc<Outbound>,
    pub processor: Arc<EventProcessor>,
    #[allow(dead_code)]
    pub token_store: Arc<TokenStore>,
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("--version") => println!("alertcast {VERSION}"),
        Some("--help") | Some("-h") => print_usage(),
        Some(other) => {
            eprintln!("Unknown option: {other}");
            print_usage();
            std::process::exit(1);
        }
        None => {
            let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
            rt.block_on(server());
        }
    }
}

fn print_usage() {
    println!("alertcast {VERSION}");
    println!("Event-to-audio alert overlay core");
    println!();
    println!("Usage: alertcast [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --version   Print version");
    println!("  --help, -h  Print this help message");
    println!();
    println!("Without options, starts the server.");
}

async fn server() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alertcast=info,tower_http=info".into()),
        )
        .init();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Starting alertcast"
    );

    let synthesizer = match Synthesizer::new(&config.tts, config.cache.clone()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Failed to initialize TTS cache: {e}");
            std::process::exit(1);
        }
    };

    let queue = Arc::new(PriorityQueue::new(config.queue.max_size));
    let outbound = Arc::new(Outbound::new());

    let token_store = match TokenStore::load(config.tokens.path.clone()).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Failed to load token store: {e}");
            std::process::exit(1);
        }
    };

    let twitch_rate_limiter = Arc::new(RateLimiter::new(config.twitch.rate_limit_per_minute, 60));
    let youtube_rate_limiter = Arc::new(RateLimiter::new(config.youtube.rate_limit_per_minute, 60));

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&queue),
        RateLimiters {
            twitch: Arc::clone(&twitch_rate_limiter),
            youtube: Arc::clone(&youtube_rate_limiter),
        },
        Arc::clone(&outbound),
        Arc::clone(&synthesizer),
    ));

    let processor = Arc::new(EventProcessor::new(
        config.clone(),
        Arc::clone(&synthesizer),
        Arc::clone(&queue),
        Arc::clone(&dispatcher),
        twitch_rate_limiter,
        youtube_rate_limiter,
    ));

    let state = AppState {
        config: config.clone(),
        synthesizer,
        queue,
        dispatcher,
        outbound,
        processor,
        token_store,
    };

    let app = Router::new()
        .route("/overlay/ws", get(transport::ws::handle_overlay_upgrade))
        .route("/audio/:audio_id", get(transport::audio::handle_get_audio))
        .route("/api/queue", get(api::queue_status))
        .route("/api/queue/clear", post(api::queue_clear))
        .route("/api/queue/skip", post(api::queue_skip))
        .route("/api/test", post(api::inject_test_event))
        .route("/api/tts/test", post(api::tts_test))
        .route("/health", get(api::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .expect("Invalid server address");

    tracing::info!(%addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl_c");
    tracing::info!("Shutdown signal received");
}
