//! Settle - debounced search over an expiring cache
//!
//! Reads lines from stdin as a search box receives edits, debounces them,
//! and resolves each settled query through the durable expiring cache.

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settle::{Config, DebouncedValue, ExpiringCache, FileStore, Scheduler, TokioScheduler};

/// Cached result for one settled query.
#[derive(Debug, Serialize, Deserialize)]
struct QuerySummary {
    query: String,
    words: usize,
    chars: usize,
}

impl QuerySummary {
    fn compute(query: &str) -> Self {
        Self {
            query: query.to_string(),
            words: query.split_whitespace().count(),
            chars: query.chars().count(),
        }
    }
}

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the file-backed expiring cache
/// 4. Start the resolver watching settled input
/// 5. Feed stdin lines into the debounced input until EOF or a signal
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "settle=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting settle");

    let config = Config::from_env();
    info!(
        "Configuration loaded: default_ttl={}m, debounce={}ms, cache_path={}",
        config.default_ttl_minutes,
        config.debounce_ms,
        config.cache_path.display()
    );

    let cache = ExpiringCache::from_config(&config)
        .with_context(|| format!("opening cache at {}", config.cache_path.display()))?;
    let cache = Arc::new(cache);

    let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::current());
    let input = DebouncedValue::new(scheduler, String::new(), config.debounce_delay());
    let resolver = spawn_resolver(input.subscribe(), Arc::clone(&cache));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("reading stdin")? {
                Some(line) => input.set(line.trim().to_string()),
                None => {
                    info!("Input closed");
                    // Let the final edit settle before tearing down
                    while input.is_pending() {
                        tokio::time::sleep(input.delay()).await;
                    }
                    break;
                }
            },
            _ = &mut shutdown => break,
        }
    }

    // Dropping the input cancels any pending update and ends the resolver
    drop(input);
    if let Err(e) = resolver.await {
        warn!("Resolver task ended abnormally: {}", e);
    }

    let stats = cache.stats();
    info!(
        "Shutdown complete: hits={}, misses={}, expired={}, failures={}, entries={}",
        stats.hits, stats.misses, stats.expired, stats.failures, stats.total_entries
    );
    Ok(())
}

/// Resolves every settled query, from cache when possible.
fn spawn_resolver(
    mut settled: watch::Receiver<String>,
    cache: Arc<ExpiringCache<FileStore>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while settled.changed().await.is_ok() {
            let query = settled.borrow_and_update().clone();
            if query.is_empty() {
                continue;
            }

            let params = json!({ "q": query });
            let (summary, source) = match cache.read::<_, QuerySummary>("search", &params) {
                Some(hit) => (hit, "cache"),
                None => {
                    let summary = QuerySummary::compute(&query);
                    cache.write("search", &params, &summary);
                    (summary, "computed")
                }
            };

            println!(
                "[{}] {:?}: {} words, {} chars",
                source, summary.query, summary.words, summary.chars
            );
        }
    })
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
