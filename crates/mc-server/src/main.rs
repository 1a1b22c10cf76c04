mod config;
mod logging;
mod routes;

use config::load_config;
use logging::init_logging;
use mc_feed::push::parse_push_url;
use mc_feed::{Aggregator, AggregatorConfig, Poller, PushClient, PushConfig, SnapshotCache};
use mc_gateway::uptime::DEFAULT_UPTIME_TIMEOUT;
use mc_gateway::TokioCommandRunner;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = load_config();
    let log_guard = init_logging(&config);
    let addr: SocketAddr = match config.addr.parse() {
        Ok(value) => value,
        Err(err) => {
            error!(event = "invalid_addr", error = %err, addr = %config.addr);
            return;
        }
    };
    if !addr.ip().is_loopback() {
        error!(event = "invalid_addr", addr = %config.addr);
        return;
    }

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(value) => value,
        Err(err) => {
            error!(event = "server_error", error = %err);
            return;
        }
    };

    let cache = Arc::new(SnapshotCache::new());
    let aggregator = Aggregator::for_gateway(
        Arc::new(TokioCommandRunner),
        &config.gateway_bin,
        AggregatorConfig {
            adapter_timeout: config.adapter_timeout,
            uptime_timeout: DEFAULT_UPTIME_TIMEOUT,
            model_config_path: config.gateway_config.clone(),
            default_version: config.backend_version.clone(),
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = Poller::new(Arc::new(aggregator), cache.clone(), config.poll_interval);
    let poll_task = tokio::spawn(poller.run(shutdown_rx.clone()));

    let push_task = if config.push_enabled {
        match parse_push_url(&config.push_url) {
            Ok(url) => {
                let push_config = PushConfig {
                    max_attempts: config.push_max_attempts,
                    base_delay: config.push_base_delay,
                    ..PushConfig::new(url)
                };
                let client = PushClient::new(push_config, cache.clone());
                Some(tokio::spawn(client.run(shutdown_rx)))
            }
            Err(err) => {
                warn!(event = "push_disabled", error = %err);
                None
            }
        }
    } else {
        None
    };

    info!(
        event = "server_start",
        addr = %config.addr,
        gateway_bin = %config.gateway_bin,
        poll_secs = config.poll_interval.as_secs(),
        push = push_task.is_some(),
        log_file = ?log_guard.as_ref().and_then(|guard| guard.path())
    );

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    if let Err(err) = axum::serve(listener, routes::router(cache))
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!(event = "server_error", error = %err);
    }

    let _ = shutdown_tx.send(true);
    join_background(poll_task, "poller_failed").await;
    if let Some(task) = push_task {
        if let Some(exit) = join_background(task, "push_failed").await {
            info!(event = "push_stopped", exit = ?exit);
        }
    }
    info!(event = "server_stop");
}

/// Awaits a background task. A panic or cancellation is logged under
/// `failed_event` and yields `None`.
async fn join_background<T>(handle: JoinHandle<T>, failed_event: &'static str) -> Option<T> {
    match handle.await {
        Ok(value) => Some(value),
        Err(err) => {
            error!(event = failed_event, panicked = err.is_panic(), error = %err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panicked_background_task_is_reported() {
        let handle: JoinHandle<()> = tokio::spawn(async { panic!("poll tick failed") });
        assert_eq!(join_background(handle, "poller_failed").await, None);

        let handle = tokio::spawn(async { 7 });
        assert_eq!(join_background(handle, "push_failed").await, Some(7));
    }
}
