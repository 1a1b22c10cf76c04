//! Reconnecting client for the gateway push channel.

use crate::cache::SnapshotCache;
use futures_util::{SinkExt, StreamExt};
use mc_core::push::{decode_frame, encode_frame, PushRequest, DEFAULT_MAX_FRAME_BYTES};
use mc_core::PushChannelState;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_PUSH_URL: &str = "ws://127.0.0.1:18789";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct PushConfig {
    pub url: Url,
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Bound on TCP connect plus the WebSocket handshake.
    pub connect_timeout: Duration,
    /// Period of the `get_system_status` refresh while connected.
    pub status_interval: Duration,
    pub max_frame_bytes: usize,
}

impl PushConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            status_interval: DEFAULT_STATUS_INTERVAL,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// Accepts only `ws://` and `wss://` URLs.
pub fn parse_push_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|err| format!("invalid push url {raw:?}: {err}"))?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(format!("unsupported push url scheme {other:?}")),
    }
}

/// Linear backoff: the n-th retry waits `n * base`.
pub fn reconnect_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt.max(1))
}

/// Why the client loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushExit {
    Shutdown,
    GaveUp,
}

type PushSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct PushClient {
    config: PushConfig,
    cache: Arc<SnapshotCache>,
}

enum Session {
    Closed,
    Shutdown,
}

impl PushClient {
    pub fn new(config: PushConfig, cache: Arc<SnapshotCache>) -> Self {
        Self { config, cache }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> PushExit {
        let mut attempt: u32 = 0;
        self.cache.set_push_state(PushChannelState::Connecting);

        loop {
            if *shutdown.borrow() {
                return PushExit::Shutdown;
            }

            let connect = timeout(
                self.config.connect_timeout,
                connect_async(self.config.url.as_str()),
            );
            let connected = tokio::select! {
                connect = connect => connect,
                _ = shutdown.changed() => return PushExit::Shutdown,
            };
            match connected {
                Ok(Ok((ws, _))) => {
                    attempt = 0;
                    self.cache.set_push_state(PushChannelState::Connected);
                    info!(event = "push_connected", url = %self.config.url);
                    match self.session(ws, &mut shutdown).await {
                        Session::Shutdown => return PushExit::Shutdown,
                        Session::Closed => warn!(event = "push_disconnected", url = %self.config.url),
                    }
                }
                Ok(Err(err)) => {
                    warn!(event = "push_connect_error", url = %self.config.url, error = %err);
                }
                Err(_) => {
                    warn!(
                        event = "push_connect_timeout",
                        url = %self.config.url,
                        timeout_ms = self.config.connect_timeout.as_millis() as u64
                    );
                }
            }

            attempt += 1;
            if attempt > self.config.max_attempts {
                self.cache.set_push_state(PushChannelState::Offline);
                warn!(
                    event = "push_gave_up",
                    attempts = self.config.max_attempts,
                    url = %self.config.url
                );
                return PushExit::GaveUp;
            }

            self.cache
                .set_push_state(PushChannelState::Reconnecting { attempt });
            let delay = reconnect_delay(self.config.base_delay, attempt);
            debug!(event = "push_reconnect_wait", attempt, delay_ms = delay.as_millis() as u64);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => return PushExit::Shutdown,
            }
        }
    }

    async fn session(&self, mut ws: PushSocket, shutdown: &mut watch::Receiver<bool>) -> Session {
        for request in PushRequest::ON_CONNECT {
            if !self.send_request(&mut ws, request).await {
                return Session::Closed;
            }
        }

        let period = self.config.status_interval.max(Duration::from_millis(1));
        let mut status_ticker = tokio::time::interval_at(Instant::now() + period, period);
        status_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = status_ticker.tick() => {
                    if !self.send_request(&mut ws, PushRequest::GetSystemStatus).await {
                        return Session::Closed;
                    }
                }
                message = ws.next() => {
                    let message = match message {
                        Some(Ok(message)) => message,
                        Some(Err(err)) => {
                            warn!(event = "push_read_error", error = %err);
                            return Session::Closed;
                        }
                        None => return Session::Closed,
                    };
                    match message {
                        Message::Text(text) => self.handle_frame(&text),
                        Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                            Ok(text) => self.handle_frame(text),
                            Err(err) => warn!(event = "push_frame_dropped", error = %err),
                        },
                        Message::Close(_) => return Session::Closed,
                        _ => {}
                    }
                }
                _ = shutdown.changed() => {
                    let _ = ws.send(Message::Close(None)).await;
                    return Session::Shutdown;
                }
            }
        }
    }

    /// False when the socket refused the write.
    async fn send_request(&self, ws: &mut PushSocket, request: PushRequest) -> bool {
        match encode_frame(&request, self.config.max_frame_bytes) {
            Ok(frame) => ws.send(Message::Text(frame)).await.is_ok(),
            Err(err) => {
                warn!(event = "push_request_encode_error", error = %err);
                true
            }
        }
    }

    /// Applies one inbound frame. Malformed or unknown frames are logged and
    /// dropped.
    pub fn handle_frame(&self, text: &str) {
        match decode_frame(text, self.config.max_frame_bytes) {
            Ok(event) => {
                debug!(event = "push_event", kind = event.kind());
                self.cache.apply_push(event);
            }
            Err(err) => warn!(event = "push_frame_dropped", error = %err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_linearly() {
        let base = Duration::from_millis(1000);
        assert_eq!(reconnect_delay(base, 1), Duration::from_millis(1000));
        assert_eq!(reconnect_delay(base, 3), Duration::from_millis(3000));
        assert_eq!(reconnect_delay(base, 0), Duration::from_millis(1000));
    }

    #[test]
    fn push_url_must_be_websocket() {
        assert!(parse_push_url(DEFAULT_PUSH_URL).is_ok());
        assert!(parse_push_url("wss://gateway.local/ws").is_ok());
        assert!(parse_push_url("http://127.0.0.1:18789").is_err());
        assert!(parse_push_url("not a url").is_err());
    }

    #[test]
    fn bad_frames_leave_cache_untouched() {
        let cache = Arc::new(SnapshotCache::new());
        let before = cache.latest();
        let url = parse_push_url(DEFAULT_PUSH_URL).expect("url");
        let client = PushClient::new(PushConfig::new(url), cache.clone());

        client.handle_frame("{broken");
        client.handle_frame(r#"{"type":"unknown_update","data":[]}"#);
        assert!(Arc::ptr_eq(&before, &cache.latest()));

        client.handle_frame(r#"{"type":"agent_status_update","data":[]}"#);
        assert!(!Arc::ptr_eq(&before, &cache.latest()));
    }
}
