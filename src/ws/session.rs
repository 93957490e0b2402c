//! Connection lifecycle: connect, read loop, close, and supervised
//! reconnection.
//!
//! One task — the read loop — drives the transport reader and feeds the
//! dispatcher. All writes go through a single async mutex over the
//! transport writer, so request senders and the dispatcher's pong reply
//! never interleave partial frames. The `connected` flag is atomic and
//! the ready gate is a `watch` channel flipped by the server greeting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::orderbook::OrderBookManager;

use super::dispatcher;
use super::events::{Callbacks, EventHub, EventStreams};
use super::protocol;
use super::subscriptions::SubscriptionRegistry;
use super::transport::{self, CloseIntent, TransportEvent, TransportReader, TransportWriter};
use super::CONNECT_TIMEOUT;

/// Shared engine state behind the public client.
pub(crate) struct StreamCore {
    pub(crate) config: StreamConfig,
    pub(crate) registry: SubscriptionRegistry,
    pub(crate) books: OrderBookManager,
    pub(crate) hub: EventHub,
    /// Single-writer mutex over the transport sink; `None` while
    /// disconnected.
    pub(crate) writer: Mutex<Option<TransportWriter>>,
    pub(crate) connected: AtomicBool,
    /// Ready gate: flipped true by the server `connected` greeting.
    pub(crate) ready: watch::Sender<bool>,
    /// Set by `close()`; tells the read loop the shutdown is deliberate.
    shutdown: AtomicBool,
    read_task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamCore {
    pub(crate) fn new(config: StreamConfig, callbacks: Callbacks) -> (Arc<Self>, EventStreams) {
        let (hub, streams) = EventHub::new(config.queue_capacities(), callbacks);
        let (ready, _) = watch::channel(false);
        let core = Arc::new(Self {
            config,
            registry: SubscriptionRegistry::new(),
            books: OrderBookManager::new(),
            hub,
            writer: Mutex::new(None),
            connected: AtomicBool::new(false),
            ready,
            shutdown: AtomicBool::new(false),
            read_task: Mutex::new(None),
        });
        (core, streams)
    }

    /// True once the server greeting has been received and the
    /// connection has not dropped since.
    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Send one text frame, serialised through the writer mutex.
    pub(crate) async fn send_text(&self, text: String) -> Result<()> {
        let mut guard = self.writer.lock().await;
        match guard.as_mut() {
            Some(writer) => writer.send_text(text).await,
            None => Err(Error::NotConnected),
        }
    }

    /// Open the transport, start the read loop, and wait for the server
    /// greeting.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyConnected`] when connected;
    /// [`Error::ConnectionTimeout`] when the greeting does not arrive
    /// within 10 s (the transport is closed with code 1001).
    pub(crate) async fn connect(self: &Arc<Self>) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }
        self.shutdown.store(false, Ordering::SeqCst);
        self.ready.send_replace(false);

        let url = self.config.ws_url()?;
        info!("connecting to {url}");
        let (writer, reader) = transport::connect(url.as_str()).await?;

        {
            let mut guard = self.writer.lock().await;
            *guard = Some(writer);
        }

        // Replace any finished read task from a previous session.
        let handle = tokio::spawn(read_loop(Arc::clone(self), reader));
        if let Some(stale) = self.read_task.lock().await.replace(handle) {
            stale.abort();
        }

        let mut ready_rx = self.ready.subscribe();
        let greeted = timeout(CONNECT_TIMEOUT, ready_rx.wait_for(|ready| *ready)).await;
        let is_ready = matches!(greeted, Ok(Ok(_)));
        drop(greeted);
        if is_ready {
            info!("connection ready");
            Ok(())
        } else {
            warn!("no server greeting within {CONNECT_TIMEOUT:?}");
            self.teardown(CloseIntent::GoingAway).await;
            Err(Error::ConnectionTimeout)
        }
    }

    /// Close the connection. Idempotent; clears the subscription
    /// registry and fires the on-disconnect callback with `None`.
    pub(crate) async fn close(&self) {
        let was_shutdown = self.shutdown.swap(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);

        let had_transport = {
            let guard = self.writer.lock().await;
            guard.is_some()
        };
        self.teardown(CloseIntent::Normal).await;
        self.registry.clear();

        if had_transport && !was_shutdown {
            info!("connection closed");
            self.hub.disconnected(None);
        }
    }

    /// Close the writer and stop the read loop.
    async fn teardown(&self, intent: CloseIntent) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.close(intent).await;
        }
        if let Some(handle) = self.read_task.lock().await.take() {
            handle.abort();
            let _ = handle.await;
        }
        self.ready.send_replace(false);
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Connect (when not yet connected) and supervise the connection,
    /// reconnecting with exponential backoff until `close()` is called
    /// or the attempt limit is exhausted.
    ///
    /// # Errors
    ///
    /// Propagates the initial [`connect`](Self::connect) failure;
    /// returns [`Error::MaxReconnectAttemptsExceeded`] when the
    /// configured attempt limit (default 10, `0` = unlimited) runs out.
    pub(crate) async fn run(self: &Arc<Self>) -> Result<()> {
        if !self.is_connected() {
            self.connect().await?;
        }

        loop {
            // Wait for the read loop to drop the ready gate.
            let mut ready_rx = self.ready.subscribe();
            if ready_rx.wait_for(|ready| !*ready).await.is_err() {
                return Ok(());
            }
            if self.is_shutdown() {
                return Ok(());
            }
            self.reconnect().await?;
        }
    }

    /// Reconnect with `min(base * 2^attempt, max)` backoff and replay
    /// the active subscriptions once connected.
    async fn reconnect(self: &Arc<Self>) -> Result<()> {
        let max_attempts = self.config.max_reconnect_attempts();
        let mut attempt: u32 = 0;

        loop {
            if max_attempts != 0 && attempt >= max_attempts {
                return Err(Error::MaxReconnectAttemptsExceeded(max_attempts));
            }

            let backoff = self
                .config
                .reconnect_delay()
                .saturating_mul(1u32 << attempt.min(16))
                .min(self.config.max_reconnect_delay());
            info!("reconnect attempt {} in {backoff:?}", attempt + 1);
            tokio::time::sleep(backoff).await;

            if self.is_shutdown() {
                return Ok(());
            }

            attempt += 1;
            match self.connect().await {
                Ok(()) => {
                    self.replay_subscriptions().await;
                    return Ok(());
                }
                Err(e) => {
                    warn!("reconnect attempt {attempt} failed: {e}");
                }
            }
        }
    }

    /// Re-send subscribe requests for every active subscription.
    /// Failures are reported on the error family, not fatal.
    async fn replay_subscriptions(self: &Arc<Self>) {
        let active = self.registry.active();
        if active.is_empty() {
            return;
        }
        info!("replaying {} subscription(s)", active.len());
        for entry in active {
            let request = protocol::build_subscribe(
                &entry.channel.wire_path(),
                entry.auth_token.as_deref(),
            );
            if let Err(e) = self.send_text(request).await {
                warn!("replay of {} failed: {e}", entry.channel);
                self.hub.error(e);
            }
        }
    }
}

/// The read loop: drives the transport reader and feeds the dispatcher.
/// Decode problems never end the loop; only transport failure or
/// closure does.
async fn read_loop(core: Arc<StreamCore>, mut reader: TransportReader) {
    let exit_error: Option<Error> = loop {
        match reader.next_event().await {
            Ok(TransportEvent::Text(text)) => {
                dispatcher::dispatch(&core, &text).await;
            }
            Ok(TransportEvent::Ping(payload)) => {
                let mut guard = core.writer.lock().await;
                if let Some(writer) = guard.as_mut() {
                    if let Err(e) = writer.send_pong_frame(payload).await {
                        debug!("pong frame failed: {e}");
                    }
                }
            }
            Ok(TransportEvent::Closed) => break Some(Error::TransportClosed),
            Err(e) => break Some(e),
        }
    };

    let deliberate = core.is_shutdown();
    core.connected.store(false, Ordering::SeqCst);
    core.ready.send_replace(false);
    {
        let mut guard = core.writer.lock().await;
        *guard = None;
    }

    if !deliberate {
        info!("read loop ended: {exit_error:?}");
        core.hub.disconnected(exit_error.as_ref());
    }
}
