//! Public streaming client.
//!
//! [`LighterStreamClient`] wraps the engine behind a small API surface:
//! connection lifecycle, per-channel subscribe/unsubscribe, transaction
//! submission, and state accessors. Decoded events are consumed through
//! the [`EventStreams`] returned by the builder, or through callbacks
//! registered on it.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio::time::timeout;

use crate::config::StreamConfig;
use crate::error::{Error, Result, MAX_TX_BATCH_SIZE};
use crate::orderbook::OrderBook;
use crate::ws::events::Callbacks;
use crate::ws::message::{PriceLevel, TxResult};
use crate::ws::session::StreamCore;
use crate::ws::{
    protocol, AccountUpdate, Channel, ConnectCallback, DisconnectCallback, EventStreams,
    HeightUpdate, MarketStatsUpdate, OrderBookUpdate, SubscriptionEntry, TradeUpdate,
    UpdateCallback, SUBSCRIBE_TIMEOUT,
};

/// Builder for [`LighterStreamClient`].
///
/// Collects the configuration and optional callbacks, then produces the
/// client together with the consumer ends of the event queues.
#[derive(Default)]
pub struct StreamClientBuilder {
    config: StreamConfig,
    callbacks: Callbacks,
}

impl StreamClientBuilder {
    /// Start from a configuration.
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            callbacks: Callbacks::default(),
        }
    }

    /// Callback fired once per connection when the server greeting
    /// arrives.
    #[must_use]
    pub fn on_connect(mut self, callback: ConnectCallback) -> Self {
        self.callbacks.on_connect = Some(callback);
        self
    }

    /// Callback fired when the connection drops. `None` means a clean,
    /// client-initiated close.
    #[must_use]
    pub fn on_disconnect(mut self, callback: DisconnectCallback) -> Self {
        self.callbacks.on_disconnect = Some(callback);
        self
    }

    /// Synchronous callback for order-book events.
    ///
    /// Runs on the reader task; keep it cheap and read from the queue
    /// for anything heavier. The same applies to every `on_*` family
    /// callback below.
    #[must_use]
    pub fn on_order_book(mut self, callback: UpdateCallback<OrderBookUpdate>) -> Self {
        self.callbacks.on_order_book = Some(callback);
        self
    }

    /// Synchronous callback for trade events.
    #[must_use]
    pub fn on_trade(mut self, callback: UpdateCallback<TradeUpdate>) -> Self {
        self.callbacks.on_trade = Some(callback);
        self
    }

    /// Synchronous callback for market-stats events.
    #[must_use]
    pub fn on_market_stats(mut self, callback: UpdateCallback<MarketStatsUpdate>) -> Self {
        self.callbacks.on_market_stats = Some(callback);
        self
    }

    /// Synchronous callback for height events.
    #[must_use]
    pub fn on_height(mut self, callback: UpdateCallback<HeightUpdate>) -> Self {
        self.callbacks.on_height = Some(callback);
        self
    }

    /// Synchronous callback for account-family events.
    #[must_use]
    pub fn on_account(mut self, callback: UpdateCallback<AccountUpdate>) -> Self {
        self.callbacks.on_account = Some(callback);
        self
    }

    /// Synchronous callback for transaction results.
    #[must_use]
    pub fn on_tx_result(mut self, callback: UpdateCallback<TxResult>) -> Self {
        self.callbacks.on_tx_result = Some(callback);
        self
    }

    /// Synchronous callback for dispatch-time errors.
    #[must_use]
    pub fn on_error(mut self, callback: UpdateCallback<Error>) -> Self {
        self.callbacks.on_error = Some(callback);
        self
    }

    /// Build the client and the event streams.
    pub fn build(self) -> (LighterStreamClient, EventStreams) {
        let (core, streams) = StreamCore::new(self.config, self.callbacks);
        (LighterStreamClient { core }, streams)
    }
}

/// Streaming client for the exchange WebSocket API.
///
/// # Example
///
/// ```no_run
/// use lighter_stream_rs::{Environment, LighterStreamClient, StreamConfig};
///
/// # async fn example() -> lighter_stream_rs::Result<()> {
/// let config = StreamConfig::new(Environment::Testnet);
/// let (client, mut events) = LighterStreamClient::builder(config).build();
///
/// client.connect().await?;
/// client.subscribe_order_book(0).await?;
///
/// while let Some(update) = events.order_books.recv().await {
///     println!(
///         "market {} best bid {:?}",
///         update.market_index,
///         update.book.best_bid()
///     );
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LighterStreamClient {
    core: Arc<StreamCore>,
}

impl LighterStreamClient {
    /// Start building a client.
    pub fn builder(config: StreamConfig) -> StreamClientBuilder {
        StreamClientBuilder::new(config)
    }

    /// Open the connection and wait for the server greeting.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyConnected`] when connected,
    /// [`Error::ConnectionTimeout`] when the greeting does not arrive
    /// in time, or a transport error.
    pub async fn connect(&self) -> Result<()> {
        self.core.connect().await
    }

    /// Close the connection. Idempotent; clears all subscriptions.
    pub async fn close(&self) {
        self.core.close().await;
    }

    /// Connect if needed, then supervise the connection: reconnect with
    /// exponential backoff on unexpected disconnects and replay active
    /// subscriptions. Returns `Ok(())` after [`close`](Self::close);
    /// returns [`Error::MaxReconnectAttemptsExceeded`] when the retry
    /// budget is spent.
    pub async fn run(&self) -> Result<()> {
        self.core.run().await
    }

    /// True while the connection is established and greeted.
    pub fn is_connected(&self) -> bool {
        self.core.is_connected()
    }

    /// Subscribe to a public channel.
    ///
    /// Waits up to 10 s for the server confirmation.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`], [`Error::AuthTokenRequired`] for a
    /// private channel, [`Error::AlreadySubscribed`],
    /// [`Error::SubscriptionTimeout`], or the server's
    /// [`Error::SubscriptionFailed`].
    pub async fn subscribe(&self, channel: Channel) -> Result<()> {
        self.subscribe_inner(channel, None).await
    }

    /// Subscribe to a private channel with an auth token.
    pub async fn subscribe_with_auth(&self, channel: Channel, auth_token: &str) -> Result<()> {
        self.subscribe_inner(channel, Some(auth_token.to_string()))
            .await
    }

    /// Subscribe to the order-book stream of a market.
    pub async fn subscribe_order_book(&self, market: i16) -> Result<()> {
        self.subscribe(Channel::OrderBook { market }).await
    }

    /// Subscribe to the public trade stream of a market.
    pub async fn subscribe_trades(&self, market: i16) -> Result<()> {
        self.subscribe(Channel::Trade { market }).await
    }

    /// Subscribe to the statistics stream of a market.
    pub async fn subscribe_market_stats(&self, market: i16) -> Result<()> {
        self.subscribe(Channel::MarketStats { market }).await
    }

    /// Subscribe to statistics for all markets.
    pub async fn subscribe_market_stats_all(&self) -> Result<()> {
        self.subscribe(Channel::MarketStatsAll).await
    }

    /// Subscribe to block height announcements.
    pub async fn subscribe_height(&self) -> Result<()> {
        self.subscribe(Channel::Height).await
    }

    /// Subscribe to the full account feed.
    pub async fn subscribe_account_all(&self, account: i64, auth_token: &str) -> Result<()> {
        self.subscribe_with_auth(Channel::AccountAll { account }, auth_token)
            .await
    }

    async fn subscribe_inner(&self, channel: Channel, auth_token: Option<String>) -> Result<()> {
        if !self.core.is_connected() {
            return Err(Error::NotConnected);
        }

        let key = channel.key();
        let path = channel.wire_path();
        let confirmation = self.core.registry.add(channel, auth_token.clone())?;

        let request = protocol::build_subscribe(&path, auth_token.as_deref());
        if let Err(e) = self.core.send_text(request).await {
            let _ = self.core.registry.remove(&key);
            return Err(e);
        }

        match timeout(SUBSCRIBE_TIMEOUT, confirmation).await {
            Ok(Ok(result)) => result,
            // Slot dropped: the registry was cleared or the entry
            // replaced while we waited.
            Ok(Err(_)) => Err(Error::Cancelled),
            Err(_) => {
                let _ = self.core.registry.remove(&key);
                Err(Error::SubscriptionTimeout(key))
            }
        }
    }

    /// Unsubscribe from a channel.
    ///
    /// The local entry is removed even while disconnected, so it will
    /// not be replayed; the unsubscribe frame is only written when
    /// connected.
    ///
    /// # Errors
    ///
    /// [`Error::NotSubscribed`] when the channel has no entry, or a
    /// transport error from the write.
    pub async fn unsubscribe(&self, channel: &Channel) -> Result<()> {
        self.core.registry.remove(&channel.key())?;
        if self.core.is_connected() {
            self.core
                .send_text(protocol::build_unsubscribe(&channel.wire_path()))
                .await?;
        }
        Ok(())
    }

    /// True when the channel is subscribed and confirmed.
    pub fn is_subscribed(&self, channel: &Channel) -> bool {
        self.core.registry.is_subscribed(&channel.key())
    }

    /// Snapshot of every confirmed subscription.
    pub fn active_subscriptions(&self) -> Vec<SubscriptionEntry> {
        self.core.registry.active()
    }

    /// Deep copy of a market's reconstructed order book.
    ///
    /// # Errors
    ///
    /// [`Error::OrderBookNotFound`] when the market has never received
    /// a snapshot or update.
    pub fn order_book(&self, market: i16) -> Result<OrderBook> {
        self.core.books.book(market)
    }

    /// Best bid of a market, `None` on an empty side.
    pub fn best_bid(&self, market: i16) -> Result<Option<PriceLevel>> {
        self.core.books.best_bid(market)
    }

    /// Best ask of a market, `None` on an empty side.
    pub fn best_ask(&self, market: i16) -> Result<Option<PriceLevel>> {
        self.core.books.best_ask(market)
    }

    /// Submit one signed transaction payload.
    ///
    /// There is no inline reply: the server echoes a `tx_result` event
    /// asynchronously on the tx-results family.
    pub async fn send_tx(&self, payload: JsonValue) -> Result<()> {
        self.core.send_text(protocol::build_send_tx(&payload)).await
    }

    /// Submit a batch of signed transaction payloads.
    ///
    /// # Errors
    ///
    /// [`Error::BatchTooLarge`] for more than
    /// [`MAX_TX_BATCH_SIZE`] payloads; nothing is written in that case.
    pub async fn send_tx_batch(&self, payloads: &[JsonValue]) -> Result<()> {
        if payloads.len() > MAX_TX_BATCH_SIZE {
            return Err(Error::BatchTooLarge(payloads.len()));
        }
        self.core
            .send_text(protocol::build_send_tx_batch(payloads))
            .await
    }
}

impl std::fmt::Debug for LighterStreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LighterStreamClient")
            .field("connected", &self.is_connected())
            .field("subscriptions", &self.core.registry.len())
            .finish()
    }
}
