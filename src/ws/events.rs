//! Decoded stream events and their fan-out to consumers.
//!
//! Each event family has its own bounded queue, sized by
//! [`QueueCapacities`](crate::QueueCapacities). Enqueueing never blocks:
//! when a consumer falls behind and its queue is full, the event is
//! dropped. Loss is preferred over stalling the network reader, which
//! would eventually make the server close the connection.
//!
//! A callback registered for a family runs synchronously on the reader
//! task after the enqueue attempt, so callbacks must stay cheap;
//! consumers doing heavy work should read from the queue instead.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio::sync::mpsc;

use crate::config::QueueCapacities;
use crate::error::Error;
use crate::orderbook::OrderBook;

use super::message::{MarketStats, OrderBookPayload, Trade, TxResult};

/// An order-book snapshot or incremental update was applied.
#[derive(Debug, Clone)]
pub struct OrderBookUpdate {
    /// Market the update applies to.
    pub market_index: i16,
    /// True for the initial snapshot, false for incremental updates.
    pub is_snapshot: bool,
    /// The wire payload that produced this update.
    pub payload: OrderBookPayload,
    /// Deep copy of the book immediately after the update was applied.
    pub book: OrderBook,
}

/// Public trades executed on a market.
#[derive(Debug, Clone)]
pub struct TradeUpdate {
    /// Market the trades executed on.
    pub market_index: i16,
    /// The executed trades, in server order.
    pub trades: Vec<Trade>,
}

/// Market statistics for one market or for all markets.
#[derive(Debug, Clone)]
pub struct MarketStatsUpdate {
    /// Market index, or `-1` for the all-markets channel.
    pub market_index: i16,
    /// Statistics for a single-market subscription.
    pub stats: Option<MarketStats>,
    /// Statistics for the all-markets subscription.
    pub all_stats: Option<Vec<MarketStats>>,
}

/// A block height announcement.
#[derive(Debug, Clone, Copy)]
pub struct HeightUpdate {
    /// Current block height.
    pub height: i64,
    /// Server timestamp (unix milliseconds).
    pub timestamp: i64,
}

/// An opaque account-family update.
///
/// The payload is passed through undecoded; copy out of `data` before
/// retaining anything past the event's lifetime.
#[derive(Debug, Clone)]
pub struct AccountUpdate {
    /// Account the update belongs to.
    pub account_index: i64,
    /// The channel kind that produced the update, e.g. `account_all`.
    pub channel: &'static str,
    /// Raw payload as received.
    pub data: JsonValue,
}

/// The consumer ends of every event queue.
///
/// Returned once from the client builder; receivers can be moved into
/// separate tasks per family.
pub struct EventStreams {
    /// Order-book snapshots and updates.
    pub order_books: mpsc::Receiver<OrderBookUpdate>,
    /// Public trades.
    pub trades: mpsc::Receiver<TradeUpdate>,
    /// Market statistics.
    pub market_stats: mpsc::Receiver<MarketStatsUpdate>,
    /// Block heights.
    pub height: mpsc::Receiver<HeightUpdate>,
    /// Account-family updates.
    pub account: mpsc::Receiver<AccountUpdate>,
    /// Transaction results.
    pub tx_results: mpsc::Receiver<TxResult>,
    /// Dispatch-time errors.
    pub errors: mpsc::Receiver<Arc<Error>>,
}

/// Synchronous per-event callback.
pub type UpdateCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Callback fired when the connection becomes ready.
pub type ConnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Callback fired when the connection drops; `None` means a clean,
/// client-initiated close.
pub type DisconnectCallback = Arc<dyn Fn(Option<&Error>) + Send + Sync>;

/// Optional user callbacks, registered on the client builder.
#[derive(Default, Clone)]
pub(crate) struct Callbacks {
    pub on_connect: Option<ConnectCallback>,
    pub on_disconnect: Option<DisconnectCallback>,
    pub on_order_book: Option<UpdateCallback<OrderBookUpdate>>,
    pub on_trade: Option<UpdateCallback<TradeUpdate>>,
    pub on_market_stats: Option<UpdateCallback<MarketStatsUpdate>>,
    pub on_height: Option<UpdateCallback<HeightUpdate>>,
    pub on_account: Option<UpdateCallback<AccountUpdate>>,
    pub on_tx_result: Option<UpdateCallback<TxResult>>,
    pub on_error: Option<UpdateCallback<Error>>,
}

/// Producer side of the fan-out, owned by the dispatcher.
pub(crate) struct EventHub {
    order_books: mpsc::Sender<OrderBookUpdate>,
    trades: mpsc::Sender<TradeUpdate>,
    market_stats: mpsc::Sender<MarketStatsUpdate>,
    height: mpsc::Sender<HeightUpdate>,
    account: mpsc::Sender<AccountUpdate>,
    tx_results: mpsc::Sender<TxResult>,
    errors: mpsc::Sender<Arc<Error>>,
    callbacks: Callbacks,
}

impl EventHub {
    /// Create the hub and the matching consumer streams.
    pub fn new(capacities: QueueCapacities, callbacks: Callbacks) -> (Self, EventStreams) {
        let (order_books_tx, order_books_rx) = mpsc::channel(capacities.order_books.max(1));
        let (trades_tx, trades_rx) = mpsc::channel(capacities.trades.max(1));
        let (market_stats_tx, market_stats_rx) = mpsc::channel(capacities.market_stats.max(1));
        let (height_tx, height_rx) = mpsc::channel(capacities.height.max(1));
        let (account_tx, account_rx) = mpsc::channel(capacities.account.max(1));
        let (tx_results_tx, tx_results_rx) = mpsc::channel(capacities.tx_results.max(1));
        let (errors_tx, errors_rx) = mpsc::channel(capacities.errors.max(1));

        let hub = Self {
            order_books: order_books_tx,
            trades: trades_tx,
            market_stats: market_stats_tx,
            height: height_tx,
            account: account_tx,
            tx_results: tx_results_tx,
            errors: errors_tx,
            callbacks,
        };
        let streams = EventStreams {
            order_books: order_books_rx,
            trades: trades_rx,
            market_stats: market_stats_rx,
            height: height_rx,
            account: account_rx,
            tx_results: tx_results_rx,
            errors: errors_rx,
        };
        (hub, streams)
    }

    /// Non-blocking enqueue followed by the family callback, if any.
    fn emit<T: Clone>(
        sender: &mpsc::Sender<T>,
        callback: &Option<UpdateCallback<T>>,
        event: T,
    ) {
        match callback {
            Some(cb) => {
                let _ = sender.try_send(event.clone());
                cb(&event);
            }
            None => {
                let _ = sender.try_send(event);
            }
        }
    }

    pub fn order_book(&self, event: OrderBookUpdate) {
        Self::emit(&self.order_books, &self.callbacks.on_order_book, event);
    }

    pub fn trade(&self, event: TradeUpdate) {
        Self::emit(&self.trades, &self.callbacks.on_trade, event);
    }

    pub fn market_stats(&self, event: MarketStatsUpdate) {
        Self::emit(&self.market_stats, &self.callbacks.on_market_stats, event);
    }

    pub fn height(&self, event: HeightUpdate) {
        Self::emit(&self.height, &self.callbacks.on_height, event);
    }

    pub fn account(&self, event: AccountUpdate) {
        Self::emit(&self.account, &self.callbacks.on_account, event);
    }

    pub fn tx_result(&self, event: TxResult) {
        Self::emit(&self.tx_results, &self.callbacks.on_tx_result, event);
    }

    pub fn error(&self, error: Error) {
        let error = Arc::new(error);
        let _ = self.errors.try_send(error.clone());
        if let Some(cb) = &self.callbacks.on_error {
            cb(&error);
        }
    }

    pub fn connected(&self) {
        if let Some(cb) = &self.callbacks.on_connect {
            cb();
        }
    }

    pub fn disconnected(&self, error: Option<&Error>) {
        if let Some(cb) = &self.callbacks.on_disconnect {
            cb(error);
        }
    }
}
