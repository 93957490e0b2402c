//! Streaming client for the Lighter exchange WebSocket API.
//!
//! This crate maintains authoritative local state for the exchange's
//! market and account streams and submits signed transactions over the
//! same connection:
//!
//! - **Connection supervision** - ready-gated connect, idempotent close,
//!   reconnection with exponential backoff and subscription replay
//! - **Order-book reconstruction** - trusted snapshot plus incremental
//!   updates per market, with sequence-gap detection
//! - **Typed event fan-out** - bounded, lossy per-family queues plus
//!   optional synchronous callbacks; the network reader never blocks on
//!   a slow consumer
//! - **Transaction submission** - single and batched `sendtx` over the
//!   stream, results delivered asynchronously
//!
//! # Quick Start
//!
//! ```no_run
//! use lighter_stream_rs::{Environment, LighterStreamClient, StreamConfig};
//!
//! #[tokio::main]
//! async fn main() -> lighter_stream_rs::Result<()> {
//!     let config = StreamConfig::new(Environment::Testnet);
//!     let (client, mut events) = LighterStreamClient::builder(config).build();
//!
//!     client.connect().await?;
//!     client.subscribe_order_book(0).await?;
//!
//!     while let Some(update) = events.order_books.recv().await {
//!         println!("best bid: {:?}", update.book.best_bid());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`client`] - the public client surface
//! - [`ws`] - channels, codec, dispatch, fan-out, and the supervisor
//! - [`orderbook`] - per-market book reconstruction
//! - [`config`] - endpoints and tuning knobs
//! - [`error`] - the crate error taxonomy
//!
//! Prices and sizes are opaque decimal strings throughout; this crate
//! does no price arithmetic.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod orderbook;
pub mod ws;

// Re-export commonly used types at the crate root
pub use client::{LighterStreamClient, StreamClientBuilder};
pub use config::{Environment, QueueCapacities, StreamConfig};
pub use error::{Error, Result, MAX_TX_BATCH_SIZE};
pub use orderbook::{OrderBook, OrderBookManager};
pub use ws::{
    AccountUpdate, Channel, EventStreams, HeightData, HeightUpdate, MarketStats,
    MarketStatsUpdate, OrderBookPayload, OrderBookUpdate, PriceLevel, SubscriptionEntry, Trade,
    TradeSide, TradeUpdate, TxResult,
};
