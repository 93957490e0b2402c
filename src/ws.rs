//! WebSocket streaming engine.
//!
//! This module owns everything between the transport and the public
//! client: channel naming, the wire codec, the subscription registry,
//! the dispatch state machine, event fan-out, and the connection
//! supervisor.
//!
//! # Data flow
//!
//! ```text
//! transport -> codec -> dispatcher -> order books -> event fan-out -> consumers
//! ```
//!
//! Control flow runs the other way: the public API registers a
//! subscription, writes the request, and awaits the confirmation slot
//! that the dispatcher resolves when the server answers.

use std::time::Duration;

pub(crate) mod channel;
pub(crate) mod dispatcher;
pub(crate) mod events;
pub(crate) mod message;
pub(crate) mod protocol;
pub(crate) mod session;
pub(crate) mod subscriptions;
pub(crate) mod transport;

pub use channel::Channel;
pub use events::{
    AccountUpdate, ConnectCallback, DisconnectCallback, EventStreams, HeightUpdate,
    MarketStatsUpdate, OrderBookUpdate, TradeUpdate, UpdateCallback,
};
pub use message::{
    HeightData, MarketStats, OneOrMany, OrderBookPayload, PriceLevel, Trade, TradeSide, TxResult,
};
pub use subscriptions::SubscriptionEntry;

/// How long to wait for the server `connected` greeting.
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a subscribe call waits for its confirmation.
pub(crate) const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);
