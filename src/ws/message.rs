//! Wire payload types for the streaming API.
//!
//! These are the inner shapes carried by the `order_book` and `data`
//! fields of server envelopes. Prices and sizes are opaque decimal
//! strings; this crate never does arithmetic on them.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One price level of an order book side.
///
/// A `size` of `""` or `"0"` in a delta means "remove this level".
/// Levels are identified by price alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price as an opaque decimal string.
    pub price: String,
    /// Size as an opaque decimal string.
    pub size: String,
    /// Number of resting orders at this level, when the server sends it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_count: Option<i64>,
}

impl PriceLevel {
    /// Create a price level from string-like parts.
    pub fn new(price: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            price: price.into(),
            size: size.into(),
            order_count: None,
        }
    }

    /// Whether this level is a removal marker (`""` or `"0"` size).
    pub fn is_removal(&self) -> bool {
        self.size.is_empty() || self.size == "0"
    }
}

impl PartialEq for PriceLevel {
    fn eq(&self, other: &Self) -> bool {
        self.price == other.price
    }
}

impl Eq for PriceLevel {}

/// The `order_book` payload of a snapshot or update envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBookPayload {
    /// Bid levels, unordered on the wire.
    #[serde(default)]
    pub bids: Vec<PriceLevel>,
    /// Ask levels, unordered on the wire.
    #[serde(default)]
    pub asks: Vec<PriceLevel>,
    /// Book sequence number; `0` when the server omits it.
    #[serde(default)]
    pub sequence: i64,
}

/// Taker side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    /// Taker bought.
    Buy,
    /// Taker sold.
    Sell,
}

/// One public trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Exchange-assigned trade identifier.
    pub trade_index: i64,
    /// Market the trade executed on.
    pub market_index: i16,
    /// Execution price as an opaque decimal string.
    pub price: String,
    /// Executed size as an opaque decimal string.
    pub size: String,
    /// Taker side.
    pub side: TradeSide,
    /// Execution timestamp (unix milliseconds).
    pub timestamp: i64,
    /// Maker account index, when disclosed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maker_index: Option<i64>,
    /// Taker account index, when disclosed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taker_index: Option<i64>,
}

/// Rolling statistics for one market.
///
/// All numeric quantities are opaque decimal strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStats {
    /// Market the statistics describe.
    pub market_index: i16,
    /// Current index price.
    #[serde(default)]
    pub index_price: String,
    /// Current mark price.
    #[serde(default)]
    pub mark_price: String,
    /// Most recent trade price.
    #[serde(default)]
    pub last_trade_price: String,
    /// 24h low.
    #[serde(default)]
    pub daily_price_low: String,
    /// 24h high.
    #[serde(default)]
    pub daily_price_high: String,
    /// 24h price change.
    #[serde(default)]
    pub daily_price_change: String,
    /// 24h base-token volume.
    #[serde(default)]
    pub daily_base_token_volume: String,
    /// 24h quote-token volume.
    #[serde(default)]
    pub daily_quote_token_volume: String,
    /// Current funding rate.
    #[serde(default)]
    pub funding_rate: String,
    /// Open interest.
    #[serde(default)]
    pub open_interest: String,
}

/// The `data` payload of a `height` envelope.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HeightData {
    /// Current block height.
    pub height: i64,
    /// Server timestamp (unix milliseconds).
    pub timestamp: i64,
}

/// The `data` payload of a `tx_result` envelope, and one element of a
/// `tx_batch_result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxResult {
    /// Whether the transaction was accepted.
    #[serde(default)]
    pub success: bool,
    /// Hash of the accepted transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// Server error message for a rejected transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Opaque extra payload echoed by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
}

/// The `data` payload of a `tx_batch_result` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct TxBatchResult {
    /// One result per submitted transaction.
    #[serde(default)]
    pub results: Vec<TxResult>,
}

/// The `data` payload of an `error` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerError {
    /// Numeric server error code.
    #[serde(default)]
    pub code: i64,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Channel the error refers to, when scoped to a subscription.
    #[serde(default)]
    pub channel: Option<String>,
}

/// Helper for payloads the server sends either as a single object or as
/// an array (trades and market stats).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// A single object.
    One(T),
    /// An array of objects.
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Flatten into a vector.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_level_equality_is_by_price() {
        let a = PriceLevel::new("100", "10");
        let b = PriceLevel::new("100", "99");
        let c = PriceLevel::new("101", "10");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn removal_marker_sizes() {
        assert!(PriceLevel::new("100", "").is_removal());
        assert!(PriceLevel::new("100", "0").is_removal());
        assert!(!PriceLevel::new("100", "0.5").is_removal());
    }

    #[test]
    fn order_book_payload_defaults_missing_fields() {
        let payload: OrderBookPayload =
            serde_json::from_str(r#"{"bids":[{"price":"100","size":"10"}]}"#).unwrap();
        assert_eq!(payload.bids.len(), 1);
        assert!(payload.asks.is_empty());
        assert_eq!(payload.sequence, 0);
    }

    #[test]
    fn trade_decodes_with_optional_parties() {
        let json = r#"{
            "trade_index": 7,
            "market_index": 0,
            "price": "100.5",
            "size": "2",
            "side": "buy",
            "timestamp": 1700000000000
        }"#;
        let trade: Trade = serde_json::from_str(json).unwrap();
        assert_eq!(trade.trade_index, 7);
        assert_eq!(trade.side, TradeSide::Buy);
        assert!(trade.maker_index.is_none());
    }

    #[test]
    fn one_or_many_accepts_both_shapes() {
        let single: OneOrMany<HeightData> =
            serde_json::from_str(r#"{"height":1,"timestamp":2}"#).unwrap();
        assert_eq!(single.into_vec().len(), 1);

        let many: OneOrMany<HeightData> =
            serde_json::from_str(r#"[{"height":1,"timestamp":2},{"height":2,"timestamp":3}]"#)
                .unwrap();
        assert_eq!(many.into_vec().len(), 2);
    }

    #[test]
    fn server_error_tolerates_missing_channel() {
        let err: ServerError =
            serde_json::from_str(r#"{"code":429,"message":"rate limited"}"#).unwrap();
        assert_eq!(err.code, 429);
        assert!(err.channel.is_none());
    }
}
