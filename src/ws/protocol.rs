//! Request encoding and envelope decoding.
//!
//! Every frame on the wire is a JSON object. Outgoing requests are built
//! with the `build_*` functions; incoming text decodes into an
//! [`Envelope`] whose inner payloads stay deferred as raw JSON values
//! until the dispatcher knows which shape applies.

use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Build a subscribe request for a channel path, optionally carrying an
/// auth token for private channels.
pub(crate) fn build_subscribe(path: &str, auth: Option<&str>) -> String {
    let request = match auth {
        Some(token) => serde_json::json!({
            "type": "subscribe",
            "channel": path,
            "auth": token,
        }),
        None => serde_json::json!({
            "type": "subscribe",
            "channel": path,
        }),
    };
    request.to_string()
}

/// Build an unsubscribe request for a channel path.
pub(crate) fn build_unsubscribe(path: &str) -> String {
    serde_json::json!({
        "type": "unsubscribe",
        "channel": path,
    })
    .to_string()
}

/// Build the reply to an application-level ping.
pub(crate) fn build_pong() -> String {
    serde_json::json!({ "type": "pong" }).to_string()
}

/// Build a transaction submission request.
pub(crate) fn build_send_tx(payload: &JsonValue) -> String {
    serde_json::json!({
        "type": "jsonapi/sendtx",
        "data": payload,
    })
    .to_string()
}

/// Build a batched transaction submission request.
///
/// The caller is responsible for enforcing the batch size limit.
pub(crate) fn build_send_tx_batch(payloads: &[JsonValue]) -> String {
    serde_json::json!({
        "type": "jsonapi/sendtxbatch",
        "data": payloads,
    })
    .to_string()
}

/// A decoded server envelope.
///
/// All fields are optional on the wire: typed messages carry `type`,
/// bare initial snapshots carry only `channel` plus a payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Envelope {
    /// Message type, e.g. `connected`, `ping`, `subscribed/order_book`.
    #[serde(rename = "type")]
    pub msg_type: Option<String>,
    /// Channel path in the server (`:`) spelling.
    pub channel: Option<String>,
    /// Deferred order-book payload.
    pub order_book: Option<JsonValue>,
    /// Deferred family-specific payload.
    pub data: Option<JsonValue>,
}

/// Decode one incoming text frame.
pub(crate) fn parse_envelope(text: &str) -> Result<Envelope, serde_json::Error> {
    serde_json::from_str(text)
}
