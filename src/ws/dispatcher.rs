//! Message dispatch: one decoded envelope in, confirmations, book
//! updates, and fan-out events out.
//!
//! The dispatcher runs on the read loop and never blocks on consumers.
//! A malformed message is reported on the error family and dropped; the
//! loop itself only ends on transport failure.

use std::sync::atomic::Ordering;

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::Error;

use super::channel::Channel;
use super::events::{
    AccountUpdate, HeightUpdate, MarketStatsUpdate, OrderBookUpdate, TradeUpdate,
};
use super::message::{
    HeightData, MarketStats, OneOrMany, OrderBookPayload, ServerError, Trade, TxBatchResult,
    TxResult,
};
use super::protocol::{self, Envelope};
use super::session::StreamCore;

/// Route one incoming text frame.
pub(crate) async fn dispatch(core: &StreamCore, text: &str) {
    let envelope = match protocol::parse_envelope(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            core.hub.error(Error::Json(e));
            return;
        }
    };

    match envelope.msg_type.as_deref() {
        Some("connected") => handle_connected(core),
        Some("ping") => handle_ping(core).await,
        Some("error") => handle_server_error(core, envelope),
        Some("tx_result") => handle_tx_result(core, envelope),
        Some("tx_batch_result") => handle_tx_batch_result(core, envelope),
        Some(typed) if typed.starts_with("subscribed/") => {
            handle_channel_message(core, &envelope, true);
        }
        Some(typed) if typed.starts_with("update/") => {
            handle_channel_message(core, &envelope, false);
        }
        Some(other) => debug!("ignoring message type {other:?}"),
        // Bare envelope: a subscription confirmation carrying an inline
        // initial payload.
        None if envelope.channel.is_some() => handle_channel_message(core, &envelope, true),
        None => debug!("ignoring envelope without type or channel"),
    }
}

/// The server greeting: releases the connect barrier exactly once.
fn handle_connected(core: &StreamCore) {
    core.connected.store(true, Ordering::SeqCst);
    let was_ready = core.ready.send_replace(true);
    if !was_ready {
        debug!("server greeting received");
        core.hub.connected();
    }
}

/// Application-level ping: answer with the pong frame.
async fn handle_ping(core: &StreamCore) {
    if let Err(e) = core.send_text(protocol::build_pong()).await {
        core.hub.error(e);
    }
}

/// A server error envelope: fail the matching pending subscription when
/// the error is channel-scoped, and always surface it on the error
/// family.
fn handle_server_error(core: &StreamCore, envelope: Envelope) {
    let Some(data) = envelope.data else {
        debug!("error envelope without data");
        return;
    };
    let server_error: ServerError = match serde_json::from_value(data) {
        Ok(decoded) => decoded,
        Err(e) => {
            core.hub.error(Error::Json(e));
            return;
        }
    };

    if let Some(raw_channel) = &server_error.channel {
        match Channel::parse(raw_channel) {
            Ok(channel) => core.registry.confirm(
                &channel.key(),
                Err(Error::SubscriptionFailed {
                    code: server_error.code,
                    message: server_error.message.clone(),
                }),
            ),
            Err(e) => core.hub.error(e),
        }
    }

    core.hub.error(Error::SubscriptionFailed {
        code: server_error.code,
        message: server_error.message,
    });
}

fn handle_tx_result(core: &StreamCore, envelope: Envelope) {
    let Some(data) = envelope.data else {
        debug!("tx_result envelope without data");
        return;
    };
    match serde_json::from_value::<TxResult>(data) {
        Ok(result) => core.hub.tx_result(result),
        Err(e) => core.hub.error(Error::Json(e)),
    }
}

fn handle_tx_batch_result(core: &StreamCore, envelope: Envelope) {
    let Some(data) = envelope.data else {
        debug!("tx_batch_result envelope without data");
        return;
    };
    match serde_json::from_value::<TxBatchResult>(data) {
        Ok(batch) => {
            for result in batch.results {
                core.hub.tx_result(result);
            }
        }
        Err(e) => core.hub.error(Error::Json(e)),
    }
}

/// A `subscribed/...`, `update/...`, or bare-channel envelope.
///
/// `confirm` distinguishes confirmations (which resolve the pending
/// subscription and treat an order-book payload as the initial
/// snapshot) from updates.
fn handle_channel_message(core: &StreamCore, envelope: &Envelope, confirm: bool) {
    let Some(raw_channel) = envelope.channel.as_deref() else {
        core.hub
            .error(Error::ChannelFormat("<missing channel>".to_string()));
        return;
    };
    let channel = match Channel::parse(raw_channel) {
        Ok(channel) => channel,
        Err(e) => {
            core.hub.error(e);
            return;
        }
    };

    if confirm {
        core.registry.confirm(&channel.key(), Ok(()));
    }

    match &channel {
        Channel::OrderBook { market } => {
            handle_order_book(core, *market, envelope, confirm);
        }
        Channel::Trade { market } => {
            if let Some(data) = &envelope.data {
                match decode::<OneOrMany<Trade>>(data) {
                    Ok(trades) => core.hub.trade(TradeUpdate {
                        market_index: *market,
                        trades: trades.into_vec(),
                    }),
                    Err(e) => core.hub.error(e),
                }
            }
        }
        Channel::MarketStats { market } => {
            if let Some(data) = &envelope.data {
                match decode::<MarketStats>(data) {
                    Ok(stats) => core.hub.market_stats(MarketStatsUpdate {
                        market_index: *market,
                        stats: Some(stats),
                        all_stats: None,
                    }),
                    Err(e) => core.hub.error(e),
                }
            }
        }
        Channel::MarketStatsAll => {
            if let Some(data) = &envelope.data {
                match decode::<OneOrMany<MarketStats>>(data) {
                    Ok(stats) => core.hub.market_stats(MarketStatsUpdate {
                        market_index: -1,
                        stats: None,
                        all_stats: Some(stats.into_vec()),
                    }),
                    Err(e) => core.hub.error(e),
                }
            }
        }
        Channel::Height => {
            if let Some(data) = &envelope.data {
                match decode::<HeightData>(data) {
                    Ok(height) => core.hub.height(HeightUpdate {
                        height: height.height,
                        timestamp: height.timestamp,
                    }),
                    Err(e) => core.hub.error(e),
                }
            }
        }
        // Account-family payloads pass through opaque.
        private => {
            if let Some(data) = &envelope.data {
                core.hub.account(AccountUpdate {
                    account_index: private.account().unwrap_or_default(),
                    channel: private.kind_str(),
                    data: data.clone(),
                });
            }
        }
    }
}

/// Confirmations carry a trusted snapshot. Updates with a sequence are
/// applied as gap-checked deltas; updates without one are merged as-is.
fn handle_order_book(core: &StreamCore, market: i16, envelope: &Envelope, is_snapshot: bool) {
    let Some(payload) = &envelope.order_book else {
        return;
    };
    let payload: OrderBookPayload = match decode(payload) {
        Ok(decoded) => decoded,
        Err(e) => {
            core.hub.error(e);
            return;
        }
    };

    let book = if is_snapshot {
        core.books.apply_snapshot(market, &payload)
    } else if payload.sequence != 0 {
        match core.books.apply_delta(market, &payload) {
            Ok(book) => book,
            Err(e) => {
                core.hub.error(e);
                return;
            }
        }
    } else {
        core.books
            .merge_updates(market, &payload.bids, &payload.asks)
    };

    core.hub.order_book(OrderBookUpdate {
        market_index: market,
        is_snapshot,
        payload,
        book,
    });
}

fn decode<T: serde::de::DeserializeOwned>(value: &JsonValue) -> Result<T, Error> {
    serde_json::from_value(value.clone()).map_err(Error::Json)
}
