//! End-to-end scenarios against an in-process mock server.
//!
//! Each test binds a local TCP listener, accepts the client's WebSocket
//! connection with `accept_async`, and scripts the server side of the
//! conversation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use lighter_stream_rs::{
    Channel, Environment, Error, EventStreams, LighterStreamClient, StreamConfig,
};

type ServerWs = WebSocketStream<TcpStream>;

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

async fn bind_server() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept_client(listener: &TcpListener) -> ServerWs {
    let (stream, _) = timeout(STEP_TIMEOUT, listener.accept()).await.unwrap().unwrap();
    timeout(STEP_TIMEOUT, accept_async(stream)).await.unwrap().unwrap()
}

async fn send_json(ws: &mut ServerWs, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

/// Read the next text frame the client sent, parsed as JSON.
async fn recv_json(ws: &mut ServerWs) -> Value {
    loop {
        let message = timeout(STEP_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a client frame")
            .expect("client closed the stream")
            .expect("transport error");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

fn client_for(url: &str) -> (LighterStreamClient, EventStreams) {
    let config = StreamConfig::new(Environment::Custom(url.to_string()))
        .with_reconnect_delay(Duration::from_millis(50))
        .with_max_reconnect_delay(Duration::from_millis(200));
    LighterStreamClient::builder(config).build()
}

#[tokio::test]
async fn connect_handshake_greets_and_fires_callback_once() {
    let (listener, url) = bind_server().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_client(&listener).await;
        send_json(&mut ws, json!({"type": "connected"})).await;
        // Stay up until the client closes.
        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                break;
            }
        }
    });

    let connects = Arc::new(AtomicUsize::new(0));
    let seen = connects.clone();
    let config = StreamConfig::new(Environment::Custom(url));
    let (client, _events) = LighterStreamClient::builder(config)
        .on_connect(Arc::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        }))
        .build();

    client.connect().await.unwrap();
    assert!(client.is_connected());
    assert_eq!(connects.load(Ordering::SeqCst), 1);

    // A second connect on a live connection is refused.
    assert!(matches!(
        client.connect().await,
        Err(Error::AlreadyConnected)
    ));

    client.close().await;
    assert!(!client.is_connected());
    server.await.unwrap();
}

#[tokio::test]
async fn order_book_snapshot_then_update_reaches_expected_state() {
    let (listener, url) = bind_server().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_client(&listener).await;
        send_json(&mut ws, json!({"type": "connected"})).await;

        let subscribe = recv_json(&mut ws).await;
        assert_eq!(subscribe["type"], "subscribe");
        assert_eq!(subscribe["channel"], "order_book/0");

        send_json(
            &mut ws,
            json!({
                "type": "subscribed/order_book",
                "channel": "order_book:0",
                "order_book": {
                    "bids": [{"price": "100", "size": "10"}],
                    "asks": [{"price": "101", "size": "5"}]
                }
            }),
        )
        .await;
        send_json(
            &mut ws,
            json!({
                "type": "update/order_book",
                "channel": "order_book:0",
                "order_book": {
                    "bids": [
                        {"price": "100", "size": "0"},
                        {"price": "99", "size": "7"}
                    ],
                    "asks": []
                }
            }),
        )
        .await;

        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                break;
            }
        }
    });

    let (client, mut events) = client_for(&url);
    client.connect().await.unwrap();
    client.subscribe_order_book(0).await.unwrap();
    assert!(client.is_subscribed(&Channel::OrderBook { market: 0 }));

    let first = timeout(STEP_TIMEOUT, events.order_books.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(first.is_snapshot);

    let second = timeout(STEP_TIMEOUT, events.order_books.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(!second.is_snapshot);

    let book = client.order_book(0).unwrap();
    let bids = book.bids_sorted();
    assert_eq!(bids.len(), 1);
    assert_eq!(bids[0].price, "99");
    assert_eq!(bids[0].size, "7");
    let asks = book.asks_sorted();
    assert_eq!(asks.len(), 1);
    assert_eq!(asks[0].price, "101");
    assert_eq!(asks[0].size, "5");

    client.close().await;
    server.await.unwrap();
}

#[tokio::test]
async fn sequenced_delta_gap_is_reported_and_refused() {
    let (listener, url) = bind_server().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_client(&listener).await;
        send_json(&mut ws, json!({"type": "connected"})).await;

        let _subscribe = recv_json(&mut ws).await;
        send_json(
            &mut ws,
            json!({
                "type": "subscribed/order_book",
                "channel": "order_book:0",
                "order_book": {
                    "bids": [{"price": "100", "size": "10"}],
                    "asks": [],
                    "sequence": 100
                }
            }),
        )
        .await;
        // Sequence jumps from 100 to 103.
        send_json(
            &mut ws,
            json!({
                "type": "update/order_book",
                "channel": "order_book:0",
                "order_book": {
                    "bids": [{"price": "98", "size": "3"}],
                    "asks": [],
                    "sequence": 103
                }
            }),
        )
        .await;

        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                break;
            }
        }
    });

    let (client, mut events) = client_for(&url);
    client.connect().await.unwrap();
    client.subscribe_order_book(0).await.unwrap();

    let snapshot = timeout(STEP_TIMEOUT, events.order_books.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.book.sequence(), 100);

    let error = timeout(STEP_TIMEOUT, events.errors.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        *error,
        Error::SequenceGap {
            expected: 101,
            got: 103
        }
    ));

    // The refused delta left the book untouched.
    let book = client.order_book(0).unwrap();
    assert_eq!(book.sequence(), 100);
    assert_eq!(book.bids_sorted().len(), 1);
    assert_eq!(book.bids_sorted()[0].price, "100");

    client.close().await;
    server.await.unwrap();
}

#[tokio::test]
async fn ping_is_answered_with_exactly_one_pong() {
    let (listener, url) = bind_server().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_client(&listener).await;
        send_json(&mut ws, json!({"type": "connected"})).await;
        send_json(&mut ws, json!({"type": "ping"})).await;

        let pong = recv_json(&mut ws).await;
        assert_eq!(pong, json!({"type": "pong"}));

        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                break;
            }
        }
    });

    let (client, _events) = client_for(&url);
    client.connect().await.unwrap();

    // The server task asserts the pong arrived; closing ends it.
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.close().await;
    server.await.unwrap();
}

#[tokio::test]
async fn reconnect_replays_active_subscriptions() {
    let (listener, url) = bind_server().await;

    let server = tokio::spawn(async move {
        // First session: greet, confirm both subscriptions, then drop.
        {
            let mut ws = accept_client(&listener).await;
            send_json(&mut ws, json!({"type": "connected"})).await;

            for _ in 0..2 {
                let subscribe = recv_json(&mut ws).await;
                let path = subscribe["channel"].as_str().unwrap().replace('/', ":");
                let kind = path.split(':').next().unwrap().to_string();
                send_json(
                    &mut ws,
                    json!({"type": format!("subscribed/{kind}"), "channel": path}),
                )
                .await;
            }
            ws.close(None).await.unwrap();
        }

        // Second session: greet and collect the replayed subscriptions.
        let mut ws = accept_client(&listener).await;
        send_json(&mut ws, json!({"type": "connected"})).await;

        let mut replayed = Vec::new();
        for _ in 0..2 {
            let subscribe = recv_json(&mut ws).await;
            assert_eq!(subscribe["type"], "subscribe");
            replayed.push(subscribe["channel"].as_str().unwrap().to_string());
        }
        replayed.sort();
        assert_eq!(replayed, ["order_book/0", "trade/1"]);

        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                break;
            }
        }
    });

    let (client, _events) = client_for(&url);
    client.connect().await.unwrap();

    let supervisor = {
        let client = client.clone();
        tokio::spawn(async move { client.run().await })
    };

    client.subscribe_order_book(0).await.unwrap();
    client.subscribe_trades(1).await.unwrap();

    // Wait for the drop, the backoff, and the replay to settle.
    let deadline = tokio::time::Instant::now() + STEP_TIMEOUT;
    loop {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if client.is_connected()
            && client.is_subscribed(&Channel::OrderBook { market: 0 })
            && client.is_subscribed(&Channel::Trade { market: 1 })
        {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "reconnect did not complete in time"
        );
    }

    // Let the replay frames reach the server before closing.
    tokio::time::sleep(Duration::from_millis(200)).await;

    client.close().await;
    supervisor.await.unwrap().unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn oversized_batch_writes_nothing() {
    let (listener, url) = bind_server().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_client(&listener).await;
        send_json(&mut ws, json!({"type": "connected"})).await;

        // The very next frame must be the marker transaction: the
        // oversized batch before it was never written.
        let frame = recv_json(&mut ws).await;
        assert_eq!(frame["type"], "jsonapi/sendtx");
        assert_eq!(frame["data"]["marker"], true);

        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                break;
            }
        }
    });

    let (client, _events) = client_for(&url);
    client.connect().await.unwrap();

    let payloads: Vec<Value> = (0..51).map(|n| json!({"nonce": n})).collect();
    let err = client.send_tx_batch(&payloads).await.unwrap_err();
    assert!(matches!(err, Error::BatchTooLarge(51)));

    client.send_tx(json!({"marker": true})).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    client.close().await;
    server.await.unwrap();
}

#[tokio::test]
async fn tx_results_flow_back_asynchronously() {
    let (listener, url) = bind_server().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_client(&listener).await;
        send_json(&mut ws, json!({"type": "connected"})).await;

        let tx = recv_json(&mut ws).await;
        assert_eq!(tx["type"], "jsonapi/sendtx");
        send_json(
            &mut ws,
            json!({"type": "tx_result", "data": {"success": true, "tx_hash": "0xabc"}}),
        )
        .await;

        let batch = recv_json(&mut ws).await;
        assert_eq!(batch["type"], "jsonapi/sendtxbatch");
        assert_eq!(batch["data"].as_array().unwrap().len(), 2);
        send_json(
            &mut ws,
            json!({"type": "tx_batch_result", "data": {"results": [
                {"success": true, "tx_hash": "0x01"},
                {"success": false, "error": "rejected"}
            ]}}),
        )
        .await;

        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                break;
            }
        }
    });

    let (client, mut events) = client_for(&url);
    client.connect().await.unwrap();

    client.send_tx(json!({"nonce": 1})).await.unwrap();
    let result = timeout(STEP_TIMEOUT, events.tx_results.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(result.success);
    assert_eq!(result.tx_hash.as_deref(), Some("0xabc"));

    client
        .send_tx_batch(&[json!({"nonce": 2}), json!({"nonce": 3})])
        .await
        .unwrap();
    let first = timeout(STEP_TIMEOUT, events.tx_results.recv())
        .await
        .unwrap()
        .unwrap();
    let second = timeout(STEP_TIMEOUT, events.tx_results.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(first.success);
    assert!(!second.success);
    assert_eq!(second.error.as_deref(), Some("rejected"));

    client.close().await;
    server.await.unwrap();
}

#[tokio::test]
async fn server_error_fails_the_pending_subscribe() {
    let (listener, url) = bind_server().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_client(&listener).await;
        send_json(&mut ws, json!({"type": "connected"})).await;

        let subscribe = recv_json(&mut ws).await;
        assert_eq!(subscribe["channel"], "order_book/42");
        send_json(
            &mut ws,
            json!({"type": "error", "data": {
                "code": 404,
                "message": "unknown market",
                "channel": "order_book:42"
            }}),
        )
        .await;

        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                break;
            }
        }
    });

    let (client, _events) = client_for(&url);
    client.connect().await.unwrap();

    let err = client.subscribe_order_book(42).await.unwrap_err();
    assert!(matches!(
        err,
        Error::SubscriptionFailed { code: 404, .. }
    ));
    assert!(!client.is_subscribed(&Channel::OrderBook { market: 42 }));

    client.close().await;
    server.await.unwrap();
}
