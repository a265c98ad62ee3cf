mod common;

use common::spawn_ws_server;
use currencyx::core::kernel::SessionState;
use currencyx::exchanges::currencycom::MarketDataEvent;
use currencyx::{build_connector, ExchangeConfig, ExchangeError, KlineInterval};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

const QUOTE_FRAME: &str = r#"{"status":"OK","destination":"internal.quote","payload":{"symbolName":"TXN","bid":139.85,"bidQty":2500,"ofr":139.92000000000002,"ofrQty":2500,"timestamp":1597850971558}}"#;

fn connector_for(url: String) -> currencyx::CurrencyComConnector {
    build_connector(ExchangeConfig::read_only().ws_url(url)).unwrap()
}

/// Server that forwards each subscribe request and then replays `frames`
async fn replaying_server(frames: Vec<String>) -> (String, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let url = spawn_ws_server(move |mut ws| {
        let tx = tx.clone();
        let frames = frames.clone();
        async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                let _ = tx.send(serde_json::from_str::<Value>(&text).unwrap());
            }
            for frame in frames {
                if ws.send(Message::Text(frame)).await.is_err() {
                    return;
                }
            }
            // Hold the connection open until the client leaves
            while let Some(Ok(_)) = ws.next().await {}
        }
    })
    .await;
    (url, rx)
}

#[tokio::test]
async fn test_market_data_subscription_delivers_quotes() {
    let ack = json!({
        "status": "OK",
        "destination": "marketData.subscribe",
        "correlationId": "0",
        "payload": {"subscriptions": {"TXN": "OK"}}
    })
    .to_string();
    let (url, mut requests) = replaying_server(vec![ack, QUOTE_FRAME.to_string()]).await;

    let connector = connector_for(url);
    let mut session = connector
        .stream()
        .subscribe_market_data(&["TXN".to_string()])
        .await
        .unwrap();
    assert!(session.is_open());

    let request = timeout(Duration::from_secs(5), requests.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request["destination"], "marketData.subscribe");
    assert_eq!(request["correlationId"], 0);
    assert_eq!(request["payload"]["symbols"], json!(["TXN"]));

    let quote = timeout(Duration::from_secs(5), session.next_event())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(
        quote,
        MarketDataEvent {
            symbol_name: "TXN".to_string(),
            bid: 139.85,
            ofr: 139.92000000000002,
            bid_qty: 2500.0,
            ofr_qty: 2500.0,
            timestamp: 1597850971558,
        }
    );

    session.stop().await;
    assert_eq!(session.state(), SessionState::Closed);
    assert!(session.next_event().await.is_none());
    println!("✅ Quote stream delivered and closed cleanly");
}

#[tokio::test]
async fn test_error_status_surfaces_and_stream_continues() {
    let error = json!({
        "status": "ERROR",
        "destination": "marketData.subscribe",
        "correlationId": "0",
        "payload": {"message": "Unknown symbol"}
    })
    .to_string();
    let (url, _requests) = replaying_server(vec![error, QUOTE_FRAME.to_string()]).await;

    let connector = connector_for(url);
    let mut session = connector
        .stream()
        .subscribe_market_data(&["TXN".to_string()])
        .await
        .unwrap();

    let first = timeout(Duration::from_secs(5), session.next_event())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first, Err(ExchangeError::StreamStatus(_))));

    let second = timeout(Duration::from_secs(5), session.next_event())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.unwrap().symbol_name, "TXN");

    session.stop().await;
}

#[tokio::test]
async fn test_correlation_ids_increase_per_subscription() {
    let (url, mut requests) = replaying_server(Vec::new()).await;
    let connector = connector_for(url);

    let symbols = vec!["TXN".to_string()];
    let quotes = connector
        .stream()
        .subscribe_market_data(&symbols)
        .await
        .unwrap();
    let candles = connector
        .stream()
        .subscribe_ohlc(&symbols, &[KlineInterval::Minutes1])
        .await
        .unwrap();
    let trades = connector.stream().subscribe_trades(&symbols).await.unwrap();

    let mut seen = Vec::new();
    for _ in 0..3 {
        let request = timeout(Duration::from_secs(5), requests.recv())
            .await
            .unwrap()
            .unwrap();
        seen.push((
            request["correlationId"].as_i64().unwrap(),
            request["destination"].as_str().unwrap().to_string(),
        ));
    }
    seen.sort();
    assert_eq!(
        seen,
        vec![
            (0, "marketData.subscribe".to_string()),
            (1, "OHLCMarketData.subscribe".to_string()),
            (2, "trades.subscribe".to_string()),
        ]
    );

    quotes.stop().await;
    candles.stop().await;
    trades.stop().await;
}

#[tokio::test]
async fn test_remote_close_ends_stream_with_io_error() {
    let url = spawn_ws_server(|mut ws| async move {
        let _ = ws.next().await;
        let _ = ws.send(Message::Text(QUOTE_FRAME.to_string())).await;
        let _ = ws.close(None).await;
    })
    .await;

    let connector = connector_for(url);
    let mut session = connector
        .stream()
        .subscribe_market_data(&["TXN".to_string()])
        .await
        .unwrap();

    let quote = timeout(Duration::from_secs(5), session.next_event())
        .await
        .unwrap()
        .unwrap();
    assert!(quote.is_ok());

    let terminal = timeout(Duration::from_secs(5), session.next_event())
        .await
        .unwrap();
    assert!(matches!(terminal, Some(Err(ExchangeError::StreamIo(_)))));
    assert!(session.next_event().await.is_none());
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_keepalive_timeout_when_peer_goes_silent() {
    // The peer never reads again, so pings are never answered
    let url = spawn_ws_server(|mut ws| async move {
        let _ = ws.next().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(ws);
    })
    .await;

    let config = ExchangeConfig::read_only().ws_url(url).ws_keepalive(true, 1);
    let connector = build_connector(config).unwrap();
    let mut session = connector
        .stream()
        .subscribe_market_data(&["TXN".to_string()])
        .await
        .unwrap();

    let terminal = timeout(Duration::from_secs(10), session.next_event())
        .await
        .unwrap();
    assert!(matches!(
        terminal,
        Some(Err(ExchangeError::KeepaliveTimeout { .. }))
    ));
    assert!(session.next_event().await.is_none());
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    let connector = connector_for("ws://127.0.0.1:1".to_string());
    let result = connector
        .stream()
        .subscribe_market_data(&["TXN".to_string()])
        .await;
    assert!(matches!(result, Err(ExchangeError::StreamConnect(_))));
}
