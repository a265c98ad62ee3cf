//! Shared helpers for the integration tests
#![allow(dead_code)]

use currencyx::core::config::ExchangeConfig;
use std::future::Future;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use wiremock::MockServer;

pub const API_KEY: &str = "test-api-key";
pub const SECRET_KEY: &str = "test-secret-key";

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Credentialed configuration pointing at the mock server
pub fn signed_config(server: &MockServer) -> ExchangeConfig {
    ExchangeConfig::new(API_KEY.to_string(), SECRET_KEY.to_string()).base_url(server.uri())
}

/// Public-only configuration pointing at the mock server
pub fn public_config(server: &MockServer) -> ExchangeConfig {
    ExchangeConfig::read_only().base_url(server.uri())
}

/// Start a local websocket server; every accepted connection runs `handler`.
/// Returns the `ws://` URL to connect to.
pub async fn spawn_ws_server<F, Fut>(handler: F) -> String
where
    F: Fn(WebSocketStream<TcpStream>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let Ok(ws) = tokio_tungstenite::accept_async(tcp).await else {
                continue;
            };
            tokio::spawn(handler(ws));
        }
    });

    format!("ws://{}", addr)
}
