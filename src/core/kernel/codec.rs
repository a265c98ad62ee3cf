use crate::core::errors::ExchangeError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

/// Status value of a successful inbound envelope
pub const STATUS_OK: &str = "OK";

/// Outbound request frame: `{"destination", "correlationId", "payload"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsRequest {
    pub destination: String,
    pub correlation_id: i64,
    pub payload: Value,
}

impl WsRequest {
    pub fn new(destination: impl Into<String>, correlation_id: i64, payload: Value) -> Self {
        Self {
            destination: destination.into(),
            correlation_id,
            payload,
        }
    }
}

/// Inbound frame as sent by the venue. The payload stays untyped until the
/// status has been checked.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEnvelope {
    pub status: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default, deserialize_with = "de_correlation_id")]
    pub correlation_id: Option<i64>,
    #[serde(default)]
    pub payload: Value,
}

impl InboundEnvelope {
    /// Parse a text frame into an envelope
    pub fn parse(text: &str) -> Result<Self, ExchangeError> {
        serde_json::from_str(text)
            .map_err(|e| ExchangeError::Decode(format!("Invalid stream envelope: {}", e)))
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Fail with `StreamStatus` unless the envelope status is `OK`
    pub fn ensure_ok(&self) -> Result<(), ExchangeError> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(ExchangeError::StreamStatus(self.status.clone()))
        }
    }

    /// Strictly deserialize the payload
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, ExchangeError> {
        T::deserialize(&self.payload).map_err(|e| {
            ExchangeError::Decode(format!(
                "Invalid '{}' payload: {}",
                self.destination, e
            ))
        })
    }
}

// The venue echoes correlation ids either as numbers or as numeric strings.
fn de_correlation_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Num(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Codec trait for handling exchange-specific WebSocket message encoding/decoding
///
/// Each venue stream implements this to turn its inbound frames into typed
/// events. Control frames (ping, pong, close) never reach the codec.
pub trait WsCodec: Send + Sync + 'static {
    /// The type representing parsed messages from this exchange
    type Message: Send + 'static;

    /// Encode a request into a text frame
    fn encode_request(&self, request: &WsRequest) -> Result<Message, ExchangeError> {
        let text = serde_json::to_string(request)
            .map_err(|e| ExchangeError::Serialization(format!("Failed to encode request: {}", e)))?;
        Ok(Message::Text(text))
    }

    /// Decode a raw WebSocket message into a typed message
    ///
    /// # Returns
    /// - `Ok(Some(message))` - Successfully decoded message
    /// - `Ok(None)` - Message was ignored/filtered by codec
    /// - `Err(error)` - The frame was rejected; the session keeps running
    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError>;
}
