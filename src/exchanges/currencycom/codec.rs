use crate::core::errors::ExchangeError;
use crate::core::kernel::{InboundEnvelope, WsCodec, WsRequest};
use crate::core::types::KlineInterval;
use crate::exchanges::currencycom::types::{MarketDataEvent, OhlcEvent, TradeEvent};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::marker::PhantomData;
use tokio_tungstenite::tungstenite::Message;
use tracing::trace;

/// Event type carried by one kind of subscription
pub trait StreamEvent: DeserializeOwned + Send + 'static {
    /// Destination of the subscribe request
    const SUBSCRIBE_DESTINATION: &'static str;
    /// Destination of inbound frames carrying this event
    const EVENT_DESTINATION: &'static str;
}

impl StreamEvent for MarketDataEvent {
    const SUBSCRIBE_DESTINATION: &'static str = "marketData.subscribe";
    const EVENT_DESTINATION: &'static str = "internal.quote";
}

impl StreamEvent for OhlcEvent {
    const SUBSCRIBE_DESTINATION: &'static str = "OHLCMarketData.subscribe";
    const EVENT_DESTINATION: &'static str = "ohlc.event";
}

impl StreamEvent for TradeEvent {
    const SUBSCRIBE_DESTINATION: &'static str = "trades.subscribe";
    const EVENT_DESTINATION: &'static str = "internal.trade";
}

/// Decodes `{"status","destination","correlationId","payload"}` frames into `E`.
///
/// Frames addressed to another destination (subscription acknowledgements)
/// are skipped. A non-`OK` status is an error regardless of destination.
pub struct CurrencyComCodec<E> {
    _event: PhantomData<fn() -> E>,
}

impl<E> CurrencyComCodec<E> {
    pub fn new() -> Self {
        Self {
            _event: PhantomData,
        }
    }
}

impl<E> Default for CurrencyComCodec<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: StreamEvent> WsCodec for CurrencyComCodec<E> {
    type Message = E;

    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError> {
        let Message::Text(text) = message else {
            return Ok(None);
        };

        let envelope = InboundEnvelope::parse(&text)?;
        envelope.ensure_ok()?;

        if !envelope.destination.is_empty() && envelope.destination != E::EVENT_DESTINATION {
            trace!(destination = %envelope.destination, correlation_id = ?envelope.correlation_id, "Skipping frame");
            return Ok(None);
        }

        envelope.payload_as::<E>().map(Some)
    }
}

pub fn market_data_request(correlation_id: i64, symbols: &[String]) -> WsRequest {
    WsRequest::new(
        MarketDataEvent::SUBSCRIBE_DESTINATION,
        correlation_id,
        json!({ "symbols": symbols }),
    )
}

pub fn ohlc_request(
    correlation_id: i64,
    symbols: &[String],
    intervals: &[KlineInterval],
) -> WsRequest {
    let intervals: Vec<&str> = intervals.iter().map(KlineInterval::as_str).collect();
    WsRequest::new(
        OhlcEvent::SUBSCRIBE_DESTINATION,
        correlation_id,
        json!({ "symbols": symbols, "intervals": intervals }),
    )
}

pub fn trades_request(correlation_id: i64, symbols: &[String]) -> WsRequest {
    WsRequest::new(
        TradeEvent::SUBSCRIBE_DESTINATION,
        correlation_id,
        json!({ "symbols": symbols }),
    )
}
