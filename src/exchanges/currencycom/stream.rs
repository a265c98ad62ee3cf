use crate::core::errors::ExchangeError;
use crate::core::kernel::{WsConfig, WsRequest, WsSession};
use crate::core::types::KlineInterval;
use crate::exchanges::currencycom::codec::{
    market_data_request, ohlc_request, trades_request, CurrencyComCodec, StreamEvent,
};
use crate::exchanges::currencycom::types::{MarketDataEvent, OhlcEvent, TradeEvent};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{info, instrument};

pub type MarketDataSession = WsSession<CurrencyComCodec<MarketDataEvent>>;
pub type OhlcSession = WsSession<CurrencyComCodec<OhlcEvent>>;
pub type TradeSession = WsSession<CurrencyComCodec<TradeEvent>>;

/// Streaming client. Each subscription opens its own session; correlation
/// ids are unique per client, starting at 0.
#[derive(Debug)]
pub struct CurrencyComStream {
    url: String,
    config: WsConfig,
    correlation_id: AtomicI64,
}

impl CurrencyComStream {
    pub fn new(url: String, config: WsConfig) -> Self {
        Self {
            url,
            config,
            correlation_id: AtomicI64::new(0),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn config(&self) -> &WsConfig {
        &self.config
    }

    fn next_correlation_id(&self) -> i64 {
        self.correlation_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Subscribe to best bid/offer quotes
    #[instrument(skip(self), fields(exchange = "currencycom", url = %self.url))]
    pub async fn subscribe_market_data(
        &self,
        symbols: &[String],
    ) -> Result<MarketDataSession, ExchangeError> {
        require_symbols(symbols)?;
        self.open(market_data_request(self.next_correlation_id(), symbols))
            .await
    }

    /// Subscribe to candles for every symbol/interval pair
    #[instrument(skip(self), fields(exchange = "currencycom", url = %self.url))]
    pub async fn subscribe_ohlc(
        &self,
        symbols: &[String],
        intervals: &[KlineInterval],
    ) -> Result<OhlcSession, ExchangeError> {
        require_symbols(symbols)?;
        if intervals.is_empty() {
            return Err(ExchangeError::Validation(
                "at least one interval is required".to_string(),
            ));
        }
        self.open(ohlc_request(self.next_correlation_id(), symbols, intervals))
            .await
    }

    /// Subscribe to public trade prints
    #[instrument(skip(self), fields(exchange = "currencycom", url = %self.url))]
    pub async fn subscribe_trades(&self, symbols: &[String]) -> Result<TradeSession, ExchangeError> {
        require_symbols(symbols)?;
        self.open(trades_request(self.next_correlation_id(), symbols))
            .await
    }

    async fn open<E: StreamEvent>(
        &self,
        request: WsRequest,
    ) -> Result<WsSession<CurrencyComCodec<E>>, ExchangeError> {
        let session =
            WsSession::connect(&self.url, CurrencyComCodec::<E>::new(), self.config.clone()).await?;

        if let Err(e) = session.send_request(&request).await {
            session.stop().await;
            return Err(e);
        }

        info!(
            destination = %request.destination,
            correlation_id = request.correlation_id,
            "Subscription sent"
        );
        Ok(session)
    }
}

fn require_symbols(symbols: &[String]) -> Result<(), ExchangeError> {
    if symbols.is_empty() || symbols.iter().any(|s| s.trim().is_empty()) {
        return Err(ExchangeError::Validation(
            "at least one non-empty symbol is required".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_ids_start_at_zero_and_increase() {
        let stream = CurrencyComStream::new("ws://unused".to_string(), WsConfig::default());
        assert_eq!(stream.next_correlation_id(), 0);
        assert_eq!(stream.next_correlation_id(), 1);
        assert_eq!(stream.next_correlation_id(), 2);
    }

    #[test]
    fn test_counters_are_per_client() {
        let a = CurrencyComStream::new("ws://unused".to_string(), WsConfig::default());
        let b = CurrencyComStream::new("ws://unused".to_string(), WsConfig::default());
        a.next_correlation_id();
        assert_eq!(b.next_correlation_id(), 0);
    }

    #[tokio::test]
    async fn test_empty_symbols_rejected_before_connecting() {
        let stream = CurrencyComStream::new("ws://127.0.0.1:1".to_string(), WsConfig::default());
        assert!(matches!(
            stream.subscribe_market_data(&[]).await,
            Err(ExchangeError::Validation(_))
        ));
        assert!(matches!(
            stream.subscribe_ohlc(&["TXN".to_string()], &[]).await,
            Err(ExchangeError::Validation(_))
        ));
    }
}
