use crate::core::errors::ExchangeError;
use crate::core::kernel::{RestClient, RestRequest, SecurityType};
use crate::exchanges::currencycom::requests::{
    EditOrder, HistoryQuery, KlinesQuery, NewOrder, UpdateTradingOrder, UpdateTradingPosition,
};
use crate::exchanges::currencycom::types::{
    Account, CancelOrderResponse, ClosePositionResponse, CreateOrderResponse, DepthResponse,
    EditOrderResponse, ExchangeInfo, FetchOrderResponse, HistoricalPositionsResponse, Kline,
    OpenOrder, TradingPositionsResponse, UpdateResponse,
};
use serde_json::Value;
use tracing::instrument;

/// Thin typed wrapper around `RestClient` for the currency.com API
#[derive(Debug, Clone)]
pub struct CurrencyComRest {
    client: RestClient,
}

impl CurrencyComRest {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    /// Underlying executor, e.g. to adjust the clock offset
    pub fn client(&self) -> &RestClient {
        &self.client
    }

    /// Get exchange information
    #[instrument(skip(self), fields(exchange = "currencycom"))]
    pub async fn exchange_info(&self) -> Result<ExchangeInfo, ExchangeError> {
        self.client
            .execute_json(RestRequest::get("/api/v2/exchange_info", SecurityType::None))
            .await
    }

    /// Get the order book
    #[instrument(skip(self), fields(exchange = "currencycom"))]
    pub async fn depth(
        &self,
        symbol: &str,
        limit: Option<u32>,
    ) -> Result<DepthResponse, ExchangeError> {
        require_field("symbol", symbol)?;
        let request = RestRequest::get("/api/v2/depth", SecurityType::None)
            .param("symbol", symbol)
            .param_opt("limit", limit);
        self.client.execute_json(request).await
    }

    /// Get klines/candlestick data
    #[instrument(skip(self), fields(exchange = "currencycom", symbol = %query.symbol))]
    pub async fn klines(&self, query: &KlinesQuery) -> Result<Vec<Kline>, ExchangeError> {
        let mut request = RestRequest::get("/api/v2/klines", SecurityType::None);
        request.query = query.to_params()?;
        let rows: Vec<Vec<Value>> = self.client.execute_json(request).await?;
        Kline::from_rows(rows)
    }

    /// Get account information
    #[instrument(skip(self), fields(exchange = "currencycom"))]
    pub async fn account(&self) -> Result<Account, ExchangeError> {
        self.client
            .execute_json(RestRequest::get("/api/v2/account", SecurityType::Signed))
            .await
    }

    /// Place an order
    #[instrument(skip(self), fields(exchange = "currencycom", symbol = %order.symbol))]
    pub async fn create_order(&self, order: &NewOrder) -> Result<CreateOrderResponse, ExchangeError> {
        let mut request = RestRequest::post("/api/v2/order", SecurityType::Signed);
        request.query = order.to_params()?;
        self.client.execute_json(request).await
    }

    /// Cancel an order
    #[instrument(skip(self), fields(exchange = "currencycom"))]
    pub async fn cancel_order(
        &self,
        symbol: &str,
        order_id: &str,
    ) -> Result<CancelOrderResponse, ExchangeError> {
        require_field("symbol", symbol)?;
        require_field("orderId", order_id)?;
        let request = RestRequest::delete("/api/v2/order", SecurityType::Signed)
            .param("symbol", symbol)
            .param("orderId", order_id);
        self.client.execute_json(request).await
    }

    /// Amend price or expiry of a resting exchange order
    #[instrument(skip(self), fields(exchange = "currencycom", order_id = %edit.order_id))]
    pub async fn edit_exchange_order(
        &self,
        edit: &EditOrder,
    ) -> Result<EditOrderResponse, ExchangeError> {
        let mut request = RestRequest::put("/api/v2/order", SecurityType::Signed);
        request.query = edit.to_params()?;
        self.client.execute_json(request).await
    }

    #[instrument(skip(self), fields(exchange = "currencycom"))]
    pub async fn fetch_order(
        &self,
        symbol: &str,
        order_id: &str,
    ) -> Result<FetchOrderResponse, ExchangeError> {
        require_field("symbol", symbol)?;
        require_field("orderId", order_id)?;
        let request = RestRequest::get("/api/v2/fetchOrder", SecurityType::Signed)
            .param("symbol", symbol)
            .param("orderId", order_id);
        self.client.execute_json(request).await
    }

    #[instrument(skip(self), fields(exchange = "currencycom"))]
    pub async fn open_orders(&self) -> Result<Vec<OpenOrder>, ExchangeError> {
        self.client
            .execute_json(RestRequest::get("/api/v2/openOrders", SecurityType::Signed))
            .await
    }

    #[instrument(skip(self), fields(exchange = "currencycom", order_id = %update.order_id))]
    pub async fn update_trading_order(
        &self,
        update: &UpdateTradingOrder,
    ) -> Result<UpdateResponse, ExchangeError> {
        let mut request = RestRequest::post("/api/v2/updateTradingOrder", SecurityType::Signed);
        request.query = update.to_params()?;
        self.client.execute_json(request).await
    }

    #[instrument(skip(self), fields(exchange = "currencycom"))]
    pub async fn trading_positions(&self) -> Result<TradingPositionsResponse, ExchangeError> {
        self.client
            .execute_json(RestRequest::get("/api/v2/tradingPositions", SecurityType::Signed))
            .await
    }

    #[instrument(skip(self), fields(exchange = "currencycom"))]
    pub async fn close_trading_position(
        &self,
        position_id: &str,
    ) -> Result<ClosePositionResponse, ExchangeError> {
        require_field("positionId", position_id)?;
        let request = RestRequest::post("/api/v2/closeTradingPosition", SecurityType::Signed)
            .param("positionId", position_id);
        self.client.execute_json(request).await
    }

    #[instrument(skip(self), fields(exchange = "currencycom", position_id = %update.position_id))]
    pub async fn update_trading_position(
        &self,
        update: &UpdateTradingPosition,
    ) -> Result<UpdateResponse, ExchangeError> {
        let mut request = RestRequest::post("/api/v2/updateTradingPosition", SecurityType::Signed);
        request.query = update.to_params()?;
        self.client.execute_json(request).await
    }

    #[instrument(skip(self), fields(exchange = "currencycom"))]
    pub async fn historical_positions(
        &self,
        query: &HistoryQuery,
    ) -> Result<HistoricalPositionsResponse, ExchangeError> {
        let mut request = RestRequest::get("/api/v2/tradingPositionsHistory", SecurityType::Signed);
        request.query = query.to_params()?;
        self.client.execute_json(request).await
    }
}

fn require_field(field: &str, value: &str) -> Result<(), ExchangeError> {
    if value.trim().is_empty() {
        return Err(ExchangeError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kernel::{
        HmacSigner, HttpResponse, HttpTransport, RestClientBuilder, RestClientConfig,
        SignedEnvelope,
    };
    use crate::core::types::Side;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct Canned {
        body: &'static str,
        seen: Mutex<Vec<SignedEnvelope>>,
    }

    #[async_trait]
    impl HttpTransport for Canned {
        async fn send(&self, envelope: &SignedEnvelope) -> Result<HttpResponse, ExchangeError> {
            self.seen.lock().unwrap().push(envelope.clone());
            Ok(HttpResponse {
                status: 200,
                body: self.body.to_string(),
            })
        }
    }

    fn rest(body: &'static str) -> (CurrencyComRest, Arc<Canned>) {
        let transport = Arc::new(Canned {
            body,
            seen: Mutex::new(Vec::new()),
        });
        let client = RestClientBuilder::new(RestClientConfig::new(
            "https://api.example.com".to_string(),
            "currencycom".to_string(),
        ))
        .with_signer(Arc::new(HmacSigner::new("k".to_string(), "s".to_string())))
        .with_transport(transport.clone())
        .build()
        .unwrap();
        (CurrencyComRest::new(client), transport)
    }

    #[tokio::test]
    async fn test_create_order_is_signed_post_with_query_params() {
        let (rest, transport) = rest(r#"{"orderId":"abc","status":"FILLED","side":"BUY"}"#);

        let response = rest
            .create_order(&NewOrder::market("TXN", Side::Buy, 1.0))
            .await
            .unwrap();
        assert_eq!(response.order_id, "abc");
        assert_eq!(response.side, Some(Side::Buy));

        let seen = transport.seen.lock().unwrap();
        let envelope = &seen[0];
        assert_eq!(envelope.method, reqwest::Method::POST);
        assert!(envelope.url.starts_with("https://api.example.com/api/v2/order?quantity=1&side=BUY&symbol=TXN&timestamp="));
        assert!(envelope.query_param("signature").is_some());
        assert!(envelope.body.is_none());
    }

    #[tokio::test]
    async fn test_validation_happens_before_io() {
        let (rest, transport) = rest("{}");

        assert!(matches!(
            rest.cancel_order("TXN", "").await,
            Err(ExchangeError::Validation(_))
        ));
        assert!(matches!(
            rest.depth(" ", None).await,
            Err(ExchangeError::Validation(_))
        ));
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_klines_decode_rows() {
        let (rest, _) = rest(r#"[[1597850940000,139.84,139.87,139.8,139.85,1200]]"#);

        let klines = rest
            .klines(&KlinesQuery::new("TXN", crate::core::types::KlineInterval::Minutes1))
            .await
            .unwrap();
        assert_eq!(klines.len(), 1);
        assert_eq!(klines[0].close, 139.85);
    }

    #[tokio::test]
    async fn test_short_kline_row_fails_decode() {
        let (rest, _) = rest(r#"[[1597850940000,139.84]]"#);

        let result = rest
            .klines(&KlinesQuery::new("TXN", crate::core::types::KlineInterval::Minutes1))
            .await;
        assert!(matches!(result, Err(ExchangeError::Decode(_))));
    }
}
