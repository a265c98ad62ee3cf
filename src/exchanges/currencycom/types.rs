use crate::core::errors::ExchangeError;
use crate::core::types::{OrderStatus, OrderType, Side, TimeInForce};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// REST DTOs decode leniently: fields the venue omits fall back to defaults.

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExchangeFilter {
    pub filter_type: String,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RateLimit {
    pub interval: String,
    pub interval_num: i32,
    pub limit: i32,
    pub rate_limit_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub name: String,
    pub status: String,
    pub asset_type: String,
    pub market_type: String,
    pub market_modes: Vec<String>,
    pub base_asset: String,
    pub base_asset_precision: i32,
    pub quote_asset: String,
    pub quote_asset_id: String,
    pub quote_precision: i32,
    pub order_types: Vec<String>,
    pub filters: Vec<ExchangeFilter>,
    pub tick_size: f64,
    pub tick_value: f64,
    pub exchange_fee: f64,
    pub maker_fee: f64,
    pub taker_fee: f64,
    pub trading_fee: f64,
    pub long_rate: f64,
    pub short_rate: f64,
    #[serde(rename = "maxSLGap")]
    pub max_sl_gap: f64,
    #[serde(rename = "maxTPGap")]
    pub max_tp_gap: f64,
    #[serde(rename = "minSLGap")]
    pub min_sl_gap: f64,
    #[serde(rename = "minTPGap")]
    pub min_tp_gap: f64,
    pub swap_charge_interval: i64,
    pub trading_hours: String,
    pub country: String,
    pub industry: String,
    pub sector: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExchangeInfo {
    pub timezone: String,
    pub server_time: i64,
    pub rate_limits: Vec<RateLimit>,
    pub exchange_filters: Vec<ExchangeFilter>,
    pub symbols: Vec<SymbolInfo>,
}

/// One side of the book at a single price
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLevel {
    pub price: f64,
    pub quantity: f64,
}

impl<'de> Deserialize<'de> for PriceLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (price, quantity): (NumberOrString, NumberOrString) =
            Deserialize::deserialize(deserializer)?;
        Ok(Self {
            price: price.to_f64().map_err(serde::de::Error::custom)?,
            quantity: quantity.to_f64().map_err(serde::de::Error::custom)?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DepthResponse {
    pub last_update_id: i64,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

/// Candle decoded from the positional `[openTime, open, high, low, close, volume, ..]` array
#[derive(Debug, Clone, PartialEq)]
pub struct Kline {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

impl NumberOrString {
    fn to_f64(&self) -> Result<f64, String> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| format!("'{}' is not a number", s)),
        }
    }
}

impl Kline {
    pub fn from_row(row: &[Value]) -> Result<Self, ExchangeError> {
        if row.len() < 6 {
            return Err(ExchangeError::Decode(format!(
                "invalid kline data: expected at least 6 fields, got {}",
                row.len()
            )));
        }

        let number = |idx: usize| -> Result<f64, ExchangeError> {
            NumberOrString::deserialize(&row[idx])
                .map_err(|e| ExchangeError::Decode(format!("kline field {}: {}", idx, e)))?
                .to_f64()
                .map_err(|e| ExchangeError::Decode(format!("kline field {}: {}", idx, e)))
        };

        let open_time = row[0].as_i64().ok_or_else(|| {
            ExchangeError::Decode(format!("kline open time is not an integer: {}", row[0]))
        })?;

        Ok(Self {
            open_time,
            open: number(1)?,
            high: number(2)?,
            low: number(3)?,
            close: number(4)?,
            volume: number(5)?,
        })
    }

    pub fn from_rows(rows: Vec<Vec<Value>>) -> Result<Vec<Self>, ExchangeError> {
        rows.iter().map(|row| Self::from_row(row)).collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Balance {
    pub account_id: String,
    pub asset: String,
    pub free: f64,
    pub locked: f64,
    pub collateral_currency: bool,
    pub default: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Account {
    pub affiliate_id: String,
    pub user_id: i64,
    pub update_time: i64,
    pub can_trade: bool,
    pub can_deposit: bool,
    pub can_withdraw: bool,
    pub maker_commission: f64,
    pub taker_commission: f64,
    pub buyer_commission: f64,
    pub seller_commission: f64,
    pub balances: Vec<Balance>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub symbol: String,
    pub side: Option<Side>,
    #[serde(rename = "type")]
    pub order_type: Option<OrderType>,
    pub status: Option<OrderStatus>,
    pub time_in_force: Option<TimeInForce>,
    pub price: String,
    pub orig_qty: String,
    pub executed_qty: String,
    pub margin: f64,
    pub expire_timestamp: i64,
    pub transact_time: i64,
    pub guaranteed_stop_loss: bool,
    pub trailing_stop_loss: bool,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub stop_distance: f64,
    pub profit_distance: f64,
    pub reject_message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CancelOrderResponse {
    pub order_id: String,
    pub symbol: String,
    pub side: Option<Side>,
    #[serde(rename = "type")]
    pub order_type: Option<OrderType>,
    pub status: Option<OrderStatus>,
    pub time_in_force: Option<TimeInForce>,
    pub price: String,
    pub orig_qty: String,
    pub executed_qty: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditOrderResponse {
    pub order_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OpenOrder {
    pub account_id: String,
    pub order_id: String,
    pub symbol: String,
    pub side: Option<Side>,
    #[serde(rename = "type")]
    pub order_type: Option<OrderType>,
    pub status: Option<OrderStatus>,
    pub time_in_force: Option<TimeInForce>,
    pub price: String,
    pub orig_qty: String,
    pub executed_qty: String,
    pub iceberg_qty: String,
    pub leverage: bool,
    pub margin: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub guaranteed_stop_loss: bool,
    pub trailing_stop_loss: bool,
    pub working: bool,
    pub time: i64,
    pub update_time: i64,
    pub expire_timestamp: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FetchOrderResponse {
    pub account_id: String,
    pub order_id: String,
    pub side: Option<Side>,
    #[serde(rename = "type")]
    pub order_type: Option<OrderType>,
    pub status: Option<OrderStatus>,
    pub time_in_force_type: Option<TimeInForce>,
    pub price: f64,
    pub quantity: f64,
    pub exec_price: f64,
    pub exec_quantity: f64,
    pub margin: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub guaranteed_stop_loss: bool,
    pub trailing_stop_loss: bool,
    pub expire_time: i64,
    pub timestamp: i64,
    pub reject_reason: String,
}

/// Acknowledgement returned by the asynchronous update endpoints
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateResponse {
    pub request_id: i64,
    pub state: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TradingPosition {
    pub id: String,
    pub account_id: String,
    pub instrument_id: i64,
    pub order_id: String,
    pub symbol: String,
    pub currency: String,
    pub state: String,
    #[serde(rename = "type")]
    pub position_type: String,
    pub open_price: f64,
    pub open_quantity: f64,
    pub open_timestamp: i64,
    pub close_price: f64,
    pub close_quantity: f64,
    pub close_timestamp: i64,
    pub created_timestamp: i64,
    pub cost: f64,
    pub fee: f64,
    pub margin: f64,
    pub dividend: f64,
    pub swap: f64,
    pub swap_converted: f64,
    pub rpl: f64,
    pub rpl_converted: f64,
    pub upl: f64,
    pub upl_converted: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub guaranteed_stop_loss: bool,
    pub trailing_stop_loss: bool,
    pub current_trailing_price: f64,
    // venue spelling
    #[serde(rename = "currenTrailingPriceUpdatedTimestamp")]
    pub current_trailing_price_updated_timestamp: i64,
    pub trailing_quoted_price: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TradingPositionsResponse {
    pub positions: Vec<TradingPosition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PositionRequest {
    pub id: i64,
    pub account_id: String,
    pub order_id: String,
    pub position_id: String,
    pub rq_type: String,
    pub state: String,
    pub created_timestamp: i64,
    pub reject_reason: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClosePositionResponse {
    pub request: Vec<PositionRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeeDetails {
    pub commission: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoricalPosition {
    pub position_id: String,
    pub account_id: i64,
    pub account_currency: String,
    pub instrument_id: i64,
    pub symbol: String,
    pub currency: String,
    pub exec_id: String,
    pub execution_type: String,
    pub exec_timestamp: i64,
    pub created_timestamp: i64,
    pub price: f64,
    pub quantity: f64,
    pub fee: f64,
    pub fee_details: FeeDetails,
    pub fx_rate: f64,
    pub rpl: f64,
    pub rpl_converted: f64,
    pub swap: f64,
    pub swap_converted: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    #[serde(rename = "gSL")]
    pub guaranteed_stop_loss: bool,
    pub trailing_stop_loss: bool,
    pub source: String,
    pub status: String,
    pub reject_reason: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HistoricalPositionsResponse {
    pub history: Vec<HistoricalPosition>,
}

// Stream events are strict: a missing or mistyped field rejects the frame.

/// Best bid/offer update from `internal.quote`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDataEvent {
    pub symbol_name: String,
    pub bid: f64,
    pub ofr: f64,
    pub bid_qty: f64,
    pub ofr_qty: f64,
    pub timestamp: i64,
}

/// Candle update from `ohlc.event`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcEvent {
    pub symbol: String,
    pub interval: String,
    #[serde(rename = "t")]
    pub timestamp: i64,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
}

/// Public trade print from `internal.trade`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeEvent {
    pub symbol: String,
    pub price: f64,
    pub size: f64,
    pub id: i64,
    pub ts: i64,
    pub buyer: bool,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub client_order_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_depth_levels_from_pairs() {
        let depth: DepthResponse = serde_json::from_value(json!({
            "lastUpdateId": 7,
            "bids": [[139.85, 2500.0]],
            "asks": [["139.92", "100"]]
        }))
        .unwrap();

        assert_eq!(depth.last_update_id, 7);
        assert_eq!(depth.bids[0], PriceLevel { price: 139.85, quantity: 2500.0 });
        assert_eq!(depth.asks[0], PriceLevel { price: 139.92, quantity: 100.0 });
    }

    #[test]
    fn test_kline_rows() {
        let rows: Vec<Vec<Value>> = serde_json::from_value(json!([
            [1597850940000_i64, 139.84, "139.87", 139.8, 139.85, 1200],
            [1597851000000_i64, 139.85, 139.9, 139.82, 139.88, 900, "extra"]
        ]))
        .unwrap();

        let klines = Kline::from_rows(rows).unwrap();
        assert_eq!(klines.len(), 2);
        assert_eq!(klines[0].open_time, 1597850940000);
        assert_eq!(klines[0].high, 139.87);
        assert_eq!(klines[1].volume, 900.0);
    }

    #[test]
    fn test_short_kline_row_is_rejected() {
        let row = vec![json!(1), json!(2), json!(3)];
        assert!(matches!(Kline::from_row(&row), Err(ExchangeError::Decode(_))));
    }

    #[test]
    fn test_account_tolerates_missing_fields() {
        let account: Account = serde_json::from_value(json!({
            "canTrade": true,
            "balances": [{"asset": "USD", "free": 10.5}]
        }))
        .unwrap();
        assert!(account.can_trade);
        assert_eq!(account.balances[0].free, 10.5);
        assert_eq!(account.balances[0].locked, 0.0);
    }

    #[test]
    fn test_trade_event_optional_ids() {
        let trade: TradeEvent = serde_json::from_value(json!({
            "symbol": "TXN", "price": 139.9, "size": 3.0, "id": 11,
            "ts": 1597850971558_i64, "buyer": true
        }))
        .unwrap();
        assert_eq!(trade.order_id, None);

        let missing_price = serde_json::from_value::<TradeEvent>(json!({
            "symbol": "TXN", "size": 3.0, "id": 11, "ts": 1, "buyer": true
        }));
        assert!(missing_price.is_err());
    }
}
