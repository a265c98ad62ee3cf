use crate::core::errors::ExchangeError;
use crate::core::kernel::Params;
use crate::core::types::{ExpireTimestampType, KlineInterval, NewOrderRespType, OrderType, Side};

fn require_non_empty(field: &str, value: &str) -> Result<(), ExchangeError> {
    if value.trim().is_empty() {
        return Err(ExchangeError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn require_positive(field: &str, value: f64) -> Result<(), ExchangeError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ExchangeError::Validation(format!(
            "{} must be a positive number, got {}",
            field, value
        )));
    }
    Ok(())
}

/// Query for `/api/v2/klines`
#[derive(Debug, Clone)]
pub struct KlinesQuery {
    pub symbol: String,
    pub interval: KlineInterval,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub limit: Option<u32>,
    pub price_type: Option<String>,
    pub kline_type: Option<String>,
}

impl KlinesQuery {
    pub fn new(symbol: impl Into<String>, interval: KlineInterval) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            start_time: None,
            end_time: None,
            limit: None,
            price_type: None,
            kline_type: None,
        }
    }

    pub fn start_time(mut self, start_time: i64) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn end_time(mut self, end_time: i64) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// `bid` or `ask`
    pub fn price_type(mut self, price_type: impl Into<String>) -> Self {
        self.price_type = Some(price_type.into());
        self
    }

    /// Candle type, e.g. `HEIKIN_ASHI`
    pub fn kline_type(mut self, kline_type: impl Into<String>) -> Self {
        self.kline_type = Some(kline_type.into());
        self
    }

    pub(crate) fn to_params(&self) -> Result<Params, ExchangeError> {
        require_non_empty("symbol", &self.symbol)?;
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if start > end {
                return Err(ExchangeError::Validation(format!(
                    "startTime {} is after endTime {}",
                    start, end
                )));
            }
        }

        let mut params = Params::new();
        params
            .set("symbol", &self.symbol)
            .set("interval", self.interval.as_str())
            .set_opt("startTime", self.start_time)
            .set_opt("endTime", self.end_time)
            .set_opt("limit", self.limit)
            .set_opt("priceType", self.price_type.as_deref())
            .set_opt("type", self.kline_type.as_deref());
        Ok(params)
    }
}

/// Order placement for `POST /api/v2/order`
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: f64,
    pub price: Option<f64>,
    pub account_id: Option<i64>,
    pub expire_timestamp: Option<i64>,
    pub guaranteed_stop_loss: Option<bool>,
    pub leverage: Option<i32>,
    pub new_order_resp_type: Option<NewOrderRespType>,
    pub profit_distance: Option<f64>,
    pub stop_distance: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub trailing_stop_loss: Option<bool>,
}

impl NewOrder {
    pub fn new(symbol: impl Into<String>, side: Side, order_type: OrderType, quantity: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type,
            quantity,
            price: None,
            account_id: None,
            expire_timestamp: None,
            guaranteed_stop_loss: None,
            leverage: None,
            new_order_resp_type: None,
            profit_distance: None,
            stop_distance: None,
            stop_loss: None,
            take_profit: None,
            trailing_stop_loss: None,
        }
    }

    pub fn market(symbol: impl Into<String>, side: Side, quantity: f64) -> Self {
        Self::new(symbol, side, OrderType::Market, quantity)
    }

    pub fn limit(symbol: impl Into<String>, side: Side, quantity: f64, price: f64) -> Self {
        Self::new(symbol, side, OrderType::Limit, quantity).price(price)
    }

    pub fn price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn account_id(mut self, account_id: i64) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn expire_timestamp(mut self, expire_timestamp: i64) -> Self {
        self.expire_timestamp = Some(expire_timestamp);
        self
    }

    pub fn guaranteed_stop_loss(mut self, enabled: bool) -> Self {
        self.guaranteed_stop_loss = Some(enabled);
        self
    }

    pub fn leverage(mut self, leverage: i32) -> Self {
        self.leverage = Some(leverage);
        self
    }

    pub fn new_order_resp_type(mut self, resp_type: NewOrderRespType) -> Self {
        self.new_order_resp_type = Some(resp_type);
        self
    }

    pub fn profit_distance(mut self, distance: f64) -> Self {
        self.profit_distance = Some(distance);
        self
    }

    pub fn stop_distance(mut self, distance: f64) -> Self {
        self.stop_distance = Some(distance);
        self
    }

    pub fn stop_loss(mut self, stop_loss: f64) -> Self {
        self.stop_loss = Some(stop_loss);
        self
    }

    pub fn take_profit(mut self, take_profit: f64) -> Self {
        self.take_profit = Some(take_profit);
        self
    }

    pub fn trailing_stop_loss(mut self, enabled: bool) -> Self {
        self.trailing_stop_loss = Some(enabled);
        self
    }

    pub(crate) fn to_params(&self) -> Result<Params, ExchangeError> {
        require_non_empty("symbol", &self.symbol)?;
        require_positive("quantity", self.quantity)?;
        match (self.order_type, self.price) {
            (OrderType::Limit | OrderType::Stop, None) => {
                return Err(ExchangeError::Validation(format!(
                    "{} orders require a price",
                    self.order_type
                )));
            }
            (_, Some(price)) => require_positive("price", price)?,
            (OrderType::Market, None) => {}
        }
        if let Some(leverage) = self.leverage {
            if leverage < 1 {
                return Err(ExchangeError::Validation(format!(
                    "leverage must be at least 1, got {}",
                    leverage
                )));
            }
        }

        let mut params = Params::new();
        params
            .set("symbol", &self.symbol)
            .set("side", self.side.as_str())
            .set("type", self.order_type.as_str())
            .set("quantity", self.quantity)
            .set_opt("price", self.price)
            .set_opt("accountId", self.account_id)
            .set_opt("expireTimestamp", self.expire_timestamp)
            .set_opt("guaranteedStopLoss", self.guaranteed_stop_loss)
            .set_opt("leverage", self.leverage)
            .set_opt("newOrderRespType", self.new_order_resp_type.map(|t| t.as_str()))
            .set_opt("profitDistance", self.profit_distance)
            .set_opt("stopDistance", self.stop_distance)
            .set_opt("stopLoss", self.stop_loss)
            .set_opt("takeProfit", self.take_profit)
            .set_opt("trailingStopLoss", self.trailing_stop_loss);
        Ok(params)
    }
}

/// Amendment of a resting exchange order (`PUT /api/v2/order`)
#[derive(Debug, Clone)]
pub struct EditOrder {
    pub order_id: String,
    pub price: Option<f64>,
    pub expire_timestamp: Option<ExpireTimestampType>,
}

impl EditOrder {
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            price: None,
            expire_timestamp: None,
        }
    }

    pub fn price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn expire_timestamp(mut self, expire: ExpireTimestampType) -> Self {
        self.expire_timestamp = Some(expire);
        self
    }

    pub(crate) fn to_params(&self) -> Result<Params, ExchangeError> {
        require_non_empty("orderId", &self.order_id)?;
        if let Some(price) = self.price {
            require_positive("price", price)?;
        }

        let mut params = Params::new();
        params
            .set("orderId", &self.order_id)
            .set_opt("price", self.price)
            .set_opt("expireTimestamp", self.expire_timestamp.map(|e| e.as_str()));
        Ok(params)
    }
}

/// Protection levels shared by trading-order and position updates
#[derive(Debug, Clone, Default)]
pub struct Protection {
    pub guaranteed_stop_loss: Option<bool>,
    pub profit_distance: Option<f64>,
    pub stop_distance: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub trailing_stop_loss: Option<bool>,
}

impl Protection {
    fn apply(&self, params: &mut Params) {
        params
            .set_opt("guaranteedStopLoss", self.guaranteed_stop_loss)
            .set_opt("profitDistance", self.profit_distance)
            .set_opt("stopDistance", self.stop_distance)
            .set_opt("stopLoss", self.stop_loss)
            .set_opt("takeProfit", self.take_profit)
            .set_opt("trailingStopLoss", self.trailing_stop_loss);
    }
}

/// `POST /api/v2/updateTradingOrder`
#[derive(Debug, Clone)]
pub struct UpdateTradingOrder {
    pub order_id: String,
    pub new_price: Option<f64>,
    pub protection: Protection,
}

impl UpdateTradingOrder {
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            new_price: None,
            protection: Protection::default(),
        }
    }

    pub fn new_price(mut self, price: f64) -> Self {
        self.new_price = Some(price);
        self
    }

    pub fn protection(mut self, protection: Protection) -> Self {
        self.protection = protection;
        self
    }

    pub(crate) fn to_params(&self) -> Result<Params, ExchangeError> {
        require_non_empty("orderId", &self.order_id)?;

        let mut params = Params::new();
        params
            .set("orderId", &self.order_id)
            .set_opt("newPrice", self.new_price);
        self.protection.apply(&mut params);
        Ok(params)
    }
}

/// `POST /api/v2/updateTradingPosition`
#[derive(Debug, Clone)]
pub struct UpdateTradingPosition {
    pub position_id: String,
    pub protection: Protection,
}

impl UpdateTradingPosition {
    pub fn new(position_id: impl Into<String>, protection: Protection) -> Self {
        Self {
            position_id: position_id.into(),
            protection,
        }
    }

    pub(crate) fn to_params(&self) -> Result<Params, ExchangeError> {
        require_non_empty("positionId", &self.position_id)?;

        let mut params = Params::new();
        params.set("positionId", &self.position_id);
        self.protection.apply(&mut params);
        Ok(params)
    }
}

/// Filter for `/api/v2/tradingPositionsHistory`
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub symbol: Option<String>,
    pub limit: Option<u32>,
}

impl HistoryQuery {
    pub(crate) fn to_params(&self) -> Result<Params, ExchangeError> {
        let mut params = Params::new();
        params
            .set_opt("from", self.from)
            .set_opt("to", self.to)
            .set_opt("symbol", self.symbol.as_deref())
            .set_opt("limit", self.limit);
        Ok(params)
    }
}
