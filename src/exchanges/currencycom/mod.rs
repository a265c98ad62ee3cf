pub mod builder;
pub mod codec;
pub mod connector;
pub mod requests;
pub mod rest;
pub mod stream;
pub mod types;

pub const EXCHANGE_NAME: &str = "currencycom";

pub const BASE_URL: &str = "https://api-adapter.backend.currency.com";
pub const DEMO_BASE_URL: &str = "https://demo-api-adapter.backend.currency.com";
pub const WS_URL: &str = "wss://api-adapter.backend.currency.com/connect";
pub const DEMO_WS_URL: &str = "wss://demo-api-adapter.backend.currency.com/connect";

// Re-export main types for easier importing
pub use builder::build_connector;
pub use codec::{CurrencyComCodec, StreamEvent};
pub use connector::CurrencyComConnector;
pub use requests::{
    EditOrder, HistoryQuery, KlinesQuery, NewOrder, Protection, UpdateTradingOrder,
    UpdateTradingPosition,
};
pub use rest::CurrencyComRest;
pub use stream::{CurrencyComStream, MarketDataSession, OhlcSession, TradeSession};
pub use types::{MarketDataEvent, OhlcEvent, TradeEvent};
