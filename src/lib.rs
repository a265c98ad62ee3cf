pub mod core;
pub mod exchanges;

pub use core::{config::ExchangeConfig, errors::ExchangeError, types::*};
pub use exchanges::currencycom::{build_connector, CurrencyComConnector};
