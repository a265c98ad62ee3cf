use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{
    HmacSigner, KeepaliveConfig, RestClientBuilder, RestClientConfig, WsConfig,
};
use crate::exchanges::currencycom::connector::CurrencyComConnector;
use crate::exchanges::currencycom::rest::CurrencyComRest;
use crate::exchanges::currencycom::stream::CurrencyComStream;
use crate::exchanges::currencycom::{
    BASE_URL, DEMO_BASE_URL, DEMO_WS_URL, EXCHANGE_NAME, WS_URL,
};
use std::sync::Arc;

/// REST base URL: explicit override, else the production or demo endpoint
pub fn rest_base_url(config: &ExchangeConfig) -> String {
    config.base_url.clone().unwrap_or_else(|| {
        if config.demo {
            DEMO_BASE_URL.to_string()
        } else {
            BASE_URL.to_string()
        }
    })
}

pub fn ws_url(config: &ExchangeConfig) -> String {
    config.ws_url.clone().unwrap_or_else(|| {
        if config.demo {
            DEMO_WS_URL.to_string()
        } else {
            WS_URL.to_string()
        }
    })
}

pub fn ws_config(config: &ExchangeConfig) -> WsConfig {
    let keepalive = config
        .ws_keepalive
        .then(|| KeepaliveConfig::from_timeout_secs(config.ws_timeout_secs));
    WsConfig::default().with_keepalive(keepalive)
}

/// Build the REST client; credentials are attached only when present
pub fn build_rest(config: &ExchangeConfig) -> Result<CurrencyComRest, ExchangeError> {
    let rest_config = RestClientConfig::new(rest_base_url(config), EXCHANGE_NAME.to_string())
        .with_timeout(30)
        .with_recv_window(config.recv_window);

    let mut rest_builder =
        RestClientBuilder::new(rest_config).with_time_offset(config.time_offset_ms);

    if config.has_credentials() {
        let signer = Arc::new(HmacSigner::new(
            config.api_key().to_string(),
            config.secret_key().to_string(),
        ));
        rest_builder = rest_builder.with_signer(signer);
    }

    Ok(CurrencyComRest::new(rest_builder.build()?))
}

/// Create a currency.com connector with REST and streaming support
pub fn build_connector(config: ExchangeConfig) -> Result<CurrencyComConnector, ExchangeError> {
    let rest = build_rest(&config)?;
    let stream = CurrencyComStream::new(ws_url(&config), ws_config(&config));
    Ok(CurrencyComConnector::new(rest, stream, config))
}
