use crate::core::config::ExchangeConfig;
use crate::exchanges::currencycom::rest::CurrencyComRest;
use crate::exchanges::currencycom::stream::CurrencyComStream;

/// currency.com connector bundling the REST catalog and the streaming client
#[derive(Debug)]
pub struct CurrencyComConnector {
    rest: CurrencyComRest,
    stream: CurrencyComStream,
    config: ExchangeConfig,
}

impl CurrencyComConnector {
    pub fn new(rest: CurrencyComRest, stream: CurrencyComStream, config: ExchangeConfig) -> Self {
        Self {
            rest,
            stream,
            config,
        }
    }

    /// Get the REST client
    pub fn rest(&self) -> &CurrencyComRest {
        &self.rest
    }

    /// Get the streaming client
    pub fn stream(&self) -> &CurrencyComStream {
        &self.stream
    }

    /// Get the current configuration
    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// Check if authentication is available
    pub fn can_authenticate(&self) -> bool {
        self.config.has_credentials()
    }

    /// Adjust the clock offset used for signed timestamps
    pub fn set_time_offset(&self, offset_ms: i64) {
        self.rest.client().set_time_offset(offset_ms);
    }
}
