/// Kernel - venue-agnostic transport layer
///
/// Everything below this module is transport: parameter encoding, request
/// signing, the REST execution pipeline and the streaming session. Venue
/// specifics (endpoints, payload shapes, destinations) live in `exchanges`.
///
/// ## REST
/// - `Params`: ordered, percent-encoded query/form parameters
/// - `Signer` / `HmacSigner`: HMAC-SHA256 over `query + body`
/// - `RestRequest`: request description with a `SecurityType`
/// - `RestClient`: stamps, signs, dispatches through an `HttpTransport` and
///   decodes error bodies
///
/// ## Streaming
/// - `WsCodec`: venue-specific frame decoding into typed events
/// - `WsSession`: one socket, a single writer task, a reader task, an optional
///   keepalive watchdog and a shutdown coordinator
///
/// # Example
/// ```rust,no_run
/// use currencyx::core::kernel::*;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), currencyx::core::errors::ExchangeError> {
/// let rest_config = RestClientConfig::new(
///     "https://demo-api-adapter.backend.currency.com".to_string(),
///     "currencycom".to_string(),
/// );
/// let rest = RestClientBuilder::new(rest_config)
///     .with_signer(Arc::new(HmacSigner::new("key".to_string(), "secret".to_string())))
///     .build()?;
///
/// let request = RestRequest::get("/api/v2/account", SecurityType::Signed);
/// let body = rest.execute(request).await?;
/// # let _ = body;
/// # Ok(())
/// # }
/// ```
pub mod codec;
pub mod params;
pub mod rest;
pub mod signer;
pub mod ws;

// Re-export key types for convenience
pub use codec::{InboundEnvelope, WsCodec, WsRequest};
pub use params::{ParamValue, Params};
pub use rest::{
    HttpResponse, HttpTransport, ReqwestTransport, RestClient, RestClientBuilder,
    RestClientConfig, RestRequest, SecurityType, SignedEnvelope,
};
pub use signer::{HmacSigner, Signer};
pub use ws::{KeepaliveConfig, SessionState, StopHandle, WsConfig, WsSession};
