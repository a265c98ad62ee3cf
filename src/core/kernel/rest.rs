use crate::core::errors::ExchangeError;
use crate::core::kernel::params::{ParamValue, Params};
use crate::core::kernel::signer::{Signer, API_KEY_HEADER};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, trace};

const TIMESTAMP_KEY: &str = "timestamp";
const SIGNATURE_KEY: &str = "signature";
const RECV_WINDOW_KEY: &str = "recvWindow";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Credentials and signature policy of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityType {
    /// Public endpoint, nothing attached
    None,
    /// API key header only
    ApiKey,
    /// API key header, timestamp and HMAC signature
    Signed,
}

/// Description of a single REST call before it is resolved into wire form
#[derive(Debug, Clone)]
pub struct RestRequest {
    pub method: Method,
    pub endpoint: String,
    pub query: Params,
    pub form: Params,
    pub headers: HashMap<String, String>,
    pub security: SecurityType,
    pub recv_window: Option<u64>,
}

impl RestRequest {
    pub fn new(method: Method, endpoint: impl Into<String>, security: SecurityType) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Params::new(),
            form: Params::new(),
            headers: HashMap::new(),
            security,
            recv_window: None,
        }
    }

    pub fn get(endpoint: impl Into<String>, security: SecurityType) -> Self {
        Self::new(Method::GET, endpoint, security)
    }

    pub fn post(endpoint: impl Into<String>, security: SecurityType) -> Self {
        Self::new(Method::POST, endpoint, security)
    }

    pub fn put(endpoint: impl Into<String>, security: SecurityType) -> Self {
        Self::new(Method::PUT, endpoint, security)
    }

    pub fn delete(endpoint: impl Into<String>, security: SecurityType) -> Self {
        Self::new(Method::DELETE, endpoint, security)
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.query.set(key, value);
        self
    }

    /// Add a query parameter when the value is present
    pub fn param_opt<V: Into<ParamValue>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.query.set_opt(key, value);
        self
    }

    /// Add a form (body) parameter
    pub fn form_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.form.set(key, value);
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_recv_window(mut self, recv_window: u64) -> Self {
        self.recv_window = Some(recv_window);
        self
    }

    fn validate(&self) -> Result<(), ExchangeError> {
        if self.endpoint.trim_matches('/').is_empty() {
            return Err(ExchangeError::Validation("endpoint is empty".to_string()));
        }
        for params in [&self.query, &self.form] {
            if params.contains(SIGNATURE_KEY) {
                return Err(ExchangeError::Validation(
                    "'signature' is set by the client and cannot be supplied".to_string(),
                ));
            }
            if self.security == SecurityType::Signed && params.contains(TIMESTAMP_KEY) {
                return Err(ExchangeError::Validation(
                    "'timestamp' is set at execution time for signed requests".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Fully resolved request as handed to the transport
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    pub method: Method,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

impl SignedEnvelope {
    /// Query string of the resolved URL, empty when there is none
    pub fn query_string(&self) -> &str {
        self.url.split_once('?').map_or("", |(_, q)| q)
    }

    /// Value of a query parameter in the resolved URL (not percent-decoded)
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query_string()
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }
}

/// Raw HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Transport abstraction used by the executor
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform the request. Only connection-level failures are errors here;
    /// HTTP error statuses come back as a normal response.
    async fn send(&self, envelope: &SignedEnvelope) -> Result<HttpResponse, ExchangeError>;
}

/// Configuration for the REST client
#[derive(Clone, Debug)]
pub struct RestClientConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Exchange name for logging and tracing
    pub exchange_name: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string to include in requests
    pub user_agent: String,
    /// Receive window applied to requests that don't set their own
    pub recv_window: Option<u64>,
}

impl RestClientConfig {
    /// Create a new configuration
    ///
    /// # Arguments
    /// * `base_url` - Base URL for the API
    /// * `exchange_name` - Name of the exchange
    pub fn new(base_url: String, exchange_name: String) -> Self {
        Self {
            base_url,
            exchange_name,
            timeout_seconds: 30,
            user_agent: "currencyx/0.1".to_string(),
            recv_window: None,
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Set the default receive window
    pub fn with_recv_window(mut self, recv_window: Option<u64>) -> Self {
        self.recv_window = recv_window;
        self
    }
}

/// `HttpTransport` backed by reqwest
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &RestClientConfig) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ExchangeError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, envelope: &SignedEnvelope) -> Result<HttpResponse, ExchangeError> {
        let mut request = self.client.request(envelope.method.clone(), &envelope.url);
        for (key, value) in &envelope.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &envelope.body {
            request = request.body(body.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(format!("Request failed: {}", e)))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::Transport(format!("Failed to read response body: {}", e)))?;

        Ok(HttpResponse { status, body })
    }
}

/// Builder for creating REST client instances
pub struct RestClientBuilder {
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
    transport: Option<Arc<dyn HttpTransport>>,
    time_offset_ms: i64,
}

impl RestClientBuilder {
    /// Create a new builder with the given configuration
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            config,
            signer: None,
            transport: None,
            time_offset_ms: 0,
        }
    }

    /// Set the signer for authenticated requests
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Replace the default reqwest transport
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Offset (ms) subtracted from the local clock for signed timestamps
    pub fn with_time_offset(mut self, offset_ms: i64) -> Self {
        self.time_offset_ms = offset_ms;
        self
    }

    /// Build the REST client
    pub fn build(self) -> Result<RestClient, ExchangeError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.config)?),
        };

        Ok(RestClient {
            config: self.config,
            signer: self.signer,
            transport,
            time_offset_ms: Arc::new(AtomicI64::new(self.time_offset_ms)),
        })
    }
}

/// Request executor: encodes, stamps, signs, dispatches and decodes.
///
/// Clones share the transport, credentials and clock offset.
#[derive(Clone)]
pub struct RestClient {
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
    transport: Arc<dyn HttpTransport>,
    time_offset_ms: Arc<AtomicI64>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("config", &self.config)
            .field("has_signer", &self.signer.is_some())
            .field("time_offset_ms", &self.time_offset())
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

impl RestClient {
    pub fn config(&self) -> &RestClientConfig {
        &self.config
    }

    pub fn has_signer(&self) -> bool {
        self.signer.is_some()
    }

    /// Clock offset (ms) between the local clock and the venue
    pub fn time_offset(&self) -> i64 {
        self.time_offset_ms.load(Ordering::Relaxed)
    }

    pub fn set_time_offset(&self, offset_ms: i64) {
        self.time_offset_ms.store(offset_ms, Ordering::Relaxed);
    }

    fn timestamp(&self) -> i64 {
        chrono::Utc::now().timestamp_millis() - self.time_offset()
    }

    fn build_url(&self, endpoint: &str, query_string: &str) -> String {
        let mut url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );
        if !query_string.is_empty() {
            url.push('?');
            url.push_str(query_string);
        }
        url
    }

    /// Resolve a request into its wire form without sending it
    pub fn prepare(&self, mut request: RestRequest) -> Result<SignedEnvelope, ExchangeError> {
        request.validate()?;

        let signer = match request.security {
            SecurityType::None => None,
            SecurityType::ApiKey | SecurityType::Signed => Some(
                self.signer
                    .as_ref()
                    .ok_or(ExchangeError::AuthenticationRequired)?,
            ),
        };

        if let Some(recv_window) = request.recv_window.or(self.config.recv_window) {
            request.query.set(RECV_WINDOW_KEY, recv_window);
        }
        if request.security == SecurityType::Signed {
            request.query.set(TIMESTAMP_KEY, self.timestamp());
        }

        let mut query_string = request.query.encode()?;
        let body = request.form.encode()?;

        let mut headers = request.headers;
        if !body.is_empty() {
            headers.insert("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string());
        }
        if let Some(signer) = signer {
            headers.insert(API_KEY_HEADER.to_string(), signer.api_key().to_string());

            if request.security == SecurityType::Signed {
                let signature = signer.sign(&query_string, &body)?;
                if !query_string.is_empty() {
                    query_string.push('&');
                }
                query_string.push_str(SIGNATURE_KEY);
                query_string.push('=');
                query_string.push_str(&signature);
            }
        }

        Ok(SignedEnvelope {
            method: request.method,
            url: self.build_url(&request.endpoint, &query_string),
            headers,
            body: (!body.is_empty()).then_some(body),
        })
    }

    /// Execute a request and return the raw response body
    #[instrument(skip(self, request), fields(exchange = %self.config.exchange_name, method = %request.method, endpoint = %request.endpoint))]
    pub async fn execute(&self, request: RestRequest) -> Result<String, ExchangeError> {
        let envelope = self.prepare(request)?;
        debug!("Request: {} {}", envelope.method, envelope.url);

        let response = self.transport.send(&envelope).await?;
        trace!(status = response.status, "Response body: {}", response.body);

        if response.status >= 400 {
            return Err(decode_api_error(response.status, &response.body));
        }
        Ok(response.body)
    }

    /// Execute a request and deserialize the response body
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RestRequest,
    ) -> Result<T, ExchangeError> {
        let body = self.execute(request).await?;
        serde_json::from_str(&body)
            .map_err(|e| ExchangeError::Decode(format!("Failed to deserialize response: {}", e)))
    }
}

/// Map an HTTP error status and body to `ExchangeError::ApiError`.
///
/// An unparsable body still yields an error keyed on the status.
pub fn decode_api_error(status: u16, body: &str) -> ExchangeError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => ExchangeError::ApiError {
            status,
            code: Some(parsed.code),
            message: parsed.msg,
        },
        Err(e) => {
            debug!("Failed to parse error message: {}", e);
            ExchangeError::ApiError {
                status,
                code: None,
                message: body.to_string(),
            }
        }
    }
}
