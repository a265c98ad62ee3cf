use crate::core::errors::ExchangeError;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the API key on every classified request
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// Signer trait for request authentication
///
/// Implementations own the credentials for the lifetime of the client. The
/// API key is transmitted; the secret never leaves the signer.
pub trait Signer: Send + Sync {
    /// API key sent in the `X-MBX-APIKEY` header
    fn api_key(&self) -> &str;

    /// Sign the encoded query and body
    ///
    /// # Arguments
    /// * `query_string` - Encoded query string (without leading '?'), including `timestamp`
    /// * `body` - Encoded form body, empty when the request has none
    ///
    /// # Returns
    /// Lower-case hex signature to append as the `signature` query parameter
    fn sign(&self, query_string: &str, body: &str) -> Result<String, ExchangeError>;
}

/// HMAC-SHA256 signer holding the venue credentials
pub struct HmacSigner {
    api_key: Secret<String>,
    secret_key: Secret<String>,
}

impl HmacSigner {
    /// Create a new HMAC signer
    ///
    /// # Arguments
    /// * `api_key` - API key from the exchange
    /// * `secret_key` - Secret key for signing
    pub fn new(api_key: String, secret_key: String) -> Self {
        Self {
            api_key: Secret::new(api_key),
            secret_key: Secret::new(secret_key),
        }
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner")
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl Signer for HmacSigner {
    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    fn sign(&self, query_string: &str, body: &str) -> Result<String, ExchangeError> {
        sign_payload(self.secret_key.expose_secret(), query_string, body)
    }
}

/// HMAC-SHA256 over `query_string + body` (no separator), hex encoded.
pub fn sign_payload(secret: &str, query_string: &str, body: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::AuthError(format!("Invalid secret key: {}", e)))?;
    mac.update(query_string.as_bytes());
    mac.update(body.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
