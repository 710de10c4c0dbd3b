//! The one place HTTP clients are built.
//!
//! Every session asks a [`TransportFactory`] for its `reqwest::Client`; the
//! auth strategy decides which identity headers are baked in. Nothing
//! downstream patches headers or login behavior after construction.

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};

use crate::auth::{AuthStrategy, SessionTokens};

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ACCEPT_JSON: &str = "application/json;charset=UTF-8";
const CONNECT_TIMEOUT_SECS: u64 = 10;

pub trait TransportFactory: Send + Sync {
    /// Build a client whose default headers carry the session identity.
    ///
    /// # Errors
    ///
    /// Returns an error if a header value is invalid or the client cannot be built.
    fn build(
        &self,
        strategy: &AuthStrategy,
        tokens: Option<&SessionTokens>,
    ) -> anyhow::Result<reqwest::Client>;
}

/// Production transport: fixed browser headers, cookie identity, request timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    referer: String,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            referer: format!("{}/", base_url.trim_end_matches('/')),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

impl TransportFactory for ReqwestTransport {
    fn build(
        &self,
        strategy: &AuthStrategy,
        tokens: Option<&SessionTokens>,
    ) -> anyhow::Result<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT_JSON));
        headers.insert(
            header::REFERER,
            HeaderValue::from_str(&self.referer)
                .map_err(|e| anyhow::anyhow!("invalid referer {:?}: {e}", self.referer))?,
        );
        if let Some(cookie) = identity_cookie(strategy, tokens) {
            let mut value = HeaderValue::from_str(cookie)
                .map_err(|_| anyhow::anyhow!("cookie contains characters not allowed in a header"))?;
            value.set_sensitive(true);
            headers.insert(header::COOKIE, value);
        }
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(self.timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| anyhow::anyhow!("could not build HTTP client: {e}"))
    }
}

/// The injected cookie always wins; credential sessions use the cached one.
fn identity_cookie<'a>(
    strategy: &'a AuthStrategy,
    tokens: Option<&'a SessionTokens>,
) -> Option<&'a str> {
    match strategy {
        AuthStrategy::PreSharedCookie(cookie) => Some(cookie.as_str()),
        AuthStrategy::CredentialLogin => tokens.and_then(|t| t.cookie.as_deref()),
    }
}
