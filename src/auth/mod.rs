pub mod mock;
pub mod token_store;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::accounts::Account;
use crate::error::CheckinError;

/// How a session proves its identity to the web API.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Use cached tokens and fall back to the [`Authenticator`] when they are rejected.
    CredentialLogin,
    /// Send a captured browser cookie on every request; never log in.
    PreSharedCookie(String),
}

// Manual Debug impl to redact the cookie
impl fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CredentialLogin => write!(f, "CredentialLogin"),
            Self::PreSharedCookie(_) => write!(f, "PreSharedCookie([REDACTED])"),
        }
    }
}

impl AuthStrategy {
    /// A configured cookie always wins over the password.
    pub fn for_account(account: &Account) -> Self {
        account
            .cookie()
            .map_or(Self::CredentialLogin, |c| Self::PreSharedCookie(c.to_string()))
    }

    pub const fn allows_login(&self) -> bool {
        matches!(self, Self::CredentialLogin)
    }
}

/// Session material cached per username between runs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

// Manual Debug impl to redact every secret
impl fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokens")
            .field("cookie", &self.cookie.as_ref().map(|_| "[REDACTED]"))
            .field("session_key", &self.session_key.as_ref().map(|_| "[REDACTED]"))
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl SessionTokens {
    pub fn from_cookie(cookie: &str) -> Self {
        Self {
            cookie: Some(cookie.to_string()),
            ..Self::default()
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }

    /// Usable for requests: something to authenticate with and not expired.
    pub fn is_usable(&self) -> bool {
        (self.cookie.is_some() || self.session_key.is_some()) && !self.is_expired()
    }
}

/// Obtains fresh session tokens for an account.
///
/// This is the seam for the interactive password-login protocol, which lives
/// outside this crate.
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, account: &Account) -> anyhow::Result<SessionTokens>;
}

/// Login guard installed in cookie mode: any login attempt means the
/// server rejected the cookie, so it fails instead of retrying.
pub struct CookieGuard;

#[async_trait::async_trait]
impl Authenticator for CookieGuard {
    async fn login(&self, account: &Account) -> anyhow::Result<SessionTokens> {
        tracing::error!(
            "login was triggered for {}: the server rejected the injected cookie",
            account.label()
        );
        Err(CheckinError::CookieExpired.into())
    }
}

/// Default authenticator for credential accounts when no password-login
/// implementation is plugged in: sessions come only from the token cache.
pub struct CacheOnly;

#[async_trait::async_trait]
impl Authenticator for CacheOnly {
    async fn login(&self, account: &Account) -> anyhow::Result<SessionTokens> {
        anyhow::bail!(
            "no usable cached session for {} and password login is not available; \
             add a `cookie` for this account",
            account.label()
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn account(cookie: Option<&str>) -> Account {
        Account {
            username: "13800000000".to_string(),
            password: "pw".to_string(),
            cookie: cookie.map(str::to_string),
        }
    }

    #[test]
    fn cookie_selects_pre_shared_strategy() {
        let strategy = AuthStrategy::for_account(&account(Some(" SSON=1 ")));
        assert_eq!(strategy, AuthStrategy::PreSharedCookie("SSON=1".to_string()));
        assert!(!strategy.allows_login());
    }

    #[test]
    fn password_only_selects_credential_login() {
        let strategy = AuthStrategy::for_account(&account(None));
        assert_eq!(strategy, AuthStrategy::CredentialLogin);
        assert!(strategy.allows_login());
    }

    #[test]
    fn strategy_debug_redacts_cookie() {
        let debug = format!("{:?}", AuthStrategy::PreSharedCookie("secret".to_string()));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn tokens_expiry() {
        let mut tokens = SessionTokens::from_cookie("c=1");
        assert!(tokens.is_usable());
        tokens.expires_at = Some(Utc::now() - chrono::Duration::seconds(5));
        assert!(tokens.is_expired());
        assert!(!tokens.is_usable());
        assert!(!SessionTokens::default().is_usable());
    }

    #[test]
    fn tokens_skip_empty_fields_when_serialized() {
        let json = serde_json::to_string(&SessionTokens::from_cookie("c=1")).unwrap();
        assert_eq!(json, r#"{"cookie":"c=1"}"#);
    }

    #[tokio::test]
    async fn cookie_guard_always_fails_with_cookie_expired() {
        let err = CookieGuard.login(&account(Some("c=1"))).await.unwrap_err();
        assert_eq!(
            crate::error::classify(&err),
            crate::error::ErrorKind::CookieExpired
        );
    }

    #[tokio::test]
    async fn cache_only_login_explains_itself() {
        let err = CacheOnly.login(&account(None)).await.unwrap_err();
        assert!(err.to_string().contains("cookie"));
    }
}
