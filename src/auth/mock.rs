use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Authenticator, SessionTokens};
use crate::accounts::Account;

/// Authenticator for tests: hands out fixed tokens (or always fails) and
/// counts every login attempt.
pub struct CountingAuthenticator {
    tokens: Option<SessionTokens>,
    calls: AtomicUsize,
}

impl CountingAuthenticator {
    pub const fn new(tokens: SessionTokens) -> Self {
        Self {
            tokens: Some(tokens),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every login is rejected.
    pub const fn failing() -> Self {
        Self {
            tokens: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn login_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Authenticator for CountingAuthenticator {
    async fn login(&self, account: &Account) -> anyhow::Result<SessionTokens> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match &self.tokens {
            Some(tokens) => Ok(tokens.clone()),
            None => anyhow::bail!("login rejected for {}", account.label()),
        }
    }
}
