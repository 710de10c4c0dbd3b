use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{CloudApi, QuotaSnapshot, SessionFactory, SignResponse};
use crate::accounts::Account;
use crate::error::CheckinError;

/// Scripted `CloudApi` for tests. Quota and sign-in replies are popped in
/// order; an exhausted sign-in script answers "already signed today".
#[derive(Default)]
pub struct ScriptedCloudApi {
    quotas: Mutex<VecDeque<Result<QuotaSnapshot, CheckinError>>>,
    signs: Mutex<VecDeque<Result<SignResponse, CheckinError>>>,
    sign_calls: AtomicUsize,
}

impl ScriptedCloudApi {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_quota(self, reply: Result<QuotaSnapshot, CheckinError>) -> Self {
        self.quotas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
        self
    }

    #[must_use]
    pub fn with_sign(self, reply: Result<SignResponse, CheckinError>) -> Self {
        self.signs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
        self
    }

    pub fn sign_count(&self) -> usize {
        self.sign_calls.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl CloudApi for ScriptedCloudApi {
    async fn quota(&self) -> anyhow::Result<QuotaSnapshot> {
        let next = self
            .quotas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(reply) => reply.map_err(Into::into),
            None => anyhow::bail!("quota script exhausted"),
        }
    }

    async fn sign_in(&self) -> anyhow::Result<SignResponse> {
        self.sign_calls.fetch_add(1, Ordering::Relaxed);
        // Yield so batched calls genuinely interleave.
        tokio::task::yield_now().await;
        let next = self
            .signs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        next.unwrap_or(Ok(SignResponse {
            is_sign: true,
            netdisk_bonus: 0,
        }))
        .map_err(Into::into)
    }
}

/// Hands out pre-built sessions by username and counts `open` calls.
#[derive(Default)]
pub struct ScriptedSessionFactory {
    sessions: Mutex<Vec<(String, Result<Arc<ScriptedCloudApi>, CheckinError>)>>,
    opened: AtomicUsize,
}

impl ScriptedSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session(self, username: &str, api: Arc<ScriptedCloudApi>) -> Self {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((username.to_string(), Ok(api)));
        self
    }

    #[must_use]
    pub fn with_failure(self, username: &str, err: CheckinError) -> Self {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((username.to_string(), Err(err)));
        self
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl SessionFactory for ScriptedSessionFactory {
    async fn open(&self, account: &Account) -> anyhow::Result<Box<dyn CloudApi>> {
        self.opened.fetch_add(1, Ordering::Relaxed);
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        match sessions.iter().find(|(name, _)| *name == account.username) {
            Some((_, Ok(api))) => Ok(Box::new(Arc::clone(api))),
            Some((_, Err(e))) => Err(e.clone().into()),
            None => anyhow::bail!("no scripted session for {}", account.username),
        }
    }
}
