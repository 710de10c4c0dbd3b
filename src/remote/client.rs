use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;

use super::transport::TransportFactory;
use super::{CloudApi, QuotaSnapshot, SessionFactory, SignResponse, UserSizeInfo};
use crate::accounts::Account;
use crate::auth::token_store::FileTokenStore;
use crate::auth::{AuthStrategy, Authenticator, CookieGuard, SessionTokens};
use crate::error::{self, CheckinError, ErrorKind};

const USER_SIZE_INFO_PATH: &str = "/api/portal/getUserSizeInfo.action";
const USER_SIGN_PATH: &str = "/mkt/userSign.action";

struct Session {
    http: reqwest::Client,
    tokens: Option<SessionTokens>,
    /// Bumped on every login attempt so concurrent callers log in only once.
    generation: u64,
    /// Set by the first failed login; later callers get it back instead of
    /// asking the authenticator again.
    login_failure: Option<LoginFailure>,
}

/// A failed login kept so it can be replayed with the same classification.
struct LoginFailure {
    typed: Option<CheckinError>,
    message: String,
}

impl LoginFailure {
    fn capture(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");
        let typed = match error::classify(err) {
            ErrorKind::CookieExpired => Some(CheckinError::CookieExpired),
            ErrorKind::Connectivity => Some(CheckinError::Connectivity(message.clone())),
            ErrorKind::Http { status, body } => Some(CheckinError::Http { status, body }),
            ErrorKind::InvalidSession { status, body } => {
                Some(CheckinError::InvalidSession { status, body })
            }
            ErrorKind::Unexpected => None,
        };
        Self { typed, message }
    }

    fn replay(&self) -> anyhow::Error {
        match &self.typed {
            Some(e) => anyhow::Error::new(e.clone()).context("login already failed for this session"),
            None => anyhow::anyhow!("login already failed for this session: {}", self.message),
        }
    }
}

/// A Cloud189 web session for one account.
pub struct HttpCloudClient {
    account: Account,
    strategy: AuthStrategy,
    base_url: String,
    transport: Arc<dyn TransportFactory>,
    authenticator: Arc<dyn Authenticator>,
    store: FileTokenStore,
    session: Mutex<Session>,
    login_lock: tokio::sync::Mutex<()>,
    logins: AtomicU64,
    persisted: AtomicBool,
}

impl HttpCloudClient {
    /// Open a session. In cookie mode the given authenticator is replaced by
    /// [`CookieGuard`]. Credential sessions start from the token cache and log
    /// in up front when the cache holds nothing usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be built or the initial login fails.
    pub async fn connect(
        account: &Account,
        base_url: &str,
        store: FileTokenStore,
        transport: Arc<dyn TransportFactory>,
        authenticator: Arc<dyn Authenticator>,
    ) -> anyhow::Result<Self> {
        let strategy = AuthStrategy::for_account(account);
        let authenticator: Arc<dyn Authenticator> = if strategy.allows_login() {
            authenticator
        } else {
            Arc::new(CookieGuard)
        };
        let cached = match strategy {
            AuthStrategy::CredentialLogin => store.load().filter(SessionTokens::is_usable),
            AuthStrategy::PreSharedCookie(_) => None,
        };
        let needs_login = strategy.allows_login() && cached.is_none();
        let http = transport.build(&strategy, cached.as_ref())?;
        let client = Self {
            account: account.clone(),
            strategy,
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
            authenticator,
            store,
            session: Mutex::new(Session {
                http,
                tokens: cached,
                generation: 0,
                login_failure: None,
            }),
            login_lock: tokio::sync::Mutex::new(()),
            logins: AtomicU64::new(0),
            persisted: AtomicBool::new(false),
        };
        if needs_login {
            tracing::debug!("no cached session, logging in");
            client.relogin(0).await?;
        }
        Ok(client)
    }

    /// Number of successful logins performed by this session.
    pub fn login_count(&self) -> u64 {
        self.logins.load(Ordering::Relaxed)
    }

    fn snapshot(&self) -> (reqwest::Client, Option<String>, u64) {
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        (
            session.http.clone(),
            session.tokens.as_ref().and_then(|t| t.session_key.clone()),
            session.generation,
        )
    }

    /// Log in again unless another caller already did since `seen_generation`.
    /// A failed login is final for this session: every later caller gets the
    /// same error and the authenticator is not asked again.
    async fn relogin(&self, seen_generation: u64) -> anyhow::Result<()> {
        let _guard = self.login_lock.lock().await;
        {
            let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(failure) = &session.login_failure {
                return Err(failure.replay());
            }
            if session.generation != seen_generation {
                return Ok(());
            }
        }
        let tokens = match self.authenticator.login(&self.account).await {
            Ok(tokens) => tokens,
            Err(e) => {
                let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
                session.login_failure = Some(LoginFailure::capture(&e));
                session.generation += 1;
                return Err(e);
            }
        };
        self.logins.fetch_add(1, Ordering::Relaxed);
        let http = self.transport.build(&self.strategy, Some(&tokens))?;
        if let Err(e) = self.store.save(&tokens) {
            tracing::warn!("could not write token cache {}: {e}", self.store.path().display());
        }
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        session.http = http;
        session.tokens = Some(tokens);
        session.generation += 1;
        Ok(())
    }

    /// Remember a working injected cookie so credential-only runs can reuse it.
    fn persist_cookie_once(&self) {
        let AuthStrategy::PreSharedCookie(cookie) = &self.strategy else {
            return;
        };
        if self.persisted.swap(true, Ordering::Relaxed) {
            return;
        }
        if let Err(e) = self.store.save(&SessionTokens::from_cookie(cookie)) {
            tracing::warn!("could not write token cache {}: {e}", self.store.path().display());
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<T> {
        let (http, session_key, generation) = self.snapshot();
        match self.send(&http, path, query, session_key.as_deref()).await {
            Err(e) if matches!(error::classify(&e), ErrorKind::InvalidSession { .. }) => {
                tracing::debug!("{path}: session rejected, attempting login");
                self.relogin(generation)
                    .await
                    .map_err(|login_err| login_err.context(e.to_string()))?;
                let (http, session_key, _) = self.snapshot();
                self.send(&http, path, query, session_key.as_deref()).await
            }
            other => other,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        http: &reqwest::Client,
        path: &str,
        query: &[(&str, String)],
        session_key: Option<&str>,
    ) -> anyhow::Result<T> {
        let url = format!("{}{path}", self.base_url);
        let mut request = http.get(&url).query(query);
        if let Some(key) = session_key {
            request = request.query(&[("sessionKey", key)]);
        }
        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(error::from_reply(status.as_u16(), &body).into());
        }
        if error::body_reports_invalid_session(&body) {
            return Err(error::from_reply(status.as_u16(), &body).into());
        }
        serde_json::from_str(&body).map_err(|e| {
            anyhow::anyhow!("unexpected response from {path}: {e}: {}", error::preview(&body))
        })
    }
}

#[async_trait::async_trait]
impl CloudApi for HttpCloudClient {
    async fn quota(&self) -> anyhow::Result<QuotaSnapshot> {
        let info: UserSizeInfo = self.get_json(USER_SIZE_INFO_PATH, &[]).await?;
        self.persist_cookie_once();
        Ok(QuotaSnapshot::from(&info))
    }

    async fn sign_in(&self) -> anyhow::Result<SignResponse> {
        let query = [
            ("rand", chrono::Utc::now().timestamp_millis().to_string()),
            ("clientType", "TELEANDROID".to_string()),
            ("version", "8.6.3".to_string()),
            ("model", "SM-G930K".to_string()),
        ];
        self.get_json(USER_SIGN_PATH, &query).await
    }
}

/// Opens [`HttpCloudClient`] sessions that share one transport and authenticator.
pub struct HttpSessionFactory {
    base_url: String,
    token_dir: PathBuf,
    transport: Arc<dyn TransportFactory>,
    authenticator: Arc<dyn Authenticator>,
}

impl HttpSessionFactory {
    pub fn new(
        base_url: &str,
        token_dir: PathBuf,
        transport: Arc<dyn TransportFactory>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            base_url: base_url.to_string(),
            token_dir,
            transport,
            authenticator,
        }
    }
}

#[async_trait::async_trait]
impl SessionFactory for HttpSessionFactory {
    async fn open(&self, account: &Account) -> anyhow::Result<Box<dyn CloudApi>> {
        let store = FileTokenStore::new(&self.token_dir, &account.username);
        let client = HttpCloudClient::connect(
            account,
            &self.base_url,
            store,
            Arc::clone(&self.transport),
            Arc::clone(&self.authenticator),
        )
        .await?;
        Ok(Box::new(client))
    }
}
