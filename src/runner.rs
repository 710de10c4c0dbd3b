use std::time::Instant;

use tracing::Instrument;

use crate::accounts::Account;
use crate::capacity::AccountSession;
use crate::error::{self, ErrorKind};
use crate::remote::SessionFactory;
use crate::report::digest::{MSG_FETCHING_QUOTA, MSG_STARTING};
use crate::sign::{self, BatchSummary};

/// Run one account: open a session, snapshot quota, run the sign-in batch.
///
/// Accounts without credentials are skipped without a trace. Failures are
/// logged and swallowed so the next account still runs, except connectivity
/// failures, which are returned to the caller.
///
/// # Errors
///
/// Returns the error only when it classifies as [`ErrorKind::Connectivity`].
pub async fn run_account(
    account: &Account,
    factory: &dyn SessionFactory,
    exec_threshold: usize,
    sessions: &mut Vec<AccountSession>,
) -> anyhow::Result<Option<BatchSummary>> {
    if !account.has_credentials() {
        return Ok(None);
    }
    let span = tracing::info_span!("account", user = %account.label());
    async {
        let started = Instant::now();
        tracing::info!("{MSG_STARTING}");
        let result = check_in(account, factory, exec_threshold, sessions).await;
        let outcome = match result {
            Ok(summary) => Ok(Some(summary)),
            Err(e) => {
                let kind = error::classify(&e);
                log_failure(&e, &kind);
                if kind.is_connectivity() { Err(e) } else { Ok(None) }
            }
        };
        tracing::info!("finished in {:.2}s", started.elapsed().as_secs_f64());
        outcome
    }
    .instrument(span)
    .await
}

async fn check_in(
    account: &Account,
    factory: &dyn SessionFactory,
    exec_threshold: usize,
    sessions: &mut Vec<AccountSession>,
) -> anyhow::Result<BatchSummary> {
    if account.cookie().is_some() {
        tracing::info!("cookie configured, using cookie session (login disabled)");
    }
    let api = factory.open(account).await?;
    tracing::info!("{MSG_FETCHING_QUOTA}");
    let before = api.quota().await?;
    let summary = sign::run_batch(api.as_ref(), exec_threshold).await;
    sessions.push(AccountSession {
        username: account.username.clone(),
        label: account.label(),
        api,
        before,
    });
    Ok(summary)
}

fn log_failure(err: &anyhow::Error, kind: &ErrorKind) {
    match kind {
        ErrorKind::InvalidSession { status, body } => {
            tracing::error!("request rejected by server, HTTP {status}");
            tracing::error!("response: {body}");
            tracing::error!("verdict: the cookie is invalid or expired, capture a fresh one");
        }
        ErrorKind::Http { status, body } => {
            tracing::error!("request rejected by server, HTTP {status}");
            tracing::error!("response: {body}");
        }
        ErrorKind::CookieExpired => {
            tracing::error!("{err:#}");
            tracing::error!("verdict: the cookie is invalid or expired, capture a fresh one");
        }
        ErrorKind::Connectivity => tracing::error!("network failure: {err:#}"),
        ErrorKind::Unexpected => tracing::error!("{err:#}"),
    }
}
