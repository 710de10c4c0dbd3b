use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::time::Duration;

use futures::FutureExt;

use crate::accounts::Account;
use crate::capacity;
use crate::push::Notifier;
use crate::remote::SessionFactory;
use crate::report::{self, Recorder, digest};
use crate::runner;

/// Pause between the end of the run and the digest, so late log lines land.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Run every account in order, then log each account's quota change.
///
/// # Errors
///
/// Returns the first connectivity failure; the remaining accounts and the
/// quota comparison are skipped in that case.
pub async fn run_all(
    accounts: &[Account],
    factory: &dyn SessionFactory,
    exec_threshold: usize,
) -> anyhow::Result<()> {
    let mut sessions = Vec::new();
    for account in accounts {
        runner::run_account(account, factory, exec_threshold, &mut sessions).await?;
    }
    capacity::report_deltas(&sessions).await;
    Ok(())
}

pub fn push_title() -> String {
    format!(
        "Cloud189 check-in {}",
        chrono::Local::now().format("%Y-%m-%d")
    )
}

/// Await `run`, then always push the recorded digest exactly once, erase
/// the recorder and remove the log file, even when `run` fails or panics.
/// The `settle` pause applies after a successful run only.
///
/// # Errors
///
/// Returns the run's own error; push failures are reported on stderr only.
pub async fn run_with_report<F>(
    run: F,
    recorder: &Recorder,
    notifier: &dyn Notifier,
    log_file: Option<&Path>,
    settle: Duration,
) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    let result = match AssertUnwindSafe(run).catch_unwind().await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("check-in run panicked")),
    };
    match &result {
        // Only a completed run waits for late log lines.
        Ok(()) => tokio::time::sleep(settle).await,
        Err(e) => tracing::error!("run aborted: {e:#}"),
    }

    let body = digest::compose(&recorder.replay());
    if let Err(e) = notifier.send(&push_title(), &body).await {
        eprintln!("[cloud189-checkin] could not push digest: {e:#}");
    }
    recorder.erase();
    if let Some(path) = log_file {
        report::clean_log_file(path);
    }
    result
}
