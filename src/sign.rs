use futures::future::join_all;

use crate::error;
use crate::remote::{CloudApi, SignResponse};

/// Result of one sign-in call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskOutcome {
    pub succeeded: bool,
    pub already_signed: bool,
    pub bonus_mb: u64,
}

impl TaskOutcome {
    const FAILED: Self = Self {
        succeeded: false,
        already_signed: false,
        bonus_mb: 0,
    };

    /// Counted only when the call succeeded, was not a same-day repeat, and paid out.
    pub const fn is_rewarded(&self) -> bool {
        self.succeeded && !self.already_signed && self.bonus_mb > 0
    }
}

impl From<SignResponse> for TaskOutcome {
    fn from(resp: SignResponse) -> Self {
        Self {
            succeeded: true,
            already_signed: resp.is_sign,
            bonus_mb: resp.netdisk_bonus,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Bonuses of the rewarded calls, in call order.
    pub bonuses: Vec<u64>,
    pub total: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[TaskOutcome]) -> Self {
        Self {
            bonuses: outcomes
                .iter()
                .filter(|o| o.is_rewarded())
                .map(|o| o.bonus_mb)
                .collect(),
            total: outcomes.len(),
        }
    }

    pub const fn rewarded(&self) -> usize {
        self.bonuses.len()
    }

    pub fn total_bonus_mb(&self) -> u64 {
        self.bonuses.iter().sum()
    }

    /// `sign-in: 1/3 rewarded, bonus 50M` (bonuses joined with commas, `0` when none).
    pub fn line(&self) -> String {
        let bonuses = if self.bonuses.is_empty() {
            "0".to_string()
        } else {
            self.bonuses
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(",")
        };
        format!(
            "sign-in: {}/{} rewarded, bonus {bonuses}M",
            self.rewarded(),
            self.total
        )
    }
}

/// Issue `count` sign-in calls at once and settle all of them; one failure
/// never cancels the others.
pub async fn run_batch(api: &dyn CloudApi, count: usize) -> BatchSummary {
    let results = join_all((0..count).map(|_| api.sign_in())).await;
    let outcomes: Vec<TaskOutcome> = results
        .into_iter()
        .map(|result| match result {
            Ok(resp) => TaskOutcome::from(resp),
            Err(e) => {
                tracing::debug!(kind = ?error::classify(&e), "sign-in call failed: {e:#}");
                TaskOutcome::FAILED
            }
        })
        .collect();
    let summary = BatchSummary::from_outcomes(&outcomes);
    tracing::info!(section = "result", "{}", summary.line());
    summary
}
