use tracing::Instrument;

use crate::remote::{CloudApi, QuotaSnapshot};

const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = MIB * 1024.0;

/// A session kept after its account ran, with the quota seen before signing in.
pub struct AccountSession {
    pub username: String,
    pub label: String,
    pub api: Box<dyn CloudApi>,
    pub before: QuotaSnapshot,
}

/// Byte growth of one account between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaDelta {
    pub personal_added: i128,
    pub family_added: i128,
    pub personal_total: u64,
    pub family_total: u64,
}

impl QuotaDelta {
    pub fn between(before: QuotaSnapshot, after: QuotaSnapshot) -> Self {
        Self {
            personal_added: i128::from(after.personal_total) - i128::from(before.personal_total),
            family_added: i128::from(after.family_total) - i128::from(before.family_total),
            personal_total: after.personal_total,
            family_total: after.family_total,
        }
    }

    /// `personal: +50.00M / 30.00G, family: +0.00M / 10.00G`
    #[allow(clippy::cast_precision_loss)]
    pub fn line(&self) -> String {
        format!(
            "personal: {:+.2}M / {:.2}G, family: {:+.2}M / {:.2}G",
            self.personal_added as f64 / MIB,
            self.personal_total as f64 / GIB,
            self.family_added as f64 / MIB,
            self.family_total as f64 / GIB,
        )
    }
}

/// Re-query every session's quota and log the change since its first
/// snapshot. A failed query is logged and skipped.
pub async fn report_deltas(sessions: &[AccountSession]) {
    for session in sessions {
        let span = tracing::info_span!("account", user = %session.label);
        async {
            match session.api.quota().await {
                Ok(after) => {
                    let delta = QuotaDelta::between(session.before, after);
                    tracing::info!(section = "capacity", "{}", delta.line());
                }
                Err(e) => tracing::warn!("could not fetch quota after sign-in: {e:#}"),
            }
        }
        .instrument(span)
        .await;
    }
}
