pub mod client;
pub mod mock;
pub mod transport;

use std::sync::Arc;

use serde::Deserialize;

use crate::accounts::Account;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityInfo {
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub used_size: u64,
    #[serde(default)]
    pub free_size: u64,
}

/// Body of `GET /api/portal/getUserSizeInfo.action`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSizeInfo {
    #[serde(default)]
    pub cloud_capacity_info: CapacityInfo,
    #[serde(default)]
    pub family_capacity_info: CapacityInfo,
}

/// Point-in-time storage totals for one account, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaSnapshot {
    pub personal_total: u64,
    pub family_total: u64,
}

impl From<&UserSizeInfo> for QuotaSnapshot {
    fn from(info: &UserSizeInfo) -> Self {
        Self {
            personal_total: info.cloud_capacity_info.total_size,
            family_total: info.family_capacity_info.total_size,
        }
    }
}

/// Body of `GET /mkt/userSign.action`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignResponse {
    /// `true` when the account had already signed in today (no reward).
    #[serde(default)]
    pub is_sign: bool,
    /// Bonus storage granted by this call, in MB.
    #[serde(default)]
    pub netdisk_bonus: u64,
}

/// The two Cloud189 calls a check-in needs.
#[async_trait::async_trait]
pub trait CloudApi: Send + Sync {
    async fn quota(&self) -> anyhow::Result<QuotaSnapshot>;

    async fn sign_in(&self) -> anyhow::Result<SignResponse>;
}

#[async_trait::async_trait]
impl<T: CloudApi + ?Sized> CloudApi for Arc<T> {
    async fn quota(&self) -> anyhow::Result<QuotaSnapshot> {
        (**self).quota().await
    }

    async fn sign_in(&self) -> anyhow::Result<SignResponse> {
        (**self).sign_in().await
    }
}

/// Creates one authenticated [`CloudApi`] session per account.
#[async_trait::async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, account: &Account) -> anyhow::Result<Box<dyn CloudApi>>;
}
