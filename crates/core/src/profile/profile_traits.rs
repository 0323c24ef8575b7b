use async_trait::async_trait;

use super::profile_model::{DashboardStats, DonationHistoryEntry};
use crate::errors::Result;

/// Contract for the signed-in identity's own figures.
#[async_trait]
pub trait ProfileServiceTrait: Send + Sync {
    /// Campaign and donation totals for the current identity.
    async fn dashboard(&self) -> Result<DashboardStats>;

    /// The current identity's donations, newest first.
    async fn donation_history(&self) -> Result<Vec<DonationHistoryEntry>>;
}
