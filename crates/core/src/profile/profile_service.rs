use std::sync::Arc;

use log::{debug, warn};
use rust_decimal::Decimal;

use super::profile_model::{DashboardStats, DonationHistoryEntry};
use super::profile_traits::ProfileServiceTrait;
use crate::campaigns::{CampaignRepositoryTrait, CampaignStatus};
use crate::donations::DonationRepositoryTrait;
use crate::errors::{Error, Result};
use crate::session::{Identity, SessionStore};
use crate::utils::Clock;

/// Builds the dashboard from the identity's owned campaigns and donations.
pub struct ProfileService {
    campaigns: Arc<dyn CampaignRepositoryTrait>,
    donations: Arc<dyn DonationRepositoryTrait>,
    session: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
}

impl ProfileService {
    pub fn new(
        campaigns: Arc<dyn CampaignRepositoryTrait>,
        donations: Arc<dyn DonationRepositoryTrait>,
        session: Arc<SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            campaigns,
            donations,
            session,
            clock,
        }
    }

    fn identity(&self) -> Result<Identity> {
        self.session.current_identity().ok_or(Error::NotAuthenticated)
    }
}

#[async_trait::async_trait]
impl ProfileServiceTrait for ProfileService {
    async fn dashboard(&self) -> Result<DashboardStats> {
        let identity = self.identity()?;
        let today = self.clock.today();

        let owned = self.campaigns.list_by_owner(&identity.id).await?;
        let active_campaigns = owned
            .iter()
            .filter(|c| c.derived_status(today) == CampaignStatus::Active)
            .count();

        // The stats card still renders when the history fetch fails.
        let donations = match self.donations.list_for_donor(&identity.id).await {
            Ok(donations) => donations,
            Err(e) => {
                warn!("Failed to load donations for {}: {}", identity.id, e);
                Vec::new()
            }
        };
        let total_amount_donated = donations
            .iter()
            .map(|d| d.donation.amount)
            .fold(Decimal::ZERO, |acc, amount| acc + amount);

        debug!(
            "Dashboard for {}: {} campaigns, {} donations",
            identity.id,
            owned.len(),
            donations.len()
        );
        Ok(DashboardStats {
            total_campaigns: owned.len(),
            active_campaigns,
            total_donations: donations.len(),
            total_amount_donated,
        })
    }

    async fn donation_history(&self) -> Result<Vec<DonationHistoryEntry>> {
        let identity = self.identity()?;
        let mut history: Vec<DonationHistoryEntry> = self
            .donations
            .list_for_donor(&identity.id)
            .await?
            .into_iter()
            .map(DonationHistoryEntry::from)
            .collect();
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(history)
    }
}
