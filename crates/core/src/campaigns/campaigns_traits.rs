//! Campaign repository and service traits.

use async_trait::async_trait;

use super::campaigns_model::{Campaign, CampaignInsert, NewCampaign};
use crate::errors::{GatewayResult, Result};

/// Contract for campaign reads and writes against the remote data gateway.
#[async_trait]
pub trait CampaignRepositoryTrait: Send + Sync {
    /// All campaigns, newest first.
    async fn list(&self) -> GatewayResult<Vec<Campaign>>;

    /// A single campaign, or `None` when no row has this id.
    async fn get_by_id(&self, campaign_id: &str) -> GatewayResult<Option<Campaign>>;

    async fn create(&self, campaign: CampaignInsert) -> GatewayResult<Campaign>;

    /// Persists the `completed` status for a campaign.
    async fn mark_completed(&self, campaign_id: &str) -> GatewayResult<Campaign>;

    /// Campaigns created by `user_id`, newest first.
    async fn list_by_owner(&self, user_id: &str) -> GatewayResult<Vec<Campaign>>;
}

/// Contract for campaign operations that need business validation.
#[async_trait]
pub trait CampaignServiceTrait: Send + Sync {
    /// Validates and creates a campaign owned by the signed-in identity.
    async fn create_campaign(&self, new_campaign: NewCampaign) -> Result<Campaign>;
}
