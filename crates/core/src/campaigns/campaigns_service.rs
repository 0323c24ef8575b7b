use std::sync::Arc;

use log::{debug, info};

use super::campaigns_model::{Campaign, NewCampaign};
use super::campaigns_traits::{CampaignRepositoryTrait, CampaignServiceTrait};
use crate::errors::{Error, Result};
use crate::events::{DomainEvent, DomainEventSink};
use crate::session::SessionStore;
use crate::utils::Clock;

/// Service for creating campaigns on behalf of the signed-in identity.
pub struct CampaignService {
    repository: Arc<dyn CampaignRepositoryTrait>,
    session: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
    event_sink: Arc<dyn DomainEventSink>,
}

impl CampaignService {
    pub fn new(
        repository: Arc<dyn CampaignRepositoryTrait>,
        session: Arc<SessionStore>,
        clock: Arc<dyn Clock>,
        event_sink: Arc<dyn DomainEventSink>,
    ) -> Self {
        Self {
            repository,
            session,
            clock,
            event_sink,
        }
    }
}

#[async_trait::async_trait]
impl CampaignServiceTrait for CampaignService {
    async fn create_campaign(&self, new_campaign: NewCampaign) -> Result<Campaign> {
        let owner = self.session.current_identity().ok_or(Error::NotAuthenticated)?;
        new_campaign.validate(self.clock.today())?;

        debug!("Creating campaign '{}' for {}", new_campaign.title, owner.id);
        let created = self
            .repository
            .create(new_campaign.into_insert(&owner.id))
            .await?;

        info!("Campaign {} created by {}", created.id, owner.id);
        self.event_sink
            .emit(DomainEvent::campaigns_changed(vec![created.id.clone()]));
        Ok(created)
    }
}
