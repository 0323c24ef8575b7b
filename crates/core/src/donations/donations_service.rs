use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::Serialize;

use super::donations_errors::DonationError;
use super::donations_model::{Donation, DonationForm};
use super::donations_traits::{DonationRepositoryTrait, DonationServiceTrait};
use crate::access::{auth_redirect, encode_return_path};
use crate::campaigns::{AmountAnimation, CampaignReadModel, Projected};
use crate::constants::DONATION_CELEBRATION;
use crate::events::{DomainEvent, DomainEventSink};
use crate::session::SessionStore;

const SUBMISSION_FAILED_MESSAGE: &str =
    "We couldn't process your donation. Please try again.";

/// Result of a recorded donation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationReceipt {
    pub donation: Donation,
    /// Displayed total of the target campaign, when it is cached.
    pub projection: Option<Projected<Decimal>>,
    pub animation: Option<AmountAnimation>,
}

/// Donation write flow: validate, require a session, record, then project
/// the new total locally until the next push.
pub struct DonationService {
    repository: Arc<dyn DonationRepositoryTrait>,
    session: Arc<SessionStore>,
    read_model: Arc<CampaignReadModel>,
    event_sink: Arc<dyn DomainEventSink>,
    celebration: Duration,
}

impl DonationService {
    pub fn new(
        repository: Arc<dyn DonationRepositoryTrait>,
        session: Arc<SessionStore>,
        read_model: Arc<CampaignReadModel>,
        event_sink: Arc<dyn DomainEventSink>,
    ) -> Self {
        Self {
            repository,
            session,
            read_model,
            event_sink,
            celebration: DONATION_CELEBRATION,
        }
    }

    pub fn with_celebration(mut self, duration: Duration) -> Self {
        self.celebration = duration;
        self
    }
}

/// Donation page path that preselects `campaign_id`.
pub fn donate_path(campaign_id: Option<&str>) -> String {
    match campaign_id {
        Some(id) => format!("/donate?campaign={}", encode_return_path(id)),
        None => "/donate".to_string(),
    }
}

#[async_trait::async_trait]
impl DonationServiceTrait for DonationService {
    async fn submit(&self, form: DonationForm) -> Result<DonationReceipt, DonationError> {
        let amount = form.validate().map_err(DonationError::Invalid)?;

        let identity = match self.session.current_identity() {
            Some(identity) => identity,
            None => {
                let redirect_to = auth_redirect(&donate_path(form.campaign_id.as_deref()));
                debug!("Donation needs a session, redirecting to {}", redirect_to);
                return Err(DonationError::AuthRequired { redirect_to });
            }
        };

        let new_donation = form.to_new_donation(amount, &identity.id);
        let campaign_id = new_donation.campaign_id.clone();
        let observed = campaign_id
            .as_deref()
            .and_then(|id| self.read_model.current_total(id));

        let donation = match self.repository.record(new_donation).await {
            Ok(donation) => donation,
            Err(e) => {
                warn!("Donation submission failed: {}", e);
                return Err(DonationError::SubmissionFailed {
                    message: SUBMISSION_FAILED_MESSAGE.to_string(),
                    form,
                });
            }
        };
        info!(
            "Recorded donation {} of {} for {}",
            donation.id,
            donation.amount,
            campaign_id.as_deref().unwrap_or("general fund")
        );

        let local = match (campaign_id.as_deref(), observed) {
            (Some(id), Some(observed)) => {
                self.read_model
                    .apply_optimistic(id, observed, amount, self.celebration)
            }
            _ => None,
        };
        let (projection, animation) = match local {
            Some((projection, animation)) => (Some(projection), Some(animation)),
            None => (None, None),
        };

        self.event_sink.emit(DomainEvent::donation_recorded(
            donation.id.clone(),
            donation.campaign_id.clone(),
            donation.amount,
        ));

        Ok(DonationReceipt {
            donation,
            projection,
            animation,
        })
    }
}
