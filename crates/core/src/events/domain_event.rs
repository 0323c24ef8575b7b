//! Domain event types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Domain events emitted by core services after successful mutations.
///
/// These events represent facts about client-visible state changes. Runtime
/// adapters translate them into platform-specific actions (toasts, analytics,
/// cache invalidation in other views, etc.).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// The signed-in identity changed (sign-in, sign-up, profile update or
    /// sign-out). `user_id` is `None` after sign-out.
    SessionChanged { user_id: Option<String> },

    /// Campaign records were created or replaced by a push.
    CampaignsChanged { campaign_ids: Vec<String> },

    /// A campaign was observed crossing its goal or deadline.
    CampaignCompleted { campaign_id: String },

    /// A donation was recorded by the gateway.
    DonationRecorded {
        donation_id: String,
        campaign_id: Option<String>,
        amount: Decimal,
    },
}

impl DomainEvent {
    /// Creates a SessionChanged event.
    pub fn session_changed(user_id: Option<String>) -> Self {
        Self::SessionChanged { user_id }
    }

    /// Creates a CampaignsChanged event.
    pub fn campaigns_changed(campaign_ids: Vec<String>) -> Self {
        Self::CampaignsChanged { campaign_ids }
    }

    /// Creates a CampaignCompleted event.
    pub fn campaign_completed(campaign_id: String) -> Self {
        Self::CampaignCompleted { campaign_id }
    }

    /// Creates a DonationRecorded event.
    pub fn donation_recorded(
        donation_id: String,
        campaign_id: Option<String>,
        amount: Decimal,
    ) -> Self {
        Self::DonationRecorded {
            donation_id,
            campaign_id,
            amount,
        }
    }
}
