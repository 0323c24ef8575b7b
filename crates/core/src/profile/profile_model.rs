use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::GENERAL_DONATION_TITLE;
use crate::donations::DonorDonation;

/// Summary figures shown on the profile dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_campaigns: usize,
    pub active_campaigns: usize,
    pub total_donations: usize,
    pub total_amount_donated: Decimal,
}

/// One row of the donor's history table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationHistoryEntry {
    pub id: String,
    pub amount: Decimal,
    pub campaign_title: String,
    pub campaign_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<DonorDonation> for DonationHistoryEntry {
    fn from(entry: DonorDonation) -> Self {
        let DonorDonation {
            donation,
            campaign_title,
        } = entry;
        Self {
            id: donation.id,
            amount: donation.amount,
            campaign_title: campaign_title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| GENERAL_DONATION_TITLE.to_string()),
            campaign_id: donation.campaign_id,
            created_at: donation.created_at,
        }
    }
}
