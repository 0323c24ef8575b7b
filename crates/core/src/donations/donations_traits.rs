//! Donation repository and service traits.

use async_trait::async_trait;

use super::donations_errors::DonationError;
use super::donations_model::{Donation, DonationForm, DonorDonation, NewDonation};
use super::donations_service::DonationReceipt;
use crate::errors::GatewayResult;

/// Contract for donation writes and the donor's own history.
#[async_trait]
pub trait DonationRepositoryTrait: Send + Sync {
    /// Creates exactly one donation row per call.
    async fn record(&self, donation: NewDonation) -> GatewayResult<Donation>;

    /// Donations made by `user_id`, newest first.
    async fn list_for_donor(&self, user_id: &str) -> GatewayResult<Vec<DonorDonation>>;
}

/// Contract for the donation write flow.
#[async_trait]
pub trait DonationServiceTrait: Send + Sync {
    /// Validates and records one donation. Never retries; a failed
    /// submission returns the form for resubmission.
    async fn submit(&self, form: DonationForm) -> Result<DonationReceipt, DonationError>;
}
