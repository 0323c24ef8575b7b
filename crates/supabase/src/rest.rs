//! PostgREST-backed campaign and donation repositories.

use async_trait::async_trait;
use hopefund_core::campaigns::{Campaign, CampaignInsert, CampaignRepositoryTrait, CampaignStatus};
use hopefund_core::donations::{Donation, DonationRepositoryTrait, DonorDonation, NewDonation};
use hopefund_core::errors::{GatewayError, GatewayResult};
use log::debug;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use crate::client::SupabaseClient;

const CAMPAIGNS: &str = "/rest/v1/campaigns";
const DONATIONS: &str = "/rest/v1/donations";

fn eq(value: &str) -> String {
    format!("eq.{}", urlencoding::encode(value))
}

/// Donation row with the embedded `campaigns(title)` resource.
#[derive(Debug, Deserialize)]
struct DonationWithCampaign {
    #[serde(flatten)]
    donation: Donation,
    #[serde(default)]
    campaigns: Option<CampaignTitle>,
}

#[derive(Debug, Deserialize)]
struct CampaignTitle {
    title: String,
}

impl From<DonationWithCampaign> for DonorDonation {
    fn from(row: DonationWithCampaign) -> Self {
        DonorDonation {
            donation: row.donation,
            campaign_title: row.campaigns.map(|c| c.title),
        }
    }
}

/// First row of a `return=representation` write.
fn single<T>(rows: Vec<T>, what: &str) -> GatewayResult<T> {
    rows.into_iter()
        .next()
        .ok_or_else(|| GatewayError::Decode(format!("{} write returned no row", what)))
}

#[async_trait]
impl CampaignRepositoryTrait for SupabaseClient {
    async fn list(&self) -> GatewayResult<Vec<Campaign>> {
        self.get(&format!("{}?select=*&order=created_at.desc", CAMPAIGNS))
            .await
    }

    async fn get_by_id(&self, campaign_id: &str) -> GatewayResult<Option<Campaign>> {
        let rows: Vec<Campaign> = self
            .get(&format!(
                "{}?select=*&id={}&limit=1",
                CAMPAIGNS,
                eq(campaign_id)
            ))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn create(&self, campaign: CampaignInsert) -> GatewayResult<Campaign> {
        let rows: Vec<Campaign> = self
            .send_json(Method::POST, CAMPAIGNS, Some(&campaign))
            .await?;
        let created = single(rows, "campaign")?;
        debug!("[Supabase] Created campaign {}", created.id);
        Ok(created)
    }

    async fn mark_completed(&self, campaign_id: &str) -> GatewayResult<Campaign> {
        let rows: Vec<Campaign> = self
            .send_json(
                Method::PATCH,
                &format!("{}?id={}", CAMPAIGNS, eq(campaign_id)),
                Some(&json!({ "status": CampaignStatus::Completed.as_str() })),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| GatewayError::NotFound(format!("campaign {}", campaign_id)))
    }

    async fn list_by_owner(&self, user_id: &str) -> GatewayResult<Vec<Campaign>> {
        self.get(&format!(
            "{}?select=*&user_id={}&order=created_at.desc",
            CAMPAIGNS,
            eq(user_id)
        ))
        .await
    }
}

#[async_trait]
impl DonationRepositoryTrait for SupabaseClient {
    async fn record(&self, donation: NewDonation) -> GatewayResult<Donation> {
        let rows: Vec<Donation> = self
            .send_json(Method::POST, DONATIONS, Some(&donation))
            .await?;
        single(rows, "donation")
    }

    async fn list_for_donor(&self, user_id: &str) -> GatewayResult<Vec<DonorDonation>> {
        let rows: Vec<DonationWithCampaign> = self
            .get(&format!(
                "{}?select=*,campaigns(title)&user_id={}&order=created_at.desc",
                DONATIONS,
                eq(user_id)
            ))
            .await?;
        Ok(rows.into_iter().map(DonorDonation::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_eq_filter_is_encoded() {
        assert_eq!(eq("camp-1"), "eq.camp-1");
        assert_eq!(eq("a&b=c"), "eq.a%26b%3Dc");
    }

    #[test]
    fn test_history_row_with_embedded_campaign() {
        let body = r#"[
            {"id":"d1","user_id":"u1","campaign_id":"c1","amount":25.5,"is_anonymous":false,
             "donor_name":"John Doe","message":null,"created_at":"2026-03-10T12:00:00.123456+00:00",
             "campaigns":{"title":"Clean Water"}},
            {"id":"d2","user_id":"u1","campaign_id":null,"amount":10,"is_anonymous":true,
             "created_at":"2026-03-09T08:00:00+00:00","campaigns":null}
        ]"#;
        let rows: Vec<DonationWithCampaign> = serde_json::from_str(body).unwrap();
        let history: Vec<DonorDonation> = rows.into_iter().map(DonorDonation::from).collect();

        assert_eq!(history[0].campaign_title.as_deref(), Some("Clean Water"));
        assert_eq!(history[0].donation.amount, dec!(25.5));
        assert_eq!(history[1].campaign_title, None);
        assert!(history[1].donation.is_anonymous);
    }

    #[test]
    fn test_campaign_row_from_postgrest() {
        let body = r#"[{"id":"c1","title":"Clean Water","description":"Wells for schools",
            "category":"health","goal":15000,"current_amount":9250.75,"deadline":"2026-06-01",
            "user_id":"u9","status":"active","image_url":null,
            "created_at":"2026-01-02T03:04:05+00:00"}]"#;
        let rows: Vec<Campaign> = serde_json::from_str(body).unwrap();
        let campaign = single(rows, "campaign").unwrap();
        assert_eq!(campaign.current_amount, dec!(9250.75));
        assert_eq!(campaign.status, CampaignStatus::Active);
    }

    #[test]
    fn test_empty_write_response_is_decode_error() {
        let err = single(Vec::<Campaign>::new(), "campaign").unwrap_err();
        assert!(matches!(err, GatewayError::Decode(_)));
    }
}
