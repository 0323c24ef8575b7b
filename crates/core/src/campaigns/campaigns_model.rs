//! Campaign domain models.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{FieldError, ValidationError};
use crate::utils::time_utils::days_until;
use crate::utils::validation::has_min_chars;

pub const MIN_TITLE_CHARS: usize = 5;
pub const MAX_TITLE_CHARS: usize = 100;
pub const MIN_DESCRIPTION_CHARS: usize = 20;
pub const MIN_GOAL: Decimal = dec!(100);

/// Campaign categories. Wire values are matched case-insensitively and
/// anything unrecognised decodes to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CampaignCategory {
    Education,
    Health,
    Environment,
    Animals,
    Community,
    Disaster,
    #[default]
    Other,
}

impl CampaignCategory {
    pub const ALL: [CampaignCategory; 7] = [
        CampaignCategory::Education,
        CampaignCategory::Health,
        CampaignCategory::Environment,
        CampaignCategory::Animals,
        CampaignCategory::Community,
        CampaignCategory::Disaster,
        CampaignCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignCategory::Education => "education",
            CampaignCategory::Health => "health",
            CampaignCategory::Environment => "environment",
            CampaignCategory::Animals => "animals",
            CampaignCategory::Community => "community",
            CampaignCategory::Disaster => "disaster",
            CampaignCategory::Other => "other",
        }
    }

    /// Lenient decoding of stored category labels.
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "education" => CampaignCategory::Education,
            "health" | "healthcare" => CampaignCategory::Health,
            "environment" => CampaignCategory::Environment,
            "animals" | "animal welfare" => CampaignCategory::Animals,
            "community" | "community development" => CampaignCategory::Community,
            "disaster" | "disaster relief" | "emergency" => CampaignCategory::Disaster,
            _ => CampaignCategory::Other,
        }
    }
}

impl fmt::Display for CampaignCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CampaignCategory {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(CampaignCategory::from_wire(s))
    }
}

impl Serialize for CampaignCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CampaignCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .map(|value| CampaignCategory::from_wire(&value))
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    #[default]
    Active,
    Completed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Active => "active",
            CampaignStatus::Completed => "completed",
        }
    }
}

/// Domain model representing a fundraising campaign as stored by the
/// backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: CampaignCategory,
    pub goal: Decimal,
    #[serde(default)]
    pub current_amount: Decimal,
    #[serde(deserialize_with = "deserialize_deadline")]
    pub deadline: NaiveDate,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub status: CampaignStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// Whether the campaign counts as completed on `today`. A campaign closes
    /// on its deadline day, when no whole day is left.
    pub fn derived_status(&self, today: NaiveDate) -> CampaignStatus {
        if self.status == CampaignStatus::Completed
            || self.current_amount >= self.goal
            || self.deadline <= today
        {
            CampaignStatus::Completed
        } else {
            CampaignStatus::Active
        }
    }

    pub fn days_left(&self, today: NaiveDate) -> i64 {
        days_until(self.deadline, today)
    }
}

/// Percentage of `goal` covered by `raised`, rounded half up and capped at
/// 100.
pub fn progress_percent(raised: Decimal, goal: Decimal) -> u32 {
    if goal <= Decimal::ZERO || raised <= Decimal::ZERO {
        return 0;
    }
    let percent = (raised / goal * dec!(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    percent.min(dec!(100)).to_u32().unwrap_or(0)
}

/// Accepts `YYYY-MM-DD` as well as a full timestamp.
fn deserialize_deadline<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let date_part = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(serde::de::Error::custom)
}

/// Local list filter. Never triggers a fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignFilter {
    pub category: Option<CampaignCategory>,
    pub query: Option<String>,
    pub status: Option<CampaignStatus>,
}

impl CampaignFilter {
    pub fn with_category(mut self, category: CampaignCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_status(mut self, status: CampaignStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Category equality plus case-insensitive substring match on the
    /// title or description. The status filter is applied by the read
    /// model against the derived status.
    pub fn matches(&self, campaign: &Campaign) -> bool {
        if let Some(category) = self.category {
            if campaign.category != category {
                return false;
            }
        }
        match self.query.as_deref().map(str::trim) {
            Some(query) if !query.is_empty() => {
                let needle = query.to_lowercase();
                campaign.title.to_lowercase().contains(&needle)
                    || campaign.description.to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }
}

/// Input model for creating a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCampaign {
    pub title: String,
    pub description: String,
    pub category: CampaignCategory,
    pub goal: Decimal,
    pub deadline: NaiveDate,
    pub image_url: Option<String>,
}

impl NewCampaign {
    /// Validates the form against `today`.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        let title_chars = self.title.trim().chars().count();
        if !(MIN_TITLE_CHARS..=MAX_TITLE_CHARS).contains(&title_chars) {
            errors.push(FieldError::new(
                "title",
                "Title must be between 5 and 100 characters.",
            ));
        }
        if !has_min_chars(&self.description, MIN_DESCRIPTION_CHARS) {
            errors.push(FieldError::new(
                "description",
                "Description must be at least 20 characters.",
            ));
        }
        if self.goal < MIN_GOAL {
            errors.push(FieldError::new("goal", "Goal amount must be at least $100."));
        }
        if self.deadline <= today {
            errors.push(FieldError::new(
                "deadline",
                "Deadline must be in the future.",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Fields(errors))
        }
    }

    /// Row written to the backend for a freshly created campaign.
    pub fn into_insert(self, owner_id: &str) -> CampaignInsert {
        CampaignInsert {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            category: self.category,
            goal: self.goal,
            current_amount: Decimal::ZERO,
            deadline: self.deadline,
            user_id: owner_id.to_string(),
            status: CampaignStatus::Active,
            image_url: self.image_url.filter(|url| !url.trim().is_empty()),
        }
    }
}

/// Insert payload for the `campaigns` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignInsert {
    pub title: String,
    pub description: String,
    pub category: CampaignCategory,
    pub goal: Decimal,
    pub current_amount: Decimal,
    pub deadline: NaiveDate,
    pub user_id: String,
    pub status: CampaignStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}
