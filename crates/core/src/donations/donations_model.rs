//! Donation domain models and the donation form.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::ANONYMOUS_DONOR;
use crate::errors::FieldError;
use crate::utils::validation::{has_min_chars, is_valid_email};

const MIN_NAME_CHARS: usize = 2;
const MAX_AMOUNT_DECIMALS: u32 = 2;

/// Domain model representing a recorded donation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donation {
    pub id: String,
    /// Kept for accounting even when the donor asked to stay anonymous.
    #[serde(default)]
    pub user_id: Option<String>,
    /// `None` for a general donation.
    #[serde(default)]
    pub campaign_id: Option<String>,
    pub amount: Decimal,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub donor_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Donation {
    /// Name shown next to the donation in public listings.
    pub fn donor_display(&self) -> &str {
        if self.is_anonymous {
            return ANONYMOUS_DONOR;
        }
        self.donor_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(ANONYMOUS_DONOR)
    }
}

/// Insert payload for the `donations` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDonation {
    pub user_id: Option<String>,
    pub campaign_id: Option<String>,
    pub amount: Decimal,
    pub is_anonymous: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub donor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A donation together with the title of the campaign it went to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorDonation {
    pub donation: Donation,
    pub campaign_title: Option<String>,
}

/// Raw donation form input. Returned untouched when a submission fails so
/// the donor does not have to type it again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationForm {
    pub amount: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default)]
    pub campaign_id: Option<String>,
}

impl DonationForm {
    /// Parses the amount field. Accepts an optional leading `$` and
    /// thousands separators.
    pub fn parsed_amount(&self) -> Option<Decimal> {
        let cleaned: String = self
            .amount
            .trim()
            .trim_start_matches('$')
            .chars()
            .filter(|c| *c != ',')
            .collect();
        Decimal::from_str(cleaned.trim()).ok()
    }

    /// Field-level validation; the returned amount is positive.
    pub fn validate(&self) -> Result<Decimal, Vec<FieldError>> {
        let mut errors = Vec::new();

        let amount = match self.parsed_amount() {
            Some(amount) if amount <= Decimal::ZERO => {
                errors.push(FieldError::new(
                    "amount",
                    "Please enter an amount greater than zero.",
                ));
                None
            }
            Some(amount) if amount.normalize().scale() > MAX_AMOUNT_DECIMALS => {
                errors.push(FieldError::new(
                    "amount",
                    "Amount cannot have more than two decimal places.",
                ));
                None
            }
            Some(amount) => Some(amount),
            None => {
                errors.push(FieldError::new(
                    "amount",
                    "Please select or enter an amount.",
                ));
                None
            }
        };

        if !has_min_chars(&self.first_name, MIN_NAME_CHARS) {
            errors.push(FieldError::new(
                "firstName",
                "First name must be at least 2 characters.",
            ));
        }
        if !has_min_chars(&self.last_name, MIN_NAME_CHARS) {
            errors.push(FieldError::new(
                "lastName",
                "Last name must be at least 2 characters.",
            ));
        }
        if !is_valid_email(&self.email) {
            errors.push(FieldError::new(
                "email",
                "Please enter a valid email address.",
            ));
        }

        match amount {
            Some(amount) if errors.is_empty() => Ok(amount),
            _ => Err(errors),
        }
    }

    /// Builds the insert payload for a validated form.
    pub fn to_new_donation(&self, amount: Decimal, user_id: &str) -> NewDonation {
        let donor_name = if self.anonymous {
            None
        } else {
            Some(format!("{} {}", self.first_name.trim(), self.last_name.trim()))
        };
        NewDonation {
            user_id: Some(user_id.to_string()),
            campaign_id: self.campaign_id.clone().filter(|id| !id.trim().is_empty()),
            amount,
            is_anonymous: self.anonymous,
            donor_name,
            message: self
                .comments
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        }
    }
}
