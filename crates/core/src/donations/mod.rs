//! Donations module - donation models, the donation form, and the write
//! flow that projects new totals locally.

mod donations_errors;
mod donations_model;
mod donations_service;
mod donations_traits;

#[cfg(test)]
mod donations_service_tests;

pub use donations_errors::DonationError;
pub use donations_model::{Donation, DonationForm, DonorDonation, NewDonation};
pub use donations_service::{donate_path, DonationReceipt, DonationService};
pub use donations_traits::{DonationRepositoryTrait, DonationServiceTrait};
