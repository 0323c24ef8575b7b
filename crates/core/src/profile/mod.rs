//! Profile module - the signed-in identity's dashboard and donation history.

mod profile_model;
mod profile_service;
mod profile_traits;


pub use profile_model::{DashboardStats, DonationHistoryEntry};
pub use profile_service::ProfileService;
pub use profile_traits::ProfileServiceTrait;
