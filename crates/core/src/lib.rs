//! HopeFund Core - session, access, campaign and donation logic.
//!
//! This crate contains the client-side business logic for HopeFund.
//! It is backend-agnostic and defines gateway traits that are implemented
//! by the `supabase` crate (and by [`gateway::InMemoryGateway`] for tests
//! and offline use).

pub mod access;
pub mod campaigns;
pub mod constants;
pub mod donations;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod profile;
pub mod session;
pub mod utils;

// Re-export error types
pub use errors::Error;
pub use errors::ErrorKind;
pub use errors::Result;
