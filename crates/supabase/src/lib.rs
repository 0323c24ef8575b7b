//! HopeFund Supabase - Remote Data Gateway over a Supabase project.
//!
//! [`SupabaseClient`] implements the core auth, campaign and donation
//! gateway traits on top of GoTrue and PostgREST. [`RealtimeFeed`]
//! implements the change feed over the Realtime websocket.

mod auth;
mod client;
mod error;
mod realtime;
mod rest;

pub use client::{SupabaseClient, SupabaseConfig, DEFAULT_TIMEOUT_SECS};
pub use realtime::{realtime_url, RealtimeFeed, HEARTBEAT_INTERVAL, RECONNECT_DELAY};
