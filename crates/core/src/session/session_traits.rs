//! Auth gateway and session storage traits.
//!
//! These traits define the boundary the session store needs from the
//! hosted backend and from client-local storage, without any transport or
//! platform types.

use async_trait::async_trait;

use super::session_model::{Identity, SignUpProfile};
use crate::errors::{GatewayResult, Result};

/// Credential exchange and registration offered by the Remote Data Gateway.
#[async_trait]
pub trait AuthGatewayTrait: Send + Sync {
    /// Exchanges an email/password pair for an identity.
    ///
    /// Rejected credentials are reported as `GatewayError::AuthRejected`.
    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<Identity>;

    /// Registers a new identity.
    ///
    /// An already registered email is reported as `GatewayError::Conflict`.
    async fn sign_up(&self, profile: &SignUpProfile, password: &str) -> GatewayResult<Identity>;
}

/// Client-local key/value storage for the persisted session record.
///
/// Implementations must treat `clear` of a missing key as success.
#[async_trait]
pub trait SessionStorageTrait: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>>;

    async fn save(&self, key: &str, value: &str) -> Result<()>;

    async fn clear(&self, key: &str) -> Result<()>;
}
