//! Session module - identity models, the session store, and its storage.

mod session_model;
mod session_service;
mod session_storage;
mod session_traits;

#[cfg(test)]
mod session_service_tests;

pub use session_model::{
    Credentials, Identity, IdentityUpdate, SessionSnapshot, SessionState, SignUpProfile, UserRole,
};
pub use session_service::SessionStore;
pub use session_storage::{FileSessionStorage, InMemorySessionStorage};
pub use session_traits::{AuthGatewayTrait, SessionStorageTrait};
