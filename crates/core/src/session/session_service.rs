use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;

use super::session_model::{
    Credentials, Identity, IdentityUpdate, SessionSnapshot, SessionState, SignUpProfile,
};
use super::session_traits::{AuthGatewayTrait, SessionStorageTrait};
use crate::constants::{SESSION_RESTORE_TIMEOUT, SESSION_STORAGE_KEY};
use crate::errors::{Error, FieldError, GatewayError, Result, ValidationError};
use crate::events::{DomainEvent, DomainEventSink};
use crate::utils::validation::{has_min_chars, is_valid_email};

const MIN_NAME_CHARS: usize = 2;
const MIN_PASSWORD_CHARS: usize = 8;

/// Single owner of "who is using the app right now".
///
/// Views read through [`SessionStore::snapshot`] or a receiver from
/// [`SessionStore::subscribe`]; only the operations below mutate the state.
pub struct SessionStore {
    auth: Arc<dyn AuthGatewayTrait>,
    storage: Arc<dyn SessionStorageTrait>,
    event_sink: Arc<dyn DomainEventSink>,
    state: watch::Sender<SessionState>,
    restore_timeout: Duration,
}

impl SessionStore {
    /// Creates a new SessionStore in the `Uninitialized` state.
    pub fn new(
        auth: Arc<dyn AuthGatewayTrait>,
        storage: Arc<dyn SessionStorageTrait>,
        event_sink: Arc<dyn DomainEventSink>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Self {
            auth,
            storage,
            event_sink,
            state,
            restore_timeout: SESSION_RESTORE_TIMEOUT,
        }
    }

    /// Overrides the bound on persisted-session resolution.
    pub fn with_restore_timeout(mut self, timeout: Duration) -> Self {
        self.restore_timeout = timeout;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().snapshot()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.state.borrow().identity().cloned()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Resolves the persisted session at startup.
    ///
    /// Missing, unreadable, corrupt or slow storage all resolve to
    /// `Unauthenticated`; this never blocks longer than the restore timeout.
    /// Calling it again after resolution is a no-op.
    pub async fn restore(&self) -> SessionSnapshot {
        let started = self.state.send_if_modified(|state| {
            if matches!(state, SessionState::Uninitialized) {
                *state = SessionState::Loading;
                true
            } else {
                false
            }
        });
        if !started {
            return self.snapshot();
        }

        let restored = match tokio::time::timeout(
            self.restore_timeout,
            self.storage.load(SESSION_STORAGE_KEY),
        )
        .await
        {
            Ok(Ok(Some(raw))) => match serde_json::from_str::<Identity>(&raw) {
                Ok(identity) => Some(identity),
                Err(e) => {
                    warn!("Discarding unreadable persisted session: {}", e);
                    None
                }
            },
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                warn!("Failed to read persisted session: {}", e);
                None
            }
            Err(_) => {
                warn!(
                    "Persisted session did not resolve within {:?}, continuing signed out",
                    self.restore_timeout
                );
                None
            }
        };

        // A sign-in or sign-out that completed while loading takes precedence.
        let user_id = restored.as_ref().map(|identity| identity.id.clone());
        let applied = self.state.send_if_modified(|state| {
            if state.is_loading() {
                *state = match restored {
                    Some(identity) => SessionState::Authenticated(identity),
                    None => SessionState::Unauthenticated,
                };
                true
            } else {
                false
            }
        });

        if applied {
            debug!("Session restored (signed in: {})", user_id.is_some());
            if user_id.is_some() {
                self.event_sink.emit(DomainEvent::session_changed(user_id));
            }
        }
        self.snapshot()
    }

    /// Exchanges credentials for a session.
    ///
    /// On failure the current state is left untouched. Concurrent calls are
    /// not deduplicated; the last one to succeed wins.
    pub async fn sign_in(&self, credentials: Credentials) -> Result<Identity> {
        let email = credentials.email.trim();
        if email.is_empty() || credentials.password.is_empty() {
            return Err(Error::InvalidCredentials);
        }

        let identity = self
            .auth
            .sign_in(email, &credentials.password)
            .await
            .map_err(classify_sign_in_error)?;

        info!("Signed in as {}", identity.id);
        self.establish(identity.clone()).await;
        Ok(identity)
    }

    /// Registers a new identity and signs it in.
    pub async fn sign_up(&self, profile: SignUpProfile, password: &str) -> Result<Identity> {
        validate_sign_up(&profile, password)?;

        let profile = SignUpProfile {
            name: profile.name.trim().to_string(),
            email: profile.email.trim().to_string(),
            role: profile.role,
        };

        let identity = self
            .auth
            .sign_up(&profile, password)
            .await
            .map_err(|e| classify_sign_up_error(e, &profile.email))?;

        info!("Registered new identity {}", identity.id);
        self.establish(identity.clone()).await;
        Ok(identity)
    }

    /// Clears the session from memory and storage. Never fails.
    pub async fn sign_out(&self) {
        let previous = self.state.send_replace(SessionState::Unauthenticated);

        if let Err(e) = self.storage.clear(SESSION_STORAGE_KEY).await {
            warn!("Failed to clear persisted session: {}", e);
        }

        if let SessionState::Authenticated(identity) = previous {
            info!("Signed out {}", identity.id);
            self.event_sink.emit(DomainEvent::session_changed(None));
        }
    }

    /// Merges `update` into the current identity and persists it.
    pub async fn update_profile(&self, update: IdentityUpdate) -> Result<Identity> {
        let current = self.current_identity().ok_or(Error::NotAuthenticated)?;
        validate_identity_update(&update)?;

        let updated = current.merged(&update);
        let swapped = self.state.send_if_modified(|state| match state {
            SessionState::Authenticated(identity) if identity.id == updated.id => {
                *state = SessionState::Authenticated(updated.clone());
                true
            }
            _ => false,
        });
        if !swapped {
            return Err(Error::NotAuthenticated);
        }

        self.persist(&updated).await;
        // The session may have ended or changed hands during the save; the
        // stored record must follow the in-memory state, not this update.
        let current = self.current_identity();
        match current {
            Some(identity) if identity.id == updated.id => {}
            Some(other) => {
                debug!("Session changed to {} during profile update", other.id);
                self.persist(&other).await;
                return Err(Error::NotAuthenticated);
            }
            None => {
                debug!("Session for {} ended during profile update", updated.id);
                if let Err(e) = self.storage.clear(SESSION_STORAGE_KEY).await {
                    warn!("Failed to clear persisted session: {}", e);
                }
                return Err(Error::NotAuthenticated);
            }
        }

        self.event_sink
            .emit(DomainEvent::session_changed(Some(updated.id.clone())));
        Ok(updated)
    }

    async fn persist(&self, identity: &Identity) {
        match serde_json::to_string(identity) {
            Ok(json) => {
                if let Err(e) = self.storage.save(SESSION_STORAGE_KEY, &json).await {
                    warn!("Failed to persist session for {}: {}", identity.id, e);
                }
            }
            Err(e) => warn!("Failed to serialize session for {}: {}", identity.id, e),
        }
    }

    async fn establish(&self, identity: Identity) {
        // The in-memory session stays authoritative even if persisting fails.
        self.persist(&identity).await;

        let user_id = identity.id.clone();
        self.state.send_replace(SessionState::Authenticated(identity));
        self.event_sink
            .emit(DomainEvent::session_changed(Some(user_id)));
    }
}

fn classify_sign_in_error(err: GatewayError) -> Error {
    match err {
        GatewayError::AuthRejected(_) | GatewayError::NotFound(_) => Error::InvalidCredentials,
        GatewayError::Api { status, .. } if status == 400 || status == 401 => {
            Error::InvalidCredentials
        }
        other => {
            warn!("Sign-in failed: {}", other);
            Error::TransientFailure(other.to_string())
        }
    }
}

fn classify_sign_up_error(err: GatewayError, email: &str) -> Error {
    match err {
        GatewayError::Conflict(_) => Error::DuplicateIdentity(email.to_string()),
        GatewayError::AuthRejected(message) => {
            Error::Validation(ValidationError::InvalidInput(message))
        }
        GatewayError::Api { status, message } if (400..500).contains(&status) => {
            Error::Validation(ValidationError::InvalidInput(message))
        }
        other => {
            warn!("Sign-up failed: {}", other);
            Error::TransientFailure(other.to_string())
        }
    }
}

fn validate_sign_up(profile: &SignUpProfile, password: &str) -> Result<()> {
    let mut errors = Vec::new();
    if !has_min_chars(&profile.name, MIN_NAME_CHARS) {
        errors.push(FieldError::new(
            "name",
            "Name must be at least 2 characters.",
        ));
    }
    if !is_valid_email(&profile.email) {
        errors.push(FieldError::new(
            "email",
            "Please enter a valid email address.",
        ));
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 8 characters.",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Fields(errors).into())
    }
}

fn validate_identity_update(update: &IdentityUpdate) -> Result<()> {
    let mut errors = Vec::new();
    if let Some(name) = &update.name {
        if !has_min_chars(name, MIN_NAME_CHARS) {
            errors.push(FieldError::new(
                "name",
                "Name must be at least 2 characters.",
            ));
        }
    }
    if let Some(email) = &update.email {
        if !is_valid_email(email) {
            errors.push(FieldError::new(
                "email",
                "Please enter a valid email address.",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Fields(errors).into())
    }
}
