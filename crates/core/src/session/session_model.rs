//! Session domain models.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of roles an identity can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Donor,
    Organizer,
    Volunteer,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Donor => "donor",
            UserRole::Organizer => "organizer",
            UserRole::Volunteer => "volunteer",
            UserRole::Admin => "admin",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "donor" => Ok(UserRole::Donor),
            "organizer" => Ok(UserRole::Organizer),
            "volunteer" => Ok(UserRole::Volunteer),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("Unknown role '{}'", other)),
        }
    }
}

/// The authenticated principal using the application.
///
/// This is also the persisted session record, so it must never grow a
/// credential field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Identity {
    /// Applies a partial update, leaving unspecified fields untouched.
    pub fn merged(&self, update: &IdentityUpdate) -> Identity {
        Identity {
            id: self.id.clone(),
            name: update.name.clone().unwrap_or_else(|| self.name.clone()),
            email: update.email.clone().unwrap_or_else(|| self.email.clone()),
            role: update.role.unwrap_or(self.role),
            avatar: match &update.avatar {
                Some(avatar) => avatar.clone(),
                None => self.avatar.clone(),
            },
        }
    }
}

/// Partial identity used by profile updates.
///
/// `avatar: Some(None)` clears the avatar; `avatar: None` keeps it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<UserRole>,
    #[serde(default, with = "double_option")]
    pub avatar: Option<Option<String>>,
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<Option<String>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Some(Option::<String>::deserialize(deserializer)?))
    }
}

/// Profile submitted when registering a new identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpProfile {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
}

/// Email/password pair exchanged for a session.
///
/// Deliberately not `Serialize`, and `Debug` hides the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Lifecycle state of the session store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// `restore()` has not been called yet.
    #[default]
    Uninitialized,
    /// A persisted session is being resolved.
    Loading,
    Authenticated(Identity),
    Unauthenticated,
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }

    /// Whether the initial resolution has completed.
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            SessionState::Authenticated(_) | SessionState::Unauthenticated
        )
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            identity: self.identity().cloned(),
            is_loading: self.is_loading(),
            is_authenticated: self.identity().is_some(),
        }
    }
}

/// Read projection handed to views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub identity: Option<Identity>,
    pub is_loading: bool,
    pub is_authenticated: bool,
}
