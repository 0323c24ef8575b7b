//! GoTrue credential exchange and registration.

use async_trait::async_trait;
use hopefund_core::errors::{GatewayError, GatewayResult};
use hopefund_core::session::{AuthGatewayTrait, Identity, SignUpProfile, UserRole};
use log::{debug, info};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::{parse_response, SupabaseClient};
use crate::error::{classify_auth_status, transport_error};

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
}

/// Token grant or sign-up response. Sign-up returns the bare user when
/// email confirmation is pending.
#[derive(Debug, Deserialize)]
struct AuthSession {
    #[serde(default)]
    access_token: Option<String>,
    user: AuthUser,
}

impl AuthUser {
    fn into_identity(self, fallback_email: &str) -> Identity {
        let email = self
            .email
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| fallback_email.to_string());
        let name = self
            .user_metadata
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
        let role = self
            .user_metadata
            .role
            .and_then(|r| r.parse::<UserRole>().ok())
            .unwrap_or_default();
        Identity {
            id: self.id,
            name,
            email,
            role,
            avatar: self.user_metadata.avatar.filter(|a| !a.trim().is_empty()),
        }
    }
}

fn parse_auth_body(body: &Value) -> GatewayResult<(Option<String>, AuthUser)> {
    if body.get("user").is_some() {
        let session: AuthSession = serde_json::from_value(body.clone())
            .map_err(|e| GatewayError::Decode(format!("auth session: {}", e)))?;
        return Ok((session.access_token, session.user));
    }
    let user: AuthUser = serde_json::from_value(body.clone())
        .map_err(|e| GatewayError::Decode(format!("auth user: {}", e)))?;
    Ok((None, user))
}

impl SupabaseClient {
    async fn auth_post(&self, path: &str, body: Value) -> GatewayResult<Value> {
        let response = self
            .request(Method::POST, path)?
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("Auth request failed", e))?;
        parse_response(response, classify_auth_status).await
    }

    fn accept_session(&self, body: Value, email: &str) -> GatewayResult<Identity> {
        let (token, user) = parse_auth_body(&body)?;
        if token.is_some() {
            self.set_access_token(token);
        }
        Ok(user.into_identity(email))
    }
}

#[async_trait]
impl AuthGatewayTrait for SupabaseClient {
    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<Identity> {
        debug!("[Supabase] Password grant for {}", email);
        let body = self
            .auth_post(
                "/auth/v1/token?grant_type=password",
                json!({ "email": email, "password": password }),
            )
            .await?;
        let identity = self.accept_session(body, email)?;
        info!("[Supabase] Signed in {}", identity.id);
        Ok(identity)
    }

    async fn sign_up(&self, profile: &SignUpProfile, password: &str) -> GatewayResult<Identity> {
        debug!("[Supabase] Registering {}", profile.email);
        let body = self
            .auth_post(
                "/auth/v1/signup",
                json!({
                    "email": profile.email,
                    "password": password,
                    "data": {
                        "name": profile.name,
                        "role": profile.role.as_str(),
                        "avatar": Value::Null,
                    },
                }),
            )
            .await?;
        let mut identity = self.accept_session(body, &profile.email)?;
        if identity.name.is_empty() {
            identity.name = profile.name.clone();
        }
        info!("[Supabase] Registered {}", identity.id);
        Ok(identity)
    }
}
