use log::debug;
use serde::Serialize;
use tokio::sync::watch;

use super::return_path::auth_redirect;
use super::routes::AppRoute;
use crate::session::SessionState;

/// Outcome of a navigation check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AccessDecision {
    Render,
    /// The session is still being resolved; show a neutral waiting state.
    AwaitSession,
    RedirectToAuth {
        original: String,
        redirect_to: String,
    },
}

/// Gates identity-requiring routes on the session state.
pub struct AccessGuard;

impl AccessGuard {
    pub fn evaluate(state: &SessionState, path_and_query: &str) -> AccessDecision {
        if !AppRoute::parse(path_and_query).requires_session() {
            return AccessDecision::Render;
        }
        match state {
            SessionState::Authenticated(_) => AccessDecision::Render,
            SessionState::Uninitialized | SessionState::Loading => AccessDecision::AwaitSession,
            SessionState::Unauthenticated => {
                debug!("Redirecting {} to sign-in", path_and_query);
                AccessDecision::RedirectToAuth {
                    original: path_and_query.to_string(),
                    redirect_to: auth_redirect(path_and_query),
                }
            }
        }
    }

    /// Re-evaluates on every session transition until the decision is no
    /// longer `AwaitSession`.
    ///
    /// Pends for as long as the session does; if the store goes away first
    /// the last decision is returned.
    pub async fn settle(
        receiver: &mut watch::Receiver<SessionState>,
        path_and_query: &str,
    ) -> AccessDecision {
        loop {
            let decision = {
                let state = receiver.borrow_and_update();
                Self::evaluate(&state, path_and_query)
            };
            if decision != AccessDecision::AwaitSession {
                return decision;
            }
            if receiver.changed().await.is_err() {
                return decision;
            }
        }
    }
}
