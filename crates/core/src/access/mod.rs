//! Access module - route table, the access guard, and return-destination
//! handling for the sign-in redirect.

mod access_guard;
mod return_path;
mod routes;

pub use access_guard::{AccessDecision, AccessGuard};
pub use return_path::{auth_redirect, decode_return_path, encode_return_path, return_destination};
pub use routes::AppRoute;
