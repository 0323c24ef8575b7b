//! Shared HTTP client for a Supabase project.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use hopefund_core::errors::{GatewayError, GatewayResult};
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{classify_status, transport_error};

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Project URL and public anon key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let url: String = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }
}

/// HTTP client for GoTrue and PostgREST.
///
/// Requests carry the project `apikey` and a bearer token: the signed-in
/// user's access token once one is known, the anon key before that.
#[derive(Clone)]
pub struct SupabaseClient {
    pub(crate) http: reqwest::Client,
    pub(crate) config: SupabaseConfig,
    access_token: Arc<RwLock<Option<String>>>,
}

impl SupabaseClient {
    pub fn new(config: SupabaseConfig) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                GatewayError::Unavailable(format!("Failed to initialize HTTP client: {}", e))
            })?;
        Ok(Self {
            http,
            config,
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    /// Token sent as bearer; falls back to the anon key.
    pub fn bearer_token(&self) -> String {
        self.access_token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .unwrap_or_else(|| self.config.anon_key.clone())
    }

    pub(crate) fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    /// Drops the user token so later requests go out with the anon key.
    pub fn clear_access_token(&self) {
        self.set_access_token(None);
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.url, path)
    }

    fn headers(&self) -> GatewayResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let apikey = HeaderValue::from_str(&self.config.anon_key)
            .map_err(|e| GatewayError::Unavailable(format!("Invalid anon key: {}", e)))?;
        headers.insert("apikey", apikey);
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.bearer_token()))
            .map_err(|e| GatewayError::Unavailable(format!("Invalid access token format: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> GatewayResult<RequestBuilder> {
        let url = self.url(path);
        debug!("[Supabase] {} {}", method, url);
        Ok(self.http.request(method, url).headers(self.headers()?))
    }

    pub(crate) async fn send_json<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> GatewayResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut request = self.request(method, path)?;
        if let Some(body) = body {
            request = request
                .header("Prefer", "return=representation")
                .json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| transport_error("Request failed", e))?;
        parse_response(response, classify_status).await
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> GatewayResult<T> {
        self.send_json::<T, ()>(Method::GET, path, None).await
    }
}

/// Reads the body and decodes it, classifying non-success statuses with
/// `classify`.
pub(crate) async fn parse_response<T: DeserializeOwned>(
    response: Response,
    classify: fn(StatusCode, &str) -> GatewayError,
) -> GatewayResult<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error("Failed to read response", e))?;

    if !status.is_success() {
        return Err(classify(status, &body));
    }
    decode_body(&body)
}

pub(crate) fn decode_body<T: DeserializeOwned>(body: &str) -> GatewayResult<T> {
    serde_json::from_str(body).map_err(|e| {
        let snippet: String = body.chars().take(200).collect();
        GatewayError::Decode(format!("{} - {}", e, snippet))
    })
}
