//! Fixed route surface of the app.

use serde::Serialize;

/// Named application routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "route", content = "id", rename_all = "kebab-case")]
pub enum AppRoute {
    Home,
    About,
    Contact,
    Campaigns,
    CampaignDetail(String),
    Donate,
    Login,
    Profile,
    CreateCampaign,
    NotFound,
}

impl AppRoute {
    /// Resolves a path, ignoring any query string or fragment and a
    /// trailing slash.
    pub fn parse(path_and_query: &str) -> Self {
        let path = path_and_query
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };

        match path {
            "/" => AppRoute::Home,
            "/about" => AppRoute::About,
            "/contact" => AppRoute::Contact,
            "/campaigns" => AppRoute::Campaigns,
            "/donate" => AppRoute::Donate,
            "/login" => AppRoute::Login,
            "/profile" => AppRoute::Profile,
            "/create-campaign" => AppRoute::CreateCampaign,
            other => match other.strip_prefix("/campaigns/") {
                Some(id) if !id.is_empty() && !id.contains('/') => {
                    AppRoute::CampaignDetail(id.to_string())
                }
                _ => AppRoute::NotFound,
            },
        }
    }

    /// Canonical path of the route.
    pub fn path(&self) -> String {
        match self {
            AppRoute::Home => "/".to_string(),
            AppRoute::About => "/about".to_string(),
            AppRoute::Contact => "/contact".to_string(),
            AppRoute::Campaigns => "/campaigns".to_string(),
            AppRoute::CampaignDetail(id) => format!("/campaigns/{}", id),
            AppRoute::Donate => "/donate".to_string(),
            AppRoute::Login => "/login".to_string(),
            AppRoute::Profile => "/profile".to_string(),
            AppRoute::CreateCampaign => "/create-campaign".to_string(),
            AppRoute::NotFound => "/404".to_string(),
        }
    }

    /// Routes that only render for a signed-in identity.
    pub fn requires_session(&self) -> bool {
        matches!(self, AppRoute::Profile | AppRoute::CreateCampaign)
    }
}
