//! Runtime configuration read from the environment (and `.env`).

use std::path::PathBuf;

use hopefund_supabase::SupabaseConfig;

pub const DEFAULT_SESSION_FILE: &str = ".hopefund/session.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` when the project URL or anon key is missing.
    pub supabase: Option<SupabaseConfig>,
    pub session_file: PathBuf,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let supabase = match (
            non_empty("HOPEFUND_SUPABASE_URL"),
            non_empty("HOPEFUND_SUPABASE_ANON_KEY"),
        ) {
            (Some(url), Some(key)) => Some(SupabaseConfig::new(url, key)),
            _ => None,
        };
        let session_file = non_empty("HOPEFUND_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE));
        let log_format = match non_empty("HOPEFUND_LOG_FORMAT") {
            Some(format) if format.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            supabase,
            session_file,
            log_format,
        }
    }

    /// Session file used with the in-memory backend, kept apart from the
    /// online one.
    pub fn offline_session_file(&self) -> PathBuf {
        self.session_file.with_extension("offline.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert!(config.supabase.is_none());
        assert_eq!(config.session_file, PathBuf::from(DEFAULT_SESSION_FILE));
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(
            config.offline_session_file(),
            PathBuf::from(".hopefund/session.offline.json")
        );
    }

    #[test]
    fn test_supabase_needs_url_and_key() {
        let partial = config(&[("HOPEFUND_SUPABASE_URL", "https://abc.supabase.co")]);
        assert!(partial.supabase.is_none());

        let full = config(&[
            ("HOPEFUND_SUPABASE_URL", "https://abc.supabase.co/"),
            ("HOPEFUND_SUPABASE_ANON_KEY", "anon"),
            ("HOPEFUND_LOG_FORMAT", "JSON"),
            ("HOPEFUND_SESSION_FILE", "/tmp/hf.json"),
        ]);
        assert_eq!(
            full.supabase,
            Some(SupabaseConfig::new("https://abc.supabase.co", "anon"))
        );
        assert_eq!(full.log_format, LogFormat::Json);
        assert_eq!(full.session_file, PathBuf::from("/tmp/hf.json"));
    }
}
