use std::env;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://study.sqlite3";
pub const DEFAULT_SCOPE: &str = "default";

/// Validated runtime settings for the study services.
#[derive(Clone, PartialEq, Eq)]
pub struct StudyConfig {
    base_url: Url,
    api_key: Option<String>,
    request_timeout: Duration,
    database_url: String,
    scope: String,
}

/// Raw settings as read from the environment or supplied by an embedder.
#[derive(Clone, Debug, Default)]
pub struct StudyConfigDraft {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_secs: Option<String>,
    pub database_url: Option<String>,
    pub scope: Option<String>,
}

impl StudyConfigDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self {
            base_url: env::var("STUDY_API_BASE_URL").ok(),
            api_key: env::var("STUDY_API_KEY").ok(),
            request_timeout_secs: env::var("STUDY_API_TIMEOUT_SECS").ok(),
            database_url: env::var("STUDY_DB_URL").ok(),
            scope: env::var("STUDY_SCOPE").ok(),
        }
    }

    /// Apply defaults and check every value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the base URL is not an http(s) URL, the timeout is
    /// not a positive number of seconds, or the database URL / scope are unusable.
    pub fn validate(self) -> Result<StudyConfig, ConfigError> {
        let raw_base = normalize_optional(self.base_url).unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let base_url =
            Url::parse(&raw_base).map_err(|_| ConfigError::InvalidBaseUrl(raw_base.clone()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl(raw_base));
        }

        let request_timeout = match normalize_optional(self.request_timeout_secs) {
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidTimeout(raw)),
            },
        };

        let database_url =
            normalize_optional(self.database_url).unwrap_or_else(|| DEFAULT_DATABASE_URL.into());
        if !database_url.starts_with("sqlite:") {
            return Err(ConfigError::InvalidDatabaseUrl(database_url));
        }

        let scope = normalize_optional(self.scope).unwrap_or_else(|| DEFAULT_SCOPE.into());
        if scope.contains('/') {
            return Err(ConfigError::InvalidScope(scope));
        }

        Ok(StudyConfig {
            base_url,
            api_key: normalize_optional(self.api_key),
            request_timeout,
            database_url,
            scope,
        })
    }
}

impl StudyConfig {
    /// Read and validate `STUDY_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any variable holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        StudyConfigDraft::from_env().validate()
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }
}

impl std::fmt::Debug for StudyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudyConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("request_timeout", &self.request_timeout)
            .field("database_url", &self.database_url)
            .field("scope", &self.scope)
            .finish()
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
