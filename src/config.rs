use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RepodropError;

pub const DEFAULT_CONFIG_FILE: &str = "repodrop.json";
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_BACKEND_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const DEFAULT_CLIENT_ID: &str = "Iv23li1NynDwC1eCb484";
pub const DEFAULT_MIN_UPLOAD_DISPLAY_MS: u64 = 3000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub backend_base_url: Option<String>,
    #[serde(default)]
    pub oauth: Option<OauthConfig>,
    #[serde(default)]
    pub min_upload_display_ms: Option<u64>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub bootstrap_help_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct OauthConfig {
    #[serde(default)]
    pub authorize_url: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OauthSettings {
    pub authorize_url: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub api_base_url: String,
    pub backend_base_url: String,
    pub oauth: OauthSettings,
    pub min_upload_display: Duration,
    pub request_timeout: Duration,
    pub bootstrap_help_url: String,
}

/// Environment values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub api_base_url: Option<String>,
    pub backend_base_url: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            api_base_url: non_empty_env("REPODROP_API_URL"),
            backend_base_url: non_empty_env("REPODROP_BACKEND_URL"),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, RepodropError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| RepodropError::ConfigRead(config_path.display().to_string()))?;
            serde_json::from_str(&content)
                .map_err(|err| RepodropError::ConfigParse(err.to_string()))?
        };

        Self::resolve_config(config, &EnvOverrides::from_env())
    }

    pub fn resolve_config(
        config: Config,
        overrides: &EnvOverrides,
    ) -> Result<ResolvedConfig, RepodropError> {
        let api_base_url = normalize_base_url(
            overrides
                .api_base_url
                .clone()
                .or(config.api_base_url)
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        )?;
        let backend_base_url = normalize_base_url(
            overrides
                .backend_base_url
                .clone()
                .or(config.backend_base_url)
                .unwrap_or_else(|| DEFAULT_BACKEND_BASE_URL.to_string()),
        )?;

        let oauth = config.oauth.unwrap_or_default();
        let scopes = oauth
            .scopes
            .filter(|scopes| !scopes.is_empty())
            .unwrap_or_else(default_scopes);
        let oauth = OauthSettings {
            authorize_url: oauth
                .authorize_url
                .unwrap_or_else(|| DEFAULT_AUTHORIZE_URL.to_string()),
            client_id: oauth
                .client_id
                .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
            scopes,
            redirect_uri: oauth
                .redirect_uri
                .unwrap_or_else(|| format!("{backend_base_url}/api/callback")),
        };

        let min_upload_display_ms = config
            .min_upload_display_ms
            .unwrap_or(DEFAULT_MIN_UPLOAD_DISPLAY_MS);
        let request_timeout_secs = config
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            return Err(RepodropError::ConfigValue(
                "request_timeout_secs must be positive".to_string(),
            ));
        }

        let bootstrap_help_url = config
            .bootstrap_help_url
            .unwrap_or_else(|| format!("{backend_base_url}/tutorial.html"));

        Ok(ResolvedConfig {
            api_base_url,
            backend_base_url,
            oauth,
            min_upload_display: Duration::from_millis(min_upload_display_ms),
            request_timeout: Duration::from_secs(request_timeout_secs),
            bootstrap_help_url,
        })
    }
}

pub fn default_scopes() -> Vec<String> {
    vec!["repo".to_string(), "user".to_string()]
}

fn normalize_base_url(value: String) -> Result<String, RepodropError> {
    let trimmed = value.trim().trim_end_matches('/').to_string();
    reqwest::Url::parse(&trimmed)
        .map_err(|err| RepodropError::ConfigValue(format!("{trimmed}: {err}")))?;
    Ok(trimmed)
}
