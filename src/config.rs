//! Settings
//!
//! Read-only settings of the generation client, loaded once (usually from the
//! environment) and turned into a [`BackendProfile`].

use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ImageGenError, Result};
use crate::retry::{DEFAULT_MAX_RETRIES, RetryPolicy};
use crate::types::{
    BackendProfile, DEFAULT_CANVAS_MAX_HEIGHT, DEFAULT_CANVAS_MAX_WIDTH, Dialect,
};

pub const DEFAULT_IMAGE_ENDPOINT: &str = "/v1/images/generations";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_STATIC_DIR: &str = "./static";

/// Environment variable names read by [`ImageSettings::from_env`].
pub mod env {
    pub const IMAGE_BASE_URL: &str = "IMAGE_BASE_URL";
    pub const IMAGE_ENDPOINT: &str = "IMAGE_ENDPOINT";
    pub const IMAGE_API_KEY: &str = "IMAGE_API_KEY";
    pub const IMAGE_MODEL: &str = "IMAGE_MODEL";
    pub const REQUEST_TIMEOUT_S: &str = "REQUEST_TIMEOUT_S";
    pub const IMAGE_I2I_ENABLED: &str = "IMAGE_I2I_ENABLED";
    pub const IMAGE_DIALECT: &str = "IMAGE_DIALECT";
    pub const STATIC_DIR: &str = "STATIC_DIR";
    pub const IMAGE_MAX_RETRIES: &str = "IMAGE_MAX_RETRIES";
}

/// Image generation settings
#[derive(Debug, Clone)]
pub struct ImageSettings {
    /// Backend base URL
    pub image_base_url: String,
    /// Generation endpoint path
    pub image_endpoint: String,
    /// API key for authentication
    pub image_api_key: SecretString,
    /// Model to use
    pub image_model: String,
    /// Timeout of ordinary backend calls
    pub request_timeout: Duration,
    /// Whether reference images are sent as image-to-image requests
    pub i2i_enabled: bool,
    /// Explicit dialect; detected from the URLs when unset
    pub dialect: Option<Dialect>,
    /// Directory served under `/static/`
    pub static_root: PathBuf,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub canvas_max_width: u32,
    pub canvas_max_height: u32,
}

impl ImageSettings {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            image_base_url: base_url.to_string(),
            image_endpoint: DEFAULT_IMAGE_ENDPOINT.to_string(),
            image_api_key: SecretString::from(api_key.to_string()),
            image_model: model.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            i2i_enabled: false,
            dialect: None,
            static_root: PathBuf::from(DEFAULT_STATIC_DIR),
            max_retries: DEFAULT_MAX_RETRIES,
            canvas_max_width: DEFAULT_CANVAS_MAX_WIDTH,
            canvas_max_height: DEFAULT_CANVAS_MAX_HEIGHT,
        }
    }

    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through `lookup` (an environment stand-in).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut settings = Self::new(
            &get(env::IMAGE_BASE_URL).unwrap_or_default(),
            &get(env::IMAGE_API_KEY).unwrap_or_default(),
            &get(env::IMAGE_MODEL).unwrap_or_default(),
        );

        if let Some(endpoint) = get(env::IMAGE_ENDPOINT) {
            settings.image_endpoint = endpoint;
        }
        if let Some(timeout) = get(env::REQUEST_TIMEOUT_S) {
            let secs: f64 = parse_var(env::REQUEST_TIMEOUT_S, &timeout)?;
            settings.request_timeout = Duration::try_from_secs_f64(secs).map_err(|e| {
                ImageGenError::ConfigurationError(format!(
                    "Invalid {}: {timeout} ({e})",
                    env::REQUEST_TIMEOUT_S
                ))
            })?;
        }
        if let Some(flag) = get(env::IMAGE_I2I_ENABLED) {
            settings.i2i_enabled = parse_flag(env::IMAGE_I2I_ENABLED, &flag)?;
        }
        if let Some(dialect) = get(env::IMAGE_DIALECT) {
            settings.dialect = Some(dialect.parse()?);
        }
        if let Some(dir) = get(env::STATIC_DIR) {
            settings.static_root = PathBuf::from(dir);
        }
        if let Some(retries) = get(env::IMAGE_MAX_RETRIES) {
            settings.max_retries = parse_var(env::IMAGE_MAX_RETRIES, &retries)?;
        }

        Ok(settings)
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.image_endpoint = endpoint.to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_i2i_enabled(mut self, enabled: bool) -> Self {
        self.i2i_enabled = enabled;
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn with_static_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.static_root = root.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_canvas(mut self, max_width: u32, max_height: u32) -> Self {
        self.canvas_max_width = max_width;
        self.canvas_max_height = max_height;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.image_api_key.expose_secret().is_empty() {
            return Err(ImageGenError::ConfigurationError(
                "API key cannot be empty".to_string(),
            ));
        }

        if self.image_base_url.is_empty() {
            return Err(ImageGenError::ConfigurationError(
                "Base URL cannot be empty".to_string(),
            ));
        }

        if !self.image_base_url.starts_with("http://")
            && !self.image_base_url.starts_with("https://")
        {
            return Err(ImageGenError::ConfigurationError(
                "Base URL must start with http:// or https://".to_string(),
            ));
        }

        if self.canvas_max_width == 0 || self.canvas_max_height == 0 {
            return Err(ImageGenError::ConfigurationError(
                "Canvas dimensions must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// The dialect in effect: the explicit one, or the detected one.
    pub fn effective_dialect(&self) -> Dialect {
        self.dialect
            .unwrap_or_else(|| Dialect::detect(&self.image_base_url, &self.image_endpoint))
    }

    /// Validated backend profile with the dialect fixed.
    pub fn profile(&self) -> Result<BackendProfile> {
        self.validate()?;
        Ok(BackendProfile {
            base_url: self.image_base_url.clone(),
            endpoint_path: self.image_endpoint.clone(),
            api_key: self.image_api_key.clone(),
            model: self.image_model.clone(),
            dialect: self.effective_dialect(),
            request_timeout: self.request_timeout,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_retries(self.max_retries)
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| ImageGenError::ConfigurationError(format!("Invalid {name}: {value} ({e})")))
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ImageGenError::ConfigurationError(format!(
            "Invalid {name}: {value} (expected true/false)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = ImageSettings::from_lookup(lookup(&[
            ("IMAGE_BASE_URL", "https://api.example.com"),
            ("IMAGE_API_KEY", "sk-1"),
        ]))
        .unwrap();
        assert_eq!(settings.image_endpoint, DEFAULT_IMAGE_ENDPOINT);
        assert_eq!(settings.request_timeout, Duration::from_secs(60));
        assert!(!settings.i2i_enabled);
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.static_root, PathBuf::from("./static"));
        assert_eq!(settings.effective_dialect(), Dialect::Json);
    }

    #[test]
    fn reads_every_variable() {
        let settings = ImageSettings::from_lookup(lookup(&[
            ("IMAGE_BASE_URL", "https://api.example.com"),
            ("IMAGE_ENDPOINT", "/v1/chat/completions"),
            ("IMAGE_API_KEY", "sk-1"),
            ("IMAGE_MODEL", "m"),
            ("REQUEST_TIMEOUT_S", "2.5"),
            ("IMAGE_I2I_ENABLED", "Yes"),
            ("STATIC_DIR", "/srv/static"),
            ("IMAGE_MAX_RETRIES", "5"),
        ]))
        .unwrap();
        assert_eq!(settings.request_timeout, Duration::from_millis(2500));
        assert!(settings.i2i_enabled);
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.retry_policy().max_attempts(), 6);
        let profile = settings.profile().unwrap();
        assert_eq!(profile.dialect, Dialect::ChatStream);
        assert_eq!(profile.model, "m");
    }

    #[test]
    fn explicit_dialect_wins_over_detection() {
        let settings = ImageSettings::from_lookup(lookup(&[
            ("IMAGE_BASE_URL", "https://api-inference.modelscope.cn"),
            ("IMAGE_API_KEY", "k"),
            ("IMAGE_DIALECT", "json"),
        ]))
        .unwrap();
        assert_eq!(settings.profile().unwrap().dialect, Dialect::Json);
    }

    #[test]
    fn malformed_values_are_configuration_errors() {
        for (key, value) in [
            ("REQUEST_TIMEOUT_S", "soon"),
            ("IMAGE_I2I_ENABLED", "maybe"),
            ("IMAGE_DIALECT", "grpc"),
            ("IMAGE_MAX_RETRIES", "-1"),
        ] {
            let err = ImageSettings::from_lookup(lookup(&[(key, value)])).unwrap_err();
            assert!(
                matches!(err, ImageGenError::ConfigurationError(_)),
                "{key}={value}"
            );
        }
    }

    #[test]
    fn validation_rejects_missing_key_and_bad_url() {
        assert!(ImageSettings::new("https://a", "", "m").validate().is_err());
        assert!(ImageSettings::new("", "k", "m").validate().is_err());
        assert!(ImageSettings::new("ftp://a", "k", "m").validate().is_err());
        assert!(ImageSettings::new("https://a", "k", "m").validate().is_ok());
    }

    #[test]
    fn api_key_is_not_printed() {
        let settings = ImageSettings::new("https://a", "sk-very-secret", "m");
        assert!(!format!("{settings:?}").contains("sk-very-secret"));
    }
}
