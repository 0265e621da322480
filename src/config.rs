use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// How the analysis image reaches the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTransport {
    /// Base64 `inlineData` part in the request body
    Inline,
    /// Uploaded through the File API first, then referenced by URI
    Upload,
}

impl ImageTransport {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "inline" => Some(ImageTransport::Inline),
            "upload" | "file" | "file_api" => Some(ImageTransport::Upload),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub analysis_model: String,
    pub base_url: String,
    pub image_transport: ImageTransport,
    pub request_timeout: Duration,
    pub label_output_dir: PathBuf,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any key lookup. Blank values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("GEMINI_API_KEY").ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;
        let analysis_model = get("MODEL_NAME").ok_or(ConfigError::Missing("MODEL_NAME"))?;

        let base_url = get("GEMINI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let image_transport = match get("GEMINI_IMAGE_TRANSPORT") {
            Some(value) => ImageTransport::parse(&value).ok_or_else(|| ConfigError::Invalid {
                name: "GEMINI_IMAGE_TRANSPORT",
                value: value.clone(),
                reason: "expected 'inline' or 'upload'".to_string(),
            })?,
            None => ImageTransport::Inline,
        };

        let timeout_secs = match get("REQUEST_TIMEOUT_SECS") {
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "REQUEST_TIMEOUT_SECS",
                        value,
                        reason: "expected a positive number of seconds".to_string(),
                    })
                }
            },
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            api_key,
            analysis_model,
            base_url,
            image_transport,
            request_timeout: Duration::from_secs(timeout_secs),
            label_output_dir: PathBuf::from(
                get("LABEL_OUTPUT_DIR").unwrap_or_else(|| "labels".to_string()),
            ),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "key"),
            ("MODEL_NAME", "gemini-1.5-flash"),
        ]))
        .unwrap();

        assert_eq!(config.api_key, "key");
        assert_eq!(config.analysis_model, "gemini-1.5-flash");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.image_transport, ImageTransport::Inline);
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.label_output_dir, PathBuf::from("labels"));
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let err = Config::from_lookup(lookup(&[("MODEL_NAME", "m")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GEMINI_API_KEY")));
    }

    #[test]
    fn test_blank_model_counts_as_missing() {
        let err = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "k"), ("MODEL_NAME", "  ")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("MODEL_NAME")));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("MODEL_NAME", "m"),
            ("GEMINI_BASE_URL", "http://127.0.0.1:9000/"),
            ("GEMINI_IMAGE_TRANSPORT", "Upload"),
            ("REQUEST_TIMEOUT_SECS", "15"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.image_transport, ImageTransport::Upload);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_invalid_values() {
        let err = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("MODEL_NAME", "m"),
            ("REQUEST_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "REQUEST_TIMEOUT_SECS", .. }));

        let err = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("MODEL_NAME", "m"),
            ("GEMINI_IMAGE_TRANSPORT", "carrier-pigeon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "GEMINI_IMAGE_TRANSPORT", .. }));
    }
}
