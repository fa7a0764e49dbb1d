use crate::config::FeedConfig;
use crate::domain::ports::TransportPolicy;
use crate::utils::error::{EtlError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// On-disk configuration. Every section and key is optional; anything left
/// out keeps its built-in default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub source: Option<SourceConfig>,
    pub extract: Option<ExtractConfig>,
    pub transform: Option<TransformConfig>,
    pub load: Option<LoadConfig>,
    pub error_handling: Option<ErrorHandlingConfig>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    pub endpoints: Option<Vec<String>>,
    pub timeout_seconds: Option<u64>,
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractConfig {
    pub records_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformConfig {
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: Option<String>,
    pub output_file: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorHandlingConfig {
    pub on_transport_error: Option<TransportPolicy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub enabled: bool,
}

impl TomlConfig {
    /// Loads a configuration file, substituting environment variables first.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value. Unset variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Applies this file on top of the built-in defaults.
    pub fn into_feed_config(self) -> FeedConfig {
        let mut feed = FeedConfig::default();

        if let Some(source) = self.source {
            if let Some(endpoints) = source.endpoints {
                feed.endpoints = endpoints;
            }
            feed.timeout_seconds = source.timeout_seconds;
            if let Some(headers) = source.headers {
                feed.headers = headers;
            }
        }

        if let Some(records_key) = self.extract.and_then(|e| e.records_key) {
            feed.records_key = records_key;
        }

        if let Some(columns) = self.transform.and_then(|t| t.columns) {
            feed.columns = columns.iter().collect();
        }

        if let Some(load) = self.load {
            if let Some(output_path) = load.output_path {
                feed.output_path = output_path;
            }
            if let Some(output_file) = load.output_file {
                feed.output_file = output_file;
            }
        }

        if let Some(policy) = self.error_handling.and_then(|e| e.on_transport_error) {
            feed.transport_policy = policy;
        }

        feed.monitoring = self.monitoring.map(|m| m.enabled).unwrap_or(false);

        feed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validation::Validate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_toml_config() {
        let toml_content = r#"
[source]
endpoints = ["https://a.example/events?callback=cb", "https://b.example/events?callback=cb"]
timeout_seconds = 10
headers = { "User-Agent" = "jsonp-etl" }

[extract]
records_key = "shows"

[transform]
columns = ["id", "title", "lineup/0"]

[load]
output_path = "./out"
output_file = "shows_{timestamp}.csv"

[error_handling]
on_transport_error = "skip"

[monitoring]
enabled = true
"#;

        let feed = TomlConfig::from_toml_str(toml_content)
            .unwrap()
            .into_feed_config();

        assert_eq!(feed.endpoints.len(), 2);
        assert_eq!(feed.timeout_seconds, Some(10));
        assert_eq!(feed.headers.get("User-Agent").unwrap(), "jsonp-etl");
        assert_eq!(feed.records_key, "shows");
        assert_eq!(feed.columns.len(), 3);
        assert_eq!(feed.output_path, "./out");
        assert_eq!(feed.output_file, "shows_{timestamp}.csv");
        assert_eq!(feed.transport_policy, TransportPolicy::Skip);
        assert!(feed.monitoring);
        assert!(feed.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_keeps_defaults() {
        let feed = TomlConfig::from_toml_str("").unwrap().into_feed_config();
        assert_eq!(feed, FeedConfig::default());
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let result = TomlConfig::from_toml_str(
            r#"
[error_handling]
on_transport_error = "retry"
"#,
        );
        assert!(matches!(
            result,
            Err(EtlError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("JSONP_ETL_TEST_ENDPOINT", "https://env.example/feed");

        let toml_content = r#"
[source]
endpoints = ["${JSONP_ETL_TEST_ENDPOINT}", "${JSONP_ETL_TEST_UNSET_VAR}"]
"#;

        let feed = TomlConfig::from_toml_str(toml_content)
            .unwrap()
            .into_feed_config();
        assert_eq!(feed.endpoints[0], "https://env.example/feed");
        assert_eq!(feed.endpoints[1], "${JSONP_ETL_TEST_UNSET_VAR}");
        assert!(feed.validate().is_err());

        std::env::remove_var("JSONP_ETL_TEST_ENDPOINT");
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[transform]\ncolumns = [\"id\"]\n")
            .unwrap();

        let feed = TomlConfig::from_file(temp_file.path())
            .unwrap()
            .into_feed_config();
        assert_eq!(feed.columns.len(), 1);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = TomlConfig::from_file("/definitely/not/here.toml");
        assert!(matches!(result, Err(EtlError::IoError(_))));
    }
}
