use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("JSONP wrapper not found in response: {preview}")]
    FormatError { preview: String },

    #[error("Invalid JSON payload: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    TransportError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Source,
    Network,
    Storage,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    /// Number of characters kept from an offending response.
    pub const PREVIEW_CHARS: usize = 200;

    pub fn format_error(raw: &str) -> Self {
        EtlError::FormatError {
            preview: raw.chars().take(Self::PREVIEW_CHARS).collect(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::FormatError { .. } | EtlError::ParseError(_) => ErrorCategory::Source,
            EtlError::TransportError(_) => ErrorCategory::Network,
            EtlError::IoError(_) => ErrorCategory::Storage,
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // a single bad source only costs its own rows
            EtlError::FormatError { .. } | EtlError::ParseError(_) => ErrorSeverity::Low,
            EtlError::TransportError(_) => ErrorSeverity::Medium,
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorSeverity::High,
            EtlError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// Whether the run may continue past this error when it comes from one endpoint.
    pub fn is_skippable(&self) -> bool {
        self.category() == ErrorCategory::Source
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::FormatError { .. } => {
                "Check that the endpoint still returns a callback(...) JSONP response"
            }
            EtlError::ParseError(_) => "The endpoint returned a truncated or malformed JSON body",
            EtlError::TransportError(_) => {
                "Check network connectivity, or rerun with --skip-failed-endpoints"
            }
            EtlError::IoError(_) => "Check that the output directory exists and is writable",
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => {
                "Review the configuration file and command line flags"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::FormatError { .. } => "A source returned an unexpected response".to_string(),
            EtlError::ParseError(e) => format!("A source returned invalid JSON: {}", e),
            EtlError::TransportError(e) => match e.url() {
                Some(url) => format!("Could not fetch {}", url),
                None => "Could not reach a source".to_string(),
            },
            EtlError::IoError(e) => format!("Could not write output: {}", e),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
