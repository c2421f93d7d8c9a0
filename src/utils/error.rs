use thiserror::Error;

#[derive(Error, Debug)]
pub enum PusherError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("[{status}] {error_type}: {reason}")]
    SinkError {
        status: u16,
        error_type: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, PusherError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Io,
    Configuration,
    Data,
    Sink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PusherError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PusherError::HttpError(_) => ErrorCategory::Network,
            PusherError::IoError(_) => ErrorCategory::Io,
            PusherError::SerializationError(_) | PusherError::ProcessingError { .. } => {
                ErrorCategory::Data
            }
            PusherError::ConfigError { .. }
            | PusherError::InvalidConfigValueError { .. }
            | PusherError::MissingConfigError { .. } => ErrorCategory::Configuration,
            PusherError::SinkError { .. } => ErrorCategory::Sink,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PusherError::SinkError { status, .. } if *status >= 500 => ErrorSeverity::Medium,
            PusherError::HttpError(_) => ErrorSeverity::Medium,
            PusherError::SinkError { .. }
            | PusherError::ProcessingError { .. }
            | PusherError::SerializationError(_) => ErrorSeverity::High,
            PusherError::IoError(_)
            | PusherError::ConfigError { .. }
            | PusherError::InvalidConfigValueError { .. }
            | PusherError::MissingConfigError { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            PusherError::HttpError(_) => {
                "Check that the Elasticsearch host is reachable and try again".to_string()
            }
            PusherError::IoError(_) => {
                "Check that the input file exists and is readable".to_string()
            }
            PusherError::SerializationError(_) => {
                "The document could not be encoded as JSON; inspect the input file".to_string()
            }
            PusherError::ConfigError { .. } | PusherError::MissingConfigError { .. } => {
                "Review the settings file and command line flags".to_string()
            }
            PusherError::InvalidConfigValueError { field, .. } => {
                format!("Fix the value of '{}' in the settings file", field)
            }
            PusherError::ProcessingError { .. } => {
                "Make sure every line of the input is a single JSON object".to_string()
            }
            PusherError::SinkError { status: 401, .. } | PusherError::SinkError { status: 403, .. } => {
                "Check the username/password or API key in the settings file".to_string()
            }
            PusherError::SinkError { status: 409, .. } => {
                "A document with this id already exists; push again to get a new id".to_string()
            }
            PusherError::SinkError { .. } => {
                "Inspect the index mapping and the rejected document".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            PusherError::HttpError(e) => format!("Could not reach Elasticsearch: {}", e),
            PusherError::IoError(e) => format!("Could not read input: {}", e),
            PusherError::SinkError { status, reason, .. } => {
                format!("Elasticsearch rejected the request ({}): {}", status, reason)
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_error_display() {
        let err = PusherError::SinkError {
            status: 400,
            error_type: "mapper_parsing_exception".to_string(),
            reason: "failed to parse".to_string(),
        };
        assert_eq!(err.to_string(), "[400] mapper_parsing_exception: failed to parse");
        assert_eq!(err.category(), ErrorCategory::Sink);
        assert_eq!(err.severity(), ErrorSeverity::High);
    }

    #[test]
    fn test_severity_of_setup_errors() {
        let io = PusherError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing.txt",
        ));
        assert_eq!(io.severity(), ErrorSeverity::Critical);

        let config = PusherError::ConfigError {
            message: "both verbose and silent mode specified".to_string(),
        };
        assert_eq!(config.category(), ErrorCategory::Configuration);
        assert_eq!(config.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_server_side_sink_error_is_retryable() {
        let err = PusherError::SinkError {
            status: 503,
            error_type: "unavailable".to_string(),
            reason: "no master".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Medium);
    }
}
