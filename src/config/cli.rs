use super::settings::default_settings_path;
use crate::domain::model::InputType;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{PusherError, Result};
use crate::utils::logger::LogOptions;
use crate::utils::validation::{validate_index_name, validate_path, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::Level;

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "elastic-pusher", version)]
#[command(about = "Push data to the ELK stack from command line")]
pub struct CliConfig {
    /// Input file containing data to be stored
    #[arg(short = 'f', long = "file")]
    pub input_file: Option<String>,

    /// Index under which the data should be stored
    #[arg(short, long, default_value = "")]
    pub index: String,

    /// Input type: json (JSON lines), raw (HTTP transaction) or anything else
    #[arg(short = 't', long = "type", default_value = "json")]
    pub input_type: String,

    /// Project name for metadata addition
    #[arg(short, long, default_value = "")]
    pub project: String,

    /// Host name for metadata addition
    #[arg(short = 'H', long, default_value = "")]
    pub host: String,

    /// Settings file (YAML, or TOML with a .toml extension)
    #[arg(short, long, default_value_t = default_settings_path())]
    pub config: String,

    /// Check every JSON line and merge the project field structurally
    #[arg(long)]
    pub validate_json: bool,

    /// Show only errors
    #[arg(long)]
    pub silent: bool,

    /// Show verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colors in output
    #[arg(long)]
    pub no_color: bool,

    /// Log as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Create the index from this mapping file before pushing
    #[arg(long = "create-index", value_name = "MAPPING")]
    pub create_index: Option<String>,

    /// Also store log lines at or above this level in the index
    #[arg(long = "forward-logs", value_name = "LEVEL")]
    pub forward_logs: Option<String>,
}

impl CliConfig {
    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            verbose: self.verbose,
            silent: self.silent,
            no_color: self.no_color,
        }
    }

    /// Maximum level shipped to the index, when forwarding is on.
    pub fn forward_level(&self) -> Option<Level> {
        self.forward_logs.as_deref().and_then(|level| level.parse().ok())
    }
}

impl ConfigProvider for CliConfig {
    fn input_file(&self) -> Option<&str> {
        self.input_file.as_deref().filter(|f| !f.is_empty())
    }

    fn index_name(&self) -> &str {
        &self.index
    }

    fn project(&self) -> &str {
        &self.project
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn input_type(&self) -> InputType {
        InputType::from(self.input_type.as_str())
    }

    fn validate_json(&self) -> bool {
        self.validate_json
    }

    fn index_mapping(&self) -> Option<&str> {
        self.create_index.as_deref().filter(|f| !f.is_empty())
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if self.verbose && self.silent {
            return Err(PusherError::ConfigError {
                message: "both verbose and silent mode specified".to_string(),
            });
        }

        if let Some(file) = self.input_file() {
            validate_path("file", file)?;
            validate_index_name("index", &self.index)?;
        }

        if let Some(mapping) = self.index_mapping() {
            validate_path("create_index", mapping)?;
            validate_index_name("index", &self.index)?;
        }

        if let Some(level) = &self.forward_logs {
            if level.parse::<Level>().is_err() {
                return Err(PusherError::InvalidConfigValueError {
                    field: "forward_logs".to_string(),
                    value: level.clone(),
                    reason: "expected one of trace, debug, info, warn, error".to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_flags() {
        let config = CliConfig::parse_from([
            "elastic-pusher",
            "-f",
            "dump.txt",
            "-i",
            "interactions",
            "-t",
            "RAW",
            "-p",
            "acme",
            "-H",
            "shop.example.com",
        ]);

        assert_eq!(config.input_file(), Some("dump.txt"));
        assert_eq!(config.index_name(), "interactions");
        assert_eq!(config.input_type(), InputType::Raw);
        assert_eq!(config.project(), "acme");
        assert_eq!(config.host(), "shop.example.com");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = CliConfig::parse_from(["elastic-pusher"]);

        assert_eq!(config.input_file(), None);
        assert_eq!(config.input_type(), InputType::Json);
        assert!(!config.validate_json());
        assert!(config.config.ends_with("settings.yaml"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_verbose_and_silent_conflict() {
        let config = CliConfig::parse_from(["elastic-pusher", "-v", "--silent"]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("both verbose and silent"));
    }

    #[test]
    fn test_file_requires_valid_index() {
        let config = CliConfig::parse_from(["elastic-pusher", "-f", "data.jsonl"]);
        assert!(config.validate().is_err());

        let config =
            CliConfig::parse_from(["elastic-pusher", "-f", "data.jsonl", "-i", "Upper"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_forward_logs_level() {
        let config = CliConfig::parse_from(["elastic-pusher", "--forward-logs", "warn"]);
        assert_eq!(config.forward_level(), Some(Level::WARN));
        assert!(config.validate().is_ok());

        let config = CliConfig::parse_from(["elastic-pusher"]);
        assert_eq!(config.forward_level(), None);

        let config = CliConfig::parse_from(["elastic-pusher", "--forward-logs", "loud"]);
        assert_eq!(config.forward_level(), None);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_create_index_requires_valid_index() {
        let config = CliConfig::parse_from([
            "elastic-pusher",
            "--create-index",
            "mapping.json",
            "-i",
            "findings",
        ]);
        assert_eq!(config.index_mapping(), Some("mapping.json"));
        assert!(config.validate().is_ok());

        let config = CliConfig::parse_from(["elastic-pusher", "--create-index", "mapping.json"]);
        assert!(config.validate().is_err());
    }
}
