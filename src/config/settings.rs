use crate::utils::error::{PusherError, Result};
use crate::utils::validation::{validate_positive_number, validate_url, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_ELK_HOST: &str = "http://localhost:9200";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const PROJECT_PLACEHOLDER: &str = "{project_name}";

/// Connection settings for the Elasticsearch cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub elk_host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apikey: Option<String>,
    /// Template for the project tag, e.g. `pentest-{project_name}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

/// How requests to the cluster are authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    None,
    Basic { username: String, password: Option<String> },
    ApiKey(String),
}

impl Settings {
    /// 從設定檔載入 (YAML, 副檔名為 .toml 時改用 TOML)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(PusherError::IoError)?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content)?;
        let settings: Settings =
            serde_yaml::from_str(&processed).map_err(|e| PusherError::ConfigError {
                message: format!("YAML parsing error: {}", e),
            })?;
        Ok(settings.with_defaults())
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content)?;
        let settings: Settings = toml::from_str(&processed).map_err(|e| PusherError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })?;
        Ok(settings.with_defaults())
    }

    /// Loads `path`, falling back to defaults when `path` is the default
    /// location and nothing is there yet.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if path == default_settings_path() && !Path::new(path).exists() {
            tracing::warn!(
                "No settings file at {}, using {}",
                path,
                DEFAULT_ELK_HOST
            );
            return Ok(Settings::default().with_defaults());
        }
        Self::from_file(path)
    }

    fn with_defaults(mut self) -> Self {
        if self.elk_host.trim().is_empty() {
            self.elk_host = DEFAULT_ELK_HOST.to_string();
        }
        self
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)
    }

    /// An API key takes precedence over username/password.
    pub fn credentials(&self) -> Credentials {
        match (&self.apikey, &self.username) {
            (Some(key), _) if !key.is_empty() => Credentials::ApiKey(key.clone()),
            (_, Some(user)) if !user.is_empty() => Credentials::Basic {
                username: user.clone(),
                password: self.password.clone(),
            },
            _ => Credentials::None,
        }
    }

    /// Resolves the project tag from the configured template. Without a
    /// template the command line value is used unchanged.
    pub fn resolve_project(&self, cli_project: &str) -> String {
        match &self.project_name {
            Some(template) if !template.is_empty() => {
                template.replace(PROJECT_PLACEHOLDER, cli_project)
            }
            _ => cli_project.to_string(),
        }
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_url("elk_host", &self.elk_host)?;

        if let Some(timeout) = self.timeout_seconds {
            validate_positive_number("timeout_seconds", timeout, 1)?;
        }

        if matches!(&self.password, Some(p) if !p.is_empty())
            && self.username.as_deref().unwrap_or("").is_empty()
            && self.apikey.as_deref().unwrap_or("").is_empty()
        {
            return Err(PusherError::MissingConfigError {
                field: "username".to_string(),
            });
        }

        Ok(())
    }
}

/// 替換環境變數 (例如 ${ELK_PASSWORD})
fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| PusherError::ConfigError {
        message: format!("Invalid substitution pattern: {}", e),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}

/// `~/.config/elasticPusher/settings.yaml`, or a relative path when no home
/// directory is known.
pub fn default_settings_path() -> String {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    home.join(".config")
        .join("elasticPusher")
        .join("settings.yaml")
        .to_string_lossy()
        .into_owned()
}
