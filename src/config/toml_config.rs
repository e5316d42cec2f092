use crate::domain::model::{PollingPolicy, DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{ExtractError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub api: ApiConfig,
    pub polling: Option<PollingConfig>,
    pub auth: Option<AuthConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    pub interval_seconds: Option<u64>,
    pub max_attempts: Option<u32>,
    /// 設為 true 時不限制查詢次數
    pub unbounded: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ExtractError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ExtractError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${MEDIA_EXTRACT_PASSWORD})，未設定的變數保留原字串
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| ExtractError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("api.base_url", &self.api.base_url)?;

        if let Some(timeout) = self.api.timeout_seconds {
            validation::validate_positive_number("api.timeout_seconds", timeout, 1)?;
        }

        if let Some(polling) = &self.polling {
            if let Some(interval) = polling.interval_seconds {
                validation::validate_positive_number("polling.interval_seconds", interval, 1)?;
            }
            if let Some(max_attempts) = polling.max_attempts {
                validation::validate_positive_number("polling.max_attempts", u64::from(max_attempts), 1)?;
            }
        }

        Ok(())
    }

    pub fn email(&self) -> Option<&str> {
        self.auth.as_ref().and_then(|auth| auth.email.as_deref())
    }

    pub fn password(&self) -> Option<&str> {
        self.auth.as_ref().and_then(|auth| auth.password.as_deref())
    }
}

impl ConfigProvider for TomlConfig {
    fn base_url(&self) -> &str {
        &self.api.base_url
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS))
    }

    fn polling_policy(&self) -> PollingPolicy {
        let Some(polling) = &self.polling else {
            return PollingPolicy::default();
        };

        let interval = polling
            .interval_seconds
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        if polling.unbounded.unwrap_or(false) {
            return PollingPolicy::unbounded(interval);
        }

        PollingPolicy {
            interval,
            max_attempts: Some(polling.max_attempts.unwrap_or(DEFAULT_MAX_POLL_ATTEMPTS)),
        }
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
