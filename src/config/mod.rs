pub mod toml_config;

use crate::domain::model::PollingPolicy;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use std::time::Duration;
use toml_config::TomlConfig;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

/// Effective settings after merging the config file with command-line flags.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub polling: PollingPolicy,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl ClientSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(toml_config::DEFAULT_TIMEOUT_SECONDS),
            polling: PollingPolicy::default(),
            email: None,
            password: None,
        }
    }

    pub fn from_toml(config: &TomlConfig) -> Self {
        Self {
            base_url: config.base_url().to_string(),
            timeout: config.request_timeout(),
            polling: config.polling_policy(),
            email: config.email().map(str::to_string),
            password: config.password().map(str::to_string),
        }
    }

    pub fn login_credentials(&self) -> Result<(&str, &str)> {
        let email = validation::validate_required_field("auth.email", &self.email)?;
        let password = validation::validate_required_field("auth.password", &self.password)?;
        Ok((email.as_str(), password.as_str()))
    }
}

impl ConfigProvider for ClientSettings {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
    }

    fn polling_policy(&self) -> PollingPolicy {
        self.polling
    }
}

impl Validate for ClientSettings {
    fn validate(&self) -> Result<()> {
        validation::validate_url("api.base_url", &self.base_url)?;
        validation::validate_positive_number("api.timeout_seconds", self.timeout.as_secs(), 1)?;
        validation::validate_positive_number("polling.interval_seconds", self.polling.interval.as_secs(), 1)?;
        if let Some(max_attempts) = self.polling.max_attempts {
            validation::validate_positive_number("polling.max_attempts", u64::from(max_attempts), 1)?;
        }
        Ok(())
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "media-extract")]
#[command(about = "Submit images, PDFs and audio to the extraction service and wait for the result")]
pub struct CliConfig {
    #[arg(long, env = "MEDIA_EXTRACT_CONFIG", help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "MEDIA_EXTRACT_BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long, env = "MEDIA_EXTRACT_EMAIL")]
    pub email: Option<String>,

    #[arg(long, env = "MEDIA_EXTRACT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long, help = "Request timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Seconds between job status checks")]
    pub poll_interval: Option<u64>,

    #[arg(long, help = "Give up after this many job status checks")]
    pub max_attempts: Option<u32>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Extract text from an image
    Image { path: PathBuf },
    /// Transcribe an audio recording
    Audio { path: PathBuf },
    /// Ask a question about a PDF, or a follow-up about a previous answer
    Pdf {
        #[arg(long, conflicts_with = "request_id", required_unless_present = "request_id")]
        file: Option<PathBuf>,

        #[arg(long)]
        request_id: Option<String>,

        #[arg(long)]
        query: String,

        #[arg(long, default_value = "gemini")]
        model: String,

        #[arg(long, env = "MEDIA_EXTRACT_OPENAI_PASS", hide_env_values = true)]
        openai_pass: Option<String>,
    },
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
    },
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 先讀設定檔，再以命令列參數覆寫
    pub fn settings(&self) -> Result<ClientSettings> {
        let mut settings = match &self.config {
            Some(path) => ClientSettings::from_toml(&TomlConfig::from_file(path)?),
            None => {
                let base_url = validation::validate_required_field("api.base_url", &self.base_url)?;
                ClientSettings::new(base_url.clone())
            }
        };

        if let Some(base_url) = &self.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(timeout) = self.timeout {
            settings.timeout = Duration::from_secs(timeout);
        }
        if let Some(interval) = self.poll_interval {
            settings.polling.interval = Duration::from_secs(interval);
        }
        if let Some(max_attempts) = self.max_attempts {
            settings.polling.max_attempts = Some(max_attempts);
        }
        if self.email.is_some() {
            settings.email = self.email.clone();
        }
        if self.password.is_some() {
            settings.password = self.password.clone();
        }

        Ok(settings)
    }
}
