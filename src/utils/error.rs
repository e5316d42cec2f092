use thiserror::Error;

pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please login again.";
pub const UNEXPECTED_JOB_RESPONSE_MESSAGE: &str = "Unexpected response format from job status API";

#[derive(Error, Debug)]
pub enum ExtractError {
    /// 401 無法透過 refresh 解決，憑證已被清除
    #[error("Session expired. Please login again.")]
    SessionExpired,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// 伺服器回報的錯誤 (非 401 的錯誤狀態)
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response format from job status API")]
    UnexpectedJobResponse,

    #[error("{message}")]
    Validation { message: String },

    #[error("Job {message_id} did not complete after {attempts} status checks")]
    PollingExhausted { message_id: String, attempts: u32 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
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
    Authentication,
    Network,
    Server,
    Protocol,
    Timeout,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ExtractError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SessionExpired => ErrorCategory::Authentication,
            Self::Network(_) => ErrorCategory::Network,
            Self::Api { .. } => ErrorCategory::Server,
            Self::UnexpectedJobResponse | Self::Validation { .. } | Self::SerializationError(_) => {
                ErrorCategory::Protocol
            }
            Self::PollingExhausted { .. } => ErrorCategory::Timeout,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network | ErrorCategory::Timeout => ErrorSeverity::Medium,
            ErrorCategory::Authentication | ErrorCategory::Server | ErrorCategory::Protocol => {
                ErrorSeverity::High
            }
            ErrorCategory::Configuration | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 只有登入過期需要使用者重新驗證
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::SessionExpired => SESSION_EXPIRED_MESSAGE.to_string(),
            Self::Network(_) => "Could not reach the extraction service".to_string(),
            Self::Api { message, .. } => message.clone(),
            Self::PollingExhausted { .. } => {
                "The extraction job is taking too long to finish".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Authentication => "Log in again with valid credentials",
            ErrorCategory::Network => "Check the network connection and the configured base URL",
            ErrorCategory::Server => "Check the submitted file and parameters, then try again",
            ErrorCategory::Protocol => "The service responded in an unexpected format; check the API version",
            ErrorCategory::Timeout => "Raise polling.max_attempts or try again later",
            ErrorCategory::Configuration => "Fix the configuration file or command-line flags",
            ErrorCategory::System => "Check file paths and permissions",
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
