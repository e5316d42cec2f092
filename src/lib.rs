pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{AuthSession, ReqwestTransport};
pub use config::{toml_config::TomlConfig, ClientSettings};
pub use core::{
    executor::AuthenticatedExecutor, extraction::ExtractionClient, poller::JobPoller,
};
pub use utils::error::{ExtractError, Result};
