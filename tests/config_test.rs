#![cfg(feature = "cli")]

use anyhow::Result;
use clap::Parser;
use media_extract::config::{ClientSettings, Command};
use media_extract::domain::ports::ConfigProvider;
use media_extract::utils::validation::Validate;
use media_extract::{CliConfig, TomlConfig};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    Ok(file)
}

#[test]
fn test_cli_overlays_config_file() -> Result<()> {
    let file = write_config(
        r#"
[api]
base_url = "https://api.example.com"
timeout_seconds = 20

[polling]
interval_seconds = 3

[auth]
email = "ada@example.com"
password = "from-file"
"#,
    )?;
    let path = file.path().to_string_lossy().to_string();

    let cli = CliConfig::try_parse_from([
        "media-extract",
        "--config",
        path.as_str(),
        "--password",
        "from-flag",
        "audio",
        "memo.m4a",
    ])?;
    let settings = cli.settings()?;

    settings.validate()?;
    assert_eq!(settings.base_url(), "https://api.example.com");
    assert_eq!(settings.request_timeout(), Duration::from_secs(20));
    assert_eq!(settings.polling_policy().interval, Duration::from_secs(3));
    assert_eq!(settings.polling_policy().max_attempts, Some(360));
    assert_eq!(settings.login_credentials()?, ("ada@example.com", "from-flag"));
    assert!(matches!(cli.command, Command::Audio { .. }));

    Ok(())
}

#[test]
fn test_settings_from_unbounded_toml() -> Result<()> {
    let config = TomlConfig::from_toml_str(
        "[api]\nbase_url = \"http://localhost:8000/\"\n[polling]\nunbounded = true\n",
    )?;
    let settings = ClientSettings::from_toml(&config);

    assert_eq!(settings.polling.max_attempts, None);
    assert_eq!(settings.polling.interval, Duration::from_secs(10));
    assert!(settings.login_credentials().is_err());

    Ok(())
}

#[test]
fn test_missing_config_file_is_io_error() {
    let cli = CliConfig::try_parse_from([
        "media-extract",
        "--config",
        "/nonexistent/media-extract.toml",
        "image",
        "photo.jpg",
    ])
    .unwrap();

    assert!(matches!(
        cli.settings(),
        Err(media_extract::ExtractError::IoError(_))
    ));
}
