use anyhow::Context;
use clap::Parser;
use media_extract::config::{ClientSettings, Command};
use media_extract::core::extraction::{load_audio, load_image, load_pdf};
use media_extract::domain::model::{PdfQuery, PdfSource};
use media_extract::domain::ports::{ConfigProvider, CredentialStore, HttpTransport};
use media_extract::utils::error::{ErrorSeverity, ExtractError};
use media_extract::utils::{logger, validation::Validate};
use media_extract::{AuthSession, AuthenticatedExecutor, CliConfig, ExtractionClient, ReqwestTransport};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.log_json {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting media-extract CLI");

    if let Err(e) = run(config).await {
        let exit_code = match e.downcast_ref::<ExtractError>() {
            Some(err) => {
                tracing::error!(
                    "❌ Request failed: {} (Category: {:?}, Severity: {:?})",
                    err,
                    err.category(),
                    err.severity()
                );
                eprintln!("❌ {}", err.user_friendly_message());
                eprintln!("💡 {}", err.recovery_suggestion());

                match err.severity() {
                    ErrorSeverity::Low => 0,
                    ErrorSeverity::Medium => 2,
                    ErrorSeverity::High => 1,
                    ErrorSeverity::Critical => 3,
                }
            }
            None => {
                tracing::error!("❌ {:#}", e);
                eprintln!("❌ {:#}", e);
                1
            }
        };

        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(config: CliConfig) -> anyhow::Result<()> {
    let settings = config.settings().context("Failed to load configuration")?;
    settings.validate()?;
    tracing::debug!("Using API at {}", settings.base_url());

    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(settings.request_timeout())?);
    let session = Arc::new(AuthSession::new(transport.clone(), settings.base_url()));

    if let Command::Register { name } = &config.command {
        let (email, password) = settings.login_credentials()?;
        let message = session.register(name, email, password).await?;
        println!("✅ {}", message);
        return Ok(());
    }

    let (email, password) = settings.login_credentials()?;
    session.login(email, password).await?;

    let outcome = extract(&config.command, &settings, transport, session.clone()).await;
    session.logout().await;
    outcome
}

async fn extract(
    command: &Command,
    settings: &ClientSettings,
    transport: Arc<dyn HttpTransport>,
    session: Arc<AuthSession>,
) -> anyhow::Result<()> {
    let credentials: Arc<dyn CredentialStore> = session;
    let executor = Arc::new(AuthenticatedExecutor::new(transport, credentials));
    let client = ExtractionClient::new(executor, settings.base_url(), settings.polling_policy());

    match command {
        Command::Image { path } => {
            let image = load_image(path)
                .await
                .with_context(|| format!("Failed to read image {}", path.display()))?;
            let text = client.extract_image_text(image).await?;
            println!("{}", text);
        }
        Command::Audio { path } => {
            let audio = load_audio(path)
                .await
                .with_context(|| format!("Failed to read audio {}", path.display()))?;
            let transcript = client.transcribe_audio(audio).await?;
            println!("{}", transcript);
        }
        Command::Pdf {
            file,
            request_id,
            query,
            model,
            openai_pass,
        } => {
            let source = match (file, request_id) {
                (_, Some(request_id)) => PdfSource::FollowUp {
                    request_id: request_id.clone(),
                },
                (Some(path), None) => PdfSource::Document(
                    load_pdf(path)
                        .await
                        .with_context(|| format!("Failed to read PDF {}", path.display()))?,
                ),
                (None, None) => anyhow::bail!("Either --file or --request-id is required"),
            };

            let result = client
                .extract_pdf(PdfQuery {
                    source,
                    query: query.clone(),
                    model: model.clone(),
                    openai_pass: openai_pass.clone(),
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Register { .. } => {}
    }

    Ok(())
}
