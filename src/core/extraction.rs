use crate::core::executor::AuthenticatedExecutor;
use crate::core::poller::JobPoller;
use crate::core::schema::{self, extract_error_message, validate_response};
use crate::domain::model::{
    ExtractionResult, MediaFile, MultipartForm, PdfQuery, PdfSource, PollingPolicy, QueuedJob,
    RequestDescriptor,
};
use crate::utils::error::{ExtractError, Result};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

pub const IMAGE_ENDPOINT: &str = "/convert/image/text";
pub const PDF_ENDPOINT: &str = "/pdf/get/response";
pub const AUDIO_ENDPOINT: &str = "/convert/sound/text";

const DEFAULT_IMAGE_NAME: &str = "photo.jpg";
const DEFAULT_IMAGE_MIME: &str = "image/jpeg";
const DEFAULT_AUDIO_NAME: &str = "audio.m4a";
const DEFAULT_AUDIO_MIME: &str = "audio/mp4";
const PDF_MIME: &str = "application/pdf";

const AUDIO_MIME_TYPES: &[(&str, &str)] = &[
    ("m4a", "audio/mp4"),
    ("mp4", "audio/mp4"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("webm", "audio/webm"),
    ("ogg", "audio/ogg"),
    ("aac", "audio/aac"),
    ("3gp", "audio/3gpp"),
    ("flac", "audio/flac"),
];

/// 一次提交對應一個 queued job，之後交給 [`JobPoller`] 等待結果
pub struct ExtractionClient {
    executor: Arc<AuthenticatedExecutor>,
    poller: JobPoller,
    base_url: String,
}

impl ExtractionClient {
    pub fn new(executor: Arc<AuthenticatedExecutor>, base_url: impl Into<String>, policy: PollingPolicy) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let poller = JobPoller::new(executor.clone(), base_url.clone(), policy);
        Self {
            executor,
            poller,
            base_url,
        }
    }

    pub fn poller(&self) -> &JobPoller {
        &self.poller
    }

    pub async fn extract_image_text(&self, image: MediaFile) -> Result<String> {
        let form = MultipartForm::new().file("image", image);
        let result = self
            .submit_and_wait(IMAGE_ENDPOINT, form, "Text extraction failed", "image extraction")
            .await?;
        Ok(result.content)
    }

    /// Asks a question about a new PDF or, with [`PdfSource::FollowUp`], about
    /// a previously processed one.
    pub async fn extract_pdf(&self, query: PdfQuery) -> Result<ExtractionResult> {
        let form = build_pdf_form(query);
        self.submit_and_wait(PDF_ENDPOINT, form, "PDF extraction failed", "PDF extraction")
            .await
    }

    pub async fn transcribe_audio(&self, audio: MediaFile) -> Result<String> {
        let form = MultipartForm::new().file("file", audio);
        let result = self
            .submit_and_wait(AUDIO_ENDPOINT, form, "Audio transcription failed", "audio transcription")
            .await?;
        Ok(result.content)
    }

    async fn submit_and_wait(
        &self,
        endpoint: &str,
        form: MultipartForm,
        failure_message: &str,
        context: &str,
    ) -> Result<ExtractionResult> {
        let request = RequestDescriptor::post(format!("{}{}", self.base_url, endpoint)).multipart(form);
        let response = self.executor.execute(&request).await?;

        if !response.is_success() {
            let payload = response.json_or(json!({ "message": failure_message }));
            let message = extract_error_message(&payload);
            tracing::error!("❌ {} submission failed ({}): {}", context, response.status, message);
            return Err(ExtractError::api(response.status, message));
        }

        let job: QueuedJob = validate_response(&schema::queued_job_response(), response.json()?, context)?;
        tracing::info!("📥 {} queued as job {} ({:?})", context, job.message_id, job.status);

        self.poller.wait_for_completion(&job.message_id).await
    }
}

pub fn build_pdf_form(query: PdfQuery) -> MultipartForm {
    let form = match query.source {
        PdfSource::FollowUp { request_id } => MultipartForm::new().text("past_request_id", request_id),
        PdfSource::Document(pdf) => MultipartForm::new().file("pdf", pdf),
    };

    let form = form.text("query", query.query).text("model", query.model.as_str());

    match query.openai_pass {
        Some(pass) if query.model == "openai" => form.text("openai_pass", pass),
        _ => form,
    }
}

fn file_extension(file_name: &str) -> Option<&str> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_alphanumeric() || c == '_'))
}

pub fn image_mime_type(file_name: &str) -> String {
    file_extension(file_name)
        .map(|ext| format!("image/{}", ext))
        .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string())
}

pub fn audio_mime_type(file_name: &str) -> &'static str {
    let Some(ext) = file_extension(file_name) else {
        return DEFAULT_AUDIO_MIME;
    };
    let ext = ext.to_lowercase();
    AUDIO_MIME_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_AUDIO_MIME)
}

fn file_name_or(path: &Path, default: &str) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(default)
        .to_string()
}

pub async fn load_image(path: impl AsRef<Path>) -> Result<MediaFile> {
    let path = path.as_ref();
    let file_name = file_name_or(path, DEFAULT_IMAGE_NAME);
    let mime_type = image_mime_type(&file_name);
    let bytes = tokio::fs::read(path).await?;
    Ok(MediaFile::new(file_name, mime_type, bytes))
}

pub async fn load_audio(path: impl AsRef<Path>) -> Result<MediaFile> {
    let path = path.as_ref();
    let file_name = file_name_or(path, DEFAULT_AUDIO_NAME);
    let mime_type = audio_mime_type(&file_name);
    let bytes = tokio::fs::read(path).await?;
    Ok(MediaFile::new(file_name, mime_type, bytes))
}

pub async fn load_pdf(path: impl AsRef<Path>) -> Result<MediaFile> {
    let path = path.as_ref();
    let file_name = file_name_or(path, "document.pdf");
    let bytes = tokio::fs::read(path).await?;
    Ok(MediaFile::new(file_name, PDF_MIME, bytes))
}
