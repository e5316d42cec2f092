use crate::core::executor::AuthenticatedExecutor;
use crate::core::schema::{decode_job_status, extract_error_message};
use crate::domain::model::{ExtractionResult, JobStatus, PollingPolicy, RequestDescriptor};
use crate::utils::error::{ExtractError, Result};
use serde_json::json;
use std::sync::Arc;

/// Polls `GET {base_url}/job/{message_id}` until the job completes.
///
/// Status checks for one job never overlap: the next request is only sent
/// after the previous response was classified and the interval elapsed.
pub struct JobPoller {
    executor: Arc<AuthenticatedExecutor>,
    base_url: String,
    policy: PollingPolicy,
}

impl JobPoller {
    pub fn new(executor: Arc<AuthenticatedExecutor>, base_url: impl Into<String>, policy: PollingPolicy) -> Self {
        Self {
            executor,
            base_url: base_url.into(),
            policy,
        }
    }

    pub fn policy(&self) -> PollingPolicy {
        self.policy
    }

    pub fn status_url(&self, message_id: &str) -> String {
        format!("{}/job/{}", self.base_url.trim_end_matches('/'), message_id)
    }

    /// 單次查詢；非 2xx 直接視為終止錯誤
    pub async fn check_status(&self, message_id: &str) -> Result<JobStatus> {
        let request = RequestDescriptor::get(self.status_url(message_id));
        let response = self.executor.execute(&request).await?;

        if !response.is_success() {
            let payload = response.json_or(json!({ "message": "Failed to check job status" }));
            return Err(ExtractError::api(response.status, extract_error_message(&payload)));
        }

        decode_job_status(response.json()?)
    }

    pub async fn wait_for_completion(&self, message_id: &str) -> Result<ExtractionResult> {
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match self.check_status(message_id).await? {
                JobStatus::Completed(result) => {
                    tracing::info!("✅ Job {} completed after {} status checks", message_id, attempts);
                    return Ok(result);
                }
                JobStatus::Pending => {
                    if let Some(max_attempts) = self.policy.max_attempts {
                        if attempts >= max_attempts {
                            tracing::warn!("Job {} still pending after {} status checks", message_id, attempts);
                            return Err(ExtractError::PollingExhausted {
                                message_id: message_id.to_string(),
                                attempts,
                            });
                        }
                    }

                    tracing::debug!(
                        "⏳ Job {} pending (check {}), next check in {:?}",
                        message_id,
                        attempts,
                        self.policy.interval
                    );
                    tokio::time::sleep(self.policy.interval).await;
                }
            }
        }
    }
}
