pub mod executor;
pub mod extraction;
pub mod poller;
pub mod schema;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::domain::model::{ExtractionResult, JobStatus, PollingPolicy, RequestDescriptor};
pub use crate::domain::ports::{ConfigProvider, CredentialStore, HttpTransport};
pub use crate::utils::error::Result;
