use blocks_types::{Job, WorkerType};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ClientError;

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    data: Option<Value>,
    message: Option<String>,
}

impl Envelope {
    fn into_data(self) -> Result<Value, ClientError> {
        if self.success {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(ClientError::Business(self.message.unwrap_or_else(|| "unknown error".to_string())))
        }
    }
}

/// A thin HTTP client for the conductor's worker-facing endpoints.
pub struct ConductorClient {
    base_url: String,
    http: reqwest::Client,
}

impl ConductorClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), http: reqwest::Client::new() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    pub async fn ping(&self, uuid: Uuid) -> Result<(), ClientError> {
        let envelope: Envelope = self
            .http
            .post(self.url("/ping"))
            .json(&json!({ "uuid": uuid }))
            .send()
            .await?
            .json()
            .await?;
        envelope.into_data().map(|_| ())
    }

    pub async fn job_request(&self, uuid: Uuid, worker_type: WorkerType) -> Result<Job, ClientError> {
        let envelope: Envelope = self
            .http
            .post(self.url("/job-request"))
            .json(&json!({ "uuid": uuid, "type": worker_type.to_string() }))
            .send()
            .await?
            .json()
            .await?;
        let data = envelope.into_data()?;
        Ok(serde_json::from_value(data)?)
    }

    /// The response is advisory: this only surfaces transport failures,
    /// never a business-level rejection, since the worker proceeds to
    /// its next cycle regardless of what the conductor says here.
    pub async fn job_submit(&self, job_uuid: Uuid) -> Result<(), ClientError> {
        let _: Envelope = self
            .http
            .post(self.url("/job-submit"))
            .json(&json!({ "job_uuid": job_uuid }))
            .send()
            .await?
            .json()
            .await?;
        Ok(())
    }

    pub async fn job_reject(&self, job_uuid: Uuid, reason: &str) -> Result<(), ClientError> {
        let envelope: Envelope = self
            .http
            .post(self.url("/job-reject"))
            .json(&json!({ "job_uuid": job_uuid, "reason": reason }))
            .send()
            .await?
            .json()
            .await?;
        envelope.into_data().map(|_| ())
    }
}
