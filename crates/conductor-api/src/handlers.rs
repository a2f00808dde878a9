use axum::extract::State;
use axum::Json;
use blocks_conductor::ConductorStatus;
use blocks_store::Store;
use blocks_types::WorkerType;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::envelope::Envelope;
use crate::state::AppState;

pub async fn index() -> Envelope {
    Envelope::ok(None)
}

pub async fn conductor_status<S: Store>(State(state): State<AppState<S>>) -> Envelope {
    let conductor = state.conductor.lock().await;
    if conductor.status() == ConductorStatus::Ready {
        Envelope::ok(None)
    } else {
        Envelope::error("conductor not ready")
    }
}

pub async fn known_blocks<S: Store>(State(state): State<AppState<S>>) -> Envelope {
    let conductor = state.conductor.lock().await;
    Envelope::ok(Some(json!(conductor.known_block_count().to_string())))
}

pub async fn status<S: Store>(State(state): State<AppState<S>>) -> Envelope {
    let conductor = state.conductor.lock().await;
    match (conductor.count_blocks().await, conductor.count_transactions().await) {
        (Ok(blocks), Ok(transactions)) => {
            Envelope::ok(Some(json!({ "blocks": blocks, "transactions": transactions })))
        }
        _ => Envelope::error("failed to read status from store"),
    }
}

#[derive(Debug, Deserialize)]
pub struct PingRequest {
    uuid: Option<Uuid>,
}

pub async fn ping<S: Store>(
    State(state): State<AppState<S>>,
    Json(body): Json<PingRequest>,
) -> Envelope {
    let Some(uuid) = body.uuid else {
        return Envelope::error("missing uuid");
    };
    let mut conductor = state.conductor.lock().await;
    match conductor.ping(uuid).await {
        Ok(()) => Envelope::ok(None),
        Err(err) => {
            tracing::error!(%err, "failed to persist consumer heartbeat");
            Envelope::error("failed to record ping")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JobRequest {
    uuid: Option<Uuid>,
    #[serde(rename = "type")]
    worker_type: Option<String>,
}

pub async fn job_request<S: Store>(
    State(state): State<AppState<S>>,
    Json(body): Json<JobRequest>,
) -> Envelope {
    let (Some(uuid), Some(worker_type)) = (body.uuid, body.worker_type) else {
        return Envelope::error("missing uuid or type");
    };

    let Ok(worker_type) = worker_type.parse::<WorkerType>() else {
        return Envelope::error("unknown worker type");
    };

    let mut conductor = state.conductor.lock().await;
    match conductor.generate_job(worker_type, uuid).await {
        Ok(job) => match serde_json::to_value(&job) {
            Ok(data) => Envelope::ok(Some(data)),
            Err(_) => Envelope::error("failed to serialize job"),
        },
        Err(err) => {
            tracing::error!(%err, "failed to generate job");
            Envelope::error("failed to generate job")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JobSubmitRequest {
    job_uuid: Option<Uuid>,
}

pub async fn job_submit<S: Store>(
    State(state): State<AppState<S>>,
    Json(body): Json<JobSubmitRequest>,
) -> Envelope {
    let Some(job_uuid) = body.job_uuid else {
        return Envelope::error("missing job_uuid");
    };

    let mut conductor = state.conductor.lock().await;
    match conductor.verify_job(job_uuid).await {
        Ok((true, _)) => Envelope::ok(None),
        Ok((false, errors)) => Envelope::error(errors.join(", ")),
        Err(err) => {
            tracing::error!(%err, "failed to verify job");
            Envelope::error("failed to verify job")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JobRejectRequest {
    job_uuid: Option<Uuid>,
    reason: Option<String>,
}

pub async fn job_reject<S: Store>(
    State(state): State<AppState<S>>,
    Json(body): Json<JobRejectRequest>,
) -> Envelope {
    let Some(job_uuid) = body.job_uuid else {
        return Envelope::error("missing job_uuid");
    };

    let mut conductor = state.conductor.lock().await;
    conductor.del_job(job_uuid);

    if let Some(reason) = body.reason {
        tracing::warn!(%job_uuid, reason, "job rejected");
    }

    Envelope::ok(None)
}
