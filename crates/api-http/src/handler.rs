//! HTTP Route Handlers

use crate::error::ApiResult;
use crate::types::{
    HealthResponse, JobStatusResponse, QueueBacklog, StartSyncResponse, JOB_ID_HEADER,
};
use axum::extract::{Path, State};
use axum::http::{HeaderName, HeaderValue};
use axum::response::IntoResponse;
use axum::Json;
use bgsync_core::application::DispatchService;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct HttpState {
    pub dispatch: Arc<DispatchService>,
}

impl HttpState {
    pub fn new(dispatch: Arc<DispatchService>) -> Self {
        Self { dispatch }
    }
}

/// GET /start-sync
///
/// Enqueues one background sync job and acknowledges without waiting for it.
pub async fn start_sync(State(state): State<HttpState>) -> ApiResult<impl IntoResponse> {
    let job_id = state.dispatch.start_sync().await?;
    info!(job_id = %job_id, queue = %state.dispatch.queue(), "Background sync dispatched");

    let mut response = Json(StartSyncResponse::started()).into_response();
    match HeaderValue::from_str(&job_id) {
        Ok(value) => {
            response
                .headers_mut()
                .insert(HeaderName::from_static(JOB_ID_HEADER), value);
        }
        Err(e) => warn!(job_id = %job_id, error = %e, "Job id is not a valid header value"),
    }
    Ok(response)
}

/// GET /jobs/{id}
pub async fn job_status(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    let job = state.dispatch.job_status(&id).await?;
    Ok(Json(job.into()))
}

/// GET /health
pub async fn health(State(state): State<HttpState>) -> ApiResult<Json<HealthResponse>> {
    let stats = state.dispatch.queue_stats().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: bgsync_core::VERSION,
        queue: QueueBacklog::new(state.dispatch.queue(), stats),
    }))
}
