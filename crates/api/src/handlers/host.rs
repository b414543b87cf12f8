use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use relay_domain::ObservedRequest;
use serde::Deserialize;

use crate::{error::ApiError, error::ApiResult, response::accepted, routes::AppState};

/// One request header as reported by the observer.
#[derive(Debug, Deserialize)]
pub struct TrafficHeader {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficReport {
    pub url: String,
    #[serde(default, alias = "requestHeaders")]
    pub headers: Vec<TrafficHeader>,
}

impl From<TrafficReport> for ObservedRequest {
    fn from(report: TrafficReport) -> Self {
        report
            .headers
            .into_iter()
            .fold(ObservedRequest::new(report.url), |request, header| {
                request.with_header(header.name, header.value)
            })
    }
}

pub async fn keepalive_ping(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    state.worker.ping()?;
    Ok(accepted())
}

pub async fn report_traffic(
    State(state): State<AppState>,
    payload: Result<Json<TrafficReport>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(report) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if report.url.trim().is_empty() {
        return Err(ApiError::BadRequest("url is required".to_string()));
    }
    state.worker.observe(report.into())?;
    Ok(accepted())
}
