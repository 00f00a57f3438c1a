use std::collections::BTreeMap;

use axum::{
	Json, Router,
	extract::{Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use tandem_service::Error as ServiceError;
use tandem_storage::models::FailedOperation;

use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/status", get(status))
		.route("/v1/failures", get(failures))
		.route("/v1/retry", post(retry))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

#[derive(Debug, Serialize)]
struct StatusResponse {
	queue_size: u64,
	unresolved_failures: i64,
	permanent_failures: i64,
	failures_by_type: BTreeMap<String, i64>,
}

async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
	let queue_size = state.queue.depth().await?;
	let ledger = state.service.ledger_status().await?;

	Ok(Json(StatusResponse {
		queue_size,
		unresolved_failures: ledger.unresolved_failures,
		permanent_failures: ledger.permanent_failures,
		failures_by_type: ledger.failures_by_type,
	}))
}

#[derive(Debug, Deserialize)]
struct FailuresQuery {
	page: Option<i64>,
	page_size: Option<i64>,
}

#[derive(Debug, Serialize)]
struct FailuresResponse {
	page: i64,
	page_size: i64,
	failures: Vec<FailureView>,
}

#[derive(Debug, Serialize)]
struct FailureView {
	failure_id: Uuid,
	operation_type: String,
	provider: String,
	product_id: String,
	error_message: String,
	error_details: Value,
	retry_count: i32,
	max_retries: i32,
	permanent: bool,
	next_retry_at: String,
	created_at: String,
	last_attempted_at: String,
}

async fn failures(
	State(state): State<AppState>,
	Query(query): Query<FailuresQuery>,
) -> Result<Json<FailuresResponse>, ApiError> {
	let (page, page_size, offset) = paginate(query.page, query.page_size);
	let rows = state.service.list_failures(page_size, offset).await?;
	let failures = rows.into_iter().map(failure_view).collect();

	Ok(Json(FailuresResponse { page, page_size, failures }))
}

#[derive(Debug, Deserialize)]
struct RetryRequest {
	operation_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Serialize)]
struct RetryResponse {
	claimed: usize,
	succeeded: usize,
	failed: usize,
	abandoned: usize,
}

/// With explicit ids this retries exactly those rows, schedule and budget aside. An omitted body
/// (or a body without ids) runs one scheduler pass over everything currently due.
async fn retry(
	State(state): State<AppState>,
	payload: Option<Json<RetryRequest>>,
) -> Result<Json<RetryResponse>, ApiError> {
	let now = OffsetDateTime::now_utc();
	let report = match requested_ids(payload.map(|Json(body)| body)) {
		Some(ids) => state.service.retry_failures(&ids, now).await?,
		None => state.service.run_due_retries(now).await?,
	};

	Ok(Json(RetryResponse {
		claimed: report.claimed,
		succeeded: report.succeeded,
		failed: report.failed,
		abandoned: report.abandoned,
	}))
}

fn requested_ids(body: Option<RetryRequest>) -> Option<Vec<Uuid>> {
	body.and_then(|body| body.operation_ids)
}

fn paginate(page: Option<i64>, page_size: Option<i64>) -> (i64, i64, i64) {
	let page = page.unwrap_or(1).max(1);
	let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

	(page, page_size, (page - 1) * page_size)
}

fn failure_view(row: FailedOperation) -> FailureView {
	FailureView {
		failure_id: row.failure_id,
		operation_type: row.operation_type.clone(),
		provider: row.provider.clone(),
		product_id: row.product_id.clone(),
		error_message: row.error_message.clone(),
		error_details: row.error_details.clone(),
		retry_count: row.retry_count,
		max_retries: row.max_retries,
		permanent: row.is_permanent(),
		next_retry_at: format_timestamp(row.next_retry_at),
		created_at: format_timestamp(row.created_at),
		last_attempted_at: format_timestamp(row.last_attempted_at),
	}
}

fn format_timestamp(ts: OffsetDateTime) -> String {
	ts.format(&Rfc3339).unwrap_or_else(|_| ts.to_string())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}

impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match &err {
			ServiceError::InvalidRequest { .. } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_request", err.to_string()),
			ServiceError::NotFound { .. } =>
				Self::new(StatusCode::NOT_FOUND, "not_found", err.to_string()),
			ServiceError::Provider { .. } =>
				Self::new(StatusCode::BAD_GATEWAY, "provider_error", err.to_string()),
			ServiceError::Timeout { .. } =>
				Self::new(StatusCode::GATEWAY_TIMEOUT, "timeout", err.to_string()),
			ServiceError::Storage { .. } | ServiceError::Qdrant { .. } =>
				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", err.to_string()),
		}
	}
}

impl From<tandem_queue::Error> for ApiError {
	fn from(err: tandem_queue::Error) -> Self {
		Self::new(StatusCode::INTERNAL_SERVER_ERROR, "queue_error", err.to_string())
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pagination_defaults_and_clamps() {
		assert_eq!(paginate(None, None), (1, 50, 0));
		assert_eq!(paginate(Some(3), Some(20)), (3, 20, 40));
		assert_eq!(paginate(Some(0), Some(1_000)), (1, 200, 0));
		assert_eq!(paginate(Some(-5), Some(0)), (1, 1, 0));
	}

	#[test]
	fn omitted_retry_body_means_retry_all_due() {
		assert_eq!(requested_ids(None), None);
		assert_eq!(requested_ids(Some(RetryRequest { operation_ids: None })), None);

		let id = Uuid::new_v4();

		assert_eq!(
			requested_ids(Some(RetryRequest { operation_ids: Some(vec![id]) })),
			Some(vec![id])
		);
	}
}
