use axum::{ http::StatusCode, response::{ IntoResponse, Response }, Json };
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::analytics::Report;

/// Body returned for every failed request. Details stay in the logs.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum ApiError {
	#[error("{report} query failed: {source:#}")]
	Query {
		report: Report,
		#[source]
		source: anyhow::Error,
	},
}

impl ApiError {
	pub fn query(report: Report, source: anyhow::Error) -> Self {
		ApiError::Query { report, source }
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		match &self {
			ApiError::Query { report, source } => {
				error!(report = %report, "Query failed: {:?}", source);
			}
		}

		(
			StatusCode::INTERNAL_SERVER_ERROR,
			Json(json!({ "error": INTERNAL_ERROR_MESSAGE })),
		).into_response()
	}
}
