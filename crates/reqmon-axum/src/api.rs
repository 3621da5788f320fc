//! JSON envelope and sample handlers served by the demo binary.

use axum::{extract::Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::{json, Value};

/// Prefix of the versioned API routes.
pub const PRESET_PATH: &str = "/preset/api/v1.10/";

/// Response body shared by API handlers.
#[derive(Debug, Serialize)]
pub struct ResponseData {
    pub code: i32,
    pub data: Value,
    pub msg: String,
}

impl ResponseData {
    pub fn ok(data: Value) -> Self {
        Self {
            code: 0,
            data,
            msg: "success".into(),
        }
    }
}

pub async fn ping() -> Json<ResponseData> {
    Json(ResponseData::ok(json!({ "pong": true })))
}

/// Echo the JSON request body back inside the envelope.
pub async fn echo(Json(body): Json<Value>) -> impl IntoResponse {
    (StatusCode::OK, Json(ResponseData::ok(body)))
}
