//! Request routing for the queue API.
//!
//! Routing is deliberately plain: split the path under `/api/queues` into
//! segments and match. The ambient server framework (connection handling,
//! body limits, CORS) lives in [`crate::server`].

use bytes::Bytes;
use hyper::{Method, Response, StatusCode};
use serde_json::{Value, json};
use tracing::error;

use curator_queue::{QueueService, QueueWorker};
use curator_store::TaskRecord;
use curator_types::TaskMeta;

use crate::error::ApiError;
use crate::{BoxBody, full_body, sse};

const ONGOING_LIMIT: u32 = 10;

/// Shared state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub service: QueueService,
    pub worker: QueueWorker,
    /// Gates purge and worker-control endpoints.
    pub debug: bool,
}

fn json_response(status: StatusCode, value: &Value) -> Response<BoxBody> {
    Response::builder()
        .status(status)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(full_body(value.to_string()))
        .unwrap_or_else(|_| Response::new(full_body("{}")))
}

fn ok_json(value: Value) -> Response<BoxBody> {
    json_response(StatusCode::OK, &value)
}

fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn require_debug(state: &AppState, what: &str) -> Result<(), ApiError> {
    if state.debug {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "{what} is only allowed in debug mode"
        )))
    }
}

fn task_summary(task: &TaskRecord) -> Value {
    json!({ "task_id": task.id, "status": task.status.as_str() })
}

/// Dispatch one request. The caller has already read the body.
pub async fn route(
    state: &AppState,
    method: &Method,
    path: &str,
    query: Option<&str>,
    body: Bytes,
) -> Response<BoxBody> {
    let Some(rest) = path.strip_prefix("/api/queues") else {
        return ApiError::not_found("Not Found").into_response();
    };
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

    if method == Method::OPTIONS {
        return Response::builder()
            .status(StatusCode::NO_CONTENT)
            .body(full_body(""))
            .unwrap_or_else(|_| Response::new(full_body("")));
    }

    let result = match (method, segments.as_slice()) {
        (&Method::POST, ["tasks"]) => create_task(state, &body).await,
        (&Method::GET, ["tasks"]) => list_tasks(state, query).await,
        (&Method::POST, ["tasks", "clear"]) => purge_tasks(state, query).await,
        (&Method::GET, ["tasks", id]) => get_task(state, id).await,
        (&Method::POST, ["tasks", id, "cancel"]) => cancel_task(state, id).await,
        (&Method::GET, ["ongoing"]) => ongoing(state).await,
        (&Method::GET, ["worker"]) => Ok(ok_json(json!({
            "running": state.worker.is_running(),
        }))),
        (&Method::GET, ["worker", "debug"]) => {
            let info = state.worker.debug_info();
            Ok(ok_json(json!({
                "running": info.running,
                "last_processed_at": info.last_processed_at,
                "last_error": info.last_error,
            })))
        }
        (&Method::POST, ["worker", "start"]) => worker_start(state),
        (&Method::POST, ["worker", "stop"]) => worker_stop(state).await,
        (&Method::POST, ["worker", "run-once"]) => worker_run_once(state).await,
        (&Method::GET, ["stream"]) => Ok(sse::stream_response(state.service.clone())),
        _ => Err(ApiError::not_found("Not Found")),
    };

    result.unwrap_or_else(ApiError::into_response)
}

async fn create_task(state: &AppState, body: &Bytes) -> Result<Response<BoxBody>, ApiError> {
    let body: Value = serde_json::from_slice(body)
        .map_err(|err| ApiError::bad_request(format!("invalid JSON body: {err}")))?;
    if !body.is_object() {
        return Err(ApiError::bad_request("body must be a JSON object"));
    }

    let task_type = body["type"]
        .as_str()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("type is required"))?;
    let items: Vec<Value> = body["items"].as_array().cloned().unwrap_or_default();
    let meta: Option<TaskMeta> = match &body["meta"] {
        Value::Null => None,
        raw => Some(
            serde_json::from_value(raw.clone())
                .map_err(|err| ApiError::bad_request(format!("invalid meta: {err}")))?,
        ),
    };
    let created_by = body["created_by"].as_str().map(String::from);

    let task = state
        .service
        .create_task(task_type, items, meta, created_by)
        .await?;
    Ok(ok_json(task_summary(&task)))
}

async fn list_tasks(
    state: &AppState,
    query: Option<&str>,
) -> Result<Response<BoxBody>, ApiError> {
    let limit = match query_param(query, "limit") {
        Some(raw) => Some(
            raw.parse::<u32>()
                .map_err(|_| ApiError::bad_request("limit must be a positive integer"))?,
        ),
        None => None,
    };
    let tasks = state.service.list_tasks(limit).await?;
    let list: Vec<Value> = tasks.iter().map(TaskRecord::to_json).collect();
    Ok(ok_json(Value::Array(list)))
}

async fn get_task(state: &AppState, raw_id: &str) -> Result<Response<BoxBody>, ApiError> {
    let task_id: i64 = raw_id
        .parse()
        .map_err(|_| ApiError::bad_request("task id must be an integer"))?;
    let task = state.service.get_task(task_id).await?;
    Ok(ok_json(task.to_json()))
}

async fn cancel_task(state: &AppState, raw_id: &str) -> Result<Response<BoxBody>, ApiError> {
    let task_id: i64 = raw_id
        .parse()
        .map_err(|_| ApiError::bad_request("task id must be an integer"))?;
    let task = state.service.cancel_task(task_id).await?;
    Ok(ok_json(task_summary(&task)))
}

async fn purge_tasks(
    state: &AppState,
    query: Option<&str>,
) -> Result<Response<BoxBody>, ApiError> {
    require_debug(state, "Clearing tasks")?;
    let scope = query_param(query, "scope").unwrap_or_else(|| "all".to_string());
    let older_than_seconds = match query_param(query, "older_than_seconds") {
        Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
            ApiError::bad_request("older_than_seconds must be an integer")
        })?),
        None => None,
    };
    let outcome = state
        .service
        .purge_tasks(&scope, older_than_seconds)
        .await?;
    Ok(ok_json(outcome.to_json()))
}

async fn ongoing(state: &AppState) -> Result<Response<BoxBody>, ApiError> {
    let tasks = state.service.list_tasks(Some(ONGOING_LIMIT)).await?;
    let list: Vec<Value> = tasks.iter().map(TaskRecord::to_json).collect();
    Ok(ok_json(Value::Array(list)))
}

fn worker_start(state: &AppState) -> Result<Response<BoxBody>, ApiError> {
    require_debug(state, "Worker start/stop")?;
    if state.worker.is_running() {
        return Ok(ok_json(json!({
            "started": false,
            "reason": "worker already running",
        })));
    }
    state.worker.start();
    Ok(ok_json(json!({ "started": true })))
}

async fn worker_stop(state: &AppState) -> Result<Response<BoxBody>, ApiError> {
    require_debug(state, "Worker start/stop")?;
    if !state.worker.is_running() {
        return Ok(ok_json(json!({
            "stopped": false,
            "reason": "worker not running",
        })));
    }
    state.worker.stop().await;
    Ok(ok_json(json!({ "stopped": true })))
}

async fn worker_run_once(state: &AppState) -> Result<Response<BoxBody>, ApiError> {
    require_debug(state, "Run-once")?;
    match state.worker.process_one().await {
        Ok(processed) => Ok(ok_json(json!({ "processed": processed }))),
        Err(err) => {
            error!(%err, "worker run-once failed");
            Err(ApiError::internal(err.to_string()))
        }
    }
}
