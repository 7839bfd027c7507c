use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::api::{self, ApiError, Command};
use crate::engine::{Engine, EngineError};
use crate::limits::MAX_FORM_BODY_BYTES;
use crate::model::Operation;
use crate::observability;

type Reply = (StatusCode, Json<Value>);

/// Build the dashboard API router.
pub fn app(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/api/data", get(data))
        .route("/api/analytics", get(analytics))
        .route("/api/request", post(request))
        .route("/api/cancel", post(cancel))
        .route("/api/leave", post(leave))
        .route("/api/rollback", post(rollback))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(MAX_FORM_BODY_BYTES))
        .layer(middleware::from_fn(cors))
        .with_state(engine)
}

/// Serve until `shutdown` resolves, then let in-flight requests finish.
pub async fn serve(
    listener: TcpListener,
    engine: Arc<Engine>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, app(engine))
        .with_graceful_shutdown(shutdown)
        .await
}

// ── Handlers ─────────────────────────────────────────────────────

async fn data(State(engine): State<Arc<Engine>>) -> Reply {
    execute(&engine, Command::Snapshot).await
}

async fn analytics(State(engine): State<Arc<Engine>>) -> Reply {
    execute(&engine, Command::Analytics).await
}

async fn request(State(engine): State<Arc<Engine>>, body: Bytes) -> Reply {
    parse_then_execute(&engine, "request", api::parse_allocate(&body)).await
}

async fn cancel(State(engine): State<Arc<Engine>>, body: Bytes) -> Reply {
    parse_then_execute(&engine, "cancel", api::parse_cancel(&body)).await
}

async fn leave(State(engine): State<Arc<Engine>>, body: Bytes) -> Reply {
    parse_then_execute(&engine, "leave", api::parse_leave(&body)).await
}

async fn rollback(State(engine): State<Arc<Engine>>, body: Bytes) -> Reply {
    parse_then_execute(&engine, "rollback", api::parse_rollback(&body)).await
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ── Dispatch ─────────────────────────────────────────────────────

async fn parse_then_execute(
    engine: &Engine,
    endpoint: &'static str,
    parsed: Result<Command, ApiError>,
) -> Reply {
    match parsed {
        Ok(cmd) => execute(engine, cmd).await,
        Err(e) => {
            tracing::debug!("{endpoint}: bad form: {e}");
            record(endpoint, StatusCode::BAD_REQUEST, None);
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "failed", "error": "bad_request", "message": e.to_string() })),
            )
        }
    }
}

async fn execute(engine: &Engine, cmd: Command) -> Reply {
    let label = observability::command_label(&cmd);
    let start = Instant::now();
    let reply = match execute_command(engine, cmd).await {
        Ok(body) => (StatusCode::OK, Json(body)),
        Err(e) => engine_err(e),
    };
    record(label, reply.0, Some(start));
    reply
}

async fn execute_command(engine: &Engine, cmd: Command) -> Result<Value, EngineError> {
    match cmd {
        Command::Snapshot => Ok(to_value(&engine.snapshot().await)),
        Command::Analytics => Ok(to_value(&engine.analytics().await)),
        Command::Allocate { vehicle_id, zone_id } => {
            let allocation = engine.allocate(&vehicle_id, zone_id).await?;
            Ok(to_value(&allocation))
        }
        Command::Cancel { request_id } => {
            engine.cancel(request_id).await?;
            Ok(json!({ "status": "cancelled", "requestId": request_id }))
        }
        Command::Leave { request_id } => {
            let op = engine.release(request_id).await?;
            let duration = match op {
                Operation::Release { duration_secs, .. } => duration_secs,
                _ => 0,
            };
            Ok(json!({ "status": "left", "requestId": request_id, "duration": duration }))
        }
        Command::Rollback { steps } => {
            let undone = engine.rollback_many(steps).await?;
            Ok(json!({ "status": "rolled_back", "undone": undone }))
        }
    }
}

fn to_value<T: serde::Serialize>(v: &T) -> Value {
    // Model types serialize infallibly (no maps with non-string keys).
    serde_json::to_value(v).unwrap_or(Value::Null)
}

/// Failure bodies never carry `requestId`: the dashboard keys success on it.
fn engine_err(e: EngineError) -> Reply {
    let status = if e.is_validation() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::CONFLICT
    };
    (
        status,
        Json(json!({ "status": "failed", "error": e.kind(), "message": e.to_string() })),
    )
}

fn record(endpoint: &'static str, status: StatusCode, start: Option<Instant>) {
    metrics::counter!(
        observability::HTTP_REQUESTS_TOTAL,
        "endpoint" => endpoint,
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    if let Some(start) = start {
        metrics::histogram!(observability::HTTP_REQUEST_DURATION_SECONDS, "endpoint" => endpoint)
            .record(start.elapsed().as_secs_f64());
    }
}

// ── CORS ─────────────────────────────────────────────────────────

/// The dashboard is served from another origin. Preflights are answered here.
async fn cors(req: Request, next: Next) -> Response {
    let mut res = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };
    add_cors_headers(res.headers_mut());
    res
}

fn add_cors_headers(headers: &mut HeaderMap) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}
