//! HTTP surface over the tool dispatcher
//!
//! Every route except `/health` requires the configured `x-api-key`.
//! The HTTP status mirrors the dispatch outcome.

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{info, warn};

use anf_tools::{Collaborators, DispatchError, Dispatcher, ToolOutcome};

const API_KEY_HEADER: &str = "x-api-key";
const ACTOR_HEADER: &str = "x-actor";
const DEFAULT_ACTOR: &str = "api-key";

/// Shared state for the gateway routes
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    /// Provider, defaults and audit sink; the actor is set per request
    pub collaborators: Collaborators,
    pub api_key: Option<String>,
}

#[derive(Deserialize)]
struct InvokeRequest {
    name: String,
    #[serde(default = "empty_object")]
    arguments: Value,
}

fn empty_object() -> Value {
    json!({})
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/tools", get(list_tools))
        .route("/tools/:name", get(describe_tool))
        .route("/tools/:name/invoke", post(invoke_tool))
        .route("/tools/:name/validate", post(validate_tool))
        .route("/invoke", post(invoke_named))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
}

/// Serve until the listener fails
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    info!("Gateway listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    match (state.api_key.as_deref(), presented) {
        (Some(expected), Some(given)) if expected == given => next.run(request).await,
        (None, _) => {
            warn!("Request refused: no API key configured");
            unauthorized("API key not configured on the server")
        }
        _ => unauthorized("missing or invalid x-api-key"),
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"success": false, "error": {"kind": "Unauthorized", "message": message}})),
    )
        .into_response()
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn list_tools(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.dispatcher.list_tools()))
}

async fn describe_tool(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.dispatcher.registry().get_tool(&name) {
        Ok(tool) => Json(json!(tool.info())).into_response(),
        Err(e) => not_found(&name, &e.to_string()),
    }
}

async fn validate_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let args = match body {
        Ok(Json(args)) => args,
        Err(rejection) => return bad_body(Some(&name), &rejection),
    };
    match state.dispatcher.validate(&name, &args) {
        Ok(result) => Json(json!(result)).into_response(),
        Err(e) => not_found(&name, &e.to_string()),
    }
}

fn not_found(name: &str, message: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": {"kind": "UnknownTool", "tool": name, "message": message}
        })),
    )
        .into_response()
}

/// Unparseable request bodies get the same envelope as schema failures
fn bad_body(tool: Option<&str>, rejection: &JsonRejection) -> Response {
    warn!("Rejected request body: {}", rejection.body_text());
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "success": false,
            "error": {
                "kind": "InvalidArguments",
                "tool": tool,
                "field": "",
                "message": rejection.body_text(),
            }
        })),
    )
        .into_response()
}

async fn invoke_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(args)) => invoke(&state, &name, args, &headers).await,
        Err(rejection) => bad_body(Some(&name), &rejection),
    }
}

async fn invoke_named(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<InvokeRequest>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(request)) => invoke(&state, &request.name, request.arguments, &headers).await,
        Err(rejection) => bad_body(None, &rejection),
    }
}

async fn invoke(state: &AppState, name: &str, args: Value, headers: &HeaderMap) -> Response {
    let actor = headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_ACTOR);
    let collaborators = state.collaborators.clone().with_actor(actor);
    let outcome = state.dispatcher.invoke(name, args, &collaborators).await;
    (outcome_status(&outcome), Json(outcome.to_json())).into_response()
}

fn outcome_status(outcome: &ToolOutcome) -> StatusCode {
    match outcome {
        ToolOutcome::Completed(_) => StatusCode::OK,
        ToolOutcome::Placeholder { .. } => StatusCode::NOT_IMPLEMENTED,
        ToolOutcome::Failed(DispatchError::UnknownTool(_)) => StatusCode::NOT_FOUND,
        ToolOutcome::Failed(DispatchError::InvalidArguments { .. }) => StatusCode::BAD_REQUEST,
        ToolOutcome::Failed(DispatchError::HandlerFailure { .. }) => StatusCode::BAD_GATEWAY,
    }
}
