//! HTTP and WebSocket routes for the BigBox server.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, patch, post},
};
use bigbox_core::{
    BuildPipeline, DeviceConnection, FirmwareConfig, FirmwareContext, MakeRequest, ProfileEnvelope,
    ProfileStore, deps,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;

use crate::error::{ServerError, ServerResult};
use crate::notifier::BroadcastNotifier;
use crate::protocol::{DependencyStatus, MakeBody, ProfileList};

/// Application state shared across handlers.
pub struct AppState {
    /// Build/flash pipeline; also owns the configuration and profile store.
    pub pipeline: BuildPipeline,
    /// Channel every pipeline message is published on.
    pub notifier: Arc<BroadcastNotifier>,
}

impl AppState {
    pub fn new(config: FirmwareConfig, device: Arc<dyn DeviceConnection>) -> Self {
        let notifier = Arc::new(BroadcastNotifier::new());
        let context = FirmwareContext::new(config, device, notifier.clone());
        Self {
            pipeline: BuildPipeline::new(context),
            notifier,
        }
    }
}

/// Create the router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/make", post(make_handler))
        .route("/check_dep", post(check_dep_handler))
        .route("/install", post(install_handler))
        .route(
            "/firmwareprofiles",
            get(list_profiles_handler).post(create_profile_handler),
        )
        .route(
            "/firmwareprofiles/{id}",
            patch(update_profile_handler).delete(delete_profile_handler),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler.
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Merge, build and flash.
///
/// The pipeline runs in its own task so a dropped connection cannot abandon
/// the printer between disconnect and reconnect.
async fn make_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MakeBody>,
) -> ServerResult<&'static str> {
    let request: MakeRequest = body.into();
    let task = tokio::spawn(async move { state.pipeline.make(&request).await });

    task.await.map_err(|e| ServerError::Task(e.to_string()))??;
    Ok("Ok.")
}

async fn check_dep_handler(State(state): State<Arc<AppState>>) -> Json<DependencyStatus> {
    let config = &state.pipeline.context().config;
    let is_installed = deps::check_installed(&config.dependencies).await;
    Json(DependencyStatus { is_installed })
}

/// Install the toolchain packages, streaming the installer's output.
async fn install_handler(State(state): State<Arc<AppState>>) -> ServerResult<&'static str> {
    let context = state.pipeline.context();
    let output = deps::install(
        &context.config.dependencies,
        &context.config.privilege,
        state.pipeline.runner(),
        state.notifier.as_ref(),
    )
    .await?;

    if !output.success() {
        tracing::warn!("Dependency installation exited with {}", output.status);
    }
    Ok("Ok.")
}

/// Run a profile store operation on the blocking pool.
async fn with_profiles<T, F>(state: &AppState, op: F) -> ServerResult<T>
where
    F: FnOnce(&ProfileStore) -> bigbox_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = state.pipeline.context().profiles.clone();
    let result = tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| ServerError::Task(e.to_string()))?;
    Ok(result?)
}

async fn list_profiles_handler(State(state): State<Arc<AppState>>) -> ServerResult<Json<ProfileList>> {
    let profiles = with_profiles(&state, |store| store.list()).await?;
    Ok(Json(ProfileList { profiles }))
}

async fn create_profile_handler(
    State(state): State<Arc<AppState>>,
    Json(envelope): Json<ProfileEnvelope>,
) -> ServerResult<StatusCode> {
    with_profiles(&state, move |store| store.save(&envelope.profile)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(envelope): Json<ProfileEnvelope>,
) -> ServerResult<StatusCode> {
    if envelope.profile.id != id {
        return Err(ServerError::BadRequest(format!(
            "profile id {} does not match {}",
            envelope.profile.id, id
        )));
    }
    with_profiles(&state, move |store| store.save(&envelope.profile)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_profile_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ServerResult<StatusCode> {
    with_profiles(&state, move |store| store.delete(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

/// Forward every plugin message to the client until either side hangs up.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.notifier.subscribe();

    let forward_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    let Ok(json) = serde_json::to_string(&msg) else {
                        continue;
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("WebSocket client lagged, dropped {} messages", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // The UI never sends anything meaningful; just watch for the close.
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::warn!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    forward_task.abort();
}

