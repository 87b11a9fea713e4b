//! HTTP pull interface and WebSocket push channel

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use rhino_scene::{PipelineError, SceneDocument};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::artifact;

pub struct AppState {
    pub file: PathBuf,
    /// Serialized documents from successful watcher runs
    pub scene_tx: broadcast::Sender<String>,
    pub latest: RwLock<Option<String>>,
}

impl AppState {
    pub fn new(file: PathBuf) -> Self {
        let (scene_tx, _) = broadcast::channel(16);
        Self {
            file,
            scene_tx,
            latest: RwLock::new(None),
        }
    }

    /// Cache and broadcast a freshly processed document.
    pub async fn publish(&self, document: &SceneDocument) -> Result<(), serde_json::Error> {
        let json = serde_json::to_string(document)?;
        *self.latest.write().await = Some(json.clone());
        // No subscribers is fine
        let _ = self.scene_tx.send(json);
        Ok(())
    }
}

pub struct ServerError(anyhow::Error);

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<PipelineError>() {
            Some(PipelineError::MissingArtifact(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl<E> From<E> for ServerError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/figma-ready.json", get(figma_ready))
        .route("/latest.json", get(latest))
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Converted on every request so a pull always reflects the file on disk.
async fn figma_ready(State(state): State<Arc<AppState>>) -> Result<Json<SceneDocument>, ServerError> {
    let assembly = artifact::load_assembly(&state.file).await?;
    Ok(Json(assembly.into_document(chrono::Utc::now())))
}

async fn latest(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ServerError> {
    Ok(Json(artifact::read_raw(&state.file).await?))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let file_exists = tokio::fs::try_exists(&state.file).await.unwrap_or(false);
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "watching": state.file.display().to_string(),
        "fileExists": file_exists,
    }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.scene_tx.subscribe();

    if let Some(document) = state.latest.read().await.clone() {
        if sender.send(Message::Text(document)).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            result = rx.recv() => match result {
                Ok(document) => {
                    if sender.send(Message::Text(document)).await.is_err() {
                        break;
                    }
                }
                // Slow client; the next document supersedes whatever was dropped
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            Some(msg) = receiver.next() => {
                match msg {
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
            else => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    async fn get_json(state: Arc<AppState>, uri: &str) -> (StatusCode, Value) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn state_with(dir: &tempfile::TempDir, contents: Option<&str>) -> Arc<AppState> {
        let file = dir.path().join("shapes.json");
        if let Some(contents) = contents {
            std::fs::write(&file, contents).unwrap();
        }
        Arc::new(AppState::new(file))
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(&dir, None);

        let (status, body) = get_json(state.clone(), "/figma-ready.json").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());

        let (status, _) = get_json(state.clone(), "/latest.json").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = get_json(state, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["fileExists"], false);
    }

    #[tokio::test]
    async fn test_malformed_file_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(&dir, Some("[{\"type\": \"curve\""));

        let (status, body) = get_json(state, "/figma-ready.json").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("malformed"));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(&dir, Some("[]"));

        let (status, body) = get_json(state.clone(), "/figma-ready.json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["shapes"], json!([]));
        assert_eq!(body["metadata"]["totalShapes"], 0);

        let (_, health) = get_json(state, "/health").await;
        assert_eq!(health["fileExists"], true);
    }

    #[tokio::test]
    async fn test_figma_ready_converts_batch() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(
            &dir,
            Some(
                r#"[
                {"type": "curve", "points": [[0, 0], [10, 0], [10, 10], [0, 0]]},
                {"type": "frame", "x": 0, "y": 0, "width": 100, "height": 50}
            ]"#,
            ),
        );

        let (status, body) = get_json(state, "/figma-ready.json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metadata"]["totalShapes"], 2);
        assert_eq!(body["shapes"][0]["type"], "FRAME");
        assert_eq!(body["shapes"][1]["type"], "VECTOR");
        assert_eq!(body["shapes"][1]["y"], 40.0);
    }

    #[tokio::test]
    async fn test_latest_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let raw = r#"[{"type": "text", "x": 1, "y": 2, "text": "hi", "extra": true}]"#;
        let state = state_with(&dir, Some(raw));

        let (status, body) = get_json(state, "/latest.json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::from_str::<Value>(raw).unwrap());
    }

    #[tokio::test]
    async fn test_publish_caches_and_broadcasts() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(&dir, None);
        let mut rx = state.scene_tx.subscribe();

        let document = SceneDocument::new(vec![], chrono::Utc::now());
        state.publish(&document).await.unwrap();

        let sent = rx.recv().await.unwrap();
        assert_eq!(state.latest.read().await.as_deref(), Some(sent.as_str()));
        let decoded: SceneDocument = serde_json::from_str(&sent).unwrap();
        assert_eq!(decoded, document);
    }
}
