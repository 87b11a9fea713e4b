//! Plugin-side session: UI messages in, status events out
//!
//! The companion UI posts `load-data`, `clear-canvas` and `close`; the
//! session answers with `loading`, `success` and `error` events.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::error::SourceError;
use crate::materialize::{clear, materialize, Canvas};
use crate::scene::SceneDocument;

/// Messages from the plugin UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PluginMessage {
    LoadData,
    ClearCanvas,
    Close,
}

/// Status events posted back to the plugin UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PluginEvent {
    Loading { message: String },
    Success { count: usize, message: String },
    Error { message: String },
}

/// Where the session pulls scene documents from
#[async_trait]
pub trait SceneSource: Send + Sync {
    async fn fetch(&self) -> Result<SceneDocument, SourceError>;
}

/// Pulls `/figma-ready.json` from a running sync server.
pub struct HttpSceneSource {
    client: Client,
    url: String,
}

impl HttpSceneSource {
    pub fn new(server: &str) -> Result<Self, SourceError> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(10)).build()?,
            url: format!("{}/figma-ready.json", server.trim_end_matches('/')),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SceneSource for HttpSceneSource {
    async fn fetch(&self) -> Result<SceneDocument, SourceError> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

pub struct Session<C, S> {
    canvas: C,
    source: S,
    events: mpsc::UnboundedSender<PluginEvent>,
}

impl<C: Canvas, S: SceneSource> Session<C, S> {
    pub fn new(canvas: C, source: S, events: mpsc::UnboundedSender<PluginEvent>) -> Self {
        Self { canvas, source, events }
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    /// Handle messages until `close` arrives or the UI goes away, then hand
    /// the canvas back.
    pub async fn run(mut self, mut inbox: mpsc::Receiver<PluginMessage>) -> C {
        while let Some(message) = inbox.recv().await {
            if self.handle(message).await.is_break() {
                break;
            }
        }
        self.canvas
    }

    pub async fn handle(&mut self, message: PluginMessage) -> ControlFlow<()> {
        match message {
            PluginMessage::LoadData => self.load_data().await,
            PluginMessage::ClearCanvas => {
                let removed = clear(&mut self.canvas);
                info!("Cleared {} synced nodes", removed);
            }
            PluginMessage::Close => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    async fn load_data(&mut self) {
        self.emit(PluginEvent::Loading {
            message: "Loading data from server...".to_string(),
        });

        let document = match self.source.fetch().await {
            Ok(document) => document,
            Err(e) => {
                error!("Error loading scene data: {}", e);
                self.emit(PluginEvent::Error {
                    message: format!("Loading failed: {}", e),
                });
                return;
            }
        };

        if document.shapes.is_empty() {
            self.emit(PluginEvent::Error {
                message: "No geometries found in server response".to_string(),
            });
            return;
        }

        let report = materialize(&mut self.canvas, &document.shapes).await;
        let count = report.created.len();
        if count == 0 {
            self.emit(PluginEvent::Error {
                message: "Unable to create any geometries".to_string(),
            });
        } else {
            self.emit(PluginEvent::Success {
                count,
                message: format!("Successfully created {} geometries", count),
            });
        }
    }

    fn emit(&self, event: PluginEvent) {
        // UI may already be gone
        let _ = self.events.send(event);
    }
}
