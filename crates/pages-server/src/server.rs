//! Development server implementation.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use pages_pipeline::{Pipeline, PipelineError};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tower_http::services::ServeDir;

use crate::watcher::{Debouncer, FileWatcher, WatchTarget, DEBOUNCE};
use crate::websocket::{
    reload_client_script, reload_script_tag, ReloadHub, ReloadMessage, RELOAD_PATH,
    RELOAD_SCRIPT_PATH,
};

/// Default port of the development server.
pub const DEFAULT_PORT: u16 = 3380;

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: "127.0.0.1".to_string(),
            open: false,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    Address(String),

    #[error("Failed to bind to {0}: {1}")]
    Bind(SocketAddr, String),

    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Server error: {0}")]
    Serve(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

#[derive(Clone)]
struct ServerState {
    hub: ReloadHub,
}

/// Development server: static roots, live reload and incremental rebuilds.
pub struct DevServer {
    config: DevServerConfig,
    pipeline: Arc<Pipeline>,
    hub: ReloadHub,
}

impl DevServer {
    pub fn new(pipeline: Pipeline, config: DevServerConfig) -> Self {
        Self {
            config,
            pipeline: Arc::new(pipeline),
            hub: ReloadHub::new(),
        }
    }

    pub fn hub(&self) -> &ReloadHub {
        &self.hub
    }

    /// Socket address from the configured host and port.
    pub fn address(&self) -> Result<SocketAddr, ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        addr.parse().map_err(|_| ServerError::Address(addr))
    }

    /// HTTP routes.
    ///
    /// Files are looked up in temp, then dist, then public. HTML responses
    /// get the reload client injected.
    pub fn router(&self) -> Router {
        let project = self.pipeline.config();
        let roots = ServeDir::new(project.temp_dir()).fallback(
            ServeDir::new(project.dist_dir()).fallback(ServeDir::new(project.public_dir())),
        );

        Router::new()
            .route(RELOAD_PATH, get(ws_handler))
            .route(RELOAD_SCRIPT_PATH, get(reload_script_handler))
            .nest_service("/node_modules", ServeDir::new(project.node_modules_dir()))
            .fallback_service(roots)
            .layer(middleware::map_response(inject_reload_script))
            .with_state(ServerState {
                hub: self.hub.clone(),
            })
    }

    /// Watch sources and serve until the process is stopped.
    pub async fn start(self) -> Result<(), ServerError> {
        let addr = self.address()?;
        let project = self.pipeline.config();

        let (watcher, rx) = FileWatcher::new(&[project.src_dir(), project.public_dir()])?;
        let pipeline = Arc::clone(&self.pipeline);
        let hub = self.hub.clone();
        tokio::spawn(async move {
            let _watcher = watcher;
            watch_changes(rx, pipeline, hub).await;
        });

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(addr, e.to_string()))?;
        let local = listener.local_addr().unwrap_or(addr);
        let url = format!("http://{}", local);

        tracing::info!("Serving at {}", url);

        if self.config.open {
            if let Err(e) = open::that(&url) {
                tracing::warn!("Failed to open browser: {}", e);
            }
        }

        axum::serve(listener, self.router())
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))
    }
}

/// Turn watcher paths into stage re-runs and reloads.
///
/// Each target runs once its changes have been quiet for [`DEBOUNCE`]. A
/// target that comes due while its previous run is still going waits
/// another window, so runs of one stage never overlap.
async fn watch_changes(
    mut rx: mpsc::Receiver<PathBuf>,
    pipeline: Arc<Pipeline>,
    hub: ReloadHub,
) {
    let mut debouncer = Debouncer::new(DEBOUNCE);
    let mut running: HashMap<WatchTarget, JoinHandle<()>> = HashMap::new();

    loop {
        let deadline = debouncer.next_deadline();
        let wake = deadline.unwrap_or_else(|| Instant::now() + DEBOUNCE);

        tokio::select! {
            received = rx.recv() => {
                let Some(path) = received else { break };
                match WatchTarget::classify(&pipeline, &path) {
                    Some(target) => {
                        tracing::info!("Changed {}", path.display());
                        debouncer.touch(target, Instant::now());
                    }
                    None => tracing::debug!("Ignoring change to {}", path.display()),
                }
            }
            _ = sleep_until(wake), if deadline.is_some() => {
                let now = Instant::now();
                for target in debouncer.due(now) {
                    if running.get(&target).is_some_and(|run| !run.is_finished()) {
                        debouncer.touch(target, now);
                        continue;
                    }
                    let pipeline = Arc::clone(&pipeline);
                    let hub = hub.clone();
                    let run = tokio::spawn(async move {
                        if let Err(e) = apply_change(target, &pipeline, &hub).await {
                            tracing::error!("{}", e);
                        }
                    });
                    running.insert(target, run);
                }
            }
        }
    }
}

/// Re-run the stage behind a change if there is one, then reload browsers.
///
/// A failed stage does not reload; the error is returned instead.
pub async fn apply_change(
    target: WatchTarget,
    pipeline: &Pipeline,
    hub: &ReloadHub,
) -> Result<(), PipelineError> {
    if let WatchTarget::Stage(kind) = target {
        pipeline.stage_task(kind).run().await?;
    }
    hub.reload();
    Ok(())
}

/// Insert the reload script tag before the closing body tag, or append it.
pub fn inject_script(html: &str) -> String {
    let tag = reload_script_tag();
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(at) => format!("{}{}{}", &html[..at], tag, &html[at..]),
        None => format!("{}{}", html, tag),
    }
}

async fn inject_reload_script(response: Response) -> Response {
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/html"));
    if !is_html || response.status() != StatusCode::OK {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to read HTML response: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if bytes.is_empty() {
        return Response::from_parts(parts, Body::empty());
    }

    let html = inject_script(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state.hub))
}

async fn handle_ws(mut socket: WebSocket, hub: ReloadHub) {
    let mut rx = hub.subscribe();

    if send_message(&mut socket, &ReloadMessage::Connected).await.is_err() {
        return;
    }

    loop {
        match rx.recv().await {
            Ok(msg) => {
                if send_message(&mut socket, &msg).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    socket.send(Message::Text(json.into())).await
}

async fn reload_script_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        reload_client_script(),
    )
}
