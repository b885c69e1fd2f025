use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::encoder::{CodecEncoder, FrameEncoder};
use crate::pipeline::StopSignal;
use crate::sink::overlay::Canvas;

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("failed to bind viewer to {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("viewer server failed: {0}")]
    Serve(std::io::Error),
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

struct ViewerState {
    canvas: Arc<Canvas>,
    stop: StopSignal,
    title: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET / — page polling the annotated frame and the latest result
async fn index(State(state): State<Arc<ViewerState>>) -> Html<String> {
    Html(INDEX_HTML.replace("{title}", &state.title))
}

/// GET /frame.png — latest frame with the overlay, 503 until one arrives
async fn frame_png(State(state): State<Arc<ViewerState>>) -> impl IntoResponse {
    let Some(frame) = state.canvas.render() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "no frame yet").into_response();
    };

    let result = tokio::task::spawn_blocking(move || CodecEncoder::png(1).encode(&frame)).await;
    match result {
        Ok(Ok(payload)) => (
            [
                (header::CONTENT_TYPE, payload.format.mime()),
                (header::CACHE_CONTROL, "no-store"),
            ],
            payload.data,
        )
            .into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "failed to encode viewer frame");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => {
            error!(error = %e, "spawn_blocking failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /result
async fn latest_result(State(state): State<Arc<ViewerState>>) -> impl IntoResponse {
    Json(state.canvas.snapshot())
}

/// POST /stop — same as pressing a key in the terminal
async fn stop(State(state): State<Arc<ViewerState>>) -> impl IntoResponse {
    info!("stop requested from viewer");
    state.stop.raise();
    StatusCode::ACCEPTED
}

fn router(state: Arc<ViewerState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/frame.png", get(frame_png))
        .route("/result", get(latest_result))
        .route("/stop", post(stop))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Small HTTP viewer for the shared canvas.
pub struct Viewer {
    listener: TcpListener,
    state: Arc<ViewerState>,
}

impl Viewer {
    pub async fn bind(
        addr: &str,
        title: &str,
        canvas: Arc<Canvas>,
        stop: StopSignal,
    ) -> Result<Self, ViewerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ViewerError::Bind(addr.to_string(), e))?;
        Ok(Self {
            listener,
            state: Arc::new(ViewerState {
                canvas,
                stop,
                title: title.to_string(),
            }),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    /// Serve until the stop signal is raised.
    pub async fn serve(self) -> Result<(), ViewerError> {
        if let Some(addr) = self.local_addr() {
            info!(%addr, "viewer listening");
        }
        let stop = self.state.stop.clone();
        axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(async move { stop.wait().await })
            .await
            .map_err(ViewerError::Serve)
    }
}

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body { font-family: sans-serif; background: #222; color: #eee; }
img { display: block; margin-bottom: 8px; image-rendering: pixelated; }
</style>
</head>
<body>
<h3>{title}</h3>
<img id="frame" alt="waiting for camera">
<pre id="result"></pre>
<button onclick="fetch('/stop', {method: 'POST'})">Stop</button>
<script>
setInterval(async () => {
  document.getElementById('frame').src = '/frame.png?t=' + Date.now();
  const resp = await fetch('/result');
  document.getElementById('result').textContent = JSON.stringify(await resp.json(), null, 2);
}, 300);
</script>
</body>
</html>
"#;
