use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt::Display;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::bus::LedBus;
use crate::config::Config;
use crate::model::{ShowRequest, SingleFrameRequest};
use crate::show::{frame_delay, ShowPlayer};
use crate::strip::{lock, with_strip, SharedStrip, StripController};

const STATS_INTERVAL: Duration = Duration::from_secs(5);

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>WS2801 LED Controller</title></head>
<body>
    <h1>WS2801 LED Controller</h1>
    <p>Available endpoints:</p>
    <ul>
        <li>POST /singleFrame - render one frame</li>
        <li>POST /spectacle - play a multi-frame show</li>
        <li>POST /testColors - cycle through the test colours</li>
    </ul>
</body>
</html>
"#;

/// State shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub strip: SharedStrip,
    pub player: ShowPlayer,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(strip: SharedStrip, config: Config) -> Self {
        AppState {
            player: ShowPlayer::new(Arc::clone(&strip)),
            strip,
            config: Arc::new(config),
        }
    }
}

/// HTTP front end driving a single LED strip
pub struct HttpServer {
    state: AppState,
    stop: Arc<Notify>,
    debug: bool,
}

impl HttpServer {
    /// Take ownership of the opened bus and darken the strip
    pub fn new(config: Config, bus: Box<dyn LedBus>, debug: bool) -> Result<Self> {
        let mut controller =
            StripController::from_config(bus, &config).context("Failed to set up strip controller")?;

        info!(
            "✓ Opened {} ({} LEDs, gamma {})",
            controller.bus_name(),
            controller.led_count(),
            controller.gamma().exponent()
        );

        if let Err(e) = controller.clear_strip() {
            warn!("Initial clear failed: {}", e);
        }

        Ok(HttpServer {
            state: AppState::new(controller.into_shared(), config),
            stop: Arc::new(Notify::new()),
            debug,
        })
    }

    /// Get a handle that stops `run` when notified (for signal handlers)
    pub fn get_stop_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.stop)
    }

    /// Serve requests until the stop handle fires
    pub async fn run(&self) -> Result<()> {
        let http = &self.state.config.http;
        let addr = format!("{}:{}", http.host, http.port);
        let listener = TcpListener::bind(&addr)
            .await
            .context(format!("Failed to bind to {}", addr))?;

        info!("✓ Server running on {}", addr);

        if self.debug {
            self.spawn_stats_task();
        }

        let stop = Arc::clone(&self.stop);
        axum::serve(listener, router(self.state.clone()))
            .with_graceful_shutdown(async move { stop.notified().await })
            .await
            .context("HTTP server failed")?;

        Ok(())
    }

    /// Turn the strip off and stop accepting further updates
    pub fn shutdown(&self) {
        info!("Clearing LED strip...");

        let mut strip = lock(&self.state.strip);
        if let Err(e) = strip.close() {
            error!("Failed to clear strip on shutdown: {}", e);
        }

        info!(
            "✓ Server stopped ({} frames sent, {} failed)",
            strip.frames_sent(),
            strip.frames_failed()
        );
    }

    fn spawn_stats_task(&self) {
        let frames_sent = lock(&self.state.strip).frames_sent_counter();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(STATS_INTERVAL);
            ticker.tick().await;
            let mut last_sent = frames_sent.load(Ordering::Relaxed);

            loop {
                ticker.tick().await;
                let current = frames_sent.load(Ordering::Relaxed);
                let fps = (current - last_sent) as f64 / STATS_INTERVAL.as_secs_f64();
                debug!("[Stats] Sent: {:.1} fps", fps);
                last_sent = current;
            }
        });
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.http.max_body_bytes;
    Router::new()
        .route("/", get(index).fallback(not_found))
        .route("/singleFrame", post(single_frame).fallback(not_found))
        .route("/spectacle", post(spectacle).fallback(not_found))
        .route("/testColors", post(test_colors).fallback(not_found))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "Route Not Found" }))).into_response()
}

fn error_response(error: &str, details: impl Display) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": error, "details": details.to_string() })),
    )
        .into_response()
}

/// Whole rates are echoed as integers
fn fps_json(fps: f64) -> serde_json::Value {
    if fps.fract() == 0.0 && fps <= u32::MAX as f64 {
        json!(fps as u32)
    } else {
        json!(fps)
    }
}

/// Oversized and unreadable bodies are reported like malformed JSON
fn parse_body<T: DeserializeOwned>(body: Result<Bytes, BytesRejection>) -> Result<T, String> {
    let body = body.map_err(|e| e.body_text())?;
    serde_json::from_slice(&body).map_err(|e| e.to_string())
}

fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// POST /singleFrame
async fn single_frame(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    const ERROR: &str = "Error rendering frame";

    let request: SingleFrameRequest = match parse_body(body) {
        Ok(request) => request,
        Err(e) => {
            error!("Error in singleFrame: {}", e);
            return error_response(ERROR, e);
        }
    };

    let leds_updated = request.array.len();
    match with_strip(&state.strip, move |strip| strip.render_frame(&request.array)).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "render": true,
                "ledsUpdated": leds_updated,
                "timestamp": timestamp_ms(),
            })),
        )
            .into_response(),
        Err(e) => {
            error!("Error in singleFrame: {}", e);
            error_response(ERROR, e)
        }
    }
}

/// POST /spectacle; acknowledges, then plays in the background
async fn spectacle(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    const ERROR: &str = "Error rendering spectacle";

    let request: ShowRequest = match parse_body(body) {
        Ok(request) => request,
        Err(e) => {
            error!("Error in spectacle: {}", e);
            return error_response(ERROR, e);
        }
    };

    let fps = request.fps.unwrap_or(state.config.show.default_fps);
    if let Err(e) = frame_delay(fps) {
        error!("Error in spectacle: {}", e);
        return error_response(ERROR, e);
    }

    let frames = request.array.len();
    info!("Starting show: {} frames at {} fps", frames, fps);
    state.player.spawn(request.array, fps);

    (
        StatusCode::OK,
        Json(json!({ "spectacle": "started", "frames": frames, "fps": fps_json(fps) })),
    )
        .into_response()
}

/// POST /testColors; responds once the whole cycle has finished
async fn test_colors(State(state): State<AppState>) -> Response {
    match state.player.test_colors(&state.config.test_pattern).await {
        Ok(colors) => (
            StatusCode::OK,
            Json(json!({ "test": "completed", "colors": colors })),
        )
            .into_response(),
        Err(e) => {
            error!("Error in colour test: {}", e);
            error_response("Error in color test", e)
        }
    }
}
