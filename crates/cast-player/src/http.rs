use crate::core::PlayerHandle;
use crate::feed::{ArtworkCache, PodcastCache};
use axum::{
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use cast_proto::library::{KeyValueStore, PodcastLibrary};
use cast_proto::protocol::{Command, PlayerSnapshot, Podcast};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

pub type SharedLibrary = Arc<Mutex<PodcastLibrary<Box<dyn KeyValueStore>>>>;

#[derive(Clone)]
pub struct HttpState {
    pub player: PlayerHandle,
    pub podcasts: PodcastCache,
    pub artwork: ArtworkCache,
    pub library: SharedLibrary,
}

#[derive(Deserialize)]
struct OpenRequest {
    url: Option<String>,
}

#[derive(Deserialize)]
struct FeedQuery {
    feed: String,
}

#[derive(Deserialize)]
struct ArtworkQuery {
    url: String,
}

type ApiError = (StatusCode, String);

pub fn router(state: HttpState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(Any);

    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/open", post(open))
        .route("/api/play", get(play).post(play))
        .route("/api/pause", get(pause).post(pause))
        .route("/api/seek/:seconds", get(seek).post(seek))
        .route("/api/volume/:percent", get(set_volume).post(set_volume))
        .route("/api/podcast", get(get_podcast))
        .route("/api/artwork", get(get_artwork))
        .route(
            "/api/library",
            get(get_library).post(add_to_library).delete(remove_from_library),
        )
        .layer(cors)
        .with_state(state)
}

pub fn start_server(bind_address: String, port: u16, state: HttpState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(state);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

fn dispatch(state: &HttpState, cmd: Command) -> StatusCode {
    match state.player.send(cmd) {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            error!("HTTP API: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn get_status(State(state): State<HttpState>) -> Json<PlayerSnapshot> {
    Json(state.player.snapshot())
}

async fn open(State(state): State<HttpState>, Json(req): Json<OpenRequest>) -> StatusCode {
    info!("HTTP API: Open {:?}", req.url);
    dispatch(&state, Command::Open { url: req.url })
}

async fn play(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Play");
    dispatch(&state, Command::SetPlayIntent { playing: true })
}

async fn pause(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Pause");
    dispatch(&state, Command::SetPlayIntent { playing: false })
}

async fn seek(State(state): State<HttpState>, Path(seconds): Path<f64>) -> StatusCode {
    info!("HTTP API: Seek to {}s", seconds);
    dispatch(&state, Command::Seek { seconds })
}

async fn set_volume(State(state): State<HttpState>, Path(percent): Path<i32>) -> StatusCode {
    let value = (percent as f32 / 100.0).clamp(0.0, 1.0);
    info!("HTTP API: Set volume to {}%", percent);
    dispatch(&state, Command::Volume { value })
}

async fn get_podcast(
    State(state): State<HttpState>,
    Query(q): Query<FeedQuery>,
) -> Result<Json<Podcast>, ApiError> {
    state
        .podcasts
        .read(&q.feed)
        .await
        .map(|podcast| Json((*podcast).clone()))
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))
}

async fn get_artwork(
    State(state): State<HttpState>,
    Query(q): Query<ArtworkQuery>,
) -> Result<Response, ApiError> {
    let bytes = state
        .artwork
        .read(&q.url)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;
    Ok(([(header::CACHE_CONTROL, "max-age=86400")], (*bytes).clone()).into_response())
}

async fn get_library(State(state): State<HttpState>) -> Result<Json<Vec<Podcast>>, ApiError> {
    state.library.lock().await.load().map(Json).map_err(internal)
}

async fn add_to_library(
    State(state): State<HttpState>,
    Query(q): Query<FeedQuery>,
) -> Result<Json<Vec<Podcast>>, ApiError> {
    let podcast = state
        .podcasts
        .read(&q.feed)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;
    info!("HTTP API: Saving '{}' to library", podcast.name);
    state
        .library
        .lock()
        .await
        .upsert((*podcast).clone())
        .map(Json)
        .map_err(internal)
}

async fn remove_from_library(
    State(state): State<HttpState>,
    Query(q): Query<FeedQuery>,
) -> Result<Json<Vec<Podcast>>, ApiError> {
    info!("HTTP API: Removing {} from library", q.feed);
    state.library.lock().await.remove(&q.feed).map(Json).map_err(internal)
}

fn internal(e: anyhow::Error) -> ApiError {
    warn!("HTTP API: library error: {:#}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
