use anyhow::Result;
use std::time::{Duration, Instant};

use tracing::{error, warn};

use crate::media_store::{ImageSummary, ListFilter, SortOrder, TagCount};
use crate::thumbnails::ThumbnailError;
use tower_http::services::ServeDir;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{http_cache, log_requests, state::*, RequestsLoggingLevel, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheSummary {
    prepared_images: usize,
    total_images: usize,
    tags: Vec<TagCount>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CacheImagesBody {
    /// 1 for oldest first, -1 for newest first.
    pub order: i64,
    pub from: usize,
    pub max_images: usize,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
    };
    Json(stats)
}

async fn get_cache_summary(State(state): State<ServerState>) -> Response {
    let snapshot = state.progress.snapshot();
    match state.store.get_tags() {
        Ok(tags) => Json(CacheSummary {
            prepared_images: snapshot.prepared_images,
            total_images: snapshot.total_images,
            tags,
        })
        .into_response(),
        Err(err) => {
            error!("Failed to load tags: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn post_cache_images(
    State(store): State<GuardedMetadataStore>,
    Json(body): Json<CacheImagesBody>,
) -> Response {
    let order = if body.order < 0 {
        SortOrder::Descending
    } else {
        SortOrder::Ascending
    };
    let filter = ListFilter {
        order,
        offset: body.from,
        limit: body.max_images,
        tag_name: body.tags.and_then(|tags| tags.into_iter().next()),
    };

    match store.list_page(&filter) {
        Ok(images) => {
            let page: Vec<ImageSummary> = images.iter().map(ImageSummary::from).collect();
            Json(page).into_response()
        }
        Err(err) => {
            error!("Failed to list images: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_cache_thumbnail(State(state): State<ServerState>, Path(id): Path<i64>) -> Response {
    match state
        .thumbnails
        .get_thumbnail(id, state.config.thumbnail_width)
        .await
    {
        Ok(bytes) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "image/jpeg")
            .body(bytes.into())
            .unwrap(),
        Err(ThumbnailError::NotFound(_)) => StatusCode::NOT_FOUND.into_response(),
        // A thumbnail that cannot be generated is indistinguishable from a
        // missing one at this boundary.
        Err(
            err @ (ThumbnailError::Image(_)
            | ThumbnailError::Timeout
            | ThumbnailError::GenerationFailed(_)),
        ) => {
            warn!("Failed to generate thumbnail for image {}: {}", id, err);
            StatusCode::NOT_FOUND.into_response()
        }
        Err(err) => {
            error!("Failed to serve thumbnail for image {}: {}", id, err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_raw_image(
    State(store): State<GuardedMetadataStore>,
    Path(file): Path<String>,
) -> Response {
    let id = match file.strip_suffix(".jpg").and_then(|s| s.parse::<i64>().ok()) {
        Some(id) => id,
        None => return StatusCode::NOT_FOUND.into_response(),
    };

    let record = match store.get_item(id) {
        Ok(Some(record)) => record,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to load image {}: {}", id, err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let buffer = match tokio::fs::read(&record.full_path).await {
        Ok(buffer) => buffer,
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
    };

    if let Some(kind) = infer::get(&buffer) {
        if kind.mime_type().starts_with("image/") {
            return Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, kind.mime_type().to_string())
                .body(buffer.into())
                .unwrap();
        }
    }
    StatusCode::NOT_FOUND.into_response()
}

impl ServerState {
    fn new(
        config: ServerConfig,
        store: GuardedMetadataStore,
        thumbnails: GuardedThumbnailCache,
        progress: GuardedProgress,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            store,
            thumbnails,
            progress,
            hash: env!("GIT_HASH").to_owned(),
        }
    }
}

pub fn make_app(
    config: ServerConfig,
    store: GuardedMetadataStore,
    thumbnails: GuardedThumbnailCache,
    progress: GuardedProgress,
) -> Result<Router> {
    let state = ServerState::new(config.clone(), store, thumbnails, progress);

    let query_routes: Router = Router::new()
        .route("/summary", get(get_cache_summary))
        .route("/images", post(post_cache_images))
        .with_state(state.clone());

    let thumbnail_routes: Router = Router::new()
        .route("/{id}", get(get_cache_thumbnail))
        .layer(middleware::from_fn_with_state(
            config.content_cache_age_sec,
            http_cache,
        ))
        .with_state(state.clone());

    let raw_routes: Router = Router::new()
        .route("/{file}", get(get_raw_image))
        .layer(middleware::from_fn_with_state(
            config.content_cache_age_sec,
            http_cache,
        ))
        .with_state(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let mut app: Router = home_router
        .nest("/cache", query_routes.merge(thumbnail_routes))
        .nest("/raw", raw_routes);

    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

pub async fn run_server(
    store: GuardedMetadataStore,
    thumbnails: GuardedThumbnailCache,
    progress: GuardedProgress,
    requests_logging_level: RequestsLoggingLevel,
    port: u16,
    thumbnail_width: u32,
    content_cache_age_sec: usize,
    frontend_dir_path: Option<String>,
) -> Result<()> {
    let config = ServerConfig {
        port,
        requests_logging_level,
        thumbnail_width,
        content_cache_age_sec,
        frontend_dir_path,
    };
    let app = make_app(config, store, thumbnails, progress)?;

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;

    Ok(axum::serve(listener, app).await?)
}
