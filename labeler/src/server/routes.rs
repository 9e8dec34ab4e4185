//! HTTP route handlers for the labeling API
//!
//! Core work is synchronous and runs on the blocking pool; handlers only
//! parse requests and shape responses.

use std::path::PathBuf;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::{ApiError, ApiErrorResponse};
use super::render::render_red_png;
use super::state::{AppState, Selection, lock_session};
use crate::acquisition::{AcquisitionEntry, ImageSummary, describe};
use crate::label::{EditAction, LabelStatus, encode_label_png, touched_from_png};
use crate::projection::{ProjectionError, ProjectionMetadata};
use crate::segmentation::{SegmentationEngine, SegmentationOptions};

/// Largest accepted canvas upload
const MAX_CANVAS_UPLOAD: usize = 64 * 1024 * 1024;

/// Run synchronous core work on the blocking pool
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {}", e)))?
}

/// Log at a level that matches the failure and convert for the response
fn log_failure(context: &str, e: ApiError) -> ApiErrorResponse {
    match &e {
        ApiError::MosaicConfirmationRequired(_)
        | ApiError::Segmentation(_)
        | ApiError::Projection(ProjectionError::Cancelled { .. }) => {
            debug!("{}: {}", context, e)
        }
        ApiError::Internal(_) => tracing::error!("{}: {}", context, e),
        _ => warn!("{}: {}", context, e),
    }
    ApiErrorResponse::from(e)
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub image_dir: PathBuf,
    pub uptime_seconds: u64,
}

/// GET /health
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let ready = state.catalog.image_dir().is_dir();
    let (status, code) = if ready {
        ("healthy", StatusCode::OK)
    } else {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            image_dir: state.catalog.image_dir().to_path_buf(),
            uptime_seconds: state.uptime_seconds(),
        }),
    )
}

/// GET /api/acquisitions - List acquisitions in the image folder
async fn list_acquisitions(
    State(state): State<AppState>,
) -> Result<Json<Vec<AcquisitionEntry>>, ApiErrorResponse> {
    let catalog = state.catalog.clone();
    let entries = blocking(move || Ok(catalog.scan()))
        .await
        .map_err(|e| log_failure("Failed to list acquisitions", e))?;
    Ok(Json(entries))
}

#[derive(Debug, Serialize)]
pub struct AcquisitionResponse {
    pub name: String,
    pub images: Vec<ImageSummary>,
}

/// GET /api/acquisition/:name - Info-only listing of every image
async fn describe_acquisition(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<AcquisitionResponse>, ApiErrorResponse> {
    let catalog = state.catalog.clone();
    let lookup = name.clone();
    let images = blocking(move || {
        let acquisition = catalog.open(&lookup)?;
        Ok(describe(&acquisition)?)
    })
    .await
    .map_err(|e| log_failure(&format!("Failed to describe {}", name), e))?;

    Ok(Json(AcquisitionResponse { name, images }))
}

/// Query for everything that addresses one projection
#[derive(Debug, Default, Deserialize)]
pub struct ProjectionQuery {
    #[serde(default)]
    pub channel: usize,
    #[serde(default)]
    pub time: usize,
    pub confirm_mosaic: Option<bool>,
}

impl From<&ProjectionQuery> for Selection {
    fn from(query: &ProjectionQuery) -> Self {
        Selection {
            channel: query.channel,
            time: query.time,
            confirm_mosaic: query.confirm_mosaic,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectionResponse {
    pub acquisition: String,
    pub image_index: usize,
    pub metadata: ProjectionMetadata,
}

/// GET /api/acquisition/:name/image/:index/projection - Projection metadata
async fn get_projection(
    State(state): State<AppState>,
    Path((name, index)): Path<(String, usize)>,
    Query(query): Query<ProjectionQuery>,
) -> Result<Json<ProjectionResponse>, ApiErrorResponse> {
    let selection = Selection::from(&query);
    let lookup = name.clone();
    let projection = blocking(move || state.projection(&lookup, index, selection))
        .await
        .map_err(|e| log_failure(&format!("Projection of {} image {} failed", name, index), e))?;

    Ok(Json(ProjectionResponse {
        acquisition: name,
        image_index: index,
        metadata: projection.metadata.clone(),
    }))
}

fn png_response(png: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        Bytes::from(png),
    )
        .into_response()
}

/// GET .../projection.png - Projection in the red channel of an RGB PNG
async fn get_projection_png(
    State(state): State<AppState>,
    Path((name, index)): Path<(String, usize)>,
    Query(query): Query<ProjectionQuery>,
) -> Result<Response, ApiErrorResponse> {
    let selection = Selection::from(&query);
    let lookup = name.clone();
    let png = blocking(move || {
        let projection = state.projection(&lookup, index, selection)?;
        render_red_png(&projection.max_projection)
            .map_err(|e| ApiError::Internal(format!("PNG encoding failed: {}", e)))
    })
    .await
    .map_err(|e| log_failure(&format!("Preview of {} image {} failed", name, index), e))?;

    Ok(png_response(png))
}

/// GET .../label.png - Current session label (values 0/1)
async fn get_label_png(
    State(state): State<AppState>,
    Path((name, index)): Path<(String, usize)>,
) -> Result<Response, ApiErrorResponse> {
    let lookup = name.clone();
    let (png, revision) = blocking(move || {
        let session = state.session(&lookup, index)?;
        let snapshot = lock_session(&session).snapshot();
        Ok((encode_label_png(&snapshot.label)?, snapshot.revision))
    })
    .await
    .map_err(|e| log_failure(&format!("Label of {} image {} failed", name, index), e))?;

    let mut response = png_response(png);
    response.headers_mut().insert(
        HeaderName::from_static("x-label-revision"),
        HeaderValue::from(revision),
    );
    Ok(response)
}

#[derive(Debug, Serialize)]
pub struct LabelResponse {
    pub acquisition: String,
    pub image_index: usize,
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: LabelStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct InitialGuessQuery {
    #[serde(default)]
    pub channel: usize,
    #[serde(default)]
    pub time: usize,
    pub confirm_mosaic: Option<bool>,
    pub threshold: Option<f64>,
    pub max_gap: Option<usize>,
}

/// POST .../label/initial-guess - Replace the label with the segmentation guess
async fn initial_guess(
    State(state): State<AppState>,
    Path((name, index)): Path<(String, usize)>,
    Query(query): Query<InitialGuessQuery>,
) -> Result<Json<LabelResponse>, ApiErrorResponse> {
    let selection = Selection {
        channel: query.channel,
        time: query.time,
        confirm_mosaic: query.confirm_mosaic,
    };
    let defaults = state.config.segmentation;
    let options = SegmentationOptions {
        threshold: query.threshold.or(defaults.threshold),
        max_gap: query.max_gap.unwrap_or(defaults.max_gap),
        region_size: defaults.region_size,
    };

    let lookup = name.clone();
    let response = blocking(move || {
        let projection = state.projection(&lookup, index, selection)?;
        let image = projection.max_projection.to_f64();
        let mask = SegmentationEngine::new(options).run(image.view())?;

        let session = state.session(&lookup, index)?;
        let mut session = lock_session(&session);
        session.replace_with_mask(mask.view())?;
        counter!("labeler_initial_guesses_total").increment(1);
        info!(
            "Initial guess for {} image {}: {} foreground pixels",
            lookup,
            index,
            session.status().foreground_pixels
        );

        Ok(LabelResponse {
            acquisition: lookup,
            image_index: index,
            path: session.path().to_path_buf(),
            status: session.status(),
        })
    })
    .await
    .map_err(|e| log_failure(&format!("Initial guess for {} image {} failed", name, index), e))?;

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct EditQuery {
    pub action: EditAction,
}

/// POST .../label/edit?action=add|remove - Paint a canvas stroke (RGBA PNG body)
async fn edit_label(
    State(state): State<AppState>,
    Path((name, index)): Path<(String, usize)>,
    Query(query): Query<EditQuery>,
    body: Bytes,
) -> Result<Json<LabelResponse>, ApiErrorResponse> {
    let lookup = name.clone();
    let response = blocking(move || {
        let touched = touched_from_png(&body)?;
        let session = state.session(&lookup, index)?;
        let mut session = lock_session(&session);
        session.apply(touched.view(), query.action)?;
        counter!("labeler_label_edits_total").increment(1);

        Ok(LabelResponse {
            acquisition: lookup,
            image_index: index,
            path: session.path().to_path_buf(),
            status: session.status(),
        })
    })
    .await
    .map_err(|e| log_failure(&format!("Edit of {} image {} failed", name, index), e))?;

    Ok(Json(response))
}

/// POST .../label/save - Persist the session label
async fn save_label(
    State(state): State<AppState>,
    Path((name, index)): Path<(String, usize)>,
) -> Result<Json<LabelResponse>, ApiErrorResponse> {
    let lookup = name.clone();
    let response = blocking(move || {
        let session = state.session(&lookup, index)?;
        let mut session = lock_session(&session);
        session.save()?;
        counter!("labeler_label_saves_total").increment(1);

        Ok(LabelResponse {
            acquisition: lookup,
            image_index: index,
            path: session.path().to_path_buf(),
            status: session.status(),
        })
    })
    .await
    .map_err(|e| log_failure(&format!("Save of {} image {} failed", name, index), e))?;

    Ok(Json(response))
}

/// Create the labeling router
pub fn labeler_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/acquisitions", get(list_acquisitions))
        .route("/api/acquisition/:name", get(describe_acquisition))
        .route(
            "/api/acquisition/:name/image/:index/projection",
            get(get_projection),
        )
        .route(
            "/api/acquisition/:name/image/:index/projection.png",
            get(get_projection_png),
        )
        .route(
            "/api/acquisition/:name/image/:index/label.png",
            get(get_label_png),
        )
        .route(
            "/api/acquisition/:name/image/:index/label/initial-guess",
            post(initial_guess),
        )
        .route(
            "/api/acquisition/:name/image/:index/label/edit",
            post(edit_label),
        )
        .route(
            "/api/acquisition/:name/image/:index/label/save",
            post(save_label),
        )
        .layer(DefaultBodyLimit::max(MAX_CANVAS_UPLOAD))
        .with_state(state)
}
