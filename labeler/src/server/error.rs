//! Error mapping for the labeling API

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::acquisition::AcquisitionError;
use crate::label::LabelError;
use crate::projection::{MosaicWarning, ProjectionError};
use crate::segmentation::SegmentationError;

/// Everything a handler can fail with
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Segmentation(#[from] SegmentationError),

    #[error(transparent)]
    Label(#[from] LabelError),

    #[error("Image {} is a mosaic of {} tiles; confirm to process tile 0", .0.image_index, .0.tiles)]
    MosaicConfirmationRequired(MosaicWarning),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response for the labeling API
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: String,
    pub code: String,
    /// Present on `mosaic_confirmation_required`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mosaic: Option<MosaicWarning>,
}

fn acquisition_code(e: &AcquisitionError) -> &'static str {
    match e {
        AcquisitionError::NotFound(_) => "not_found",
        AcquisitionError::OutOfRange(_) => "out_of_range",
        AcquisitionError::Format(_) => "format_error",
        AcquisitionError::IoError(_) => "io_error",
    }
}

impl From<ApiError> for ApiErrorResponse {
    fn from(e: ApiError) -> Self {
        let code = match &e {
            ApiError::Acquisition(inner) => acquisition_code(inner),
            ApiError::Projection(inner) => match inner {
                ProjectionError::OutOfRange(_) => "out_of_range",
                ProjectionError::Cancelled { .. } => "cancelled",
                ProjectionError::EmptyStack { .. } => "empty_stack",
                ProjectionError::Acquisition(inner) => acquisition_code(inner),
            },
            ApiError::Segmentation(SegmentationError::NoRegionsFound { .. }) => "no_regions_found",
            ApiError::Label(inner) => match inner {
                LabelError::NotFound(_) => "not_found",
                LabelError::FormatError(_) => "format_error",
                LabelError::ShapeMismatch { .. } => "shape_mismatch",
                LabelError::IoError(_) => "io_error",
            },
            ApiError::MosaicConfirmationRequired(_) => "mosaic_confirmation_required",
            ApiError::Internal(_) => "internal_error",
        };
        let error = e.to_string();
        let mosaic = match e {
            ApiError::MosaicConfirmationRequired(warning) => Some(warning),
            _ => None,
        };
        Self {
            error,
            code: code.to_string(),
            mosaic,
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "out_of_range" | "cancelled" | "shape_mismatch" => StatusCode::BAD_REQUEST,
            "mosaic_confirmation_required" => StatusCode::CONFLICT,
            "no_regions_found" => StatusCode::UNPROCESSABLE_ENTITY,
            "format_error" => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        ApiErrorResponse::from(self).into_response()
    }
}
