//! HTTP labeling server
//!
//! This module provides:
//! - `AppState` holding the catalog, label store, projection cache and sessions
//! - `labeler_routes` wiring the labeling API
//! - `ApiError` / `ApiErrorResponse` for the `{ error, code }` error shape
//! - PNG rendering of projections for the canvas background

mod error;
mod render;
pub mod routes;
mod state;

pub use error::{ApiError, ApiErrorResponse};
pub use render::{render_red_png, stretch_to_u8};
pub use routes::labeler_routes;
pub use state::{AppState, Selection, SessionKey, lock_session};
