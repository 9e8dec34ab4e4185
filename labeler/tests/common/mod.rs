//! Common Test Utilities for Integration Tests
//!
//! Shared helpers used across integration test modules.

#![allow(dead_code)]

use std::fs::File;
use std::path::Path;

use axum::{Router, body::Body, http::Request, response::Response};
use image_labeler::config::Config;
use image_labeler::server::{AppState, labeler_routes};
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tiff::encoder::{TiffEncoder, colortype};
use tiff::tags::Tag;
use tower::ServiceExt;

/// Seeded random Z-stack of `nz` planes of shape `(h, w)`
pub fn random_stack(seed: u64, nz: usize, h: usize, w: usize) -> Vec<Array2<u16>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..nz)
        .map(|_| Array2::from_shape_fn((h, w), |_| rng.random_range(0..4096u16)))
        .collect()
}

/// Elementwise maximum computed the slow way
pub fn naive_max(slices: &[Array2<u16>]) -> Array2<u16> {
    let mut out = slices[0].clone();
    for slice in &slices[1..] {
        for (o, &v) in out.iter_mut().zip(slice.iter()) {
            if v > *o {
                *o = v;
            }
        }
    }
    out
}

/// Dim background with a bright `size`x`size` square at `(top, left)`
pub fn blob_plane(h: usize, w: usize, top: usize, left: usize, size: usize) -> Array2<u16> {
    Array2::from_shape_fn((h, w), |(r, c)| {
        if (top..top + size).contains(&r) && (left..left + size).contains(&c) {
            1000
        } else {
            10
        }
    })
}

/// Write 16-bit pages to a multi-page TIFF, with an optional ImageJ-style
/// description on the first page
pub fn write_tiff(path: &Path, pages: &[Array2<u16>], description: Option<&str>) {
    let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
    for (i, page) in pages.iter().enumerate() {
        let (h, w) = page.dim();
        let mut image = encoder
            .new_image::<colortype::Gray16>(w as u32, h as u32)
            .unwrap();
        if i == 0
            && let Some(description) = description
        {
            image
                .encoder()
                .write_tag(Tag::ImageDescription, description)
                .unwrap();
        }
        let data: Vec<u16> = page.iter().copied().collect();
        image.write_data(&data).unwrap();
    }
}

/// Application state over scratch image and label directories
pub fn create_test_state(image_dir: &Path, label_dir: &Path) -> AppState {
    let mut config = Config::default();
    config.storage.image_dir = image_dir.to_path_buf();
    config.storage.label_dir = label_dir.to_path_buf();
    AppState::new(config)
}

/// Create a test application router with all routes configured
pub fn create_test_app(image_dir: &Path, label_dir: &Path) -> (Router, AppState) {
    let state = create_test_state(image_dir, label_dir);
    (labeler_routes(state.clone()), state)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

pub async fn post(app: &Router, uri: &str, body: Vec<u8>) -> Response {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::from(body))
            .unwrap(),
    )
    .await
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
