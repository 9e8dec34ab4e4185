//! Integration tests for the image labeler
//!
//! Covers projection over in-memory and TIFF acquisitions, and the full
//! labeling workflow through the HTTP router.

mod common;

use axum::http::StatusCode;
use common::*;
use image::{ImageFormat, Rgba, RgbaImage};
use image_labeler::acquisition::{
    AcquisitionError, AcquisitionReader, InMemoryAcquisition, InMemoryImage, IndexAxis, Plane,
    TiffAcquisition,
};
use image_labeler::label::{decode_label_png, load_label};
use image_labeler::projection::{
    MosaicPolicy, ProjectionEngine, ProjectionError, ProjectionOutcome, ProjectionRequest,
};
use image_labeler::segmentation::initial_guess;
use ndarray::Array2;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

fn u16_planes(slices: &[Array2<u16>]) -> Vec<Plane> {
    slices.iter().cloned().map(Plane::U16).collect()
}

fn canvas_png(width: u32, height: u32, strokes: &[(u32, u32)]) -> Vec<u8> {
    let mut canvas = RgbaImage::new(width, height);
    for &(x, y) in strokes {
        canvas.put_pixel(x, y, Rgba([0, 0, 255, 255]));
    }
    let mut bytes = Vec::new();
    canvas
        .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

// ============================================================================
// Projection
// ============================================================================

mod projection_tests {
    use super::*;

    #[test]
    fn test_projection_is_elementwise_max_in_any_order() {
        let slices = random_stack(7, 9, 12, 17);
        let expected = naive_max(&slices);

        let mut shuffled = slices.clone();
        shuffled.shuffle(&mut ChaCha8Rng::seed_from_u64(99));

        for stack in [slices, shuffled] {
            let acquisition = InMemoryAcquisition::new(vec![
                InMemoryImage::from_stack("stack", u16_planes(&stack)).unwrap(),
            ]);
            let projection = ProjectionEngine::new(&acquisition)
                .project(&ProjectionRequest::new(0))
                .unwrap()
                .complete()
                .unwrap();

            assert_eq!(projection.max_projection, Plane::U16(expected.clone()));
            assert_eq!(projection.metadata.num_slices, 9);
            assert_eq!(projection.metadata.shape, (12, 17));
        }
    }

    #[test]
    fn test_projection_bounds() {
        // 2 channels x 3 time points x 2 slices
        let planes = u16_planes(&random_stack(3, 12, 4, 4));
        let acquisition = InMemoryAcquisition::new(vec![
            InMemoryImage::from_planes("hyper", 2, 3, planes).unwrap(),
        ]);
        let engine = ProjectionEngine::new(&acquisition);

        assert!(engine.project(&ProjectionRequest::new(0).with_channel(1)).is_ok());
        assert!(engine.project(&ProjectionRequest::new(0).with_time(2)).is_ok());

        let cases = [
            (ProjectionRequest::new(1), IndexAxis::Image, 1),
            (ProjectionRequest::new(0).with_channel(2), IndexAxis::Channel, 2),
            (ProjectionRequest::new(0).with_time(3), IndexAxis::Time, 3),
        ];
        for (request, axis, value) in cases {
            match engine.project(&request) {
                Err(ProjectionError::OutOfRange(range)) => {
                    assert_eq!(range.axis, axis);
                    assert_eq!(range.value, value);
                }
                other => panic!("expected OutOfRange for {:?}, got {:?}", request, other),
            }
        }
    }

    #[test]
    fn test_channel_and_time_select_their_own_stack() {
        // Plane value encodes (t, c, z) so the max identifies the stack
        let mut planes = Vec::new();
        for t in 0..2u16 {
            for c in 0..2u16 {
                for z in 0..3u16 {
                    planes.push(Plane::U16(Array2::from_elem((2, 2), t * 100 + c * 10 + z)));
                }
            }
        }
        let acquisition =
            InMemoryAcquisition::new(vec![InMemoryImage::from_planes("tc", 2, 2, planes).unwrap()]);
        let engine = ProjectionEngine::new(&acquisition);

        let projection = engine
            .project(&ProjectionRequest::new(0).with_channel(1).with_time(1))
            .unwrap()
            .complete()
            .unwrap();
        assert_eq!(projection.max_projection, Plane::U16(Array2::from_elem((2, 2), 112)));
        assert_eq!(projection.middle_slice, Plane::U16(Array2::from_elem((2, 2), 111)));
    }

    #[test]
    fn test_tiff_hyperstack_projection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hyper.tif");

        // Page order: z-major, channel-minor
        let pages = random_stack(11, 6, 5, 7);
        write_tiff(&path, &pages, Some("ImageJ=1.54f\nchannels=2\nslices=3\n"));

        let acquisition = TiffAcquisition::open(&path).unwrap();
        let info = acquisition.image_info(0).unwrap();
        assert_eq!((info.dims.c, info.dims.z, info.dims.t), (2, 3, 1));
        assert_eq!(info.bit_depth, 16);
        assert_eq!(info.name, "hyper");

        let channel_1: Vec<_> = pages.iter().skip(1).step_by(2).cloned().collect();
        let projection = ProjectionEngine::new(&acquisition)
            .project(&ProjectionRequest::new(0).with_channel(1))
            .unwrap()
            .complete()
            .unwrap();
        assert_eq!(projection.max_projection, Plane::U16(naive_max(&channel_1)));
    }

    #[test]
    fn test_tiff_time_points_follow_page_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timelapse.tif");

        // Pages run time, then z, then channel; values encode (t, z, c)
        let mut pages = Vec::new();
        for t in 0..2u16 {
            for z in 0..3u16 {
                for c in 0..2u16 {
                    pages.push(Array2::from_elem((3, 4), t * 100 + z * 10 + c));
                }
            }
        }
        write_tiff(
            &path,
            &pages,
            Some("ImageJ=1.54f\nimages=12\nchannels=2\nslices=3\nframes=2\nhyperstack=true\n"),
        );

        let acquisition = TiffAcquisition::open(&path).unwrap();
        let info = acquisition.image_info(0).unwrap();
        assert_eq!((info.dims.c, info.dims.z, info.dims.t), (2, 3, 2));

        let engine = ProjectionEngine::new(&acquisition);
        let projection = engine
            .project(&ProjectionRequest::new(0).with_channel(1).with_time(1))
            .unwrap()
            .complete()
            .unwrap();
        assert_eq!(projection.max_projection, Plane::U16(Array2::from_elem((3, 4), 121)));
        assert_eq!(projection.middle_slice, Plane::U16(Array2::from_elem((3, 4), 111)));

        let first = engine
            .project(&ProjectionRequest::new(0))
            .unwrap()
            .complete()
            .unwrap();
        assert_eq!(first.max_projection, Plane::U16(Array2::from_elem((3, 4), 20)));
    }

    #[test]
    fn test_tiff_oversized_layout_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.tif");
        write_tiff(
            &path,
            &[Array2::from_elem((2, 2), 7u16)],
            Some("channels=4294967296\nframes=4294967296\nslices=1\n"),
        );

        assert!(matches!(
            TiffAcquisition::open(&path),
            Err(AcquisitionError::Format(_))
        ));
    }

    #[test]
    fn test_tiff_mosaic_needs_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tilescan.tif");
        write_tiff(&path, &random_stack(5, 4, 3, 3), Some("tiles=2\n"));

        let acquisition = TiffAcquisition::open(&path).unwrap();
        let engine = ProjectionEngine::new(&acquisition);

        match engine.project(&ProjectionRequest::new(0)).unwrap() {
            ProjectionOutcome::NeedsConfirmation(pending) => {
                assert_eq!(pending.warning().tiles, 2);
                assert!(matches!(
                    pending.resolve(&engine, false),
                    Err(ProjectionError::Cancelled { image_index: 0 })
                ));
            }
            ProjectionOutcome::Complete(_) => panic!("mosaic projected without confirmation"),
        }

        let projection = engine
            .project(&ProjectionRequest::new(0).with_mosaic(MosaicPolicy::Proceed))
            .unwrap()
            .complete()
            .unwrap();
        assert_eq!(projection.metadata.num_slices, 2);
        assert!(projection.metadata.is_mosaic);
    }

    #[test]
    fn test_tiff_directory_acquisition() {
        let dir = tempfile::tempdir().unwrap();
        write_tiff(&dir.path().join("a_tile.tif"), &random_stack(1, 2, 3, 3), None);
        write_tiff(&dir.path().join("b_Merged.tif"), &random_stack(2, 3, 3, 3), None);

        let acquisition = TiffAcquisition::open(dir.path()).unwrap();
        assert_eq!(acquisition.image_count(), 2);
        assert_eq!(acquisition.image_info(1).unwrap().name, "b_Merged");
        assert_eq!(acquisition.image_info(1).unwrap().dims.z, 3);
        assert!(matches!(
            acquisition.image_info(2),
            Err(AcquisitionError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_projection_feeds_initial_guess() {
        let slices = vec![
            blob_plane(16, 16, 2, 2, 3),
            blob_plane(16, 16, 9, 9, 5),
            Array2::from_elem((16, 16), 10),
        ];
        let acquisition = InMemoryAcquisition::new(vec![
            InMemoryImage::from_stack("blobs", u16_planes(&slices)).unwrap(),
        ]);
        let projection = ProjectionEngine::new(&acquisition)
            .project(&ProjectionRequest::new(0))
            .unwrap()
            .complete()
            .unwrap();

        let mask = initial_guess(projection.max_projection.to_f64().view(), None, 0).unwrap();
        assert!(mask[[11, 11]]);
        assert!(!mask[[3, 3]]);
        assert_eq!(mask.iter().filter(|&&v| v).count(), 25);
    }
}

// ============================================================================
// HTTP workflow
// ============================================================================

mod api_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let images = tempfile::tempdir().unwrap();
        let labels = tempfile::tempdir().unwrap();
        let (app, _) = create_test_app(images.path(), labels.path());

        let response = get(&app, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert!(json["version"].is_string());
    }

    #[tokio::test]
    async fn test_list_and_describe_acquisitions() {
        let images = tempfile::tempdir().unwrap();
        let labels = tempfile::tempdir().unwrap();
        write_tiff(&images.path().join("embryo.tif"), &random_stack(1, 3, 4, 4), None);
        std::fs::write(images.path().join("readme.txt"), b"ignored").unwrap();
        let (app, _) = create_test_app(images.path(), labels.path());

        let json = body_json(get(&app, "/api/acquisitions").await).await;
        let names: Vec<_> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["embryo"]);

        let response = get(&app, "/api/acquisition/embryo").await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["images"][0]["dims"]["z"], 3);
        assert_eq!(json["images"][0]["is_mosaic"], false);

        let response = get(&app, "/api/acquisition/missing").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "not_found");
    }

    #[tokio::test]
    async fn test_projection_endpoints() {
        let images = tempfile::tempdir().unwrap();
        let labels = tempfile::tempdir().unwrap();
        let slices = vec![blob_plane(8, 10, 1, 1, 3), blob_plane(8, 10, 4, 5, 3)];
        write_tiff(&images.path().join("cells.tif"), &slices, None);
        let (app, state) = create_test_app(images.path(), labels.path());

        let response = get(&app, "/api/acquisition/cells/image/0/projection").await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["metadata"]["num_slices"], 2);
        assert_eq!(json["metadata"]["intensity_max"], 1000.0);
        assert_eq!(json["metadata"]["shape"], serde_json::json!([8, 10]));

        // Second request is served from the cache
        let response = get(&app, "/api/acquisition/cells/image/0/projection").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.projections.stats().hits, 1);

        let response = get(&app, "/api/acquisition/cells/image/0/projection.png").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "image/png");
        let preview = image::load_from_memory_with_format(&body_bytes(response).await, ImageFormat::Png)
            .unwrap()
            .to_rgb8();
        assert_eq!(preview.dimensions(), (10, 8));
        assert_eq!(preview.get_pixel(2, 2).0, [255, 0, 0]);
        assert_eq!(preview.get_pixel(9, 0).0, [0, 0, 0]);

        let response = get(&app, "/api/acquisition/cells/image/0/projection?channel=1").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "out_of_range");

        let response = get(&app, "/api/acquisition/cells/image/3/projection").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_mosaic_confirmation_flow() {
        let images = tempfile::tempdir().unwrap();
        let labels = tempfile::tempdir().unwrap();
        write_tiff(
            &images.path().join("tilescan.tif"),
            &random_stack(4, 6, 4, 4),
            Some("tiles=3\n"),
        );
        let (app, _) = create_test_app(images.path(), labels.path());
        let base = "/api/acquisition/tilescan/image/0/projection";

        let response = get(&app, base).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["code"], "mosaic_confirmation_required");
        assert_eq!(json["mosaic"]["tiles"], 3);

        let response = get(&app, &format!("{}?confirm_mosaic=false", base)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "cancelled");

        let response = get(&app, &format!("{}?confirm_mosaic=true", base)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["metadata"]["num_slices"], 2);

        // A cached mosaic still asks without confirmation
        let response = get(&app, base).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_labeling_workflow() {
        let images = tempfile::tempdir().unwrap();
        let labels = tempfile::tempdir().unwrap();
        let slices = vec![blob_plane(12, 12, 2, 2, 4), Array2::from_elem((12, 12), 10)];
        write_tiff(&images.path().join("embryo.tif"), &slices, None);
        let (app, _) = create_test_app(images.path(), labels.path());
        let base = "/api/acquisition/embryo/image/0";

        // Never-labeled image starts blank
        let response = get(&app, &format!("{}/label.png", base)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-label-revision"], "0");
        let label = decode_label_png(&body_bytes(response).await).unwrap();
        assert_eq!(label.dim(), (12, 12));
        assert!(label.iter().all(|&v| v == 0));

        let response = post(&app, &format!("{}/label/initial-guess?max_gap=0", base), vec![]).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["foreground_pixels"], 16);
        assert_eq!(json["revision"], 1);
        assert_eq!(json["dirty"], true);

        // Paint one extra pixel, then erase a block pixel
        let add = canvas_png(12, 12, &[(11, 11)]);
        let response = post(&app, &format!("{}/label/edit?action=add", base), add).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["foreground_pixels"], 17);

        let remove = canvas_png(12, 12, &[(2, 2)]);
        let response = post(&app, &format!("{}/label/edit?action=remove", base), remove).await;
        assert_eq!(body_json(response).await["foreground_pixels"], 16);

        let response = post(&app, &format!("{}/label/save", base), vec![]).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["dirty"], false);

        let saved = load_label(&labels.path().join("embryo_image0.png")).unwrap();
        assert_eq!(saved[[11, 11]], 1);
        assert_eq!(saved[[2, 2]], 0);
        assert_eq!(saved[[3, 3]], 1);
        assert_eq!(saved.iter().filter(|&&v| v == 1).count(), 16);
    }

    #[tokio::test]
    async fn test_saved_label_is_reloaded_by_new_server() {
        let images = tempfile::tempdir().unwrap();
        let labels = tempfile::tempdir().unwrap();
        write_tiff(
            &images.path().join("embryo.tif"),
            &[blob_plane(6, 6, 1, 1, 2)],
            None,
        );
        let base = "/api/acquisition/embryo/image/0";

        let (app, _) = create_test_app(images.path(), labels.path());
        post(&app, &format!("{}/label/initial-guess?max_gap=0", base), vec![]).await;
        post(&app, &format!("{}/label/save", base), vec![]).await;

        let (fresh, _) = create_test_app(images.path(), labels.path());
        let label = decode_label_png(&body_bytes(get(&fresh, &format!("{}/label.png", base)).await).await)
            .unwrap();
        assert_eq!(label.iter().filter(|&&v| v == 1).count(), 4);
    }

    #[tokio::test]
    async fn test_no_regions_keeps_label() {
        let images = tempfile::tempdir().unwrap();
        let labels = tempfile::tempdir().unwrap();
        write_tiff(
            &images.path().join("dark.tif"),
            &[Array2::from_elem((5, 5), 50u16)],
            None,
        );
        let (app, _) = create_test_app(images.path(), labels.path());
        let base = "/api/acquisition/dark/image/0";

        let response = post(&app, &format!("{}/label/initial-guess", base), vec![]).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["code"], "no_regions_found");

        let response = get(&app, &format!("{}/label.png", base)).await;
        assert_eq!(response.headers()["x-label-revision"], "0");

        // An explicit threshold below the data finds the whole frame
        let response = post(&app, &format!("{}/label/initial-guess?threshold=20", base), vec![]).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["foreground_pixels"], 25);
    }

    #[tokio::test]
    async fn test_bad_canvas_uploads() {
        let images = tempfile::tempdir().unwrap();
        let labels = tempfile::tempdir().unwrap();
        write_tiff(
            &images.path().join("embryo.tif"),
            &[Array2::from_elem((4, 4), 0u16)],
            None,
        );
        let (app, _) = create_test_app(images.path(), labels.path());
        let base = "/api/acquisition/embryo/image/0/label/edit";

        let response = post(&app, &format!("{}?action=add", base), b"garbage".to_vec()).await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body_json(response).await["code"], "format_error");

        let response = post(&app, &format!("{}?action=add", base), canvas_png(5, 4, &[(0, 0)])).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "shape_mismatch");

        let response = post(&app, &format!("{}?action=smudge", base), canvas_png(4, 4, &[])).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
