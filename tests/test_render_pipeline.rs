//! Integration tests for the render pipeline
//!
//! Surface sizing, letterboxing, scene order and ROI capture through the
//! `RenderPipeline` facade, checked on a recording canvas.

mod common;

use std::sync::Arc;

use common::test_frames::{SENSOR, png};
use console_geometry::{Box2D, Point2D, Roi};
use edge_console::processing::drawing::ROI_COLOR;
use edge_console::processing::{
    Canvas, CommandRecorder, ControlMode, DrawCommand, DrawingElement, Padding, RasterCanvas, RawDrawing,
    RenderPipeline, preprocess,
};
use image::{Rgba, RgbaImage};

fn image_drawing(width: u32, height: u32) -> RawDrawing {
    RawDrawing::new(vec![DrawingElement::NativeImage(Arc::new(RgbaImage::from_pixel(
        width,
        height,
        Rgba([90, 90, 90, 255]),
    )))])
}

#[test]
fn test_wide_image_is_letterboxed() {
    let drawing = preprocess(image_drawing(1600, 400), Point2D::new(800.0, 600.0)).unwrap();
    assert_eq!(drawing.scale, 800.0 / 1600.0);
    assert!(drawing.boundary.min.y > 0.0);
    assert_eq!(drawing.boundary.min, Point2D::new(0.0, 200.0));
    assert_eq!(drawing.boundary.max, Point2D::new(800.0, 400.0));
}

#[test]
fn test_encoded_image_in_pipeline() {
    let raw = RawDrawing::new(vec![DrawingElement::Image(Arc::new(png(64, 48, [1, 2, 3, 255])))]);
    let mut pipeline = RenderPipeline::new(CommandRecorder::new(640, 480), Padding::default());
    pipeline.set_drawing(Some(raw)).unwrap();

    let drawing = pipeline.drawing().unwrap();
    assert_eq!(drawing.scale, 10.0);
    assert!(matches!(
        pipeline.canvas().commands()[1],
        DrawCommand::Image { size: (64, 48), .. }
    ));
}

#[test]
fn test_layout_resizes_only_on_change() {
    let mut pipeline = RenderPipeline::new(CommandRecorder::new(800, 600), Padding::uniform(8));
    pipeline.set_drawing(Some(image_drawing(1600, 400))).unwrap();

    assert!(!pipeline.layout(816, 616).unwrap());
    assert_eq!(pipeline.surface_size(), (800, 600));

    assert!(pipeline.layout(416, 616).unwrap());
    assert_eq!(pipeline.canvas().size(), (400, 600));
    // The drawing is placed again for the new surface
    assert_eq!(pipeline.drawing().unwrap().scale, 0.25);
}

#[test]
fn test_capture_emits_normalized_selection() {
    let mut pipeline = RenderPipeline::new(CommandRecorder::new(800, 600), Padding::default());
    pipeline.set_drawing(Some(image_drawing(1600, 400))).unwrap();

    // Render mode ignores the pointer
    assert!(!pipeline.pointer_down(Point2D::new(100.0, 300.0)));

    pipeline.set_mode(ControlMode::Capture).unwrap();
    assert!(pipeline.pointer_down(Point2D::new(200.0, 250.0)));
    pipeline.pointer_move(Point2D::new(600.0, 350.0)).unwrap();

    // Candidate drawn as the ROI overlay: box plus four handles
    let strokes: Vec<_> = pipeline
        .canvas()
        .commands()
        .iter()
        .filter(|command| matches!(command, DrawCommand::StrokeRect { color, .. } if *color == ROI_COLOR))
        .collect();
    assert_eq!(strokes.len(), 5);
    assert!(matches!(
        strokes[0],
        DrawCommand::StrokeRect { rect, .. }
            if *rect == Box2D::new(Point2D::new(200.0, 250.0), Point2D::new(600.0, 350.0))
    ));

    let selection = pipeline.pointer_up(Point2D::new(600.0, 350.0)).unwrap().unwrap();
    assert_eq!(selection, Box2D::new(Point2D::new(0.25, 0.25), Point2D::new(0.75, 0.75)));

    let roi = Roi::from_normalized(&selection, SENSOR);
    assert_eq!(roi, Roi::new(Point2D::new(1014.0, 760.0), Point2D::new(2028.0, 1520.0)));
    let back = roi.to_normalized(SENSOR);
    assert!((back.min.x - selection.min.x).abs() < 1e-3);
    assert!((back.max.y - selection.max.y).abs() < 1e-3);
}

#[test]
fn test_drag_outside_is_clamped_to_image() {
    let mut pipeline = RenderPipeline::new(CommandRecorder::new(800, 600), Padding::default());
    pipeline.set_drawing(Some(image_drawing(1600, 400))).unwrap();
    pipeline.set_mode(ControlMode::Capture).unwrap();

    assert!(pipeline.pointer_down(Point2D::new(400.0, 300.0)));
    let selection = pipeline.pointer_up(Point2D::new(1000.0, 0.0)).unwrap().unwrap();
    assert_eq!(selection, Box2D::new(Point2D::new(0.5, 0.0), Point2D::new(1.0, 0.5)));
}

#[test]
fn test_mode_change_discards_candidate() {
    let mut pipeline = RenderPipeline::new(CommandRecorder::new(800, 600), Padding::default());
    pipeline.set_drawing(Some(image_drawing(1600, 400))).unwrap();
    pipeline.set_mode(ControlMode::Capture).unwrap();
    pipeline.pointer_down(Point2D::new(200.0, 250.0));
    pipeline.pointer_move(Point2D::new(300.0, 300.0)).unwrap();
    assert_eq!(pipeline.canvas().stroke_count(), 5);

    pipeline.set_mode(ControlMode::Render).unwrap();
    assert!(!pipeline.controls().is_capturing());
    assert_eq!(pipeline.canvas().stroke_count(), 0);
    assert_eq!(pipeline.pointer_up(Point2D::new(300.0, 300.0)).unwrap(), None);
}

#[test]
fn test_blank_drawing_clears_surface() {
    let mut pipeline = RenderPipeline::new(RasterCanvas::new(100, 100), Padding::default());
    pipeline.set_drawing(Some(image_drawing(10, 10))).unwrap();
    assert_eq!(pipeline.canvas().raster().get_pixel(50, 50).0, [90, 90, 90, 255]);

    pipeline.set_drawing(None).unwrap();
    assert!(pipeline.drawing().is_none());
    assert_eq!(pipeline.canvas().raster().get_pixel(50, 50).0, [0, 0, 0, 255]);
}

#[test]
fn test_sliver_image_renders_without_error() {
    // 100x1 on a 10x10 surface places to a 10x0.1 box
    let mut pipeline = RenderPipeline::new(RasterCanvas::new(10, 10), Padding::default());
    pipeline.set_drawing(Some(image_drawing(100, 1))).unwrap();

    assert_eq!(pipeline.drawing().unwrap().scale, 0.1);
    assert_eq!(pipeline.canvas().raster().get_pixel(5, 0).0, [0, 0, 0, 255]);

    // The next normal frame still renders
    pipeline.set_drawing(Some(image_drawing(10, 10))).unwrap();
    assert_eq!(pipeline.canvas().raster().get_pixel(5, 5).0, [90, 90, 90, 255]);
}
