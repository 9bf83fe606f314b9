use letterhead_studio::capture::{
    CapturePhase, CapturePipeline, CaptureStep, ExportKind, SETTLE_FRAMES,
};
use letterhead_studio::document::Document;
use letterhead_studio::error::EditorError;
use letterhead_studio::export::pdf_from_bitmap;
use letterhead_studio::render::render_document;
use letterhead_studio::zoom::{Zoom, PAGE_WIDTH_PX};

fn settle(pipeline: &mut CapturePipeline) -> CaptureStep {
    let mut step = pipeline.advance();
    for _ in 0..SETTLE_FRAMES {
        assert_eq!(step, CaptureStep::Wait);
        step = pipeline.advance();
    }
    step
}

#[test]
fn zoom_is_restored_after_a_simulated_capture_failure() {
    for z0 in [0.2_f32, 0.5, 1.0, 1.3, 2.8] {
        let mut zoom = Zoom::new(z0);
        let mut pipeline = CapturePipeline::new();

        assert!(pipeline.begin(ExportKind::Pdf, &mut zoom));
        assert_eq!(zoom.get(), 1.0, "capture must run at zoom 1");

        let _ = settle(&mut pipeline);
        pipeline.begin_finalize();
        let result = pipeline.finish(
            Err(EditorError::Capture("rasterizer exploded".into())),
            &mut zoom,
        );

        assert!(result.is_err());
        assert_eq!(zoom.get(), z0);
        assert!(!pipeline.is_busy());
    }
}

#[test]
fn concurrent_export_requests_run_exactly_one_capture() {
    let mut zoom = Zoom::new(1.4);
    let mut pipeline = CapturePipeline::new();

    assert!(pipeline.begin(ExportKind::Pdf, &mut zoom));
    // Same-turn second request is a no-op.
    assert!(!pipeline.begin(ExportKind::Pdf, &mut zoom));
    assert!(!pipeline.begin(ExportKind::Clipboard, &mut zoom));

    let step = settle(&mut pipeline);
    assert!(matches!(
        step,
        CaptureStep::Rasterize {
            kind: ExportKind::Pdf,
            ..
        }
    ));
    pipeline.begin_finalize();
    pipeline.finish(Ok(()), &mut zoom).expect("capture");

    // After the sequence finishes a new capture may start.
    assert!(pipeline.begin(ExportKind::Clipboard, &mut zoom));
}

#[test]
fn full_pdf_export_sequence_produces_a_parsable_document() {
    let mut doc = Document::new();
    doc.add_text();
    doc.zoom = Zoom::new(0.7);

    let mut pipeline = CapturePipeline::new();
    assert!(pipeline.begin(ExportKind::Pdf, &mut doc.zoom));
    let step = settle(&mut pipeline);
    let CaptureStep::Rasterize { kind, scale } = step else {
        panic!("expected rasterize step, got {step:?}");
    };
    assert_eq!(kind, ExportKind::Pdf);
    assert_eq!(scale, 4.0);

    // Zoom is pinned to 1.0 while the bitmap is taken, so the supersample
    // factor is the only scale in play.
    assert_eq!(doc.zoom.get(), 1.0);
    let bitmap = render_document(&doc, scale);
    assert_eq!(bitmap.width(), (PAGE_WIDTH_PX * 4.0) as u32);

    pipeline.begin_finalize();
    assert_eq!(pipeline.phase(), CapturePhase::Finalizing);
    let outcome = pdf_from_bitmap(&bitmap)
        .map(|bytes| assert!(bytes.starts_with(b"%PDF-")))
        .map_err(|e| EditorError::Capture(e.to_string()));
    pipeline.finish(outcome, &mut doc.zoom).expect("export");

    assert_eq!(doc.zoom.get(), 0.7);
    assert!(!pipeline.is_busy());
}

#[test]
fn clipboard_capture_uses_the_lower_supersample() {
    let mut zoom = Zoom::new(1.0);
    let mut pipeline = CapturePipeline::new();
    pipeline.begin(ExportKind::Clipboard, &mut zoom);
    let step = settle(&mut pipeline);
    assert_eq!(
        step,
        CaptureStep::Rasterize {
            kind: ExportKind::Clipboard,
            scale: 3.0,
        }
    );
    pipeline.begin_finalize();
    pipeline.finish(Ok(()), &mut zoom).expect("capture");
}

#[test]
fn cancelling_before_rasterize_still_restores_zoom() {
    let mut zoom = Zoom::new(2.1);
    let mut pipeline = CapturePipeline::new();
    pipeline.begin(ExportKind::Pdf, &mut zoom);
    assert_eq!(zoom.get(), 1.0);

    pipeline.cancel(&mut zoom);
    assert_eq!(zoom.get(), 2.1);
    assert!(!pipeline.is_busy());
    assert_eq!(pipeline.phase(), CapturePhase::Idle);
}
