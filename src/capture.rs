use crate::error::{EditorError, EditorResult};
use crate::zoom::Zoom;

/// Supersampling factors for the rasterization step. PDF favors fidelity,
/// clipboard favors speed.
pub const PDF_SUPERSAMPLE: f32 = 4.0;
pub const CLIPBOARD_SUPERSAMPLE: f32 = 3.0;
/// Frames to wait after forcing zoom 1.0 so layout has settled before any
/// pixel is read.
pub const SETTLE_FRAMES: u8 = 2;
/// JPEG quality for the PDF-embedded page image.
pub const PDF_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Pdf,
    Clipboard,
}

impl ExportKind {
    pub fn supersample(self) -> f32 {
        match self {
            ExportKind::Pdf => PDF_SUPERSAMPLE,
            ExportKind::Clipboard => CLIPBOARD_SUPERSAMPLE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Idle,
    Preparing,
    Capturing,
    Finalizing,
    Failed,
}

pub fn can_transition(from: CapturePhase, to: CapturePhase) -> bool {
    matches!(
        (from, to),
        (CapturePhase::Idle, CapturePhase::Preparing)
            | (CapturePhase::Preparing, CapturePhase::Capturing)
            | (CapturePhase::Capturing, CapturePhase::Finalizing)
            | (CapturePhase::Finalizing, CapturePhase::Idle)
            | (CapturePhase::Preparing, CapturePhase::Failed)
            | (CapturePhase::Capturing, CapturePhase::Failed)
            | (CapturePhase::Finalizing, CapturePhase::Failed)
            | (CapturePhase::Failed, CapturePhase::Idle)
    ) || from == to
}

/// What the frame driver should do next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureStep {
    /// Nothing in flight.
    Idle,
    /// Settling; keep repainting, touch nothing.
    Wait,
    /// Layout has settled at zoom 1.0: rasterize now at this scale.
    Rasterize { kind: ExportKind, scale: f32 },
}

/// The capture pipeline.
///
/// Rasterizing a scaled subtree produces wrong text metrics, so the zoom is
/// forced to 1.0 for the duration and restored on every exit path. The busy
/// flag makes the entry points no-ops while a capture is in flight; within
/// the single-threaded frame loop check-and-set is atomic.
#[derive(Debug)]
pub struct CapturePipeline {
    phase: CapturePhase,
    busy: bool,
    kind: Option<ExportKind>,
    saved_zoom: Option<f32>,
    settle_frames: u8,
}

impl Default for CapturePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl CapturePipeline {
    pub fn new() -> Self {
        Self {
            phase: CapturePhase::Idle,
            busy: false,
            kind: None,
            saved_zoom: None,
            settle_frames: 0,
        }
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Start a capture. Returns false (a no-op) while one is in flight.
    /// Records the current zoom and forces 1.0; nothing is rasterized until
    /// the settle countdown has run out.
    pub fn begin(&mut self, kind: ExportKind, zoom: &mut Zoom) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        self.phase = CapturePhase::Preparing;
        self.kind = Some(kind);
        self.saved_zoom = Some(zoom.get());
        self.settle_frames = SETTLE_FRAMES;
        zoom.set(1.0);
        true
    }

    /// Advance one frame. Transitions Preparing to Capturing once the
    /// settle countdown expires.
    pub fn advance(&mut self) -> CaptureStep {
        match self.phase {
            CapturePhase::Idle => CaptureStep::Idle,
            // Failed is observable for one frame, then settles back to Idle.
            CapturePhase::Failed => {
                self.phase = CapturePhase::Idle;
                CaptureStep::Idle
            }
            CapturePhase::Preparing => {
                if self.settle_frames > 0 {
                    self.settle_frames -= 1;
                    return CaptureStep::Wait;
                }
                self.phase = CapturePhase::Capturing;
                let kind = self.kind.expect("capturing without a kind");
                CaptureStep::Rasterize {
                    kind,
                    scale: kind.supersample(),
                }
            }
            // Rasterization and finalization happen inside the same frame
            // that received Rasterize; nothing more to schedule.
            CapturePhase::Capturing | CapturePhase::Finalizing => CaptureStep::Wait,
        }
    }

    /// The bitmap is in hand; encoding/delivery starts.
    pub fn begin_finalize(&mut self) {
        debug_assert!(can_transition(self.phase, CapturePhase::Finalizing));
        self.phase = CapturePhase::Finalizing;
    }

    /// Terminal step for every capture, success or failure: restore the
    /// recorded zoom and clear the busy flag. This is the one cleanup path;
    /// a mid-capture error can never leave the document stuck at zoom 1 or
    /// permanently busy.
    pub fn finish(&mut self, outcome: EditorResult<()>, zoom: &mut Zoom) -> EditorResult<()> {
        if let Some(saved) = self.saved_zoom.take() {
            zoom.set(saved);
        }
        self.phase = if outcome.is_err() {
            CapturePhase::Failed
        } else {
            CapturePhase::Idle
        };
        self.kind = None;
        self.busy = false;
        self.settle_frames = 0;
        outcome
    }

    /// Abort before the rasterize step ran (e.g. the user cancelled the
    /// save dialog). Same cleanup path as [`finish`].
    ///
    /// [`finish`]: CapturePipeline::finish
    pub fn cancel(&mut self, zoom: &mut Zoom) {
        let _ = self.finish(Ok(()), zoom);
    }

    /// Convenience for failures detected by the driver.
    pub fn fail(&mut self, message: impl Into<String>, zoom: &mut Zoom) -> EditorError {
        let err = EditorError::Capture(message.into());
        let _ = self.finish(Err(err.clone()), zoom);
        err
    }
}
