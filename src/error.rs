/// Failure taxonomy for the editor core.
///
/// Everything here is recoverable: the session keeps running and the user is
/// told what happened through a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    /// An image source failed to load or has not finished decoding. The
    /// pixel processor skips its run and the previous output is retained.
    Decode(String),
    /// A crop or margin value was outside its accepted range. The input is
    /// rejected and the prior value kept.
    InputValidation(String),
    /// Rasterization failed mid-capture. Zoom and busy state are restored
    /// unconditionally by the pipeline.
    Capture(String),
    /// The system clipboard refused the image payload. Reported separately
    /// from capture failures; the PDF path is unaffected.
    ClipboardUnavailable(String),
}

impl std::fmt::Display for EditorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditorError::Decode(msg) => write!(f, "image decode failed: {msg}"),
            EditorError::InputValidation(msg) => write!(f, "invalid input: {msg}"),
            EditorError::Capture(msg) => write!(f, "capture failed: {msg}"),
            EditorError::ClipboardUnavailable(msg) => {
                write!(f, "clipboard unavailable: {msg}")
            }
        }
    }
}

impl std::error::Error for EditorError {}

pub type EditorResult<T> = Result<T, EditorError>;

#[cfg(test)]
mod tests {
    use super::EditorError;

    #[test]
    fn clipboard_failures_are_distinguishable_from_capture_failures() {
        let clipboard = EditorError::ClipboardUnavailable("denied".into());
        let capture = EditorError::Capture("render".into());
        assert_ne!(clipboard, capture);
        assert!(clipboard.to_string().contains("clipboard"));
        assert!(capture.to_string().contains("capture"));
    }
}
