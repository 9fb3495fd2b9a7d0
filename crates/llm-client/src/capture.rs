//! Sentinel capture over a kernel's stdout stream.
//!
//! The kernel-proxy snippet prints the model reply between
//! [`RESPONSE_START`] and [`RESPONSE_END`], or a single [`RESPONSE_ERROR`]
//! line on failure. Output fragments arrive in order but with arbitrary
//! boundaries, so capture is an explicit two-state machine.
//!
//! Known limitations: a reply that itself contains one of the sentinel
//! strings is mis-captured, and text following the start sentinel in the
//! same fragment (when the end sentinel is not also in it) is dropped.

use log::debug;

pub const RESPONSE_START: &str = "LLM_RESPONSE_START";
pub const RESPONSE_END: &str = "LLM_RESPONSE_END";
pub const RESPONSE_ERROR: &str = "LLM_ERROR:";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CaptureState {
    #[default]
    Idle,
    Capturing { buffer: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Trimmed reply text between the sentinels.
    Completed(String),
    /// Message printed after the error sentinel, trimmed.
    Failed(String),
}

#[derive(Debug, Default)]
pub struct OutputCapture {
    state: CaptureState,
}

impl OutputCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.state, CaptureState::Capturing { .. })
    }

    pub fn reset(&mut self) {
        self.state = CaptureState::Idle;
    }

    /// Advance the state machine with one stdout fragment.
    pub fn feed(&mut self, fragment: &str) -> Option<CaptureOutcome> {
        if let Some(pos) = fragment.find(RESPONSE_ERROR) {
            let message = fragment[pos + RESPONSE_ERROR.len()..].trim().to_string();
            debug!("[llm-client] capture: error sentinel, back to idle");
            self.state = CaptureState::Idle;
            return Some(CaptureOutcome::Failed(message));
        }

        match &mut self.state {
            CaptureState::Idle => {
                let start = fragment.find(RESPONSE_START)?;
                let after_start = &fragment[start + RESPONSE_START.len()..];
                match after_start.find(RESPONSE_END) {
                    Some(end) => {
                        debug!("[llm-client] capture: complete reply in one fragment");
                        Some(CaptureOutcome::Completed(
                            after_start[..end].trim().to_string(),
                        ))
                    }
                    None => {
                        debug!("[llm-client] capture: start sentinel, capturing");
                        self.state = CaptureState::Capturing {
                            buffer: String::new(),
                        };
                        None
                    }
                }
            }
            CaptureState::Capturing { buffer } => match fragment.find(RESPONSE_END) {
                Some(end) => {
                    buffer.push_str(&fragment[..end]);
                    let text = buffer.trim().to_string();
                    debug!("[llm-client] capture: end sentinel, back to idle");
                    self.state = CaptureState::Idle;
                    Some(CaptureOutcome::Completed(text))
                }
                None => {
                    buffer.push_str(fragment);
                    None
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_fragment_capture() {
        let mut capture = OutputCapture::new();
        let outcome = capture.feed("LLM_RESPONSE_START\nHi there\nLLM_RESPONSE_END\n");
        assert_eq!(outcome, Some(CaptureOutcome::Completed("Hi there".into())));
        assert_eq!(capture.state(), &CaptureState::Idle);
    }

    #[test]
    fn test_split_capture() {
        let mut capture = OutputCapture::new();
        assert_eq!(capture.feed("LLM_RESPONSE_START"), None);
        assert!(capture.is_capturing());
        assert_eq!(capture.feed("Hi "), None);
        assert_eq!(
            capture.feed("there\nLLM_RESPONSE_END"),
            Some(CaptureOutcome::Completed("Hi there".into()))
        );
        assert!(!capture.is_capturing());
    }

    #[test]
    fn test_text_after_start_in_same_fragment_is_dropped() {
        let mut capture = OutputCapture::new();
        assert_eq!(capture.feed("LLM_RESPONSE_START\nlost "), None);
        assert_eq!(
            capture.feed("kept\nLLM_RESPONSE_END\n"),
            Some(CaptureOutcome::Completed("kept".into()))
        );
    }

    #[test]
    fn test_error_sentinel_from_idle() {
        let mut capture = OutputCapture::new();
        assert_eq!(
            capture.feed("LLM_ERROR: HTTP Error 404: Not Found\n"),
            Some(CaptureOutcome::Failed("HTTP Error 404: Not Found".into()))
        );
    }

    #[test]
    fn test_error_sentinel_abandons_capture() {
        let mut capture = OutputCapture::new();
        capture.feed("LLM_RESPONSE_START\n");
        capture.feed("partial");
        assert_eq!(
            capture.feed("LLM_ERROR: timed out"),
            Some(CaptureOutcome::Failed("timed out".into()))
        );
        assert_eq!(capture.state(), &CaptureState::Idle);
        // A stray end sentinel after the error is ignored.
        assert_eq!(capture.feed("LLM_RESPONSE_END"), None);
    }

    #[test]
    fn test_unrelated_output_is_ignored_while_idle() {
        let mut capture = OutputCapture::new();
        assert_eq!(capture.feed("warming up...\n"), None);
        assert_eq!(capture.feed("LLM_RESPONSE_END\n"), None);
        assert_eq!(capture.state(), &CaptureState::Idle);
    }

    #[test]
    fn test_reset_discards_accumulator() {
        let mut capture = OutputCapture::new();
        capture.feed("LLM_RESPONSE_START");
        capture.feed("stale");
        capture.reset();
        assert_eq!(capture.state(), &CaptureState::Idle);
    }
}
