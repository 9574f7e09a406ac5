//! Progress-callback trait for per-stage conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConverterConfigBuilder::progress_callback`] to observe a
//! request as it moves through `classify → extract → structure → persist`.
//! OCR of a long scan can take minutes, so a terminal spinner or a status
//! endpoint wants to know which stage a request is sitting in.
//!
//! # Example
//!
//! ```rust
//! use ocr_pdf2md::{ConversionProgressCallback, ConverterConfig, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct StageCounter {
//!     finished: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for StageCounter {
//!     fn on_stage_complete(&self, stage: Stage) {
//!         self.finished.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{stage} done");
//!     }
//! }
//!
//! let counter = Arc::new(StageCounter { finished: AtomicUsize::new(0) });
//! let config = ConverterConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ConversionResult;
use crate::pipeline::Stage;
use std::path::Path;
use std::sync::Arc;

/// Called by the converter as a request moves through its stages.
///
/// Independent requests may run concurrently on one converter, so
/// implementations must be `Send + Sync` and protect shared state
/// themselves. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, after validation, before the first stage.
    fn on_conversion_start(&self, source: &Path) {
        let _ = source;
    }

    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes without error.
    fn on_stage_complete(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage fails. No further stages run for this request.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once with the terminal result, success or error.
    fn on_conversion_complete(&self, result: &ConversionResult) {
        let _ = result;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConverterConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ConversionProgressCallback for Recorder {
        fn on_stage_start(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("start:{stage}"));
        }

        fn on_stage_error(&self, stage: Stage, error: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("error:{stage}:{error}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(Path::new("a.pdf"));
        cb.on_stage_start(Stage::Classify);
        cb.on_stage_complete(Stage::Classify);
        cb.on_stage_error(Stage::Extract, "boom");
        cb.on_conversion_complete(&ConversionResult::failure("boom", None));
    }

    #[test]
    fn recorder_sees_overridden_events_only() {
        let rec = Recorder::default();
        rec.on_stage_start(Stage::Extract);
        rec.on_stage_complete(Stage::Extract);
        rec.on_stage_error(Stage::Persist, "read-only");
        let events = rec.events.lock().unwrap();
        assert_eq!(
            *events,
            vec!["start:extract".to_string(), "error:persist:read-only".to_string()]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage_start(Stage::Structure);
    }
}
