//! Pipeline stages for PDF-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step, and the
//! external engines (pdfium, ocrmypdf) sit behind traits so every stage can
//! be tested without them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ classify ──▶ extract ──▶ structure ──▶ persist
//! (path)    (page 1)     (pdf/ocr)   (headings)    (.md + registry)
//! ```
//!
//! 1. [`input`]: validate the path (`.pdf`, exists, readable, `%PDF`)
//!    before anything runs
//! 2. [`classify`]: scanned if page 1 has no text layer
//! 3. [`extract`]: layout text plus inlined [`tables`]; scanned inputs go
//!    through [`ocr`] into a per-request temp artifact first
//! 4. [`structure`]: deterministic heading/paragraph rules
//! 5. [`persist`]: atomic write of `<stem>.md`, registry update
//!
//! [`Converter`](crate::Converter) drives the stages through [`PipelineState`].

pub mod classify;
pub mod extract;
pub mod input;
pub mod ocr;
pub mod pdf;
pub mod persist;
pub mod structure;
pub mod tables;

use std::fmt;

/// A unit of work reported to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Classify,
    Extract,
    Structure,
    Persist,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Classify => "classify",
            Stage::Extract => "extract",
            Stage::Structure => "structure",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a request in the linear stage sequence.
///
/// `Done` and `Error` are terminal; `Error` is reachable from every
/// non-terminal state and absorbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Classify,
    Extract,
    Structure,
    Persist,
    Done,
    Error,
}

impl PipelineState {
    /// State after the current stage succeeds.
    pub fn next(self) -> Self {
        match self {
            Self::Classify => Self::Extract,
            Self::Extract => Self::Structure,
            Self::Structure => Self::Persist,
            Self::Persist | Self::Done => Self::Done,
            Self::Error => Self::Error,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// The stage run in this state, if any.
    pub fn stage(self) -> Option<Stage> {
        match self {
            Self::Classify => Some(Stage::Classify),
            Self::Extract => Some(Stage::Extract),
            Self::Structure => Some(Stage::Structure),
            Self::Persist => Some(Stage::Persist),
            Self::Done | Self::Error => None,
        }
    }
}
