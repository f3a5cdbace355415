//! Recorder module for turning captured interactions into macros
//!
//! This module provides:
//! - Raw event types and the capture listener seam
//! - Locator scoring to order the candidates of each step target
//! - The step recorder with input coalescing

pub mod capture;
pub mod event_recorder;
pub mod selector_scorer;

pub use capture::{CaptureListener, ElementDescriptor, RawEvent, RawEventKind};
pub use event_recorder::StepRecorder;
pub use selector_scorer::{SelectorCandidate, SelectorScorer};
