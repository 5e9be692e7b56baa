//! Core functionality for the SmartCAPTCHA slider.
//!
//! This module contains:
//! - The jittered session clock and per-load calibration
//! - The interaction recorder and its session trace
//! - Feature extraction and the local heuristic classifier
//! - The verification payload

pub mod calibration;
pub mod classifier;
pub mod clock;
pub mod features;
pub mod payload;
pub mod recorder;
pub mod session;

// Re-export commonly used types
pub use calibration::{SessionConfig, ShapeMode, TrackGeometry, HANDLE_GUTTER_PX};
pub use classifier::{assess, looks_bot_like, Assessment, RuleId, Signals, Thresholds};
pub use clock::{ClockError, SessionClock, StepBounds, TimingNoiseSequence, DEFAULT_NOISE_LEN};
pub use features::{
    extract_features, normalized_entropy, safe_divide, ExtractionError, FeatureVector,
    InternalFeatures, PublicFeatures, MIN_MOVE_EVENTS,
};
pub use payload::{VerifyPayload, FEATURE_COLUMNS};
pub use recorder::{DragOutcome, HandleFrame, Recorder, RecorderError, RecorderState, Transition};
pub use session::{Event, EventKind, Session};
