//! SmartCAPTCHA - behavioral drag-slider challenge core.
//!
//! This library records the raw pointer motion of a slider drag, derives a
//! behavioral feature vector from it and decides whether the interaction
//! looks automated, first with local heuristics and then through a remote
//! verifier.
//!
//! # Guarantees
//!
//! - **Jittered time**: every recorded timestamp goes through a session clock
//!   with bounded, noisy steps, so raw timing cannot be replayed bit-exact
//! - **Moving target**: thresholds and the expected path shape are redrawn
//!   for every widget
//! - **Minimal payload**: only ten aggregate features leave the process; raw
//!   traces never do
//! - **Host-driven**: no threads, timers or wall clock inside the core
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        SmartCAPTCHA                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │ Input feed  │──▶│  Recorder   │──▶│  Features   │       │
//! │  │(mouse/touch)│   │(jitter clock│   │ (extract)   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                             │               │
//! │                                             ▼               │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │Transparency │◀──│  Challenge  │◀──│ Classifier  │       │
//! │  │    Log      │   │  (verdict)  │──▶│  Verifier   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use smartcaptcha::challenge::{Challenge, ChallengeEvent, ChallengeSettings};
//! use smartcaptcha::collector::PointerInput;
//!
//! let mut rng = rand::thread_rng();
//! let mut challenge =
//!     Challenge::generate(&mut rng, 420.0, 44.0, ChallengeSettings::default(), 0.0)
//!         .expect("noise sequence");
//!
//! challenge.handle_input(&PointerInput::press(10.0, 20.0, 1000.0)).ok();
//! // ... motion inputs ...
//! if let Ok(Some(ChallengeEvent::NeedsVerification(ticket))) =
//!     challenge.handle_input(&PointerInput::release(380.0, 21.0, 1900.0))
//! {
//!     // Send ticket.payload to the verifier, then:
//!     // challenge.resolve_verification(ticket.attempt, result, now_ms);
//! }
//! ```

pub mod challenge;
pub mod collector;
pub mod config;
pub mod core;
pub mod transparency;
pub mod verifier;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use challenge::{
    AttemptError, Challenge, ChallengeEvent, ChallengeSettings, HostNotice, Verdict,
    VerificationTicket,
};
pub use collector::{CollectorError, InputFeed, PointerInput, PointerPhase};
pub use config::{Config, ConfigError};
pub use core::{
    extract_features, looks_bot_like, FeatureVector, Session, SessionConfig, Thresholds,
    VerifyPayload, FEATURE_COLUMNS,
};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};
pub use verifier::{VerifierConfig, VerifyError, VerifyResponse};

// Verifier client re-exports (when enabled)
#[cfg(feature = "verifier")]
pub use verifier::{BlockingVerifierClient, VerifierClient};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Payload declaration that can be displayed to operators.
pub const PAYLOAD_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║             SMARTCAPTCHA - VERIFICATION PAYLOAD                  ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  The slider records pointer motion while the handle is dragged.  ║
║                                                                  ║
║  ✓ SENT TO THE VERIFIER (ten aggregate numbers):                 ║
║    • avg_mouse_speed, mouse_path_entropy                         ║
║    • click_delay, task_completion_time, idle_time                ║
║    • micro_jitter_variance, acceleration_curve                   ║
║    • curvature_variance, overshoot_correction_ratio              ║
║    • timing_entropy                                              ║
║                                                                  ║
║  ✗ NEVER SENT:                                                   ║
║    • Raw pointer coordinates or timestamps                       ║
║    • Internal classifier signals                                 ║
║    • Anything outside the slider track                           ║
║                                                                  ║
║  Traces are discarded when the attempt resets.                   ║
║                                                                  ║
║  You can view challenge statistics anytime with:                 ║
║    GET /stats on a running `smartcaptcha serve`                  ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
