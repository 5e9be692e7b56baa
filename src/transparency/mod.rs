//! Transparency module for the SmartCAPTCHA core.
//!
//! Tracks what the challenge recorded, decided and sent, so an operator can
//! see exactly which data leaves the process.

pub mod log;

// Re-export commonly used types
pub use log::{create_shared_log, SharedTransparencyLog, TransparencyLog, TransparencyStats};
