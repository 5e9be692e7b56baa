//! Pointer input collection for the slider challenge.
//!
//! The host translates mouse and touch events into [`PointerInput`]s and
//! pushes them through an [`InputFeed`]; the challenge owns the consuming end.

pub mod feed;
pub mod types;

// Re-export commonly used types
pub use feed::{CollectorError, InputFeed, InputSender, DEFAULT_FEED_CAPACITY};
pub use types::{InputSource, PointerInput, PointerPhase};
