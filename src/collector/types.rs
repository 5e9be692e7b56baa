//! Pointer input types fed to the interaction recorder.
//!
//! Mouse and touch input are normalized to a single [`PointerInput`] carrying
//! track-local coordinates and the host's monotonic time in milliseconds.

use serde::{Deserialize, Serialize};

/// Phase of a pointer interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerPhase {
    /// Mouse button or finger went down on the handle
    Press,
    /// Pointer moved while the button/finger is held
    Move,
    /// Mouse button or finger released
    Release,
    /// Touch cancelled by the platform (treated like a release)
    Cancel,
}

/// Device the input came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    #[default]
    Mouse,
    Touch,
}

/// A single pointer input in track-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerInput {
    pub phase: PointerPhase,
    #[serde(default)]
    pub source: InputSource,
    /// Horizontal position relative to the track's left edge
    pub x: f64,
    /// Vertical position relative to the track's top edge
    pub y: f64,
    /// Host monotonic time in milliseconds
    pub at_ms: f64,
}

impl PointerInput {
    pub fn new(phase: PointerPhase, x: f64, y: f64, at_ms: f64) -> Self {
        Self {
            phase,
            source: InputSource::Mouse,
            x,
            y,
            at_ms,
        }
    }

    pub fn press(x: f64, y: f64, at_ms: f64) -> Self {
        Self::new(PointerPhase::Press, x, y, at_ms)
    }

    pub fn moved(x: f64, y: f64, at_ms: f64) -> Self {
        Self::new(PointerPhase::Move, x, y, at_ms)
    }

    pub fn release(x: f64, y: f64, at_ms: f64) -> Self {
        Self::new(PointerPhase::Release, x, y, at_ms)
    }

    /// Mark this input as coming from a touch screen.
    pub fn touch(mut self) -> Self {
        self.source = InputSource::Touch;
        self
    }

    /// Whether the input ends the current drag.
    pub fn ends_drag(&self) -> bool {
        matches!(self.phase, PointerPhase::Release | PointerPhase::Cancel)
    }

    /// Whether coordinates and time are all finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.at_ms.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_ends_drag() {
        let mut input = PointerInput::moved(1.0, 2.0, 3.0);
        assert!(!input.ends_drag());
        input.phase = PointerPhase::Cancel;
        assert!(input.ends_drag());
    }

    #[test]
    fn test_source_defaults_to_mouse_when_absent() {
        let input: PointerInput =
            serde_json::from_str(r#"{"phase":"move","x":4.0,"y":1.5,"at_ms":120.0}"#).unwrap();
        assert_eq!(input.source, InputSource::Mouse);
        assert_eq!(input.phase, PointerPhase::Move);
        assert_eq!(input.touch().source, InputSource::Touch);
    }

    #[test]
    fn test_non_finite_detection() {
        assert!(PointerInput::press(0.0, 0.0, 0.0).is_finite());
        assert!(!PointerInput::press(f64::NAN, 0.0, 0.0).is_finite());
        assert!(!PointerInput::press(0.0, 0.0, f64::INFINITY).is_finite());
    }
}
