//! Interaction recorder for the slider handle.
//!
//! The recorder is a host-driven state machine. It never reads a wall clock:
//! every input carries the host's monotonic time, and deferred transitions
//! (the delayed arm) fire from [`Recorder::advance`].
//!
//! ```text
//! Idle --press--> Armed --delay elapsed--> Dragging --release--> Settled (complete)
//!                   |                         |
//!                   +--release--> Idle        +--release--> Idle (incomplete)
//! ```

use crate::collector::{PointerInput, PointerPhase};
use crate::core::calibration::{SessionConfig, TrackGeometry};
use crate::core::clock::SessionClock;
use crate::core::session::{Event, EventKind, Session};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fill bar extends this far past the handle's left edge.
pub const FILL_OFFSET_PX: f64 = 26.0;

/// Recorder state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecorderState {
    Idle,
    /// Pointer is down; the drag begins at `fire_at_ms` if still held
    Armed { fire_at_ms: f64, x: f64, y: f64 },
    /// Drag in progress; `grab_offset_px` is where the handle was grabbed
    Dragging { grab_offset_px: f64 },
    /// A complete drag was released; the recorder is locked
    Settled,
}

/// How a drag ended.
#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome {
    /// Handle reached the completion point; the trace stays in the session
    Complete,
    /// Handle released short; the trace is handed back and the session reopened
    Incomplete { trace: Session },
}

/// Observable effect of one input.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Armed { fire_at_ms: f64 },
    Began,
    Moved { position_px: f64 },
    /// Released before the arm delay elapsed
    Cancelled,
    Settled(DragOutcome),
    Ignored,
}

/// Recorder input errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderError {
    /// Press while a drag is already in progress
    AlreadyDragging,
    /// Input after a complete release locked the recorder
    Finalized,
}

impl std::fmt::Display for RecorderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecorderError::AlreadyDragging => write!(f, "A drag is already in progress"),
            RecorderError::Finalized => write!(f, "Recorder is locked after a complete drag"),
        }
    }
}

impl std::error::Error for RecorderError {}

/// One coalesced redraw of the handle and fill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandleFrame {
    pub position_px: f64,
    pub fill_width_px: f64,
    /// Animate toward this frame (snap-back after an incomplete drag)
    pub animated: bool,
}

/// Records one widget's drag trace.
#[derive(Debug)]
pub struct Recorder {
    config: Arc<SessionConfig>,
    clock: SessionClock,
    geometry: TrackGeometry,
    interaction_delay_ms: f64,
    session: Session,
    state: RecorderState,
    pointer_down: bool,
    position_px: f64,
    frame_dirty: bool,
    frame_animated: bool,
}

impl Recorder {
    /// Create a recorder for a widget shown at host time `now_ms`.
    pub fn new(
        config: Arc<SessionConfig>,
        mut clock: SessionClock,
        geometry: TrackGeometry,
        interaction_delay_ms: f64,
        now_ms: f64,
    ) -> Self {
        let session = Session::new(clock.now(now_ms));
        let interaction_delay_ms = if interaction_delay_ms.is_finite() {
            interaction_delay_ms.max(0.0)
        } else {
            0.0
        };

        Self {
            config,
            clock,
            geometry,
            interaction_delay_ms,
            session,
            state: RecorderState::Idle,
            pointer_down: false,
            position_px: geometry.min_x,
            frame_dirty: true,
            frame_animated: false,
        }
    }

    /// Feed one pointer input.
    pub fn handle(&mut self, input: &PointerInput) -> Result<Transition, RecorderError> {
        if self.state == RecorderState::Settled {
            return Err(RecorderError::Finalized);
        }
        if input.ends_drag() {
            return Ok(self.release(input));
        }
        match input.phase {
            PointerPhase::Press => self.press(input),
            _ => Ok(self.motion(input)),
        }
    }

    /// Fire the deferred arm if it is due at `now_ms`.
    pub fn advance(&mut self, now_ms: f64) -> Option<Transition> {
        let RecorderState::Armed { fire_at_ms, x, y } = self.state else {
            return None;
        };
        if now_ms < fire_at_ms {
            return None;
        }
        if !self.pointer_down {
            self.state = RecorderState::Idle;
            return None;
        }
        Some(self.begin(x, y, fire_at_ms))
    }

    fn press(&mut self, input: &PointerInput) -> Result<Transition, RecorderError> {
        if let RecorderState::Dragging { .. } = self.state {
            return Err(RecorderError::AlreadyDragging);
        }

        self.pointer_down = true;
        if self.interaction_delay_ms <= 0.0 {
            return Ok(self.begin(input.x, input.y, input.at_ms));
        }

        // A new press replaces any pending arm.
        let fire_at_ms = input.at_ms + self.interaction_delay_ms;
        self.state = RecorderState::Armed {
            fire_at_ms,
            x: input.x,
            y: input.y,
        };
        tracing::debug!("Drag armed, begins at {:.1} ms", fire_at_ms);
        Ok(Transition::Armed { fire_at_ms })
    }

    fn begin(&mut self, x: f64, y: f64, at_ms: f64) -> Transition {
        if self.session.interaction_started_at_ms.is_none() {
            let started = self.clock.now(at_ms);
            self.session.mark_started(started);
        }
        let t_ms = self.clock.now(at_ms);
        self.session.push(Event::new(EventKind::Down, t_ms, x, y));

        let grab_offset_px = if x.is_finite() { x - self.position_px } else { 0.0 };
        self.state = RecorderState::Dragging { grab_offset_px };
        tracing::debug!("Drag began at x={:.1}", x);
        Transition::Began
    }

    fn motion(&mut self, input: &PointerInput) -> Transition {
        let RecorderState::Dragging { grab_offset_px } = self.state else {
            return Transition::Ignored;
        };
        if !input.is_finite() {
            tracing::debug!("Dropped non-finite motion sample");
            return Transition::Ignored;
        }

        let t_ms = self.clock.now(input.at_ms);
        self.session
            .push(Event::new(EventKind::Move, t_ms, input.x, input.y));
        self.set_position(input.x - grab_offset_px, false);
        Transition::Moved {
            position_px: self.position_px,
        }
    }

    fn release(&mut self, input: &PointerInput) -> Transition {
        self.pointer_down = false;
        match self.state {
            RecorderState::Armed { .. } => {
                self.state = RecorderState::Idle;
                tracing::debug!("Arm cancelled before the drag began");
                Transition::Cancelled
            }
            RecorderState::Dragging { .. } => self.finish(input),
            _ => Transition::Ignored,
        }
    }

    fn finish(&mut self, input: &PointerInput) -> Transition {
        let ended = self.clock.now(input.at_ms);
        self.session.mark_ended(ended);
        let t_ms = self.clock.now(input.at_ms);
        self.session
            .push(Event::new(EventKind::Up, t_ms, input.x, input.y));

        if self.is_complete() {
            self.state = RecorderState::Settled;
            self.set_position(self.geometry.max_x, false);
            tracing::debug!(
                "Drag complete with {} motion samples",
                self.session.move_count()
            );
            Transition::Settled(DragOutcome::Complete)
        } else {
            self.state = RecorderState::Idle;
            self.set_position(self.geometry.min_x, true);
            let trace = self.session.take_trace();
            tracing::debug!(
                "Drag released short with {} motion samples",
                trace.move_count()
            );
            Transition::Settled(DragOutcome::Incomplete { trace })
        }
    }

    /// Whether the current handle position, shifted by the hidden start
    /// bias, reaches the completion point.
    pub fn is_complete(&self) -> bool {
        if self.geometry.max_x <= 0.0 {
            return false;
        }
        let effective = self
            .geometry
            .clamp(self.position_px - self.config.start_bias_px);
        effective >= self.geometry.max_x * self.config.completion_factor
    }

    fn set_position(&mut self, x: f64, animated: bool) {
        self.position_px = self.geometry.clamp(x);
        self.frame_dirty = true;
        self.frame_animated = animated;
    }

    /// Take the pending redraw, if any. Updates since the last call collapse
    /// into one frame.
    pub fn take_frame(&mut self) -> Option<HandleFrame> {
        if !self.frame_dirty {
            return None;
        }
        self.frame_dirty = false;
        let animated = std::mem::take(&mut self.frame_animated);
        Some(HandleFrame {
            position_px: self.position_px,
            fill_width_px: self.position_px + FILL_OFFSET_PX,
            animated,
        })
    }

    /// Adopt new track geometry after the host re-measured the track.
    pub fn set_geometry(&mut self, geometry: TrackGeometry) {
        self.geometry = geometry;
        let position = self.position_px;
        self.set_position(position, false);
    }

    /// Discard the session and start over for a widget shown at `now_ms`.
    pub fn reset(&mut self, now_ms: f64) {
        self.session = Session::new(self.clock.now(now_ms));
        self.state = RecorderState::Idle;
        self.pointer_down = false;
        self.set_position(self.geometry.min_x, false);
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn position(&self) -> f64 {
        self.position_px
    }

    pub fn geometry(&self) -> TrackGeometry {
        self.geometry
    }

    pub fn is_finalized(&self) -> bool {
        self.state == RecorderState::Settled
    }
}
