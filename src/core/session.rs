//! Interaction session and its recorded trace.
//!
//! A [`Session`] is created when the widget renders and is owned by exactly
//! one challenge attempt. Events are appended in arrival order by the
//! recorder and never modified afterwards.

use serde::{Deserialize, Serialize};

/// Kind of recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Down,
    Move,
    Up,
}

/// A single recorded sample in track-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Jittered session-clock timestamp
    pub t_ms: f64,
    pub x: f64,
    pub y: f64,
}

impl Event {
    pub fn new(kind: EventKind, t_ms: f64, x: f64, y: f64) -> Self {
        Self { kind, t_ms, x, y }
    }
}

/// One widget's interaction timeline and trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub widget_shown_at_ms: f64,
    pub interaction_started_at_ms: Option<f64>,
    pub interaction_ended_at_ms: Option<f64>,
    events: Vec<Event>,
}

impl Session {
    /// Create an empty session for a widget shown at `widget_shown_at_ms`.
    pub fn new(widget_shown_at_ms: f64) -> Self {
        Self {
            widget_shown_at_ms,
            interaction_started_at_ms: None,
            interaction_ended_at_ms: None,
            events: Vec::new(),
        }
    }

    /// Assemble a session from an already recorded timeline.
    pub fn from_parts(
        widget_shown_at_ms: f64,
        interaction_started_at_ms: Option<f64>,
        interaction_ended_at_ms: Option<f64>,
        events: Vec<Event>,
    ) -> Self {
        Self {
            widget_shown_at_ms,
            interaction_started_at_ms,
            interaction_ended_at_ms,
            events,
        }
    }

    /// All recorded events in arrival order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Motion samples with a usable timestamp.
    pub fn move_events(&self) -> impl Iterator<Item = &Event> {
        self.events
            .iter()
            .filter(|e| e.kind == EventKind::Move && e.t_ms.is_finite())
    }

    pub fn move_count(&self) -> usize {
        self.move_events().count()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub(crate) fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Record the first arm of the widget; later arms keep the original time.
    pub(crate) fn mark_started(&mut self, t_ms: f64) {
        if self.interaction_started_at_ms.is_none() {
            self.interaction_started_at_ms = Some(t_ms);
        }
    }

    pub(crate) fn mark_ended(&mut self, t_ms: f64) {
        self.interaction_ended_at_ms = Some(t_ms);
    }

    /// Move the current trace out, leaving the timeline open for another drag.
    pub(crate) fn take_trace(&mut self) -> Session {
        Session {
            widget_shown_at_ms: self.widget_shown_at_ms,
            interaction_started_at_ms: self.interaction_started_at_ms,
            interaction_ended_at_ms: self.interaction_ended_at_ms.take(),
            events: std::mem::take(&mut self.events),
        }
    }
}
