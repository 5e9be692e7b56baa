//! Shared fixtures for integration tests.

#![allow(dead_code)]

use smartcaptcha::challenge::{Challenge, ChallengeSettings};
use smartcaptcha::collector::PointerInput;
use smartcaptcha::core::{
    Event, EventKind, Session, SessionConfig, TimingNoiseSequence, TrackGeometry,
};

/// Challenge with centred calibration, no clock jitter and a 306 px range.
pub fn quiet_challenge() -> Challenge {
    let noise = TimingNoiseSequence::from_values(vec![0; 64]).expect("power of two");
    Challenge::new(
        SessionConfig::midpoint(),
        noise,
        TrackGeometry::new(356.0, 44.0),
        ChallengeSettings::default(),
        0.0,
    )
}

/// Irregular, wobbly drag that reaches the end of a 306 px range.
pub fn human_inputs() -> Vec<PointerInput> {
    let steps = [
        (37.0, 1.2, 41.0),
        (22.0, -0.8, 77.0),
        (48.0, 2.1, 23.0),
        (31.0, -1.7, 130.0),
        (19.0, 0.9, 58.0),
        (55.0, -2.4, 34.0),
        (28.0, 1.6, 96.0),
        (41.0, -0.6, 45.0),
        (60.0, 1.9, 70.0),
        (35.0, -1.3, 28.0),
    ];
    let (mut x, mut y, mut t) = (8.0, 20.0, 1_000.0);
    let mut inputs = vec![PointerInput::press(x, y, t)];
    for (dx, dy, dt) in steps {
        x += dx;
        y += dy;
        t += dt;
        inputs.push(PointerInput::moved(x, y, t));
    }
    inputs.push(PointerInput::release(x, y, t + 30.0));
    inputs
}

/// Uniform trace: fixed cadence, fixed step, no vertical motion.
pub fn robotic_session() -> Session {
    let mut events = vec![Event::new(EventKind::Down, 1_000.0, 0.0, 20.0)];
    for i in 1..=24 {
        let i = f64::from(i);
        events.push(Event::new(EventKind::Move, 1_000.0 + 16.0 * i, 12.0 * i, 20.0));
    }
    events.push(Event::new(EventKind::Up, 1_400.0, 288.0, 20.0));
    Session::from_parts(500.0, Some(1_000.0), Some(1_400.0), events)
}

/// Irregular trace with jittery steps and vertical wobble.
pub fn human_session() -> Session {
    let steps = [
        (37.0, 1.2, 41.0),
        (22.0, -0.8, 77.0),
        (48.0, 2.1, 23.0),
        (31.0, -1.7, 130.0),
        (19.0, 0.9, 58.0),
        (55.0, -2.4, 34.0),
        (28.0, 1.6, 96.0),
        (-6.0, -0.6, 45.0),
        (60.0, 1.9, 70.0),
        (35.0, -1.3, 28.0),
    ];
    let (mut x, mut y, mut t) = (0.0, 20.0, 1_000.0);
    let mut events = vec![Event::new(EventKind::Down, t, x, y)];
    for (dx, dy, dt) in steps {
        x += dx;
        y += dy;
        t += dt;
        events.push(Event::new(EventKind::Move, t, x, y));
    }
    events.push(Event::new(EventKind::Up, t + 30.0, x, y));
    Session::from_parts(200.0, Some(1_000.0), Some(t + 30.0), events)
}

/// Feed every input, returning the last settled event.
pub fn drive(
    challenge: &mut Challenge,
    inputs: &[PointerInput],
) -> Option<smartcaptcha::ChallengeEvent> {
    let mut last = None;
    for input in inputs {
        if let Ok(Some(event)) = challenge.handle_input(input) {
            last = Some(event);
        }
    }
    last
}
