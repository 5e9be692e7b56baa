//! Integration tests for the recorder, extractor and classifier pipeline

mod common;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smartcaptcha::challenge::{ChallengeEvent, Verdict, STATUS_NO_DATA};
use smartcaptcha::collector::PointerInput;
use smartcaptcha::core::{
    assess, extract_features, looks_bot_like, Event, EventKind, ExtractionError, RecorderState,
    RuleId, Session, SessionConfig, ShapeMode, Thresholds,
};

#[test]
fn test_uniform_trace_is_bot_like_for_every_calibration() {
    let session = common::robotic_session();
    let thresholds = Thresholds::default();

    for seed in 0..32 {
        let config = SessionConfig::generate(&mut StdRng::seed_from_u64(seed));
        let features = extract_features(&session, &config).expect("enough motion");
        assert_eq!(features.public.timing_entropy, 0.0);
        assert_eq!(features.public.micro_jitter_variance, 0.0);

        let assessment = assess(&features, &config, &thresholds);
        assert!(assessment.bot_like, "seed {seed} let a scripted drag through");
        assert!(assessment.fired.contains(&RuleId::Cadence));
    }
}

/// Calibrations to run a fixed trace against: the centred one plus seeded draws.
fn calibrations() -> Vec<SessionConfig> {
    std::iter::once(SessionConfig::midpoint())
        .chain((0..32).map(|seed| SessionConfig::generate(&mut StdRng::seed_from_u64(seed))))
        .collect()
}

#[test]
fn test_five_evenly_spaced_moves_are_bot_like() {
    // 100 ms apart, 20 px steps, no vertical motion.
    let mut events = vec![Event::new(EventKind::Down, 400.0, 0.0, 20.0)];
    for i in 1..=5 {
        let i = f64::from(i);
        events.push(Event::new(EventKind::Move, 400.0 + 100.0 * i, 20.0 * i, 20.0));
    }
    events.push(Event::new(EventKind::Up, 950.0, 100.0, 20.0));
    let session = Session::from_parts(0.0, Some(400.0), Some(950.0), events);
    let thresholds = Thresholds::default();

    for config in calibrations() {
        let config = SessionConfig {
            shape_mode: ShapeMode::Straight,
            ..config
        };
        let features = extract_features(&session, &config).expect("five moves");
        assert_eq!(features.internal.straightness_ratio, 1.0);

        let assessment = assess(&features, &config, &thresholds);
        assert!(assessment.signals.regular_timing);
        assert!(assessment.signals.low_jitter);
        assert!(assessment.signals.constant_speed);
        assert!(assessment.bot_like);
        assert!(assessment.fired.contains(&RuleId::Cadence));
    }
}

#[test]
fn test_uneven_wobbly_drag_with_reversals_is_not_bot_like() {
    // Delays 40/180/90/220 ms, y swinging 8 px either side of 20, and the
    // horizontal direction reversing twice.
    let moves = [
        (0.0, 28.0, 1_000.0),
        (60.0, 12.0, 1_040.0),
        (100.0, 28.0, 1_220.0),
        (85.0, 12.0, 1_310.0),
        (155.0, 28.0, 1_530.0),
    ];
    let mut events = vec![Event::new(EventKind::Down, 900.0, 0.0, 20.0)];
    events.extend(
        moves
            .iter()
            .map(|&(x, y, t)| Event::new(EventKind::Move, t, x, y)),
    );
    events.push(Event::new(EventKind::Up, 2_100.0, 155.0, 28.0));
    let session = Session::from_parts(300.0, Some(900.0), Some(2_100.0), events);
    let thresholds = Thresholds::default();

    for config in calibrations() {
        let features = extract_features(&session, &config).expect("five moves");
        assert!(features.public.task_completion_time > 1.0);
        assert!(features.public.overshoot_correction_ratio > 0.0);
        assert!(features.internal.dy_sign_change_count >= 2);

        let assessment = assess(&features, &config, &thresholds);
        assert!(!assessment.signals.regular_timing);
        assert!(!assessment.signals.low_jitter);
        assert!(
            !assessment.bot_like,
            "{:?} rejected an irregular drag: {:?}",
            config.shape_mode, assessment.fired
        );
    }
}

#[test]
fn test_irregular_trace_passes_every_calibration() {
    let session = common::human_session();
    let thresholds = Thresholds::default();

    for seed in 0..32 {
        let config = SessionConfig::generate(&mut StdRng::seed_from_u64(seed));
        let features = extract_features(&session, &config).expect("enough motion");
        assert!(
            !looks_bot_like(&features, &config, &thresholds),
            "seed {seed} rejected a human-like drag: {:?}",
            assess(&features, &config, &thresholds).fired
        );
    }
}

#[test]
fn test_human_drag_proceeds_to_verification() {
    let mut challenge = common::quiet_challenge();
    let event = common::drive(&mut challenge, &common::human_inputs());

    let Some(ChallengeEvent::NeedsVerification(ticket)) = event else {
        panic!("expected a verification ticket, got {event:?}");
    };
    assert_eq!(challenge.verdict(), &Verdict::Verifying);
    assert!(ticket.payload.task_completion_time > 0.0);
    assert!(ticket.payload.avg_mouse_speed > 0.0);
    for (name, value) in ticket.payload.columns() {
        assert!(value.is_finite(), "{name} is not finite");
    }
}

#[test]
fn test_classification_is_pure() {
    let session = common::human_session();
    let config = SessionConfig::midpoint();
    let thresholds = Thresholds::default();

    let first = extract_features(&session, &config).unwrap();
    let second = extract_features(&session, &config).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        assess(&first, &config, &thresholds),
        assess(&second, &config, &thresholds)
    );
}

#[test]
fn test_fewer_than_three_moves_is_insufficient() {
    let config = SessionConfig::midpoint();
    for moves in 0..3 {
        let mut events = vec![Event::new(EventKind::Down, 0.0, 0.0, 0.0)];
        for i in 0..moves {
            let i = f64::from(i);
            events.push(Event::new(EventKind::Move, 10.0 + i * 20.0, i * 5.0, 0.0));
        }
        events.push(Event::new(EventKind::Up, 200.0, 10.0, 0.0));
        let session = Session::from_parts(0.0, Some(0.0), Some(200.0), events);

        assert_eq!(
            extract_features(&session, &config),
            Err(ExtractionError::InsufficientData {
                moves: moves as usize
            })
        );
    }
}

#[test]
fn test_insufficient_data_on_complete_drag() {
    let mut challenge = common::quiet_challenge();
    let event = common::drive(
        &mut challenge,
        &[
            PointerInput::press(8.0, 20.0, 100.0),
            PointerInput::moved(200.0, 20.0, 140.0),
            PointerInput::moved(400.0, 20.0, 180.0),
            PointerInput::release(400.0, 20.0, 220.0),
        ],
    );
    assert!(matches!(event, Some(ChallengeEvent::Indeterminate(_))));
    assert_eq!(challenge.verdict(), &Verdict::Unresolved);
    assert_eq!(challenge.status(), STATUS_NO_DATA);

    // The delayed reset re-arms the widget.
    challenge.advance(1_000.0);
    assert!(challenge.session().is_empty());
    assert_eq!(challenge.recorder().state(), RecorderState::Idle);
}

#[test]
fn test_entropies_stay_in_unit_interval() {
    let config = SessionConfig::midpoint();
    let mut rng = StdRng::seed_from_u64(11);

    for _ in 0..64 {
        let n = rng.gen_range(3..40);
        let mut t = 0.0;
        let mut events = Vec::with_capacity(n);
        for _ in 0..n {
            t += rng.gen_range(-5.0..200.0);
            events.push(Event::new(
                EventKind::Move,
                t,
                rng.gen_range(-50.0..400.0),
                rng.gen_range(-20.0..20.0),
            ));
        }
        let session = Session::from_parts(0.0, Some(0.0), Some(t), events);
        let features = extract_features(&session, &config).unwrap();

        for value in [
            features.public.mouse_path_entropy,
            features.public.timing_entropy,
        ] {
            assert!((0.0..=1.0).contains(&value));
        }
        let json = serde_json::to_value(&features.public).unwrap();
        for (name, value) in json.as_object().unwrap() {
            assert!(value.as_f64().unwrap().is_finite(), "{name} is not finite");
        }
    }
}

#[test]
fn test_reset_is_idempotent() {
    let mut challenge = common::quiet_challenge();
    common::drive(&mut challenge, &common::human_inputs());
    assert_eq!(challenge.verdict(), &Verdict::Verifying);

    challenge.reset(5_000.0);
    let attempt = challenge.attempt();
    challenge.reset(5_010.0);

    assert_eq!(challenge.attempt(), attempt + 1);
    assert_eq!(challenge.verdict(), &Verdict::Unresolved);
    assert_eq!(challenge.status(), "");
    assert!(challenge.session().is_empty());
    assert_eq!(challenge.session().interaction_started_at_ms, None);
    assert_eq!(challenge.recorder().state(), RecorderState::Idle);
    assert_eq!(challenge.pending_reset_at(), None);
    assert!(challenge.features().is_none());

    // The widget accepts a fresh drag afterwards.
    let event = common::drive(
        &mut challenge,
        &common::human_inputs()
            .into_iter()
            .map(|i| PointerInput {
                at_ms: i.at_ms + 6_000.0,
                ..i
            })
            .collect::<Vec<_>>(),
    );
    assert!(matches!(event, Some(ChallengeEvent::NeedsVerification(_))));
}

#[test]
fn test_touch_and_mouse_drive_the_same_recorder() {
    let mut mouse = common::quiet_challenge();
    let mut touch = common::quiet_challenge();
    let inputs = common::human_inputs();
    let touches: Vec<PointerInput> = inputs.iter().map(|i| i.touch()).collect();

    common::drive(&mut mouse, &inputs);
    common::drive(&mut touch, &touches);
    assert_eq!(mouse.session().events(), touch.session().events());
}
