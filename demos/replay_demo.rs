//! Demonstration of the SmartCAPTCHA challenge pipeline.
//!
//! This example shows how to:
//! 1. Draw a calibration and lay out the track
//! 2. Push pointer inputs through an input feed
//! 3. Read the local decision and the verification payload
//! 4. Apply a verifier answer
//!
//! Run with: cargo run --example replay_demo

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use smartcaptcha::{
    challenge::{Challenge, ChallengeEvent, ChallengeSettings},
    collector::{InputFeed, PointerInput},
    transparency::create_shared_log,
    VerifyResponse, PAYLOAD_DECLARATION,
};

/// Constant-speed, perfectly flat drag at a fixed 16 ms cadence.
fn scripted_drag(end_x: f64) -> Vec<PointerInput> {
    let mut inputs = vec![PointerInput::press(10.0, 22.0, 1_000.0)];
    let mut t = 1_000.0;
    let mut x = 10.0;
    while x < end_x {
        x += 12.0;
        t += 16.0;
        inputs.push(PointerInput::moved(x, 22.0, t));
    }
    inputs.push(PointerInput::release(x, 22.0, t + 16.0));
    inputs
}

/// Irregular drag with vertical wobble, pauses and a small overshoot.
fn wobbly_drag<R: Rng>(rng: &mut R, end_x: f64) -> Vec<PointerInput> {
    let mut inputs = vec![PointerInput::press(10.0, 22.0, 1_000.0)];
    let (mut x, mut y, mut t) = (10.0, 22.0, 1_000.0);
    while x < end_x + 8.0 {
        x += rng.gen_range(4.0..28.0);
        y += rng.gen_range(-2.5..2.5);
        t += rng.gen_range(12.0..140.0);
        inputs.push(PointerInput::moved(x, y, t));
    }
    x -= 6.0;
    t += 90.0;
    inputs.push(PointerInput::moved(x, y, t));
    inputs.push(PointerInput::release(x, y, t + 40.0));
    inputs
}

fn run(label: &str, inputs: Vec<PointerInput>, rng: &mut StdRng) {
    println!("--- {label} ---");

    let log = create_shared_log();
    let mut challenge = match Challenge::generate(rng, 420.0, 44.0, ChallengeSettings::default(), 0.0) {
        Ok(challenge) => challenge.with_transparency(Arc::clone(&log)),
        Err(e) => {
            println!("Could not create challenge: {e}");
            return;
        }
    };
    let last_ms = inputs.last().map(|i| i.at_ms).unwrap_or(0.0);
    let max_x = challenge.geometry().max_x;

    let mut feed = InputFeed::default();
    if let Err(e) = feed.start() {
        println!("Could not start feed: {e}");
        return;
    }
    let sender = feed.sender();
    for input in inputs {
        // Inputs arrive in track coordinates; stretch them onto this track.
        let scaled = PointerInput {
            x: input.x * max_x / 380.0,
            ..input
        };
        if let Err(e) = sender.send(scaled) {
            println!("Dropped input: {e}");
        }
    }

    for event in challenge.pump(&feed) {
        match event {
            ChallengeEvent::NeedsVerification(ticket) => {
                println!("Local screen passed; payload:");
                for (name, value) in ticket.payload.columns() {
                    println!("  {name:<28} {value:>10.4}");
                }
                // Pretend the verifier agreed.
                challenge.resolve_verification(
                    ticket.attempt,
                    Ok(VerifyResponse::with_decision("human")),
                    last_ms,
                );
            }
            ChallengeEvent::LocalReject(e) => println!("Local screen: {e}"),
            ChallengeEvent::Indeterminate(e) => println!("No decision: {e}"),
            ChallengeEvent::Incomplete { .. } => println!("Released short"),
        }
    }

    println!("Verdict: {:?}", challenge.verdict());
    println!("Notices: {:?}", challenge.take_notices());
    println!();
}

fn main() {
    println!("SmartCAPTCHA - Replay Demo");
    println!("==========================");
    println!("{PAYLOAD_DECLARATION}");

    let mut rng = StdRng::seed_from_u64(2024);
    run("Scripted drag", scripted_drag(390.0), &mut rng);

    let wobble = wobbly_drag(&mut rng, 390.0);
    run("Wobbly drag", wobble, &mut rng);
}
