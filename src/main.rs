//! SmartCAPTCHA CLI
//!
//! Runs the HTTP host, replays recorded slider traces offline and prints
//! calibration and configuration.

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use smartcaptcha::{
    challenge::{Challenge, ChallengeEvent},
    collector::{InputFeed, PointerInput},
    config::Config,
    core::{FeatureVector, SessionConfig, FEATURE_COLUMNS},
    transparency::create_shared_log,
    PAYLOAD_DECLARATION, VERSION,
};

#[derive(Parser)]
#[command(name = "smartcaptcha")]
#[command(version = VERSION)]
#[command(about = "Drag-slider CAPTCHA core: recorder, features and heuristic screen", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP host for browser widgets
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(long)]
        port: Option<u16>,

        /// Verify endpoint URL (defaults to the configured endpoint)
        #[arg(long)]
        verifier: Option<String>,
    },

    /// Replay a recorded JSON input trace offline
    Replay {
        /// Trace file: an array of pointer inputs or {"inputs": [...], ...}
        file: PathBuf,

        /// Send the payload to the verifier when the local screen passes
        #[arg(long)]
        verify: bool,

        /// Seed for the calibration and timing noise draw
        #[arg(long)]
        seed: Option<u64>,

        /// Track width available to the widget
        #[arg(long, default_value = "400")]
        available_width: f64,

        /// Handle width
        #[arg(long, default_value = "44")]
        handle_width: f64,
    },

    /// Print a freshly drawn calibration
    Calibration {
        /// Seed for a reproducible draw
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show configuration
    Config,

    /// Display which data leaves the process
    Declaration,
}

/// Replay file layout.
#[derive(Deserialize)]
#[serde(untagged)]
enum ReplayFile {
    Trace(ReplayTrace),
    Inputs(Vec<PointerInput>),
}

#[derive(Deserialize)]
struct ReplayTrace {
    inputs: Vec<PointerInput>,
    #[serde(default)]
    config: Option<SessionConfig>,
    #[serde(default)]
    available_width_px: Option<f64>,
    #[serde(default)]
    handle_width_px: Option<f64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, verifier } => cmd_serve(port, verifier),
        Commands::Replay {
            file,
            verify,
            seed,
            available_width,
            handle_width,
        } => cmd_replay(&file, verify, seed, available_width, handle_width),
        Commands::Calibration { seed } => cmd_calibration(seed),
        Commands::Config => cmd_config(),
        Commands::Declaration => {
            println!("{PAYLOAD_DECLARATION}");
            Ok(())
        }
    }
}

#[cfg(feature = "server")]
fn cmd_serve(port: Option<u16>, verifier: Option<String>) -> anyhow::Result<()> {
    use smartcaptcha::server::{run, ServerConfig};
    use std::time::Duration;

    let mut config = Config::load().unwrap_or_default();
    if let Some(endpoint) = verifier {
        config.verifier_endpoint = endpoint;
    }
    let port = port.unwrap_or(config.server_port);

    println!("SmartCAPTCHA v{VERSION}");
    println!("  Verifier: {}", config.verifier_endpoint);
    println!("  Interaction delay: {} ms", config.interaction_delay_ms);
    println!("  Reset delay: {} ms", config.reset_delay_ms);
    println!("  Challenge expiry: {} s", config.challenge_ttl.as_secs());
    println!();
    println!("Press Ctrl+C to stop");

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(Arc::clone(&running))?;

    let server_config = ServerConfig::new(port, config.verifier(), config.challenge_settings())
        .with_limits(config.max_challenges, config.challenge_ttl);
    let runtime = tokio::runtime::Runtime::new().context("Failed to create runtime")?;

    runtime.block_on(async move {
        let (addr, shutdown_tx) = run(server_config).await?;
        println!("Listening on http://{addr}");

        while running.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        println!();
        println!("Stopping...");
        let _ = shutdown_tx.send(());
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok::<(), anyhow::Error>(())
    })
}

#[cfg(not(feature = "server"))]
fn cmd_serve(_port: Option<u16>, _verifier: Option<String>) -> anyhow::Result<()> {
    anyhow::bail!("serve requires the `server` feature")
}

fn cmd_replay(
    file: &Path,
    verify: bool,
    seed: Option<u64>,
    available_width: f64,
    handle_width: f64,
) -> anyhow::Result<()> {
    let content =
        std::fs::read_to_string(file).with_context(|| format!("Failed to read {file:?}"))?;
    let replay: ReplayFile =
        serde_json::from_str(&content).with_context(|| format!("Invalid trace in {file:?}"))?;
    let trace = match replay {
        ReplayFile::Trace(trace) => trace,
        ReplayFile::Inputs(inputs) => ReplayTrace {
            inputs,
            config: None,
            available_width_px: None,
            handle_width_px: None,
        },
    };
    if trace.inputs.is_empty() {
        anyhow::bail!("Trace {file:?} has no inputs");
    }

    let config = Config::load().unwrap_or_default();
    let settings = config.challenge_settings();
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    // Recorded calibration wins; a seed draws one; otherwise use range centres.
    let session_config = match (trace.config, seed) {
        (Some(cfg), _) => cfg,
        (None, Some(_)) => SessionConfig::generate(&mut rng),
        (None, None) => SessionConfig::midpoint(),
    };
    let noise = session_config.noise_sequence(&mut rng, settings.noise_len);
    let geometry = session_config.geometry(
        trace.available_width_px.unwrap_or(available_width),
        trace.handle_width_px.unwrap_or(handle_width),
    );
    let start_ms = trace.inputs[0].at_ms;
    let last_ms = trace.inputs[trace.inputs.len() - 1].at_ms;

    let log = create_shared_log();
    let mut challenge = Challenge::new(session_config, noise, geometry, settings, start_ms)
        .with_transparency(Arc::clone(&log));

    println!("Replaying {} inputs from {:?}", trace.inputs.len(), file);
    println!(
        "  Track: {:.0}px, movable range 0..{:.1}px, shape {:?}, variant {}",
        geometry.track_width_px,
        geometry.max_x,
        challenge.config().shape_mode,
        challenge.config().pattern_variant
    );
    println!();

    let mut feed = InputFeed::new(trace.inputs.len());
    feed.start()?;
    let sender = feed.sender();
    for input in trace.inputs {
        sender.send(input)?;
    }
    let events = challenge.pump(&feed);
    feed.stop();

    for event in events {
        match event {
            ChallengeEvent::Incomplete { features } => {
                println!("Drag released short.");
                if let Some(features) = features {
                    print_features(&features);
                }
            }
            ChallengeEvent::Indeterminate(e) => println!("No decision: {e}"),
            ChallengeEvent::LocalReject(e) => {
                if let Some(features) = challenge.features() {
                    print_features(features);
                }
                println!("Local screen: {e}");
            }
            ChallengeEvent::NeedsVerification(ticket) => {
                if let Some(features) = challenge.features() {
                    print_features(features);
                }
                println!("Local screen: passed");
                if verify {
                    let result = verify_blocking(&config, &ticket.payload);
                    challenge.resolve_verification(ticket.attempt, result, last_ms);
                } else {
                    println!("Verification skipped (use --verify to contact the verifier)");
                }
            }
        }
    }

    println!();
    println!("Verdict: {:?}", challenge.verdict());
    if !challenge.status().is_empty() {
        println!("Status: {}", challenge.status());
    }
    for notice in challenge.take_notices() {
        println!("Host notice: {notice:?}");
    }
    println!();
    println!("{}", log.summary());
    Ok(())
}

#[cfg(feature = "verifier")]
fn verify_blocking(
    config: &Config,
    payload: &smartcaptcha::core::VerifyPayload,
) -> Result<smartcaptcha::verifier::VerifyResponse, smartcaptcha::verifier::VerifyError> {
    let client = smartcaptcha::verifier::BlockingVerifierClient::new(config.verifier())?;
    match client.test_connection() {
        Ok(true) => {}
        Ok(false) => eprintln!("Warning: Verifier health check failed"),
        Err(e) => eprintln!("Warning: Could not reach verifier: {e}"),
    }
    client.verify(payload)
}

#[cfg(not(feature = "verifier"))]
fn verify_blocking(
    _config: &Config,
    _payload: &smartcaptcha::core::VerifyPayload,
) -> Result<smartcaptcha::verifier::VerifyResponse, smartcaptcha::verifier::VerifyError> {
    Err(smartcaptcha::verifier::VerifyError::Config(
        "verifier feature not enabled at compile time".to_string(),
    ))
}

fn print_features(features: &FeatureVector) {
    println!("Features sent to the verifier:");
    for name in FEATURE_COLUMNS {
        println!("  {:<28} {:>12.4}", name, features.get(name).unwrap_or(0.0));
    }
    let internal = serde_json::to_value(&features.internal).unwrap_or_default();
    if let Some(fields) = internal.as_object() {
        println!("Internal signals:");
        for (name, value) in fields {
            println!("  {:<28} {:>12.4}", name, value.as_f64().unwrap_or(0.0));
        }
    }
}

fn cmd_calibration(seed: Option<u64>) -> anyhow::Result<()> {
    let config = match seed {
        Some(seed) => SessionConfig::generate(&mut StdRng::seed_from_u64(seed)),
        None => SessionConfig::generate(&mut rand::thread_rng()),
    };
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
#[cfg(feature = "server")]
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
