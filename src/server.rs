//! HTTP host for browser slider widgets.
//!
//! A thin widget streams its raw pointer inputs here; the host replays them
//! through a [`Challenge`], runs the local classifier and, when needed, the
//! remote verifier, and answers with the verdict.
//!
//! # Architecture
//!
//! ```text
//! Widget ──→ POST /challenges/:id/inputs ──→ Challenge ──→ verifier
//!                                               ↓
//!                                    verdict, token, handle frame
//! ```

use crate::challenge::{Challenge, ChallengeEvent, ChallengeSettings, HostNotice, Verdict};
use crate::collector::PointerInput;
use crate::core::{HandleFrame, RuleId, TrackGeometry};
use crate::transparency::{create_shared_log, SharedTransparencyLog, TransparencyStats};
use crate::verifier::{VerifierClient, VerifierConfig, VerifyError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

/// Default upper bound on live challenges held in memory.
pub const MAX_CHALLENGES: usize = 10_000;

/// Default idle time after which a challenge is swept.
pub const CHALLENGE_TTL: Duration = Duration::from_secs(300);

const MAX_EMAIL_LEN: usize = 254;
const MAX_MESSAGE_LEN: usize = 2000;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Remote verifier
    pub verifier: VerifierConfig,
    /// Settings for every challenge created by this host
    pub settings: ChallengeSettings,
    /// Live challenges allowed at once
    pub max_challenges: usize,
    /// Idle time before a challenge is dropped
    pub challenge_ttl: Duration,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(port: u16, verifier: VerifierConfig, settings: ChallengeSettings) -> Self {
        Self {
            port,
            verifier,
            settings,
            max_challenges: MAX_CHALLENGES,
            challenge_ttl: CHALLENGE_TTL,
        }
    }

    /// Override the capacity and idle expiry of the challenge map.
    pub fn with_limits(mut self, max_challenges: usize, challenge_ttl: Duration) -> Self {
        self.max_challenges = max_challenges;
        self.challenge_ttl = challenge_ttl;
        self
    }
}

/// A challenge plus the last time a request touched it.
struct HostedChallenge {
    challenge: Challenge,
    touched: Instant,
}

impl HostedChallenge {
    fn new(challenge: Challenge) -> Self {
        Self {
            challenge,
            touched: Instant::now(),
        }
    }

    fn touch(&mut self) -> &mut Challenge {
        self.touched = Instant::now();
        &mut self.challenge
    }
}

type ChallengeMap = HashMap<Uuid, HostedChallenge>;

/// Drop every challenge idle for at least `ttl`. Returns how many went.
fn sweep_expired(challenges: &mut ChallengeMap, ttl: Duration) -> usize {
    let before = challenges.len();
    challenges.retain(|_, hosted| hosted.touched.elapsed() < ttl);
    before - challenges.len()
}

/// Shared server state
pub struct ServerState {
    /// Live challenges by id
    challenges: RwLock<ChallengeMap>,
    settings: ChallengeSettings,
    max_challenges: usize,
    challenge_ttl: Duration,
    verifier: VerifierClient,
    log: SharedTransparencyLog,
    /// Fallback time base when a request carries no host time
    started: Instant,
}

impl ServerState {
    /// Create new server state
    pub fn new(config: &ServerConfig) -> Result<Self, VerifyError> {
        Ok(Self {
            challenges: RwLock::new(HashMap::new()),
            settings: config.settings.clone(),
            max_challenges: config.max_challenges,
            challenge_ttl: config.challenge_ttl,
            verifier: VerifierClient::new(config.verifier.clone())?,
            log: create_shared_log(),
            started: Instant::now(),
        })
    }

    fn now_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

/// POST /challenges body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChallengeRequest {
    /// Width the host can give the track
    pub available_width_px: f64,
    pub handle_width_px: f64,
    /// Host monotonic time at render
    #[serde(default)]
    pub now_ms: Option<f64>,
}

/// POST /challenges response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeCreated {
    pub id: Uuid,
    pub geometry: TrackGeometry,
    pub interaction_delay_ms: f64,
}

/// POST /challenges/:id/inputs body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputBatch {
    pub inputs: Vec<PointerInput>,
}

/// POST /challenges/:id/reset body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetRequest {
    pub now_ms: Option<f64>,
}

/// Current view of one challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeView {
    pub id: Uuid,
    pub attempt: u64,
    pub verdict: Verdict,
    pub status: String,
    pub notices: Vec<HostNotice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<HandleFrame>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub fired_rules: Vec<RuleId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChallengeView {
    fn capture(challenge: &mut Challenge) -> Self {
        Self {
            id: challenge.id(),
            attempt: challenge.attempt(),
            verdict: challenge.verdict().clone(),
            status: challenge.status().to_string(),
            notices: challenge.take_notices(),
            frame: challenge.take_frame(),
            fired_rules: challenge
                .assessment()
                .map(|a| a.fired.clone())
                .unwrap_or_default(),
            error: challenge.last_error().map(|e| e.to_string()),
        }
    }
}

/// POST /feedback body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    pub email: String,
    pub message: String,
}

impl FeedbackSubmission {
    /// Check the submission is well formed.
    pub fn validate(&self) -> Result<(), String> {
        let email = self.email.trim();
        if email.is_empty() || email.len() > MAX_EMAIL_LEN {
            return Err("Email is required".to_string());
        }
        let valid_email = email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
            .unwrap_or(false);
        if !valid_email || email.chars().any(char::is_whitespace) {
            return Err(format!("Invalid email address '{email}'"));
        }

        let message = self.message.trim();
        if message.is_empty() {
            return Err("Message is required".to_string());
        }
        if message.chars().count() > MAX_MESSAGE_LEN {
            return Err(format!("Message is longer than {MAX_MESSAGE_LEN} characters"));
        }
        Ok(())
    }
}

/// Generic acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /stats response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub active_challenges: usize,
    #[serde(flatten)]
    pub stats: TransparencyStats,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.to_string(),
        }),
    )
}

fn not_found(id: Uuid) -> ApiError {
    api_error(
        StatusCode::NOT_FOUND,
        "UNKNOWN_CHALLENGE",
        format!("No challenge with id {id}"),
    )
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /challenges
async fn create_challenge(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<CreateChallengeRequest>,
) -> Result<Json<ChallengeCreated>, ApiError> {
    let now_ms = request.now_ms.unwrap_or_else(|| state.now_ms());

    let challenge = Challenge::generate(
        &mut rand::thread_rng(),
        request.available_width_px,
        request.handle_width_px,
        state.settings.clone(),
        now_ms,
    )
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, "CHALLENGE_ERROR", e.to_string()))?
    .with_transparency(Arc::clone(&state.log));

    let created = ChallengeCreated {
        id: challenge.id(),
        geometry: challenge.geometry(),
        interaction_delay_ms: state.settings.interaction_delay_ms,
    };

    let mut challenges = state.challenges.write().await;
    let swept = sweep_expired(&mut challenges, state.challenge_ttl);
    if swept > 0 {
        tracing::debug!("Swept {} expired challenges", swept);
    }
    if challenges.len() >= state.max_challenges {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "TOO_MANY_CHALLENGES",
            "Too many open challenges",
        ));
    }
    challenges.insert(created.id, HostedChallenge::new(challenge));
    tracing::debug!("Challenge {} created", created.id);

    Ok(Json(created))
}

/// POST /challenges/:id/inputs
///
/// Replays a batch of pointer inputs. When the batch completes a drag that
/// passes the local screen, the verifier is called without holding the
/// challenge lock and its answer is applied to the attempt it belongs to.
/// A verified challenge is dropped once its token has been handed out.
async fn push_inputs(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<Uuid>,
    Json(batch): Json<InputBatch>,
) -> Result<Json<ChallengeView>, ApiError> {
    let last_at_ms = batch.inputs.last().map(|i| i.at_ms);

    let ticket = {
        let mut challenges = state.challenges.write().await;
        let challenge = challenges
            .get_mut(&id)
            .ok_or_else(|| not_found(id))?
            .touch();

        let mut ticket = None;
        for input in &batch.inputs {
            match challenge.handle_input(input) {
                Ok(Some(ChallengeEvent::NeedsVerification(t))) => ticket = Some(t),
                Ok(_) => {}
                Err(e) => tracing::debug!("Challenge {} dropped input: {}", id, e),
            }
        }
        ticket
    };

    if let Some(ticket) = ticket {
        let result = state.verifier.verify(&ticket.payload).await;
        let now_ms = last_at_ms.unwrap_or_else(|| state.now_ms());

        let mut challenges = state.challenges.write().await;
        if let Some(hosted) = challenges.get_mut(&id) {
            hosted
                .touch()
                .resolve_verification(ticket.attempt, result, now_ms);
        }
    }

    let mut challenges = state.challenges.write().await;
    let hosted = challenges.get_mut(&id).ok_or_else(|| not_found(id))?;
    let view = ChallengeView::capture(&mut hosted.challenge);
    if view.verdict.is_verified() {
        challenges.remove(&id);
        tracing::debug!("Challenge {} verified and released", id);
    }
    Ok(Json(view))
}

/// POST /challenges/:id/reset
async fn reset_challenge(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<ChallengeView>, ApiError> {
    let now_ms = request.now_ms.unwrap_or_else(|| state.now_ms());

    let mut challenges = state.challenges.write().await;
    let challenge = challenges
        .get_mut(&id)
        .ok_or_else(|| not_found(id))?
        .touch();
    challenge.reset(now_ms);
    Ok(Json(ChallengeView::capture(challenge)))
}

/// POST /feedback
///
/// Validated and logged only; nothing is stored.
async fn feedback(
    Json(submission): Json<FeedbackSubmission>,
) -> Result<Json<StatusResponse>, ApiError> {
    submission
        .validate()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, "INVALID_FEEDBACK", e))?;

    tracing::info!(
        "Feedback received ({} characters)",
        submission.message.trim().chars().count()
    );
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}

/// GET /stats
async fn stats(State(state): State<Arc<ServerState>>) -> Json<StatsResponse> {
    let active_challenges = state.challenges.read().await.len();
    Json(StatsResponse {
        active_challenges,
        stats: state.log.stats(),
    })
}

/// Build the router over shared state.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/challenges", post(create_challenge))
        .route("/challenges/:id/inputs", post(push_inputs))
        .route("/challenges/:id/reset", post(reset_challenge))
        .route("/feedback", post(feedback))
        .route("/stats", get(stats))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(&config)?);
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("SmartCAPTCHA host listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
