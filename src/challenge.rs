//! Per-widget challenge orchestration.
//!
//! A [`Challenge`] owns one widget's calibration, recorder and verdict. It
//! turns a complete drag into a local decision or a [`VerificationTicket`],
//! applies the verifier's answer, and schedules the short delayed reset that
//! follows any failure. Like the recorder it is host-driven: timers fire from
//! [`Challenge::advance`] and the verifier call is made by the host.

use crate::collector::{InputFeed, PointerInput};
use crate::core::{
    assess, extract_features, Assessment, ClockError, DragOutcome, ExtractionError,
    FeatureVector, HandleFrame, Recorder, RecorderError, RuleId, Session, SessionClock,
    SessionConfig, StepBounds, Thresholds, TimingNoiseSequence, TrackGeometry, Transition,
    VerifyPayload, DEFAULT_NOISE_LEN,
};
use crate::transparency::SharedTransparencyLog;
use crate::verifier::{VerifyError, VerifyResponse};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const STATUS_VERIFYING: &str = "Verifying...";
pub const STATUS_VERIFIED: &str = "Verified: Human";
pub const STATUS_FAILED: &str = "Verification failed. Try again.";
pub const STATUS_RETRY: &str = "Try again.";
pub const STATUS_NO_DATA: &str =
    "Slider completed, but not enough movement data to compute features.";

/// Tunables shared by every challenge a host creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeSettings {
    /// Delay between press and the start of recording (ms)
    pub interaction_delay_ms: f64,
    /// Delay before a failed attempt re-renders (ms)
    pub reset_delay_ms: f64,
    pub step_bounds: StepBounds,
    pub thresholds: Thresholds,
    pub noise_len: usize,
}

impl Default for ChallengeSettings {
    fn default() -> Self {
        Self {
            interaction_delay_ms: 0.0,
            reset_delay_ms: 250.0,
            step_bounds: StepBounds::default(),
            thresholds: Thresholds::default(),
            noise_len: DEFAULT_NOISE_LEN,
        }
    }
}

/// Outcome of the current attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Verdict {
    Unresolved,
    LocalReject,
    Verifying,
    Verified { token: String },
    RemoteReject,
    Error { message: String },
}

impl Verdict {
    pub fn status_line(&self) -> String {
        match self {
            Verdict::Unresolved => String::new(),
            Verdict::LocalReject | Verdict::RemoteReject => STATUS_FAILED.to_string(),
            Verdict::Verifying => STATUS_VERIFYING.to_string(),
            Verdict::Verified { .. } => STATUS_VERIFIED.to_string(),
            Verdict::Error { message } => format!("Verification error: {message}"),
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Verdict::Verified { .. })
    }
}

/// Why an attempt did not verify. None of these is fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptError {
    InsufficientData { moves: usize },
    LocalRejection { rules: Vec<RuleId> },
    RemoteRejection { decision: String },
    TransportError(String),
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptError::InsufficientData { moves } => {
                write!(f, "Not enough movement data ({moves} motion samples)")
            }
            AttemptError::LocalRejection { rules } => {
                let rules: Vec<&str> = rules.iter().map(|r| r.as_str()).collect();
                write!(f, "Rejected locally by {}", rules.join(", "))
            }
            AttemptError::RemoteRejection { decision } => {
                write!(f, "Verifier decided '{decision}'")
            }
            AttemptError::TransportError(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for AttemptError {}

/// One-way notification for the embedding host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostNotice {
    Verified { token: String },
    Failed,
}

/// Payload the host must send to the verifier, tagged with the attempt it
/// belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationTicket {
    pub attempt: u64,
    pub payload: VerifyPayload,
}

/// What a settled drag produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ChallengeEvent {
    /// Released short; features are computed for telemetry only
    Incomplete { features: Option<FeatureVector> },
    /// Complete but too little motion to score
    Indeterminate(AttemptError),
    LocalReject(AttemptError),
    NeedsVerification(VerificationTicket),
}

/// One rendered slider widget.
#[derive(Debug)]
pub struct Challenge {
    id: Uuid,
    config: Arc<SessionConfig>,
    settings: ChallengeSettings,
    recorder: Recorder,
    verdict: Verdict,
    status: String,
    attempt: u64,
    pending_reset_at_ms: Option<f64>,
    notices: Vec<HostNotice>,
    features: Option<FeatureVector>,
    assessment: Option<Assessment>,
    last_error: Option<AttemptError>,
    log: Option<SharedTransparencyLog>,
}

impl Challenge {
    /// Create a challenge from an explicit calibration and noise sequence.
    pub fn new(
        config: SessionConfig,
        noise: TimingNoiseSequence,
        geometry: TrackGeometry,
        settings: ChallengeSettings,
        now_ms: f64,
    ) -> Self {
        let config = Arc::new(config);
        let clock = SessionClock::new(Arc::new(noise), settings.step_bounds, now_ms);
        let recorder = Recorder::new(
            Arc::clone(&config),
            clock,
            geometry,
            settings.interaction_delay_ms,
            now_ms,
        );

        Self {
            id: Uuid::new_v4(),
            config,
            settings,
            recorder,
            verdict: Verdict::Unresolved,
            status: String::new(),
            attempt: 0,
            pending_reset_at_ms: None,
            notices: Vec::new(),
            features: None,
            assessment: None,
            last_error: None,
            log: None,
        }
    }

    /// Draw a fresh calibration and noise sequence and lay out the track for
    /// the host's available width.
    pub fn generate<R: Rng + ?Sized>(
        rng: &mut R,
        available_width_px: f64,
        handle_width_px: f64,
        settings: ChallengeSettings,
        now_ms: f64,
    ) -> Result<Self, ClockError> {
        let config = SessionConfig::generate(rng);
        let noise = config.noise_sequence(rng, settings.noise_len);
        if noise.is_empty() {
            return Err(ClockError::InvalidNoiseLength(0));
        }
        let geometry = config.geometry(available_width_px, handle_width_px);
        Ok(Self::new(config, noise, geometry, settings, now_ms))
    }

    /// Attach a transparency log.
    pub fn with_transparency(mut self, log: SharedTransparencyLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Feed one pointer input at its own host time.
    pub fn handle_input(
        &mut self,
        input: &PointerInput,
    ) -> Result<Option<ChallengeEvent>, RecorderError> {
        self.advance(input.at_ms);
        if let Some(log) = &self.log {
            log.record_input();
        }

        let transition = self.recorder.handle(input)?;
        Ok(self.on_transition(transition, input.at_ms))
    }

    /// Drain every queued input from `feed`.
    pub fn pump(&mut self, feed: &InputFeed) -> Vec<ChallengeEvent> {
        let mut events = Vec::new();
        for input in feed.drain() {
            match self.handle_input(&input) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => tracing::debug!("Input dropped: {}", e),
            }
        }
        events
    }

    /// Fire timers due at `now_ms`: the deferred arm and the delayed reset.
    pub fn advance(&mut self, now_ms: f64) {
        if let Some(reset_at) = self.pending_reset_at_ms {
            if now_ms >= reset_at {
                let status = match &self.verdict {
                    Verdict::Error { .. } => self.status.clone(),
                    _ => STATUS_RETRY.to_string(),
                };
                self.reset(now_ms);
                self.status = status;
            }
        }

        if let Some(transition) = self.recorder.advance(now_ms) {
            self.on_transition(transition, now_ms);
        }
    }

    fn on_transition(&mut self, transition: Transition, now_ms: f64) -> Option<ChallengeEvent> {
        match transition {
            Transition::Began => {
                self.status.clear();
                None
            }
            Transition::Settled(DragOutcome::Complete) => Some(self.settle(now_ms)),
            Transition::Settled(DragOutcome::Incomplete { trace }) => {
                self.status = STATUS_RETRY.to_string();
                let features = extract_features(&trace, &self.config).ok();
                Some(ChallengeEvent::Incomplete { features })
            }
            _ => None,
        }
    }

    /// Score a complete drag.
    fn settle(&mut self, now_ms: f64) -> ChallengeEvent {
        if let Some(log) = &self.log {
            log.record_attempt_completed();
        }

        let features = match extract_features(self.recorder.session(), &self.config) {
            Ok(features) => features,
            Err(ExtractionError::InsufficientData { moves }) => {
                tracing::info!("Challenge {} completed with {} motion samples", self.id, moves);
                if let Some(log) = &self.log {
                    log.record_insufficient_data();
                }
                let error = AttemptError::InsufficientData { moves };
                self.status = STATUS_NO_DATA.to_string();
                self.last_error = Some(error.clone());
                self.schedule_reset(now_ms);
                return ChallengeEvent::Indeterminate(error);
            }
        };

        let assessment = assess(&features, &self.config, &self.settings.thresholds);
        let payload = VerifyPayload::from_features(&features.public);
        self.features = Some(features);

        if assessment.bot_like {
            tracing::info!(
                "Challenge {} rejected locally: {:?}",
                self.id,
                assessment.fired
            );
            if let Some(log) = &self.log {
                log.record_local_rejection();
            }
            let error = AttemptError::LocalRejection {
                rules: assessment.fired.clone(),
            };
            self.assessment = Some(assessment);
            self.verdict = Verdict::LocalReject;
            self.status = STATUS_FAILED.to_string();
            self.notices.push(HostNotice::Failed);
            self.last_error = Some(error.clone());
            self.schedule_reset(now_ms);
            return ChallengeEvent::LocalReject(error);
        }

        if let Some(log) = &self.log {
            log.record_verification_request();
        }
        self.assessment = Some(assessment);
        self.verdict = Verdict::Verifying;
        self.status = STATUS_VERIFYING.to_string();
        ChallengeEvent::NeedsVerification(VerificationTicket {
            attempt: self.attempt,
            payload,
        })
    }

    /// Apply the verifier's answer. Returns `false` when the answer is stale
    /// or the challenge is not waiting for one.
    pub fn resolve_verification(
        &mut self,
        attempt: u64,
        result: Result<VerifyResponse, VerifyError>,
        now_ms: f64,
    ) -> bool {
        if attempt != self.attempt || self.verdict != Verdict::Verifying {
            tracing::debug!(
                "Ignoring verifier answer for attempt {} (current {}, {:?})",
                attempt,
                self.attempt,
                self.verdict
            );
            return false;
        }

        match result {
            Ok(response) if response.is_human() => {
                let token = Uuid::new_v4().simple().to_string();
                tracing::info!("Challenge {} verified", self.id);
                if let Some(log) = &self.log {
                    log.record_verified();
                }
                self.notices.push(HostNotice::Verified {
                    token: token.clone(),
                });
                self.verdict = Verdict::Verified { token };
                self.last_error = None;
            }
            Ok(response) => {
                tracing::info!("Challenge {} rejected by verifier: {}", self.id, response);
                if let Some(log) = &self.log {
                    log.record_remote_rejection();
                }
                self.notices.push(HostNotice::Failed);
                self.verdict = Verdict::RemoteReject;
                self.last_error = Some(AttemptError::RemoteRejection {
                    decision: response.decision().to_string(),
                });
                self.schedule_reset(now_ms);
            }
            Err(e) => {
                tracing::warn!("Verification failed for challenge {}: {}", self.id, e);
                if let Some(log) = &self.log {
                    log.record_transport_error();
                }
                self.verdict = Verdict::Error {
                    message: e.to_string(),
                };
                self.last_error = Some(AttemptError::TransportError(e.to_string()));
                self.schedule_reset(now_ms);
            }
        }
        self.status = self.verdict.status_line();
        true
    }

    fn schedule_reset(&mut self, now_ms: f64) {
        self.pending_reset_at_ms = Some(now_ms + self.settings.reset_delay_ms.max(0.0));
    }

    /// Discard the session and start a new attempt. Pending timers are
    /// cleared and answers for earlier attempts are ignored from now on.
    pub fn reset(&mut self, now_ms: f64) {
        self.recorder.reset(now_ms);
        self.verdict = Verdict::Unresolved;
        self.status.clear();
        self.attempt += 1;
        self.pending_reset_at_ms = None;
        self.features = None;
        self.assessment = None;
        self.last_error = None;
        tracing::debug!("Challenge {} reset to attempt {}", self.id, self.attempt);
    }

    /// Take the notifications raised since the last call.
    pub fn take_notices(&mut self) -> Vec<HostNotice> {
        std::mem::take(&mut self.notices)
    }

    /// Take the pending handle redraw, if any.
    pub fn take_frame(&mut self) -> Option<HandleFrame> {
        self.recorder.take_frame()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn features(&self) -> Option<&FeatureVector> {
        self.features.as_ref()
    }

    pub fn assessment(&self) -> Option<&Assessment> {
        self.assessment.as_ref()
    }

    pub fn last_error(&self) -> Option<&AttemptError> {
        self.last_error.as_ref()
    }

    pub fn pending_reset_at(&self) -> Option<f64> {
        self.pending_reset_at_ms
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn settings(&self) -> &ChallengeSettings {
        &self.settings
    }

    pub fn geometry(&self) -> TrackGeometry {
        self.recorder.geometry()
    }

    pub fn session(&self) -> &Session {
        self.recorder.session()
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }
}
