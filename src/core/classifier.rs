//! Local heuristic screen run before contacting the verifier.
//!
//! The classifier derives boolean signals from a [`FeatureVector`] and the
//! session's calibration, then evaluates a fixed table of rules. A trace is
//! bot-like when any rule fires.

use crate::core::calibration::SessionConfig;
use crate::core::features::FeatureVector;
use serde::{Deserialize, Serialize};

/// Fixed cut-offs shared by every session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Completion faster than this is suspicious (seconds)
    pub fast_completion_secs: f64,
    /// Timing entropy below this is too regular
    pub regular_timing_entropy: f64,
    /// Jitter variance below this is too smooth
    pub low_jitter_variance: f64,
    /// Speed coefficient of variation below this is too constant
    pub constant_speed_cv: f64,
    /// Path/chord ratio below this is too straight.
    ///
    /// The browser widget compared in the other direction (`ratio > 1.02`),
    /// so verdicts on nearly straight drags differ from it.
    pub straightness_ratio_max: f64,
    /// Deviation spread below this follows the shape too perfectly (px)
    pub shape_perfect_std_px: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            fast_completion_secs: 0.25,
            regular_timing_entropy: 0.04,
            low_jitter_variance: 0.15,
            constant_speed_cv: 0.02,
            straightness_ratio_max: 1.02,
            shape_perfect_std_px: 0.65,
        }
    }
}

/// Boolean signals derived from one feature vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signals {
    pub fast: bool,
    pub regular_timing: bool,
    pub low_jitter: bool,
    pub constant_speed: bool,
    pub too_straight: bool,
    pub too_flat: bool,
    pub low_entropy: bool,
    pub flat_dy: bool,
    pub few_turns: bool,
    pub low_angle_change: bool,
    pub shape_mismatch: bool,
    pub shape_too_perfect: bool,
    /// Outcome of the session's pattern variant
    pub variant_flag: bool,
}

impl Signals {
    pub fn derive(features: &FeatureVector, config: &SessionConfig, thresholds: &Thresholds) -> Self {
        let p = &features.public;
        let i = &features.internal;

        let tct = p.task_completion_time;
        let too_flat = i.y_span_px <= config.drift_min_span_px
            && i.y_micro_dev_ratio <= config.micro_dev_ratio_min;
        let low_entropy =
            p.mouse_path_entropy >= 0.0 && p.mouse_path_entropy < config.entropy_min;
        let flat_dy = i.flat_dy_ratio >= config.flat_dy_ratio_min;
        let few_turns = i.dy_sign_change_count <= config.sign_change_max;
        let low_angle_change = i.angle_change_mean <= config.angle_change_min_rad;
        let shaped = !config.shape_mode.is_straight();

        let variant_flag = match config.pattern_variant {
            0 => too_flat,
            1 => too_flat && low_angle_change,
            2 => too_flat && low_entropy,
            3 => flat_dy && few_turns,
            4 => flat_dy && few_turns && low_angle_change,
            _ => flat_dy && few_turns && low_entropy,
        };

        Self {
            fast: tct > 0.0 && tct < thresholds.fast_completion_secs,
            regular_timing: p.timing_entropy < thresholds.regular_timing_entropy,
            low_jitter: p.micro_jitter_variance < thresholds.low_jitter_variance,
            constant_speed: i.speed_cv < thresholds.constant_speed_cv,
            too_straight: i.straightness_ratio > 0.0
                && i.straightness_ratio < thresholds.straightness_ratio_max,
            too_flat,
            low_entropy,
            flat_dy,
            few_turns,
            low_angle_change,
            shape_mismatch: shaped && i.path_deviation_mean_px > config.shape_tolerance_px,
            shape_too_perfect: shaped && i.path_deviation_std_px < thresholds.shape_perfect_std_px,
            variant_flag,
        }
    }

    /// Timing looks machine-made.
    fn mechanical_timing(&self) -> bool {
        self.regular_timing || self.low_jitter
    }

    /// Motion looks machine-made.
    fn mechanical_motion(&self) -> bool {
        self.constant_speed || self.too_straight
    }
}

/// Identifier of a classifier rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    /// Scripted cadence, or a fast, regular, straight drag
    Cadence,
    /// Session pattern variant with mechanical timing and motion
    VariantPattern,
    /// Path ignores the session shape with mechanical timing and motion
    ShapeMismatch,
    /// Path follows the session shape too perfectly
    ShapeTooPerfect,
}

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::Cadence => "cadence",
            RuleId::VariantPattern => "variant_pattern",
            RuleId::ShapeMismatch => "shape_mismatch",
            RuleId::ShapeTooPerfect => "shape_too_perfect",
        }
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

type Predicate = fn(&Signals) -> bool;

const RULES: [(RuleId, Predicate); 4] = [
    (RuleId::Cadence, |s| {
        (s.regular_timing && s.low_jitter && s.constant_speed)
            || (s.fast && s.regular_timing && s.too_straight)
    }),
    (RuleId::VariantPattern, |s| {
        s.variant_flag && s.mechanical_timing() && s.mechanical_motion()
    }),
    (RuleId::ShapeMismatch, |s| {
        s.shape_mismatch && s.mechanical_timing() && s.mechanical_motion()
    }),
    (RuleId::ShapeTooPerfect, |s| {
        s.shape_too_perfect && s.flat_dy && s.mechanical_timing() && s.mechanical_motion()
    }),
];

/// Result of a local assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub bot_like: bool,
    pub fired: Vec<RuleId>,
    pub signals: Signals,
}

/// Evaluate every rule and report which fired.
pub fn assess(features: &FeatureVector, config: &SessionConfig, thresholds: &Thresholds) -> Assessment {
    let signals = Signals::derive(features, config, thresholds);
    let fired: Vec<RuleId> = RULES
        .iter()
        .filter(|(_, predicate)| predicate(&signals))
        .map(|(id, _)| *id)
        .collect();

    Assessment {
        bot_like: !fired.is_empty(),
        fired,
        signals,
    }
}

/// Whether the trace should be rejected without contacting the verifier.
pub fn looks_bot_like(features: &FeatureVector, config: &SessionConfig, thresholds: &Thresholds) -> bool {
    assess(features, config, thresholds).bot_like
}
