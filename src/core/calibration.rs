//! Per-load challenge calibration.
//!
//! A [`SessionConfig`] is drawn once when a widget is created and never
//! mutated afterwards. It moves the classifier's decision boundary between
//! sessions so a scripted drag tuned against one session does not transfer.

use crate::core::clock::TimingNoiseSequence;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Gap kept between the handle's right edge and the track end.
pub const HANDLE_GUTTER_PX: f64 = 6.0;

/// Expected vertical shape of a drag along the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeMode {
    Straight,
    Upward,
    Downward,
    Curve,
}

impl ShapeMode {
    pub const ALL: [ShapeMode; 4] = [
        ShapeMode::Straight,
        ShapeMode::Upward,
        ShapeMode::Downward,
        ShapeMode::Curve,
    ];

    /// Expected y offset from the first sample at `progress` (0..=1) along x.
    pub fn expected_offset(self, progress: f64, offset_px: f64) -> f64 {
        match self {
            ShapeMode::Straight => 0.0,
            ShapeMode::Upward => progress * offset_px,
            ShapeMode::Downward => -progress * offset_px,
            ShapeMode::Curve => (progress * std::f64::consts::PI).sin() * offset_px,
        }
    }

    pub fn is_straight(self) -> bool {
        self == ShapeMode::Straight
    }
}

/// Randomized calibration for one challenge instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Uniform draw in [0, 1] selecting the track width between min and max
    pub track_width_u: f64,
    pub track_width_min_px: f64,
    pub track_width_max_px_cap: f64,
    /// Hidden logical offset subtracted from the handle position on release
    pub start_bias_px: f64,
    /// Fraction of the movable range that counts as complete
    pub completion_factor: f64,
    pub drift_tol_px: f64,
    pub drift_min_span_px: f64,
    pub micro_dev_ratio_min: f64,
    pub angle_change_min_rad: f64,
    pub entropy_min: f64,
    pub flat_dy_eps_px: f64,
    pub sign_change_max: u32,
    pub flat_dy_ratio_min: f64,
    /// Selects which flat/turn-count signals participate (0..=5)
    pub pattern_variant: u8,
    pub shape_mode: ShapeMode,
    pub shape_y_offset_px: f64,
    pub shape_tolerance_px: f64,
    pub timing_noise_min_ms: u32,
    pub timing_noise_max_ms: u32,
}

impl SessionConfig {
    /// Draw a fresh calibration.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let bias_sign = if rng.gen_bool(0.5) { -1.0 } else { 1.0 };

        Self {
            track_width_u: rng.gen_range(0.0..=1.0),
            track_width_min_px: 300.0,
            track_width_max_px_cap: 700.0,
            start_bias_px: bias_sign * f64::from(rng.gen_range(5u32..=15)),
            completion_factor: rng.gen_range(0.90..0.99),
            drift_tol_px: rng.gen_range(6.0..10.0),
            drift_min_span_px: rng.gen_range(0.8..1.8),
            micro_dev_ratio_min: rng.gen_range(0.02..0.06),
            angle_change_min_rad: rng.gen_range(0.0015..0.0065),
            entropy_min: rng.gen_range(0.015..0.055),
            flat_dy_eps_px: rng.gen_range(0.12..0.42),
            sign_change_max: rng.gen_range(0..=1),
            flat_dy_ratio_min: rng.gen_range(0.85..0.97),
            pattern_variant: rng.gen_range(0..=5),
            shape_mode: *ShapeMode::ALL
                .choose(rng)
                .unwrap_or(&ShapeMode::Straight),
            shape_y_offset_px: rng.gen_range(6.0..12.0),
            shape_tolerance_px: rng.gen_range(8.0..14.0),
            timing_noise_min_ms: 40,
            timing_noise_max_ms: 120,
        }
    }

    /// Centre of every calibration range, straight shape, variant 0.
    ///
    /// Used for offline replay where no per-load draw exists.
    pub fn midpoint() -> Self {
        Self {
            track_width_u: 0.5,
            track_width_min_px: 300.0,
            track_width_max_px_cap: 700.0,
            start_bias_px: 10.0,
            completion_factor: 0.945,
            drift_tol_px: 8.0,
            drift_min_span_px: 1.3,
            micro_dev_ratio_min: 0.04,
            angle_change_min_rad: 0.004,
            entropy_min: 0.035,
            flat_dy_eps_px: 0.27,
            sign_change_max: 1,
            flat_dy_ratio_min: 0.91,
            pattern_variant: 0,
            shape_mode: ShapeMode::Straight,
            shape_y_offset_px: 9.0,
            shape_tolerance_px: 11.0,
            timing_noise_min_ms: 40,
            timing_noise_max_ms: 120,
        }
    }

    /// Final track width for the space the host has available, or `None`
    /// when the host could not measure it.
    pub fn track_width(&self, available_px: f64) -> Option<f64> {
        if !available_px.is_finite() || available_px <= 0.0 {
            return None;
        }
        let max_w = available_px.min(self.track_width_max_px_cap);
        let min_w = max_w.min(self.track_width_min_px);
        Some((min_w + self.track_width_u * (max_w - min_w)).round())
    }

    /// Track geometry for a handle of `handle_width_px`.
    pub fn geometry(&self, available_px: f64, handle_width_px: f64) -> TrackGeometry {
        let track_width_px = self
            .track_width(available_px)
            .unwrap_or_else(|| if available_px.is_finite() { available_px.max(0.0) } else { 0.0 });
        TrackGeometry::new(track_width_px, handle_width_px)
    }

    /// Draw the timing noise sequence for this calibration.
    pub fn noise_sequence<R: Rng + ?Sized>(&self, rng: &mut R, len: usize) -> TimingNoiseSequence {
        TimingNoiseSequence::generate(rng, len, self.timing_noise_min_ms, self.timing_noise_max_ms)
    }
}

/// Movable range of the slider handle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackGeometry {
    pub track_width_px: f64,
    pub handle_width_px: f64,
    pub min_x: f64,
    pub max_x: f64,
}

impl TrackGeometry {
    pub fn new(track_width_px: f64, handle_width_px: f64) -> Self {
        let handle_width_px = if handle_width_px.is_finite() {
            handle_width_px.max(0.0)
        } else {
            0.0
        };
        let min_x = 0.0;
        let max_x = (track_width_px - handle_width_px - HANDLE_GUTTER_PX).max(0.0).max(min_x);

        Self {
            track_width_px,
            handle_width_px,
            min_x,
            max_x,
        }
    }

    /// Clamp a handle position into the movable range.
    pub fn clamp(&self, x: f64) -> f64 {
        if !x.is_finite() {
            return self.min_x;
        }
        x.clamp(self.min_x, self.max_x)
    }
}
