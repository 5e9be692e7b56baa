//! Feature extraction from a finished drag trace.
//!
//! Only `move` samples contribute to motion statistics. Consecutive samples
//! with a non-positive time delta are skipped as segments. Every division goes
//! through [`safe_divide`] and every output is forced finite, so no NaN or
//! infinity reaches the classifier or the verification payload.

use crate::core::calibration::SessionConfig;
use crate::core::session::{Event, Session};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::f64::consts::PI;

/// Minimum number of motion samples needed to describe a drag.
pub const MIN_MOVE_EVENTS: usize = 3;

/// Gaps longer than this count toward idle time (in milliseconds).
pub const IDLE_GAP_THRESHOLD_MS: f64 = 120.0;

/// Gaps inside this range are counted as micro-pauses (in milliseconds).
const MICRO_PAUSE_MIN_MS: f64 = 80.0;
const MICRO_PAUSE_MAX_MS: f64 = 240.0;

/// Vertical steps at least this large count as micro y-moves (in pixels).
const MICRO_Y_MOVE_PX: f64 = 0.35;

const DIRECTION_BINS: usize = 12;
const TIMING_BINS: usize = 10;

/// Features sent to the remote verifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicFeatures {
    /// Path distance over elapsed time (px/s)
    pub avg_mouse_speed: f64,
    /// Normalized entropy of segment directions (0-1)
    pub mouse_path_entropy: f64,
    /// Seconds from widget shown to first arm
    pub click_delay: f64,
    /// Seconds from first arm to release
    pub task_completion_time: f64,
    /// Seconds spent in gaps longer than the idle threshold
    pub idle_time: f64,
    /// Sample variance of dx plus sample variance of dy
    pub micro_jitter_variance: f64,
    /// Mean absolute change of segment speed per second
    pub acceleration_curve: f64,
    /// Variance of turn angle per pixel
    pub curvature_variance: f64,
    /// Backward over forward horizontal travel
    pub overshoot_correction_ratio: f64,
    /// Normalized entropy of inter-sample delays (0-1)
    pub timing_entropy: f64,
}

/// Features used only by the local classifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InternalFeatures {
    pub micro_pause_ratio: f64,
    /// Coefficient of variation of segment speed
    pub speed_cv: f64,
    /// Path length over net displacement (1.0 for a perfect line)
    pub straightness_ratio: f64,
    pub y_span_px: f64,
    pub y_micro_dev_ratio: f64,
    pub y_abs_dy_mean: f64,
    pub y_within_tol_ratio: f64,
    pub angle_change_mean: f64,
    pub flat_dy_ratio: f64,
    pub dy_sign_change_count: u32,
    /// Mean absolute deviation from the expected path shape
    pub path_deviation_mean_px: f64,
    pub path_deviation_std_px: f64,
}

/// All features derived from one trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub public: PublicFeatures,
    pub internal: InternalFeatures,
}

impl FeatureVector {
    /// Look up a feature by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        let p = &self.public;
        let i = &self.internal;
        let value = match name {
            "avg_mouse_speed" => p.avg_mouse_speed,
            "mouse_path_entropy" => p.mouse_path_entropy,
            "click_delay" => p.click_delay,
            "task_completion_time" => p.task_completion_time,
            "idle_time" => p.idle_time,
            "micro_jitter_variance" => p.micro_jitter_variance,
            "acceleration_curve" => p.acceleration_curve,
            "curvature_variance" => p.curvature_variance,
            "overshoot_correction_ratio" => p.overshoot_correction_ratio,
            "timing_entropy" => p.timing_entropy,
            "micro_pause_ratio" => i.micro_pause_ratio,
            "speed_cv" => i.speed_cv,
            "straightness_ratio" => i.straightness_ratio,
            "y_span_px" => i.y_span_px,
            "y_micro_dev_ratio" => i.y_micro_dev_ratio,
            "y_abs_dy_mean" => i.y_abs_dy_mean,
            "y_within_tol_ratio" => i.y_within_tol_ratio,
            "angle_change_mean" => i.angle_change_mean,
            "flat_dy_ratio" => i.flat_dy_ratio,
            "dy_sign_change_count" => f64::from(i.dy_sign_change_count),
            "path_deviation_mean_px" => i.path_deviation_mean_px,
            "path_deviation_std_px" => i.path_deviation_std_px,
            _ => return None,
        };
        Some(value)
    }

    /// Replace any non-finite value with 0.
    fn sanitized(mut self) -> Self {
        let p = &mut self.public;
        for v in [
            &mut p.avg_mouse_speed,
            &mut p.mouse_path_entropy,
            &mut p.click_delay,
            &mut p.task_completion_time,
            &mut p.idle_time,
            &mut p.micro_jitter_variance,
            &mut p.acceleration_curve,
            &mut p.curvature_variance,
            &mut p.overshoot_correction_ratio,
            &mut p.timing_entropy,
        ] {
            *v = finite_or_zero(*v);
        }
        let i = &mut self.internal;
        for v in [
            &mut i.micro_pause_ratio,
            &mut i.speed_cv,
            &mut i.straightness_ratio,
            &mut i.y_span_px,
            &mut i.y_micro_dev_ratio,
            &mut i.y_abs_dy_mean,
            &mut i.y_within_tol_ratio,
            &mut i.angle_change_mean,
            &mut i.flat_dy_ratio,
            &mut i.path_deviation_mean_px,
            &mut i.path_deviation_std_px,
        ] {
            *v = finite_or_zero(*v);
        }
        self
    }
}

/// Feature extraction errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// Fewer than [`MIN_MOVE_EVENTS`] motion samples
    InsufficientData { moves: usize },
}

impl std::fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionError::InsufficientData { moves } => write!(
                f,
                "Not enough movement data: {moves} motion samples, need {MIN_MOVE_EVENTS}"
            ),
        }
    }
}

impl std::error::Error for ExtractionError {}

/// Motion between two consecutive samples.
#[derive(Debug, Clone, Copy)]
struct Segment {
    dx: f64,
    dy: f64,
    dt_ms: f64,
    distance: f64,
    speed: f64,
    angle: f64,
    end_y: f64,
}

impl Segment {
    fn between(a: &Event, b: &Event) -> Option<Self> {
        let dt_ms = b.t_ms - a.t_ms;
        if !dt_ms.is_finite() || dt_ms <= 0.0 {
            return None;
        }
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let distance = dx.hypot(dy);
        Some(Self {
            dx,
            dy,
            dt_ms,
            distance,
            speed: distance / (dt_ms / 1000.0),
            angle: dy.atan2(dx),
            end_y: b.y,
        })
    }
}

/// Compute the feature vector for a finished trace.
pub fn extract_features(
    session: &Session,
    config: &SessionConfig,
) -> Result<FeatureVector, ExtractionError> {
    let moves: Vec<&Event> = session.move_events().collect();
    if moves.len() < MIN_MOVE_EVENTS {
        return Err(ExtractionError::InsufficientData { moves: moves.len() });
    }

    let started = session.interaction_started_at_ms.unwrap_or(0.0);
    let ended = session.interaction_ended_at_ms.unwrap_or(0.0);
    let click_delay = safe_divide(started - session.widget_shown_at_ms, 1000.0);
    let task_completion_time = safe_divide(ended - started, 1000.0);

    let segments: Vec<Segment> = moves
        .windows(2)
        .filter_map(|pair| Segment::between(pair[0], pair[1]))
        .collect();
    let segment_count = segments.len() as f64;

    let dxs: Vec<f64> = segments.iter().map(|s| s.dx).collect();
    let dys: Vec<f64> = segments.iter().map(|s| s.dy).collect();
    let speeds: Vec<f64> = segments.iter().map(|s| s.speed).collect();
    let angles: Vec<f64> = segments.iter().map(|s| s.angle).collect();

    let total_distance: f64 = segments.iter().map(|s| s.distance).sum();
    let total_time_ms: f64 = segments.iter().map(|s| s.dt_ms).sum();
    let avg_mouse_speed = safe_divide(total_distance, total_time_ms / 1000.0);

    // Raw gaps between consecutive samples, including skipped segments.
    let gaps: Vec<f64> = moves.windows(2).map(|p| p[1].t_ms - p[0].t_ms).collect();
    let idle_time_ms: f64 = gaps.iter().filter(|&&g| g > IDLE_GAP_THRESHOLD_MS).sum();
    let micro_pause_count = gaps
        .iter()
        .filter(|&&g| (MICRO_PAUSE_MIN_MS..=MICRO_PAUSE_MAX_MS).contains(&g))
        .count();

    let direction_counts = histogram(
        angles.iter().map(|a| (a + PI) / (2.0 * PI)),
        DIRECTION_BINS,
    );
    let mouse_path_entropy = normalized_entropy(&direction_counts);

    let micro_jitter_variance = sample_variance(&dxs) + sample_variance(&dys);

    let speed_cv = safe_divide(sample_variance(&speeds).sqrt(), mean(&speeds));

    let accelerations: Vec<f64> = segments
        .windows(2)
        .filter_map(|pair| {
            let dt_s = pair[1].dt_ms / 1000.0;
            (dt_s.is_finite() && dt_s > 0.0).then(|| ((pair[1].speed - pair[0].speed) / dt_s).abs())
        })
        .collect();
    let acceleration_curve = mean(&accelerations);

    let turns: Vec<f64> = angles
        .windows(2)
        .map(|pair| wrap_angle(pair[1] - pair[0]).abs())
        .collect();
    let angle_change_mean = safe_divide(turns.iter().sum(), (turns.len().max(1)) as f64);

    let curvatures: Vec<f64> = turns
        .iter()
        .zip(segments.iter().skip(1))
        .filter(|(_, seg)| seg.distance > 0.0)
        .map(|(turn, seg)| turn / seg.distance)
        .collect();
    let curvature_variance = sample_variance(&curvatures);

    let (forward, backward) = dxs.iter().fold((0.0, 0.0), |(fwd, back), &dx| {
        if dx >= 0.0 {
            (fwd + dx, back)
        } else {
            (fwd, back + dx.abs())
        }
    });
    let overshoot_correction_ratio = safe_divide(backward, forward);

    let timing_entropy = timing_entropy(&segments);

    // Vertical drift relative to the first motion sample.
    let y0 = moves[0].y;
    let (y_min, y_max) = segments
        .iter()
        .fold((y0, y0), |(lo, hi), s| (lo.min(s.end_y), hi.max(s.end_y)));
    let y_within_tol = segments
        .iter()
        .filter(|s| (s.end_y - y0).abs() <= config.drift_tol_px)
        .count();
    let micro_y_moves = dys.iter().filter(|dy| dy.abs() >= MICRO_Y_MOVE_PX).count();
    let abs_dy_sum: f64 = dys.iter().map(|dy| dy.abs()).sum();

    let flat_dy_count = dys
        .iter()
        .filter(|dy| dy.abs() < config.flat_dy_eps_px)
        .count();
    let dy_signs: Vec<bool> = dys
        .iter()
        .filter(|dy| dy.abs() >= config.flat_dy_eps_px)
        .map(|dy| *dy > 0.0)
        .collect();
    let dy_sign_change_count = dy_signs.windows(2).filter(|p| p[0] != p[1]).count() as u32;

    let (path_deviation_mean_px, path_deviation_std_px) = path_deviation(&moves, config);

    let (dx_sum, dy_sum) = (dxs.iter().sum::<f64>(), dys.iter().sum::<f64>());

    let features = FeatureVector {
        public: PublicFeatures {
            avg_mouse_speed,
            mouse_path_entropy,
            click_delay,
            task_completion_time,
            idle_time: idle_time_ms / 1000.0,
            micro_jitter_variance,
            acceleration_curve,
            curvature_variance,
            overshoot_correction_ratio,
            timing_entropy,
        },
        internal: InternalFeatures {
            micro_pause_ratio: safe_divide(micro_pause_count as f64, segment_count),
            speed_cv,
            straightness_ratio: safe_divide(total_distance, dx_sum.hypot(dy_sum)),
            y_span_px: y_max - y_min,
            y_micro_dev_ratio: safe_divide(micro_y_moves as f64, segment_count),
            y_abs_dy_mean: safe_divide(abs_dy_sum, segment_count),
            y_within_tol_ratio: safe_divide(
                y_within_tol as f64,
                (moves.len() - 1).max(1) as f64,
            ),
            angle_change_mean,
            flat_dy_ratio: safe_divide(flat_dy_count as f64, segment_count.max(1.0)),
            dy_sign_change_count,
            path_deviation_mean_px,
            path_deviation_std_px,
        },
    };

    Ok(features.sanitized())
}

/// Mean and standard deviation of the absolute distance between each sample
/// and the expected path, projected over normalized x-progress.
fn path_deviation(moves: &[&Event], config: &SessionConfig) -> (f64, f64) {
    let y0 = moves[0].y;
    let (x_min, x_max) = moves
        .iter()
        .fold((moves[0].x, moves[0].x), |(lo, hi), e| (lo.min(e.x), hi.max(e.x)));
    let x_span = (x_max - x_min).max(1.0);

    let deviations: Vec<f64> = moves
        .iter()
        .map(|e| {
            let progress = safe_divide(e.x - x_min, x_span).clamp(0.0, 1.0);
            let expected_y =
                y0 + config.shape_mode.expected_offset(progress, config.shape_y_offset_px);
            (e.y - expected_y).abs()
        })
        .collect();

    let count = deviations.len() as f64;
    let dev_mean = safe_divide(deviations.iter().sum(), count);
    let mean_sq = safe_divide(deviations.iter().map(|d| d * d).sum(), count);
    let dev_std = (mean_sq - dev_mean * dev_mean).max(0.0).sqrt();
    (dev_mean, dev_std)
}

/// Normalized entropy of segment delays over equal bins on [min, max].
fn timing_entropy(segments: &[Segment]) -> f64 {
    let delays: Vec<f64> = segments
        .iter()
        .map(|s| s.dt_ms)
        .filter(|dt| dt.is_finite() && *dt > 0.0)
        .collect();
    if delays.is_empty() {
        return 0.0;
    }

    let min = delays.iter().copied().fold(f64::INFINITY, f64::min);
    let max = delays.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    let counts = histogram(
        delays
            .iter()
            .map(|dt| if range > 0.0 { (dt - min) / range } else { 0.0 }),
        TIMING_BINS,
    );
    normalized_entropy(&counts)
}

/// Count values normalized to [0, 1] into `bins` equal bins; out-of-range
/// values land in the nearest edge bin.
fn histogram(normalized: impl Iterator<Item = f64>, bins: usize) -> Vec<usize> {
    let mut counts = vec![0usize; bins];
    if bins == 0 {
        return counts;
    }
    for value in normalized {
        // Negative and NaN casts saturate to 0.
        let idx = ((value * bins as f64).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
}

/// Division that yields 0 when the divisor is zero or either operand is
/// non-finite.
pub fn safe_divide(numerator: f64, denominator: f64) -> f64 {
    if !numerator.is_finite() || !denominator.is_finite() || denominator == 0.0 {
        return 0.0;
    }
    numerator / denominator
}

/// Shannon entropy (bits) of a count histogram, normalized by `log2(bins)`.
pub fn normalized_entropy(counts: &[usize]) -> f64 {
    let bins = counts.len();
    if bins <= 1 {
        return 0.0;
    }
    let total: usize = counts.iter().sum();
    let bits: f64 = counts
        .iter()
        .map(|&c| safe_divide(c as f64, total as f64))
        .filter(|&p| p > 0.0)
        .map(|p| -p * p.log2())
        .sum();
    safe_divide(bits, (bins as f64).log2()).clamp(0.0, 1.0)
}

/// Wrap an angle difference into (-π, π].
pub fn wrap_angle(delta: f64) -> f64 {
    delta.sin().atan2(delta.cos())
}

pub(crate) fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().mean()
}

/// Unbiased sample variance; 0 below two samples.
fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().variance()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::calibration::ShapeMode;
    use crate::core::session::EventKind;

    fn trace(points: &[(f64, f64, f64)]) -> Session {
        let mut events = vec![Event::new(EventKind::Down, points[0].0 - 10.0, 0.0, 0.0)];
        events.extend(
            points
                .iter()
                .map(|&(t, x, y)| Event::new(EventKind::Move, t, x, y)),
        );
        let last = points[points.len() - 1];
        events.push(Event::new(EventKind::Up, last.0 + 10.0, last.1, last.2));
        Session::from_parts(0.0, Some(500.0), Some(last.0 + 10.0), events)
    }

    fn straight_config() -> SessionConfig {
        SessionConfig {
            shape_mode: ShapeMode::Straight,
            ..SessionConfig::midpoint()
        }
    }

    #[test]
    fn test_insufficient_data() {
        let session = trace(&[(600.0, 0.0, 0.0), (700.0, 10.0, 0.0)]);
        let err = extract_features(&session, &straight_config()).unwrap_err();
        assert_eq!(err, ExtractionError::InsufficientData { moves: 2 });

        let empty = Session::new(0.0);
        assert!(extract_features(&empty, &straight_config()).is_err());
    }

    #[test]
    fn test_uniform_straight_drag() {
        let session = trace(&[
            (600.0, 0.0, 10.0),
            (700.0, 20.0, 10.0),
            (800.0, 40.0, 10.0),
            (900.0, 60.0, 10.0),
            (1000.0, 80.0, 10.0),
        ]);
        let f = extract_features(&session, &straight_config()).unwrap();

        assert!((f.public.avg_mouse_speed - 200.0).abs() < 1e-9);
        assert_eq!(f.public.mouse_path_entropy, 0.0);
        assert_eq!(f.public.timing_entropy, 0.0);
        assert_eq!(f.public.micro_jitter_variance, 0.0);
        assert_eq!(f.public.acceleration_curve, 0.0);
        assert_eq!(f.public.overshoot_correction_ratio, 0.0);
        assert_eq!(f.public.idle_time, 0.0);
        assert!((f.public.click_delay - 0.5).abs() < 1e-9);
        assert!((f.public.task_completion_time - 0.51).abs() < 1e-9);
        assert_eq!(f.internal.speed_cv, 0.0);
        assert!((f.internal.straightness_ratio - 1.0).abs() < 1e-9);
        assert_eq!(f.internal.y_span_px, 0.0);
        assert_eq!(f.internal.flat_dy_ratio, 1.0);
        assert_eq!(f.internal.dy_sign_change_count, 0);
        assert_eq!(f.internal.path_deviation_mean_px, 0.0);
        assert_eq!(f.internal.micro_pause_ratio, 1.0);
    }

    #[test]
    fn test_idle_time_and_overshoot() {
        let session = trace(&[
            (600.0, 0.0, 0.0),
            (650.0, 50.0, 0.0),
            (850.0, 70.0, 0.0),
            (900.0, 60.0, 0.0),
        ]);
        let f = extract_features(&session, &straight_config()).unwrap();
        assert!((f.public.idle_time - 0.2).abs() < 1e-9);
        assert!((f.public.overshoot_correction_ratio - 10.0 / 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_positive_deltas_are_skipped() {
        let session = trace(&[
            (600.0, 0.0, 0.0),
            (600.0, 5.0, 0.0),
            (700.0, 15.0, 0.0),
            (800.0, 25.0, 0.0),
        ]);
        let f = extract_features(&session, &straight_config()).unwrap();
        // Two valid segments of 10 px over 100 ms.
        assert!((f.public.avg_mouse_speed - 100.0).abs() < 1e-9);
        assert!(f.public.avg_mouse_speed.is_finite());
    }

    #[test]
    fn test_entropies_are_bounded() {
        let session = trace(&[
            (600.0, 0.0, 0.0),
            (640.0, 10.0, 8.0),
            (820.0, 20.0, -8.0),
            (910.0, 15.0, 8.0),
            (1130.0, 40.0, -8.0),
            (1160.0, 30.0, 0.0),
            (1400.0, 60.0, 5.0),
        ]);
        let f = extract_features(&session, &straight_config()).unwrap();
        for value in [f.public.mouse_path_entropy, f.public.timing_entropy] {
            assert!((0.0..=1.0).contains(&value), "entropy out of range: {value}");
        }
        assert!(f.public.timing_entropy > 0.0);
        assert!(f.internal.dy_sign_change_count >= 2);
    }

    #[test]
    fn test_upward_shape_deviation() {
        let config = SessionConfig {
            shape_mode: ShapeMode::Upward,
            shape_y_offset_px: 10.0,
            ..SessionConfig::midpoint()
        };
        // Follows the expected path exactly.
        let session = trace(&[
            (600.0, 0.0, 0.0),
            (700.0, 50.0, 5.0),
            (800.0, 100.0, 10.0),
        ]);
        let f = extract_features(&session, &config).unwrap();
        assert!(f.internal.path_deviation_mean_px < 1e-9);
        assert!(f.internal.path_deviation_std_px < 1e-9);
    }

    #[test]
    fn test_safe_divide() {
        assert_eq!(safe_divide(1.0, 0.0), 0.0);
        assert_eq!(safe_divide(f64::NAN, 2.0), 0.0);
        assert_eq!(safe_divide(2.0, f64::INFINITY), 0.0);
        assert_eq!(safe_divide(f64::INFINITY, 2.0), 0.0);
        assert_eq!(safe_divide(6.0, 3.0), 2.0);
    }

    #[test]
    fn test_normalized_entropy() {
        assert_eq!(normalized_entropy(&[5, 0, 0, 0]), 0.0);
        assert_eq!(normalized_entropy(&[0, 0, 0]), 0.0);
        assert_eq!(normalized_entropy(&[3]), 0.0);
        assert!((normalized_entropy(&[1, 1, 1, 1]) - 1.0).abs() < 1e-12);
        let half = normalized_entropy(&[1, 1, 0, 0]);
        assert!((half - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(2.0 * PI) - 0.0).abs() < 1e-12);
        assert!((wrap_angle(1.5 * PI) + 0.5 * PI).abs() < 1e-12);
        assert!(wrap_angle(PI) > 0.0);
    }

    #[test]
    fn test_lookup_by_name() {
        let f = FeatureVector {
            public: PublicFeatures {
                idle_time: 1.5,
                ..Default::default()
            },
            internal: InternalFeatures {
                dy_sign_change_count: 3,
                ..Default::default()
            },
        };
        assert_eq!(f.get("idle_time"), Some(1.5));
        assert_eq!(f.get("dy_sign_change_count"), Some(3.0));
        assert_eq!(f.get("unknown"), None);
    }

    #[test]
    fn test_non_finite_inputs_never_leak() {
        let session = trace(&[
            (600.0, 0.0, 0.0),
            (700.0, f64::INFINITY, 0.0),
            (800.0, 20.0, f64::NAN),
            (900.0, 30.0, 0.0),
        ]);
        let f = extract_features(&session, &straight_config()).unwrap();
        let json = serde_json::to_value(&f).unwrap();
        for section in ["public", "internal"] {
            for (name, value) in json[section].as_object().unwrap() {
                assert!(value.as_f64().unwrap().is_finite(), "{name} is not finite");
            }
        }
    }
}
