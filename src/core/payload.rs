//! Verification payload sent to the remote verifier.
//!
//! Only the ten public features leave the process. Internal classifier
//! signals are never serialized here.

use crate::core::features::{finite_or_zero, PublicFeatures};
use serde::{Deserialize, Serialize};

/// Keys of the verification payload, in wire order.
pub const FEATURE_COLUMNS: [&str; 10] = [
    "avg_mouse_speed",
    "mouse_path_entropy",
    "click_delay",
    "task_completion_time",
    "idle_time",
    "micro_jitter_variance",
    "acceleration_curve",
    "curvature_variance",
    "overshoot_correction_ratio",
    "timing_entropy",
];

/// JSON body of a verification request.
///
/// Missing keys deserialize as 0 and every value is finite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyPayload {
    pub avg_mouse_speed: f64,
    pub mouse_path_entropy: f64,
    pub click_delay: f64,
    pub task_completion_time: f64,
    pub idle_time: f64,
    pub micro_jitter_variance: f64,
    pub acceleration_curve: f64,
    pub curvature_variance: f64,
    pub overshoot_correction_ratio: f64,
    pub timing_entropy: f64,
}

impl VerifyPayload {
    pub fn from_features(features: &PublicFeatures) -> Self {
        Self {
            avg_mouse_speed: finite_or_zero(features.avg_mouse_speed),
            mouse_path_entropy: finite_or_zero(features.mouse_path_entropy),
            click_delay: finite_or_zero(features.click_delay),
            task_completion_time: finite_or_zero(features.task_completion_time),
            idle_time: finite_or_zero(features.idle_time),
            micro_jitter_variance: finite_or_zero(features.micro_jitter_variance),
            acceleration_curve: finite_or_zero(features.acceleration_curve),
            curvature_variance: finite_or_zero(features.curvature_variance),
            overshoot_correction_ratio: finite_or_zero(features.overshoot_correction_ratio),
            timing_entropy: finite_or_zero(features.timing_entropy),
        }
    }

    /// Values paired with their column names, in wire order.
    pub fn columns(&self) -> [(&'static str, f64); 10] {
        [
            (FEATURE_COLUMNS[0], self.avg_mouse_speed),
            (FEATURE_COLUMNS[1], self.mouse_path_entropy),
            (FEATURE_COLUMNS[2], self.click_delay),
            (FEATURE_COLUMNS[3], self.task_completion_time),
            (FEATURE_COLUMNS[4], self.idle_time),
            (FEATURE_COLUMNS[5], self.micro_jitter_variance),
            (FEATURE_COLUMNS[6], self.acceleration_curve),
            (FEATURE_COLUMNS[7], self.curvature_variance),
            (FEATURE_COLUMNS[8], self.overshoot_correction_ratio),
            (FEATURE_COLUMNS[9], self.timing_entropy),
        ]
    }
}

impl From<&PublicFeatures> for VerifyPayload {
    fn from(features: &PublicFeatures) -> Self {
        Self::from_features(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_keys_on_the_wire() {
        let payload = VerifyPayload::default();
        let json = serde_json::to_value(&payload).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), FEATURE_COLUMNS.len());
        for key in FEATURE_COLUMNS {
            assert!(obj.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn test_non_finite_values_are_zeroed() {
        let features = PublicFeatures {
            avg_mouse_speed: f64::INFINITY,
            timing_entropy: f64::NAN,
            idle_time: 0.4,
            ..Default::default()
        };
        let payload = VerifyPayload::from(&features);
        assert_eq!(payload.avg_mouse_speed, 0.0);
        assert_eq!(payload.timing_entropy, 0.0);
        assert_eq!(payload.idle_time, 0.4);
    }

    #[test]
    fn test_missing_keys_default_to_zero() {
        let payload: VerifyPayload = serde_json::from_str(r#"{"idle_time": 1.5}"#).unwrap();
        assert_eq!(payload.idle_time, 1.5);
        assert_eq!(payload.click_delay, 0.0);
    }

    #[test]
    fn test_columns_follow_wire_order() {
        let payload = VerifyPayload {
            click_delay: 2.0,
            ..Default::default()
        };
        let columns = payload.columns();
        assert_eq!(columns[2], ("click_delay", 2.0));
        let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, FEATURE_COLUMNS);
    }
}
