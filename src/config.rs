// src/config.rs
//
// Every tunable threshold of the pipeline, with the reference values as
// defaults. A YAML file only needs to name the fields it overrides.

use crate::analysis::ego::EgoPolicy;
use crate::error::AnalysisError;
use crate::types::VehicleClasses;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub tracker: TrackerConfig,
    pub estimators: EstimatorConfig,
    pub detectors: DetectorConfig,
    pub ego: EgoConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Reject values no detector can work with.
    pub fn validate(&self) -> std::result::Result<(), AnalysisError> {
        let invalid = |msg: String| Err(AnalysisError::Config(msg));

        if self.model.class_names.is_empty() {
            return invalid("model.class_names is empty".to_string());
        }
        if self.model.input_size == 0 {
            return invalid("model.input_size must be positive".to_string());
        }
        if self.tracker.distance_threshold <= 0.0 {
            return invalid("tracker.distance_threshold must be positive".to_string());
        }

        let d = &self.detectors;
        let ratios = [
            ("signal_violation.entry_line_ratio", d.signal_violation.entry_line_ratio),
            ("prior_entry.entry_line_ratio", d.prior_entry.entry_line_ratio),
            ("crosswalk.entry_line_ratio", d.crosswalk.entry_line_ratio),
            ("crosswalk.roadway_line_ratio", d.crosswalk.roadway_line_ratio),
        ];
        for (name, ratio) in ratios {
            if !(0.0..=1.0).contains(&ratio) {
                return invalid(format!("detectors.{} must be within [0, 1], got {}", name, ratio));
            }
        }

        let samplings = [
            ("signal_violation", d.signal_violation.sampling),
            ("prior_entry", d.prior_entry.sampling),
            ("turn_duty", d.turn_duty.sampling),
            ("wrong_direction", d.wrong_direction.sampling),
            ("tailgating", d.tailgating.sampling),
            ("lane_change", d.lane_change.sampling),
            ("abrupt_maneuver", d.abrupt_maneuver.sampling),
            ("center_line", d.center_line.sampling),
            ("merge_yield", d.merge_yield.sampling),
            ("unclear_entry", d.unclear_entry.sampling),
            ("crosswalk", d.crosswalk.sampling),
            ("protection_duty", d.protection_duty.sampling),
            ("slow_duty", d.slow_duty.sampling),
            ("slow_duty.fallback", d.slow_duty.fallback_sampling),
            ("low_visibility", d.low_visibility.sampling),
            ("school_zone", d.school_zone.sampling),
        ];
        for (name, sampling) in samplings {
            if sampling.step == 0 {
                return invalid(format!("detectors.{}.sampling.step must be positive", name));
            }
        }

        Ok(())
    }
}

// ============================================================================
// MODEL
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: String,
    /// Square letterbox input size
    pub input_size: usize,
    pub input_name: String,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub use_cuda: bool,
    pub intra_threads: usize,
    /// Class index → class name, in model output order
    pub class_names: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: "models/yolov8n.onnx".to_string(),
            input_size: 640,
            input_name: "images".to_string(),
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            use_cuda: false,
            intra_threads: 4,
            class_names: COCO_CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub const COCO_CLASS_NAMES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

// ============================================================================
// TRACKER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum centroid distance (px) for a detection to continue a track
    pub distance_threshold: f32,
    /// Updates a track may go unmatched before it is dropped
    pub max_missed_frames: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 30.0,
            max_missed_frames: 15,
        }
    }
}

// ============================================================================
// ESTIMATORS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub red_light: RedLightConfig,
    /// Hough parameters for the lane-heading estimate
    pub lane_lines: HoughConfig,
    /// Hough parameters for the centerline estimate
    pub center_lines: HoughConfig,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            red_light: RedLightConfig::default(),
            lane_lines: HoughConfig::default(),
            center_lines: HoughConfig::center_line(),
        }
    }
}

/// HSV red bands. Hue in degrees [0, 360), saturation/value in [0, 255].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedLightConfig {
    pub low_band_hue_max: f32,
    pub high_band_hue_min: f32,
    pub min_saturation: f32,
    pub min_value: f32,
    /// Fraction of red pixels in the light crop above which the light is red
    pub red_ratio_threshold: f32,
}

impl Default for RedLightConfig {
    fn default() -> Self {
        Self {
            low_band_hue_max: 20.0,
            high_band_hue_min: 320.0,
            min_saturation: 70.0,
            min_value: 50.0,
            red_ratio_threshold: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HoughConfig {
    pub canny_low: f64,
    pub canny_high: f64,
    pub threshold: i32,
    pub min_line_length: f64,
    pub max_line_gap: f64,
    /// Segments steeper than this (degrees from horizontal) are discarded
    pub max_angle_deg: f32,
}

impl Default for HoughConfig {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            threshold: 100,
            min_line_length: 100.0,
            max_line_gap: 10.0,
            max_angle_deg: 45.0,
        }
    }
}

impl HoughConfig {
    pub fn center_line() -> Self {
        Self {
            min_line_length: 200.0,
            max_angle_deg: 20.0,
            ..Self::default()
        }
    }
}

// ============================================================================
// DETECTORS
// ============================================================================

/// Which frames a detector inspects: `start, start + step, ...`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sampling {
    pub start: usize,
    pub step: usize,
}

impl Sampling {
    pub const fn new(start: usize, step: usize) -> Self {
        Self { start, step }
    }

    pub fn indices(&self, len: usize) -> impl Iterator<Item = usize> {
        (self.start..len).step_by(self.step.max(1))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub signal_violation: SignalViolationConfig,
    pub prior_entry: PriorEntryConfig,
    pub turn_duty: TurnDutyConfig,
    pub wrong_direction: WrongDirectionConfig,
    pub tailgating: TailgatingConfig,
    pub lane_change: LaneChangeConfig,
    pub abrupt_maneuver: AbruptManeuverConfig,
    pub center_line: CenterLineConfig,
    pub merge_yield: MergeYieldConfig,
    pub unclear_entry: UnclearEntryConfig,
    pub crosswalk: CrosswalkConfig,
    pub protection_duty: ProtectionDutyConfig,
    pub slow_duty: SlowDutyConfig,
    pub low_visibility: LowVisibilityConfig,
    pub school_zone: SchoolZoneConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalViolationConfig {
    /// Box bottom past this fraction of frame height = entered the junction
    pub entry_line_ratio: f32,
    pub sampling: Sampling,
}

impl Default for SignalViolationConfig {
    fn default() -> Self {
        Self {
            entry_line_ratio: 0.8,
            sampling: Sampling::new(0, 1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorEntryConfig {
    /// Track centroid past this fraction of frame height = crossed the entry line
    pub entry_line_ratio: f32,
    pub sampling: Sampling,
}

impl Default for PriorEntryConfig {
    fn default() -> Self {
        Self {
            entry_line_ratio: 0.6,
            sampling: Sampling::new(0, 1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnDutyConfig {
    pub angle_threshold_deg: f32,
    pub proximity_px: f32,
    pub min_turn_frames: u32,
    pub min_close_frames: u32,
    pub sampling: Sampling,
}

impl Default for TurnDutyConfig {
    fn default() -> Self {
        Self {
            angle_threshold_deg: 40.0,
            proximity_px: 100.0,
            min_turn_frames: 3,
            min_close_frames: 3,
            sampling: Sampling::new(1, 3),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WrongDirectionConfig {
    pub angle_diff_threshold_deg: f32,
    pub sampling: Sampling,
}

impl Default for WrongDirectionConfig {
    fn default() -> Self {
        Self {
            angle_diff_threshold_deg: 120.0,
            sampling: Sampling::new(0, 3),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TailgatingConfig {
    pub min_distance_px: f32,
    pub min_close_frames: u32,
    pub sampling: Sampling,
}

impl Default for TailgatingConfig {
    fn default() -> Self {
        Self {
            min_distance_px: 50.0,
            min_close_frames: 10,
            sampling: Sampling::new(0, 3),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneChangeConfig {
    pub dx_threshold_px: f32,
    pub proximity_px: f32,
    pub min_change_frames: u32,
    pub min_close_frames: u32,
    pub sampling: Sampling,
}

impl Default for LaneChangeConfig {
    fn default() -> Self {
        Self {
            dx_threshold_px: 50.0,
            proximity_px: 80.0,
            min_change_frames: 3,
            min_close_frames: 3,
            sampling: Sampling::new(1, 3),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AbruptManeuverConfig {
    pub delta_threshold_px: f32,
    pub count_threshold: u32,
    /// Raw-frame gap required between two counted events
    pub min_frames_between: usize,
    pub sampling: Sampling,
}

impl Default for AbruptManeuverConfig {
    fn default() -> Self {
        Self {
            delta_threshold_px: 50.0,
            count_threshold: 3,
            min_frames_between: 3,
            sampling: Sampling::new(1, 3),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CenterLineConfig {
    pub sampling: Sampling,
}

impl Default for CenterLineConfig {
    fn default() -> Self {
        Self {
            sampling: Sampling::new(0, 1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeYieldConfig {
    pub merge_distance_px: f32,
    pub min_close_frames: u32,
    pub sampling: Sampling,
}

impl Default for MergeYieldConfig {
    fn default() -> Self {
        Self {
            merge_distance_px: 100.0,
            min_close_frames: 5,
            sampling: Sampling::new(1, 3),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnclearEntryConfig {
    pub dx_threshold_px: f32,
    pub proximity_px: f32,
    pub min_overlap_frames: u32,
    pub sampling: Sampling,
}

impl Default for UnclearEntryConfig {
    fn default() -> Self {
        Self {
            dx_threshold_px: 40.0,
            proximity_px: 100.0,
            min_overlap_frames: 5,
            sampling: Sampling::new(1, 3),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrosswalkConfig {
    /// Person box bottom past this fraction of height = entered the road (signal check)
    pub entry_line_ratio: f32,
    /// Person centroid past this fraction of height outside a crosswalk = jaywalking
    pub roadway_line_ratio: f32,
    pub sampling: Sampling,
}

impl Default for CrosswalkConfig {
    fn default() -> Self {
        Self {
            entry_line_ratio: 0.8,
            roadway_line_ratio: 0.6,
            sampling: Sampling::new(0, 1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionDutyConfig {
    pub proximity_px: f32,
    pub speed_threshold_px: f32,
    pub sampling: Sampling,
}

impl Default for ProtectionDutyConfig {
    fn default() -> Self {
        Self {
            proximity_px: 100.0,
            speed_threshold_px: 10.0,
            sampling: Sampling::new(1, 3),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlowDutyConfig {
    pub speed_threshold_px: f32,
    pub sampling: Sampling,
    /// Cadence used when slow duty substitutes for a missing traffic light
    pub fallback_sampling: Sampling,
    pub vehicle_classes: VehicleClasses,
}

impl Default for SlowDutyConfig {
    fn default() -> Self {
        Self {
            speed_threshold_px: 10.0,
            sampling: Sampling::new(1, 3),
            fallback_sampling: Sampling::new(1, 1),
            vehicle_classes: VehicleClasses::All,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LowVisibilityConfig {
    pub brightness_threshold: f32,
    pub sampling: Sampling,
}

impl Default for LowVisibilityConfig {
    fn default() -> Self {
        Self {
            brightness_threshold: 50.0,
            sampling: Sampling::new(0, 5),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchoolZoneConfig {
    pub sampling: Sampling,
}

impl Default for SchoolZoneConfig {
    fn default() -> Self {
        Self {
            sampling: Sampling::new(0, 1),
        }
    }
}

// ============================================================================
// EGO / LOGGING
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EgoConfig {
    pub policy: EgoPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
