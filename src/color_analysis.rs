// src/color_analysis.rs
//
// HSV-based traffic light state classification.
//
// A light is "red" when enough pixels of its crop fall inside either red hue
// band (red wraps around 0°). Single-frame decision, no temporal smoothing;
// glare or a washed-out crop simply reads as not-red.

use crate::config::RedLightConfig;
use crate::types::Frame;
use tracing::trace;

// ============================================================================
// HSV CONVERSION
// ============================================================================

/// Convert RGB to HSV.
/// Returns (H: 0-360, S: 0-255, V: 0-255).
#[inline]
pub fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let r_n = r / 255.0;
    let g_n = g / 255.0;
    let b_n = b / 255.0;

    let max = r_n.max(g_n).max(b_n);
    let min = r_n.min(g_n).min(b_n);
    let delta = max - min;

    let h = if delta < 1e-6 {
        0.0
    } else if (max - r_n).abs() < 1e-6 {
        60.0 * (((g_n - b_n) / delta) % 6.0)
    } else if (max - g_n).abs() < 1e-6 {
        60.0 * (((b_n - r_n) / delta) + 2.0)
    } else {
        60.0 * (((r_n - g_n) / delta) + 4.0)
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    let s = if max < 1e-6 { 0.0 } else { (delta / max) * 255.0 };
    let v = max * 255.0;

    (h, s, v)
}

// ============================================================================
// RED LIGHT CLASSIFIER
// ============================================================================

#[derive(Debug, Clone)]
pub struct RedLightClassifier {
    config: RedLightConfig,
}

impl RedLightClassifier {
    pub fn new(config: RedLightConfig) -> Self {
        Self { config }
    }

    #[inline]
    fn is_red_pixel(&self, rgb: [u8; 3]) -> bool {
        let (h, s, v) = rgb_to_hsv(rgb[0] as f32, rgb[1] as f32, rgb[2] as f32);
        let in_band = h <= self.config.low_band_hue_max || h >= self.config.high_band_hue_min;
        in_band && s >= self.config.min_saturation && v >= self.config.min_value
    }

    /// Fraction of red pixels inside `bbox` ([x1, y1, x2, y2], end-exclusive).
    /// `None` when the clamped crop is empty.
    pub fn red_ratio(&self, frame: &Frame, bbox: &[f32; 4]) -> Option<f32> {
        let clamp_x = |v: f32| (v.max(0.0) as usize).min(frame.width);
        let clamp_y = |v: f32| (v.max(0.0) as usize).min(frame.height);
        let (x1, y1, x2, y2) = (
            clamp_x(bbox[0]),
            clamp_y(bbox[1]),
            clamp_x(bbox[2]),
            clamp_y(bbox[3]),
        );

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        let mut red = 0usize;
        for y in y1..y2 {
            for x in x1..x2 {
                if self.is_red_pixel(frame.pixel(x, y)) {
                    red += 1;
                }
            }
        }

        let total = (x2 - x1) * (y2 - y1);
        Some(red as f32 / total as f32)
    }

    pub fn is_red(&self, frame: &Frame, bbox: &[f32; 4]) -> bool {
        match self.red_ratio(frame, bbox) {
            Some(ratio) => {
                trace!("Frame {} light red ratio {:.3}", frame.index, ratio);
                ratio > self.config.red_ratio_threshold
            }
            None => false,
        }
    }
}

impl Default for RedLightClassifier {
    fn default() -> Self {
        Self::new(RedLightConfig::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================
