// src/analysis/kinematics.rs
//
// Pixel-space motion measurements between sampled frames. No camera
// calibration: "speed" is centroid displacement per sample, heading is the
// direction of that displacement in image coordinates (y grows downward).

pub type Point = (f32, f32);

/// Euclidean displacement between two sampled centroids.
#[inline]
pub fn displacement(prev: Point, cur: Point) -> f32 {
    (cur.0 - prev.0).hypot(cur.1 - prev.1)
}

/// Heading of the displacement vector in degrees (-180, 180].
/// `None` when the centroid did not move.
pub fn heading_deg(prev: Point, cur: Point) -> Option<f32> {
    let dx = cur.0 - prev.0;
    let dy = cur.1 - prev.1;
    if dx == 0.0 && dy == 0.0 {
        return None;
    }
    Some(dy.atan2(dx).to_degrees())
}

/// Absolute difference of two headings folded onto [0, 180].
pub fn angular_difference(a: f32, b: f32) -> f32 {
    let diff = (a - b).abs() % 360.0;
    diff.min(360.0 - diff)
}

/// Circular mean of headings in degrees (-180, 180]. `None` when empty or
/// when the headings cancel out.
pub fn mean_heading_deg(headings: &[f32]) -> Option<f32> {
    let (sin, cos) = headings.iter().fold((0.0f32, 0.0f32), |(s, c), h| {
        let r = h.to_radians();
        (s + r.sin(), c + r.cos())
    });
    if sin.hypot(cos) < 1e-6 {
        return None;
    }
    Some(sin.atan2(cos).to_degrees())
}

pub fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f32>() / values.len() as f32)
    }
}

/// Running mean of per-sample displacement of one object.
#[derive(Debug, Default, Clone)]
pub struct SpeedAccumulator {
    prev: Option<Point>,
    sum: f32,
    count: u32,
}

impl SpeedAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the next sampled centroid.
    pub fn push(&mut self, center: Point) {
        if let Some(prev) = self.prev {
            self.sum += displacement(prev, center);
            self.count += 1;
        }
        self.prev = Some(center);
    }

    /// Mean displacement, or `None` before the second sample.
    pub fn mean_speed(&self) -> Option<f32> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f32)
        }
    }

    /// Mean displacement, zero before the second sample.
    pub fn mean_speed_or_zero(&self) -> f32 {
        self.mean_speed().unwrap_or(0.0)
    }

    pub fn samples(&self) -> u32 {
        self.count
    }
}
