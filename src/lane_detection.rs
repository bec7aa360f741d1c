// src/lane_detection.rs
//
// Line-based road geometry: Canny edges + probabilistic Hough segments,
// filtered to near-horizontal (road-aligned) segments. Two measurements are
// built on top:
//   - lane heading: mean signed angle of the kept segments
//   - centerline:   mean y of kept segments below the vertical midpoint
// Both return `None` when no segment qualifies; callers treat that as
// "measurement unavailable".

use crate::config::HoughConfig;
use crate::error::Result;
use crate::types::Frame;
use opencv::{
    core::{self, Mat, Vector},
    imgproc,
    prelude::*,
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl LineSegment {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Signed angle from the image x-axis in degrees (-180, 180].
    pub fn angle_deg(&self) -> f32 {
        (self.y2 - self.y1).atan2(self.x2 - self.x1).to_degrees()
    }

    /// Undirected angle folded onto (-90, 90]; endpoint order does not matter.
    pub fn axis_angle_deg(&self) -> f32 {
        let a = self.angle_deg();
        if a > 90.0 {
            a - 180.0
        } else if a <= -90.0 {
            a + 180.0
        } else {
            a
        }
    }

    pub fn mean_y(&self) -> f32 {
        (self.y1 + self.y2) * 0.5
    }
}

/// Source of line segments for a frame.
pub trait LineSegmentExtractor {
    fn extract(&self, frame: &Frame, params: &HoughConfig) -> Result<Vec<LineSegment>>;
}

/// OpenCV Canny + HoughLinesP.
#[derive(Debug, Default, Clone, Copy)]
pub struct HoughLineExtractor;

impl LineSegmentExtractor for HoughLineExtractor {
    fn extract(&self, frame: &Frame, params: &HoughConfig) -> Result<Vec<LineSegment>> {
        let mat = Mat::from_slice(&frame.data)?;
        let mat = mat.reshape(3, frame.height as i32)?;

        let mut gray = Mat::default();
        imgproc::cvt_color(&mat, &mut gray, imgproc::COLOR_RGB2GRAY, 0)?;

        let mut edges = Mat::default();
        imgproc::canny(&gray, &mut edges, params.canny_low, params.canny_high, 3, false)?;

        let mut lines = Vector::<core::Vec4i>::new();
        imgproc::hough_lines_p(
            &edges,
            &mut lines,
            1.0,
            std::f64::consts::PI / 180.0,
            params.threshold,
            params.min_line_length,
            params.max_line_gap,
        )?;

        let segments: Vec<LineSegment> = lines
            .iter()
            .map(|l| LineSegment::new(l[0] as f32, l[1] as f32, l[2] as f32, l[3] as f32))
            .collect();

        debug!("Frame {}: {} Hough segments", frame.index, segments.len());
        Ok(segments)
    }
}

/// Mean signed angle of the segments within `max_angle_deg` of horizontal.
pub fn lane_heading(segments: &[LineSegment], max_angle_deg: f32) -> Option<f32> {
    let angles: Vec<f32> = segments
        .iter()
        .map(|s| s.axis_angle_deg())
        .filter(|a| a.abs() < max_angle_deg)
        .collect();

    if angles.is_empty() {
        return None;
    }
    Some(angles.iter().sum::<f32>() / angles.len() as f32)
}

/// Mean y of near-horizontal segments lying below the frame's vertical midpoint.
pub fn estimate_centerline(
    segments: &[LineSegment],
    frame_height: usize,
    max_angle_deg: f32,
) -> Option<f32> {
    let midpoint = frame_height as f32 / 2.0;
    let ys: Vec<f32> = segments
        .iter()
        .filter(|s| s.axis_angle_deg().abs() < max_angle_deg)
        .map(|s| s.mean_y())
        .filter(|y| *y > midpoint)
        .collect();

    if ys.is_empty() {
        return None;
    }
    Some(ys.iter().sum::<f32>() / ys.len() as f32)
}
