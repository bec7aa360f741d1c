// src/testing.rs
//
// Test doubles: canned detections per frame and fixed line segments, so the
// rule detectors run without a model file or a video.

use crate::config::{Config, HoughConfig};
use crate::detectors::AnalysisContext;
use crate::error::{AnalysisError, Result};
use crate::lane_detection::{LineSegment, LineSegmentExtractor};
use crate::object_detection::ObjectDetector;
use crate::types::{Detection, Frame, Label, RoadContext};
use std::collections::HashMap;

pub const WIDTH: usize = 640;
pub const HEIGHT: usize = 480;

/// `count` black frames of `WIDTH`×`HEIGHT`.
pub fn blank_frames(count: usize) -> Vec<Frame> {
    (0..count)
        .map(|i| Frame::filled(i, WIDTH, HEIGHT, [0, 0, 0]))
        .collect()
}

/// Fill a box of `frame` with one color.
pub fn paint(frame: &mut Frame, bbox: [f32; 4], rgb: [u8; 3]) {
    let x1 = bbox[0].max(0.0) as usize;
    let y1 = bbox[1].max(0.0) as usize;
    let x2 = (bbox[2].max(0.0) as usize).min(frame.width);
    let y2 = (bbox[3].max(0.0) as usize).min(frame.height);
    for y in y1..y2 {
        for x in x1..x2 {
            let idx = (y * frame.width + x) * 3;
            frame.data[idx..idx + 3].copy_from_slice(&rgb);
        }
    }
}

/// Square box of side `size` centered on (cx, cy).
pub fn boxed(label: Label, cx: f32, cy: f32, size: f32, frame_index: usize) -> Detection {
    let h = size / 2.0;
    Detection::new(label, [cx - h, cy - h, cx + h, cy + h], frame_index)
}

/// Replays canned detections by frame index; unknown frames yield nothing.
#[derive(Debug, Default, Clone)]
pub struct ScriptedDetector {
    script: HashMap<usize, Vec<Detection>>,
    fail_on: Option<usize>,
    calls: usize,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, frame_index: usize, detections: Vec<Detection>) -> Self {
        self.script.entry(frame_index).or_default().extend(detections);
        self
    }

    pub fn add(&mut self, frame_index: usize, detection: Detection) {
        self.script.entry(frame_index).or_default().push(detection);
    }

    /// Make `detect` fail on this frame index.
    pub fn failing_on(mut self, frame_index: usize) -> Self {
        self.fail_on = Some(frame_index);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl ObjectDetector for ScriptedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        self.calls += 1;
        if self.fail_on == Some(frame.index) {
            return Err(AnalysisError::inference(frame.index, "scripted failure"));
        }
        let mut detections = self.script.get(&frame.index).cloned().unwrap_or_default();
        for det in detections.iter_mut() {
            det.frame_index = frame.index;
        }
        Ok(detections)
    }
}

/// Returns the same segments for every frame, or per-frame overrides.
#[derive(Debug, Default, Clone)]
pub struct FixedLines {
    default: Vec<LineSegment>,
    per_frame: HashMap<usize, Vec<LineSegment>>,
}

impl FixedLines {
    pub fn new(segments: Vec<LineSegment>) -> Self {
        Self {
            default: segments,
            per_frame: HashMap::new(),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn at(mut self, frame_index: usize, segments: Vec<LineSegment>) -> Self {
        self.per_frame.insert(frame_index, segments);
        self
    }
}

impl LineSegmentExtractor for FixedLines {
    fn extract(&self, frame: &Frame, _params: &HoughConfig) -> Result<Vec<LineSegment>> {
        Ok(self
            .per_frame
            .get(&frame.index)
            .unwrap_or(&self.default)
            .clone())
    }
}

/// Frames, config and doubles for running one detector in isolation.
pub struct Harness {
    pub frames: Vec<Frame>,
    pub config: Config,
    pub detector: ScriptedDetector,
    pub lines: FixedLines,
    pub road: RoadContext,
}

impl Harness {
    pub fn new(frame_count: usize) -> Self {
        Self {
            frames: blank_frames(frame_count),
            config: Config::default(),
            detector: ScriptedDetector::new(),
            lines: FixedLines::none(),
            road: RoadContext::Intersection,
        }
    }

    pub fn add(&mut self, frame_index: usize, detection: Detection) -> &mut Self {
        self.detector.add(frame_index, detection);
        self
    }

    pub fn run<T>(&mut self, detector: impl FnOnce(&mut AnalysisContext<'_>) -> Result<T>) -> T {
        let mut ctx = AnalysisContext::new(
            &self.frames,
            &self.config,
            self.road.clone(),
            &mut self.detector,
            &self.lines,
        );
        detector(&mut ctx).expect("detector run failed")
    }
}
