// src/detectors/context.rs
//
// Everything one analysis run shares between detectors: the decoded frames,
// the detection adapter (behind a per-run memo), the line extractor, the red
// light classifier and the thresholds. Dropped when `analyze()` returns.

use crate::analysis::kinematics::Point;
use crate::analysis::{CentroidTracker, EgoSplit};
use crate::color_analysis::RedLightClassifier;
use crate::config::{Config, HoughConfig, Sampling};
use crate::error::Result;
use crate::lane_detection::{LineSegment, LineSegmentExtractor};
use crate::object_detection::ObjectDetector;
use crate::types::{Detection, Frame, Label, RoadContext, VehicleClasses};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::trace;

/// Ego vehicle position in one sampled frame plus every other vehicle,
/// ordered left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct EgoSample {
    pub frame_index: usize,
    pub ego: Point,
    pub others: Vec<Point>,
}

pub struct AnalysisContext<'a> {
    frames: &'a [Frame],
    config: &'a Config,
    road: RoadContext,
    detector: &'a mut dyn ObjectDetector,
    lines: &'a dyn LineSegmentExtractor,
    red_light: RedLightClassifier,
    memo: HashMap<usize, Rc<[Detection]>>,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(
        frames: &'a [Frame],
        config: &'a Config,
        road: RoadContext,
        detector: &'a mut dyn ObjectDetector,
        lines: &'a dyn LineSegmentExtractor,
    ) -> Self {
        Self {
            frames,
            config,
            road,
            detector,
            lines,
            red_light: RedLightClassifier::new(config.estimators.red_light.clone()),
            memo: HashMap::new(),
        }
    }

    pub fn config(&self) -> &'a Config {
        self.config
    }

    pub fn road(&self) -> &RoadContext {
        &self.road
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, index: usize) -> &'a Frame {
        &self.frames[index]
    }

    pub fn sampled(&self, sampling: Sampling) -> impl Iterator<Item = usize> {
        sampling.indices(self.frames.len())
    }

    /// Detections for one frame. Inference runs at most once per frame and run;
    /// an adapter error aborts the caller.
    pub fn detections(&mut self, index: usize) -> Result<Rc<[Detection]>> {
        if let Some(cached) = self.memo.get(&index) {
            return Ok(Rc::clone(cached));
        }
        let detections: Rc<[Detection]> = self.detector.detect(&self.frames[index])?.into();
        trace!("Frame {}: inferred {} detections", index, detections.len());
        self.memo.insert(index, Rc::clone(&detections));
        Ok(detections)
    }

    /// Frames inferred so far in this run.
    pub fn inferred_frames(&self) -> usize {
        self.memo.len()
    }

    pub fn line_segments(&self, index: usize, params: &HoughConfig) -> Result<Vec<LineSegment>> {
        self.lines.extract(&self.frames[index], params)
    }

    pub fn is_red_light(&self, frame: &Frame, light: &Detection) -> bool {
        self.red_light.is_red(frame, &light.bbox)
    }

    /// Fresh tracker, owned by the calling detector only.
    pub fn tracker(&self) -> CentroidTracker {
        CentroidTracker::new(self.config.tracker.clone())
    }

    /// Split one frame's vehicles into ego and others with the configured policy.
    pub fn ego_split<'d>(
        &self,
        detections: &'d [Detection],
        classes: VehicleClasses,
        frame: &Frame,
    ) -> Option<EgoSplit<'d>> {
        EgoSplit::new(
            vehicles(detections, classes),
            self.config.ego.policy,
            frame.width,
            frame.height,
        )
    }

    /// Ego position per sampled frame. Frames without any vehicle are skipped.
    pub fn ego_samples(
        &mut self,
        sampling: Sampling,
        classes: VehicleClasses,
    ) -> Result<Vec<EgoSample>> {
        let mut samples = Vec::new();
        for index in sampling.indices(self.frames.len()) {
            let detections = self.detections(index)?;
            let frame = self.frame(index);
            if let Some(split) = self.ego_split(&detections, classes, frame) {
                let mut others: Vec<Point> = split.others.iter().map(|d| d.center()).collect();
                others.sort_by(|a, b| a.0.total_cmp(&b.0));
                samples.push(EgoSample {
                    frame_index: index,
                    ego: split.ego_center(),
                    others,
                });
            }
        }
        Ok(samples)
    }
}

pub fn vehicles(detections: &[Detection], classes: VehicleClasses) -> Vec<&Detection> {
    detections
        .iter()
        .filter(|d| classes.contains(d.label))
        .collect()
}

pub fn with_label(detections: &[Detection], label: Label) -> impl Iterator<Item = &Detection> {
    detections.iter().filter(move |d| d.label == label)
}
