// src/analysis/ego.rs
//
// Ego-vehicle disambiguation. The detector output order carries no identity,
// so "which box is my vehicle" is an explicit, configurable policy.

use crate::types::Detection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EgoPolicy {
    /// Largest box area (the vehicle nearest the camera)
    #[default]
    LargestBox,
    /// Box centroid nearest the bottom-center of the frame
    ClosestToBottomCenter,
    /// First vehicle in detector output order (legacy behavior)
    FirstDetection,
}

impl EgoPolicy {
    /// Index into `vehicles` of the ego vehicle, or `None` if the slice is empty.
    /// Ties resolve to the earliest index.
    pub fn select(
        &self,
        vehicles: &[&Detection],
        frame_width: usize,
        frame_height: usize,
    ) -> Option<usize> {
        if vehicles.is_empty() {
            return None;
        }

        match self {
            EgoPolicy::FirstDetection => Some(0),
            EgoPolicy::LargestBox => {
                let mut best = 0;
                for (i, det) in vehicles.iter().enumerate().skip(1) {
                    if det.area() > vehicles[best].area() {
                        best = i;
                    }
                }
                Some(best)
            }
            EgoPolicy::ClosestToBottomCenter => {
                let anchor = (frame_width as f32 * 0.5, frame_height as f32);
                let dist = |d: &Detection| {
                    let (cx, cy) = d.center();
                    (cx - anchor.0).hypot(cy - anchor.1)
                };
                let mut best = 0;
                for (i, det) in vehicles.iter().enumerate().skip(1) {
                    if dist(*det) < dist(vehicles[best]) {
                        best = i;
                    }
                }
                Some(best)
            }
        }
    }
}

/// Ego vehicle plus every other vehicle of one frame.
#[derive(Debug, Clone)]
pub struct EgoSplit<'a> {
    pub ego: &'a Detection,
    pub others: Vec<&'a Detection>,
}

impl<'a> EgoSplit<'a> {
    pub fn new(
        vehicles: Vec<&'a Detection>,
        policy: EgoPolicy,
        frame_width: usize,
        frame_height: usize,
    ) -> Option<Self> {
        let ego_idx = policy.select(&vehicles, frame_width, frame_height)?;
        let ego = vehicles[ego_idx];
        let others = vehicles
            .into_iter()
            .enumerate()
            .filter(|(i, _)| *i != ego_idx)
            .map(|(_, d)| d)
            .collect();
        Some(Self { ego, others })
    }

    pub fn ego_center(&self) -> (f32, f32) {
        self.ego.center()
    }
}
