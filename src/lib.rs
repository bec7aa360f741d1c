// src/lib.rs
//
// Collision-video violation factor analysis.
//
//   video_processor   → frames
//   object_detection  → labeled boxes per frame (YOLO via ONNX Runtime)
//   analysis          → tracking, ego selection, kinematics
//   color_analysis    → red-light classification
//   lane_detection    → Hough segments, lane heading, centerline
//   detectors         → one rule per violation factor
//   scenario          → which factors apply to (accident type, road context)
//   analyzer          → ties it together, returns an ordered AnalysisResult

pub mod analysis;
pub mod analyzer;
pub mod color_analysis;
pub mod config;
pub mod detectors;
pub mod error;
pub mod factors;
pub mod lane_detection;
pub mod object_detection;
pub mod preprocessing;
pub mod scenario;
pub mod types;
pub mod video_processor;

#[cfg(test)]
pub(crate) mod testing;

pub use analyzer::Analyzer;
pub use config::Config;
pub use error::{AnalysisError, Result};
pub use factors::{AnalysisResult, FactorValue};
pub use types::{AccidentType, RoadContext};
