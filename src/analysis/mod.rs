// src/analysis/mod.rs
//
// Measurement primitives shared by the rule detectors.
//
//   Detections → object_tracker → TrackedObject (identity over time)
//   Detections → ego            → ego vehicle / others split
//   Centroids  → kinematics     → displacement, heading

pub mod ego;
pub mod kinematics;
pub mod object_tracker;

pub use ego::{EgoPolicy, EgoSplit};
pub use kinematics::{angular_difference, displacement, heading_deg, SpeedAccumulator};
pub use object_tracker::{CentroidTracker, TrackedObject};
