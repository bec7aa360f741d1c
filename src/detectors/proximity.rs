// src/detectors/proximity.rs
//
// Sustained-pattern detectors: a condition has to hold over a minimum number
// of sampled frames before it counts. A single close or jumpy frame never
// decides a factor on its own.

use super::context::{vehicles, AnalysisContext};
use crate::analysis::kinematics::displacement;
use crate::error::Result;
use crate::factors::FactorValue;
use crate::types::VehicleClasses;
use tracing::debug;

/// Any two vehicles closer than the threshold in enough sampled frames.
pub fn tailgating(ctx: &mut AnalysisContext<'_>) -> Result<FactorValue> {
    let cfg = ctx.config().detectors.tailgating.clone();
    let mut close_frames = 0u32;

    for index in ctx.sampled(cfg.sampling).collect::<Vec<_>>() {
        let detections = ctx.detections(index)?;
        let centers: Vec<(f32, f32)> = vehicles(&detections, VehicleClasses::All)
            .iter()
            .map(|d| d.center())
            .collect();
        if centers.len() < 2 {
            continue;
        }

        let mut min_dist = f32::INFINITY;
        for i in 0..centers.len() {
            for j in (i + 1)..centers.len() {
                min_dist = min_dist.min(displacement(centers[i], centers[j]));
            }
        }
        if min_dist < cfg.min_distance_px {
            close_frames += 1;
        }
    }

    debug!(
        "Tailgating: {} close frames (need {})",
        close_frames, cfg.min_close_frames
    );
    Ok(FactorValue::Bool(close_frames >= cfg.min_close_frames))
}

/// Ego shifted sideways repeatedly, with another vehicle nearby during the shifts.
pub fn illegal_lane_change(ctx: &mut AnalysisContext<'_>) -> Result<FactorValue> {
    let cfg = ctx.config().detectors.lane_change.clone();
    let samples = ctx.ego_samples(cfg.sampling, VehicleClasses::CarOrTruck)?;

    let mut change_frames = 0u32;
    let mut close_frames = 0u32;
    for pair in samples.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        if (cur.ego.0 - prev.ego.0).abs() <= cfg.dx_threshold_px {
            continue;
        }
        change_frames += 1;
        if cur
            .others
            .iter()
            .any(|o| displacement(cur.ego, *o) < cfg.proximity_px)
        {
            close_frames += 1;
        }
    }

    debug!(
        "Lane change: {} shifting frames, {} with a vehicle nearby",
        change_frames, close_frames
    );
    Ok(FactorValue::Bool(
        change_frames >= cfg.min_change_frames && close_frames >= cfg.min_close_frames,
    ))
}

/// Large ego jumps between samples, debounced by a minimum raw-frame gap.
pub fn abrupt_maneuver(ctx: &mut AnalysisContext<'_>) -> Result<FactorValue> {
    let cfg = ctx.config().detectors.abrupt_maneuver.clone();
    let samples = ctx.ego_samples(cfg.sampling, VehicleClasses::CarOrTruck)?;

    let mut events = 0u32;
    let mut last_event: Option<usize> = None;
    for pair in samples.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        if displacement(prev.ego, cur.ego) <= cfg.delta_threshold_px {
            continue;
        }
        let debounced = last_event.map_or(true, |last| {
            cur.frame_index - last >= cfg.min_frames_between
        });
        if debounced {
            events += 1;
            last_event = Some(cur.frame_index);
        }
    }

    debug!("Abrupt maneuver: {} events", events);
    Ok(FactorValue::Bool(events >= cfg.count_threshold))
}

/// Ego kept forcing its way next to another vehicle (highway merge).
pub fn merge_yield_violation(ctx: &mut AnalysisContext<'_>) -> Result<FactorValue> {
    let cfg = ctx.config().detectors.merge_yield.clone();
    let samples = ctx.ego_samples(cfg.sampling, VehicleClasses::CarOrTruck)?;

    let close_frames = samples
        .iter()
        .filter_map(|s| {
            s.others
                .iter()
                .map(|o| displacement(s.ego, *o))
                .min_by(|a, b| a.total_cmp(b))
        })
        .filter(|&nearest| nearest < cfg.merge_distance_px)
        .count() as u32;

    debug!("Merge yield: {} close frames", close_frames);
    Ok(FactorValue::Bool(close_frames >= cfg.min_close_frames))
}
