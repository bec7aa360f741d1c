// src/detectors/trajectory.rs
//
// Detectors driven by where vehicles go over time: prior entry (tracked
// identities), turn duty, wrong-direction travel, unclear entry and
// center-line violation.

use super::context::{vehicles, AnalysisContext};
use crate::analysis::kinematics::{
    angular_difference, displacement, heading_deg, mean, mean_heading_deg, Point,
};
use crate::error::Result;
use crate::factors::FactorValue;
use crate::lane_detection::{estimate_centerline, lane_heading};
use crate::types::VehicleClasses;
use std::collections::BTreeMap;
use tracing::debug;

// ============================================================================
// PRIOR ENTRY
// ============================================================================

#[derive(Debug, Default)]
struct TrackHistory {
    entry_frame: Option<usize>,
    ys: Vec<f32>,
}

/// The ego track (largest mean y, i.e. nearest the camera) crossed the entry
/// line first.
pub fn prior_entry(ctx: &mut AnalysisContext<'_>) -> Result<FactorValue> {
    let cfg = ctx.config().detectors.prior_entry.clone();
    let mut tracker = ctx.tracker();
    let mut history: BTreeMap<u32, TrackHistory> = BTreeMap::new();

    for index in ctx.sampled(cfg.sampling).collect::<Vec<_>>() {
        let detections = ctx.detections(index)?;
        let entry_y = ctx.frame(index).height as f32 * cfg.entry_line_ratio;
        let cars = vehicles(&detections, VehicleClasses::CarOrTruck);

        for obj in tracker.update(&cars, index) {
            let entry = history.entry(obj.track_id).or_default();
            let cy = obj.estimated_center.1;
            if cy > entry_y && entry.entry_frame.is_none() {
                entry.entry_frame = Some(index);
            }
            entry.ys.push(cy);
        }
    }

    let entered: Vec<(usize, u32)> = history
        .iter()
        .filter_map(|(id, h)| h.entry_frame.map(|f| (f, *id)))
        .collect();
    if entered.len() < 2 {
        debug!(
            "Prior entry: {} tracks, {} crossed the entry line",
            history.len(),
            entered.len()
        );
        return Ok(FactorValue::undeterminable("insufficient trajectory data"));
    }

    let first_id = entered.iter().min().map(|(_, id)| *id);

    let mut ego: Option<(u32, f32)> = None;
    for (id, h) in &history {
        if let Some(avg) = mean(&h.ys) {
            if ego.map_or(true, |(_, best)| avg > best) {
                ego = Some((*id, avg));
            }
        }
    }
    let ego_id = ego.map(|(id, _)| id);

    debug!("Prior entry: first track {:?}, ego track {:?}", first_id, ego_id);
    Ok(FactorValue::Bool(first_id.is_some() && first_id == ego_id))
}

// ============================================================================
// TURN DUTY
// ============================================================================

/// Ego turned sharply while another vehicle stayed close. A prior-entrant
/// ego carries no turn-duty fault.
pub fn turn_duty_violation(ctx: &mut AnalysisContext<'_>) -> Result<FactorValue> {
    if prior_entry(ctx)? == FactorValue::Bool(true) {
        debug!("Turn duty: ego entered first, no violation");
        return Ok(FactorValue::Bool(false));
    }

    let cfg = ctx.config().detectors.turn_duty.clone();
    let samples = ctx.ego_samples(cfg.sampling, VehicleClasses::CarOrTruck)?;

    let mut turn_frames = 0u32;
    // Keyed by left-to-right position among the non-ego vehicles
    let mut close_by_slot: BTreeMap<usize, u32> = BTreeMap::new();
    let mut prev_heading: Option<f32> = None;

    for pair in samples.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let Some(heading) = heading_deg(prev.ego, cur.ego) else {
            continue;
        };

        if let Some(last) = prev_heading {
            if angular_difference(heading, last) > cfg.angle_threshold_deg {
                turn_frames += 1;
                for (slot, other) in cur.others.iter().enumerate() {
                    if displacement(cur.ego, *other) < cfg.proximity_px {
                        *close_by_slot.entry(slot).or_insert(0) += 1;
                    }
                }
            }
        }
        prev_heading = Some(heading);
    }

    let sustained_close = close_by_slot.values().any(|&c| c >= cfg.min_close_frames);
    debug!(
        "Turn duty: {} turning frames, close counts {:?}",
        turn_frames, close_by_slot
    );
    Ok(FactorValue::Bool(
        turn_frames >= cfg.min_turn_frames && sustained_close,
    ))
}

// ============================================================================
// WRONG DIRECTION
// ============================================================================

/// Circular-mean ego heading disagrees with the lane heading at the sequence midpoint.
pub fn wrong_direction(ctx: &mut AnalysisContext<'_>) -> Result<FactorValue> {
    let cfg = ctx.config().detectors.wrong_direction.clone();
    let samples = ctx.ego_samples(cfg.sampling, VehicleClasses::All)?;

    let headings: Vec<f32> = samples
        .windows(2)
        .filter_map(|pair| heading_deg(pair[0].ego, pair[1].ego))
        .collect();
    let Some(vehicle_heading) = mean_heading_deg(&headings) else {
        return Ok(FactorValue::undeterminable("insufficient vehicle trajectory"));
    };

    let lane_params = ctx.config().estimators.lane_lines.clone();
    let midpoint = ctx.frame_count() / 2;
    let segments = ctx.line_segments(midpoint, &lane_params)?;
    let Some(lane) = lane_heading(&segments, lane_params.max_angle_deg) else {
        return Ok(FactorValue::undeterminable("lane direction not detected"));
    };

    let diff = angular_difference(vehicle_heading, lane);
    debug!(
        "Wrong direction: vehicle {:.1}°, lane {:.1}°, diff {:.1}°",
        vehicle_heading, lane, diff
    );
    Ok(FactorValue::Bool(diff > cfg.angle_diff_threshold_deg))
}

// ============================================================================
// UNCLEAR ENTRY
// ============================================================================

/// Two vehicles moving sideways at the same time while close together: the
/// narrow-road case where neither clearly entered first.
pub fn unclear_entry(ctx: &mut AnalysisContext<'_>) -> Result<FactorValue> {
    let cfg = ctx.config().detectors.unclear_entry.clone();
    let mut prev: Option<[Point; 2]> = None;
    let mut overlaps = 0u32;

    for index in ctx.sampled(cfg.sampling).collect::<Vec<_>>() {
        let detections = ctx.detections(index)?;
        let mut centers: Vec<Point> = vehicles(&detections, VehicleClasses::CarOrTruck)
            .iter()
            .map(|d| d.center())
            .collect();
        if centers.len() != 2 {
            continue;
        }
        centers.sort_by(|a, b| a.0.total_cmp(&b.0));
        let cur = [centers[0], centers[1]];

        if let Some(last) = prev {
            let dx_left = (cur[0].0 - last[0].0).abs();
            let dx_right = (cur[1].0 - last[1].0).abs();
            if dx_left > cfg.dx_threshold_px
                && dx_right > cfg.dx_threshold_px
                && displacement(cur[0], cur[1]) < cfg.proximity_px
            {
                overlaps += 1;
            }
        }
        prev = Some(cur);
    }

    debug!("Unclear entry: {} overlapping frames", overlaps);
    Ok(FactorValue::Bool(overlaps >= cfg.min_overlap_frames))
}

// ============================================================================
// CENTER LINE
// ============================================================================

/// A vehicle centroid below the estimated centerline in any frame.
pub fn center_line_violation(ctx: &mut AnalysisContext<'_>) -> Result<FactorValue> {
    let cfg = ctx.config().detectors.center_line.clone();
    let params = ctx.config().estimators.center_lines.clone();
    let mut centerline_seen = false;

    for index in ctx.sampled(cfg.sampling).collect::<Vec<_>>() {
        let segments = ctx.line_segments(index, &params)?;
        let height = ctx.frame(index).height;
        let Some(centerline_y) = estimate_centerline(&segments, height, params.max_angle_deg)
        else {
            continue;
        };
        centerline_seen = true;

        let detections = ctx.detections(index)?;
        if vehicles(&detections, VehicleClasses::All)
            .iter()
            .any(|d| d.center().1 > centerline_y)
        {
            debug!(
                "Center line crossed at frame {} (centerline y {:.0})",
                index, centerline_y
            );
            return Ok(FactorValue::Bool(true));
        }
    }

    if !centerline_seen {
        return Ok(FactorValue::undeterminable("center line not detected"));
    }
    Ok(FactorValue::Bool(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Sampling;
    use crate::lane_detection::LineSegment;
    use crate::testing::{boxed, FixedLines, Harness};
    use crate::types::Label;

    #[test]
    fn test_prior_entry_needs_two_entering_tracks() {
        let mut h = Harness::new(10);
        // One car crossing the 60% line, one staying near the top
        for i in 0..10 {
            h.add(i, boxed(Label::Car, 100.0, 250.0 + 10.0 * i as f32, 40.0, i));
            h.add(i, boxed(Label::Car, 500.0, 80.0, 40.0, i));
        }
        assert_eq!(
            h.run(prior_entry),
            FactorValue::undeterminable("insufficient trajectory data")
        );

        let mut h = Harness::new(5);
        assert!(h.run(prior_entry).is_undeterminable());
    }

    #[test]
    fn test_prior_entry_single_crosser_in_any_layout() {
        // Lone car crossing the line
        let mut h = Harness::new(10);
        for i in 0..10 {
            h.add(i, boxed(Label::Car, 200.0, 250.0 + 10.0 * i as f32, 40.0, i));
        }
        assert!(h.run(prior_entry).is_undeterminable());

        // Three tracks, only the middle one crosses
        let mut h = Harness::new(10);
        for i in 0..10 {
            h.add(i, boxed(Label::Car, 100.0, 90.0, 40.0, i));
            h.add(i, boxed(Label::Truck, 320.0, 250.0 + 10.0 * i as f32, 40.0, i));
            h.add(i, boxed(Label::Car, 540.0, 120.0 + 5.0 * i as f32, 40.0, i));
        }
        assert_eq!(
            h.run(prior_entry),
            FactorValue::undeterminable("insufficient trajectory data")
        );

        // Two tracks, neither crosses
        let mut h = Harness::new(10);
        for i in 0..10 {
            h.add(i, boxed(Label::Car, 150.0, 100.0, 40.0, i));
            h.add(i, boxed(Label::Car, 450.0, 200.0, 40.0, i));
        }
        assert!(h.run(prior_entry).is_undeterminable());
    }

    #[test]
    fn test_prior_entry_ego_first() {
        let mut h = Harness::new(12);
        for i in 0..12 {
            let step = i as f32;
            // Ego: low in the frame, crosses 288 at frame 0
            h.add(i, boxed(Label::Car, 200.0, 300.0 + 5.0 * step, 60.0, i));
            // Other: crosses 288 at frame 6
            h.add(i, boxed(Label::Truck, 450.0, 250.0 + 7.0 * step, 60.0, i));
        }
        assert_eq!(h.run(prior_entry), FactorValue::Bool(true));
    }

    #[test]
    fn test_prior_entry_other_first() {
        let mut h = Harness::new(12);
        for i in 0..12 {
            let step = i as f32;
            // Ego: largest mean y but crosses only at frame 1
            h.add(i, boxed(Label::Car, 200.0, 270.0 + 20.0 * step, 60.0, i));
            // Other: already past the line at frame 0, stays there
            h.add(i, boxed(Label::Car, 450.0, 300.0, 60.0, i));
        }
        assert_eq!(h.run(prior_entry), FactorValue::Bool(false));
    }

    fn zigzag(h: &mut Harness, frames: usize, close_other: bool) {
        // Keep prior entry undeterminable so the turn check itself runs
        h.config.detectors.prior_entry.entry_line_ratio = 0.99;
        // Ego alternates direction every sample, which is a sharp heading change
        for i in 0..frames {
            let x = if i % 2 == 0 { 300.0 } else { 340.0 };
            let y = 300.0 + 10.0 * i as f32;
            h.add(i, boxed(Label::Car, x, y, 100.0, i));
            let ox = if close_other { x + 50.0 } else { 600.0 };
            let oy = if close_other { y } else { 20.0 };
            h.add(i, boxed(Label::Car, ox, oy, 20.0, i));
        }
    }

    #[test]
    fn test_turn_duty_violation_with_close_vehicle() {
        let mut h = Harness::new(12);
        h.config.detectors.turn_duty.sampling = Sampling::new(0, 1);
        zigzag(&mut h, 12, true);
        assert_eq!(h.run(turn_duty_violation), FactorValue::Bool(true));
    }

    #[test]
    fn test_turn_duty_without_close_vehicle() {
        let mut h = Harness::new(12);
        h.config.detectors.turn_duty.sampling = Sampling::new(0, 1);
        zigzag(&mut h, 12, false);
        assert_eq!(h.run(turn_duty_violation), FactorValue::Bool(false));
    }

    #[test]
    fn test_wrong_direction() {
        // Ego moves right to left, lane lines run left to right
        let mut h = Harness::new(12);
        for i in 0..12 {
            h.add(i, boxed(Label::Car, 500.0 - 20.0 * i as f32, 300.0, 80.0, i));
        }
        h.lines = FixedLines::new(vec![LineSegment::new(0.0, 400.0, 600.0, 410.0)]);
        assert_eq!(h.run(wrong_direction), FactorValue::Bool(true));

        let mut h = Harness::new(12);
        for i in 0..12 {
            h.add(i, boxed(Label::Car, 100.0 + 20.0 * i as f32, 300.0, 80.0, i));
        }
        h.lines = FixedLines::new(vec![LineSegment::new(0.0, 400.0, 600.0, 410.0)]);
        assert_eq!(h.run(wrong_direction), FactorValue::Bool(false));
    }

    #[test]
    fn test_wrong_direction_with_vertical_jitter() {
        // Leftward with 4px bounce: headings straddle +-180
        let mut h = Harness::new(12);
        for i in 0..12 {
            let x = 500.0 - 20.0 * i as f32;
            let y = if (i / 3) % 2 == 0 { 300.0 } else { 304.0 };
            h.add(i, boxed(Label::Car, x, y, 80.0, i));
        }
        h.lines = FixedLines::new(vec![LineSegment::new(0.0, 400.0, 600.0, 410.0)]);
        assert_eq!(h.run(wrong_direction), FactorValue::Bool(true));

        // Same bounce while driving with the lane
        let mut h = Harness::new(12);
        for i in 0..12 {
            let x = 100.0 + 20.0 * i as f32;
            let y = if (i / 3) % 2 == 0 { 300.0 } else { 304.0 };
            h.add(i, boxed(Label::Car, x, y, 80.0, i));
        }
        h.lines = FixedLines::new(vec![LineSegment::new(0.0, 400.0, 600.0, 410.0)]);
        assert_eq!(h.run(wrong_direction), FactorValue::Bool(false));
    }

    #[test]
    fn test_wrong_direction_undeterminable() {
        let mut h = Harness::new(12);
        for i in 0..12 {
            h.add(i, boxed(Label::Car, 100.0 + 20.0 * i as f32, 300.0, 80.0, i));
        }
        assert_eq!(
            h.run(wrong_direction),
            FactorValue::undeterminable("lane direction not detected")
        );

        let mut h = Harness::new(12);
        h.lines = FixedLines::new(vec![LineSegment::new(0.0, 400.0, 600.0, 410.0)]);
        assert_eq!(
            h.run(wrong_direction),
            FactorValue::undeterminable("insufficient vehicle trajectory")
        );
    }

    #[test]
    fn test_unclear_entry() {
        let mut h = Harness::new(20);
        h.config.detectors.unclear_entry.sampling = Sampling::new(0, 1);
        for i in 0..20 {
            // Both shuffle sideways 50px per frame, 60px apart
            let x = if i % 2 == 0 { 200.0 } else { 250.0 };
            h.add(i, boxed(Label::Car, x, 300.0, 40.0, i));
            h.add(i, boxed(Label::Car, x + 60.0, 300.0, 40.0, i));
        }
        assert_eq!(h.run(unclear_entry), FactorValue::Bool(true));

        let mut h = Harness::new(20);
        for i in 0..20 {
            h.add(i, boxed(Label::Car, 200.0, 300.0, 40.0, i));
            h.add(i, boxed(Label::Car, 260.0, 300.0, 40.0, i));
        }
        assert_eq!(h.run(unclear_entry), FactorValue::Bool(false));
    }

    #[test]
    fn test_center_line() {
        let mut h = Harness::new(4);
        h.lines = FixedLines::none().at(2, vec![LineSegment::new(0.0, 300.0, 600.0, 300.0)]);
        h.add(2, boxed(Label::Car, 320.0, 350.0, 60.0, 2));
        assert_eq!(h.run(center_line_violation), FactorValue::Bool(true));
        // Only the frame with a centerline was sent to the detector
        assert_eq!(h.detector.calls(), 1);

        let mut h = Harness::new(4);
        h.lines = FixedLines::new(vec![LineSegment::new(0.0, 300.0, 600.0, 300.0)]);
        h.add(2, boxed(Label::Car, 320.0, 200.0, 60.0, 2));
        assert_eq!(h.run(center_line_violation), FactorValue::Bool(false));

        let mut h = Harness::new(4);
        assert_eq!(
            h.run(center_line_violation),
            FactorValue::undeterminable("center line not detected")
        );
    }
}
