// src/detectors/pedestrian.rs
//
// Vehicle-to-pedestrian conditions: protection duty, slow-down duty, low
// visibility and school-zone presence.

use super::context::{with_label, AnalysisContext};
use crate::analysis::kinematics::{displacement, SpeedAccumulator};
use crate::config::Sampling;
use crate::error::Result;
use crate::factors::FactorValue;
use crate::types::{Label, RoadContext};
use tracing::debug;

/// Ego kept moving fast while a pedestrian was within reach.
pub fn protection_duty_violation(ctx: &mut AnalysisContext<'_>) -> Result<FactorValue> {
    let cfg = ctx.config().detectors.protection_duty.clone();
    let classes = ctx.config().detectors.slow_duty.vehicle_classes;
    let mut speed = SpeedAccumulator::new();
    let mut co_observed = false;

    for index in ctx.sampled(cfg.sampling).collect::<Vec<_>>() {
        let detections = ctx.detections(index)?;
        let frame = ctx.frame(index);
        let pedestrians: Vec<(f32, f32)> = with_label(&detections, Label::Person)
            .map(|d| d.center())
            .collect();
        if pedestrians.is_empty() {
            continue;
        }
        let Some(split) = ctx.ego_split(&detections, classes, frame) else {
            continue;
        };
        co_observed = true;

        let ego = split.ego_center();
        speed.push(ego);

        let near = pedestrians
            .iter()
            .any(|p| displacement(ego, *p) < cfg.proximity_px);
        if near && speed.mean_speed_or_zero() > cfg.speed_threshold_px {
            debug!(
                "Protection duty: ego at {:.1} px/sample near a pedestrian at frame {}",
                speed.mean_speed_or_zero(),
                index
            );
            return Ok(FactorValue::Bool(true));
        }
    }

    if !co_observed {
        return Ok(FactorValue::undeterminable(
            "vehicle and pedestrian never seen together",
        ));
    }
    Ok(FactorValue::Bool(false))
}

/// Mean ego displacement over `sampling` above the slow-down threshold.
/// `None` when no displacement could be measured.
pub fn measure_slow_duty(
    ctx: &mut AnalysisContext<'_>,
    sampling: Sampling,
) -> Result<Option<bool>> {
    let cfg = ctx.config().detectors.slow_duty.clone();
    let samples = ctx.ego_samples(sampling, cfg.vehicle_classes)?;

    let mut speed = SpeedAccumulator::new();
    for sample in &samples {
        speed.push(sample.ego);
    }

    Ok(speed.mean_speed().map(|mean| {
        debug!(
            "Slow duty: mean ego displacement {:.1} px over {} samples",
            mean,
            speed.samples()
        );
        mean > cfg.speed_threshold_px
    }))
}

/// Ego failed to slow down. Roads without a slow-down duty short-circuit to a
/// categorical note.
pub fn slow_duty(ctx: &mut AnalysisContext<'_>) -> Result<FactorValue> {
    if matches!(ctx.road(), RoadContext::Highway | RoadContext::ArterialRoad) {
        return Ok(FactorValue::categorical("no slow-down duty on this road"));
    }

    let sampling = ctx.config().detectors.slow_duty.sampling;
    Ok(match measure_slow_duty(ctx, sampling)? {
        Some(failed_to_slow) => FactorValue::Bool(failed_to_slow),
        None => FactorValue::undeterminable("no vehicle motion measured"),
    })
}

/// Mean frame brightness below the night threshold.
pub fn low_visibility(ctx: &mut AnalysisContext<'_>) -> Result<FactorValue> {
    let cfg = ctx.config().detectors.low_visibility.clone();
    let lumas: Vec<f32> = ctx
        .sampled(cfg.sampling)
        .map(|i| ctx.frame(i).mean_luma())
        .collect();

    if lumas.is_empty() {
        return Ok(FactorValue::undeterminable("no frames sampled"));
    }
    let brightness = lumas.iter().sum::<f32>() / lumas.len() as f32;
    debug!("Low visibility: mean brightness {:.1}", brightness);
    Ok(FactorValue::Bool(brightness < cfg.brightness_threshold))
}

/// School-zone sign anywhere in the sequence.
pub fn school_zone(ctx: &mut AnalysisContext<'_>) -> Result<FactorValue> {
    let cfg = ctx.config().detectors.school_zone.clone();
    for index in ctx.sampled(cfg.sampling).collect::<Vec<_>>() {
        let detections = ctx.detections(index)?;
        if with_label(&detections, Label::SchoolZone).next().is_some() {
            debug!("School-zone sign at frame {}", index);
            return Ok(FactorValue::Bool(true));
        }
    }
    Ok(FactorValue::undeterminable(
        "school zone sign not detected, ask the user",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::EgoPolicy;
    use crate::testing::{boxed, Harness, HEIGHT, WIDTH};
    use crate::types::Frame;

    fn driving(h: &mut Harness, frames: usize, step_px: f32) {
        for i in 0..frames {
            h.add(i, boxed(Label::Car, 100.0 + step_px * i as f32, 300.0, 80.0, i));
        }
    }

    #[test]
    fn test_protection_duty_fast_near_pedestrian() {
        let mut h = Harness::new(20);
        driving(&mut h, 20, 10.0);
        // Sampled every 3rd frame: 30px per sample. Pedestrian joins late and close.
        h.add(13, boxed(Label::Person, 260.0, 320.0, 30.0, 13));
        h.add(16, boxed(Label::Person, 290.0, 320.0, 30.0, 16));
        // First co-observation has no speed yet; the second one decides
        assert_eq!(h.run(protection_duty_violation), FactorValue::Bool(true));
    }

    #[test]
    fn test_protection_duty_stopped_vehicle() {
        let mut h = Harness::new(20);
        driving(&mut h, 20, 0.0);
        for i in 0..20 {
            h.add(i, boxed(Label::Person, 120.0, 320.0, 30.0, i));
        }
        assert_eq!(h.run(protection_duty_violation), FactorValue::Bool(false));
    }

    #[test]
    fn test_protection_duty_never_co_observed() {
        let mut h = Harness::new(10);
        driving(&mut h, 10, 10.0);
        assert!(h.run(protection_duty_violation).is_undeterminable());
    }

    #[test]
    fn test_slow_duty() {
        let mut h = Harness::new(20);
        h.road = RoadContext::Alley;
        driving(&mut h, 20, 5.0);
        // 15px per sample > 10
        assert_eq!(h.run(slow_duty), FactorValue::Bool(true));

        let mut h = Harness::new(20);
        h.road = RoadContext::Alley;
        driving(&mut h, 20, 2.0);
        assert_eq!(h.run(slow_duty), FactorValue::Bool(false));

        let mut h = Harness::new(20);
        h.road = RoadContext::Alley;
        assert!(h.run(slow_duty).is_undeterminable());
    }

    /// A small car moving along the bottom of the frame and a large parked one
    /// higher up, in the given detector output order.
    fn two_candidates(policy: EgoPolicy, mover_first: bool) -> Harness {
        let mut h = Harness::new(12);
        h.road = RoadContext::Alley;
        h.config.ego.policy = policy;
        for i in 0..12 {
            let mover = boxed(Label::Car, 200.0 + 20.0 * i as f32, 440.0, 40.0, i);
            let parked = boxed(Label::Truck, 320.0, 150.0, 120.0, i);
            if mover_first {
                h.add(i, mover);
                h.add(i, parked);
            } else {
                h.add(i, parked);
                h.add(i, mover);
            }
        }
        h
    }

    #[test]
    fn test_slow_duty_follows_ego_policy() {
        let cases = [
            (EgoPolicy::LargestBox, true, false),
            (EgoPolicy::LargestBox, false, false),
            (EgoPolicy::ClosestToBottomCenter, true, true),
            (EgoPolicy::ClosestToBottomCenter, false, true),
            (EgoPolicy::FirstDetection, true, true),
            (EgoPolicy::FirstDetection, false, false),
        ];
        for (policy, mover_first, expected) in cases {
            let mut h = two_candidates(policy, mover_first);
            assert_eq!(
                h.run(slow_duty),
                FactorValue::Bool(expected),
                "{:?}, mover first: {}",
                policy,
                mover_first
            );
        }
    }

    #[test]
    fn test_slow_duty_not_applicable_on_highway() {
        let mut h = Harness::new(5);
        h.road = RoadContext::Highway;
        assert_eq!(
            h.run(slow_duty),
            FactorValue::categorical("no slow-down duty on this road")
        );
        assert_eq!(h.detector.calls(), 0);
    }

    #[test]
    fn test_low_visibility() {
        let mut h = Harness::new(10);
        assert_eq!(h.run(low_visibility), FactorValue::Bool(true));

        let mut h = Harness::new(0);
        h.frames = (0..10)
            .map(|i| Frame::filled(i, WIDTH, HEIGHT, [180, 180, 180]))
            .collect();
        assert_eq!(h.run(low_visibility), FactorValue::Bool(false));
    }

    #[test]
    fn test_school_zone() {
        let mut h = Harness::new(6);
        h.add(4, boxed(Label::SchoolZone, 50.0, 50.0, 30.0, 4));
        assert_eq!(h.run(school_zone), FactorValue::Bool(true));

        let mut h = Harness::new(6);
        assert!(h.run(school_zone).is_undeterminable());
    }
}
