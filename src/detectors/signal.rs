// src/detectors/signal.rs
//
// Signal-state detectors: vehicle signal violation, pedestrian signal
// violation and crosswalk violation. All three scan the full sampled
// sequence and decide afterwards; the first red frame is compared against
// the first "entered" frame.

use super::context::{with_label, AnalysisContext};
use super::pedestrian::measure_slow_duty;
use crate::config::Sampling;
use crate::error::Result;
use crate::factors::FactorValue;
use crate::types::{Detection, Frame, Label};
use tracing::{debug, info};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct SignalScan {
    light_seen: bool,
    first_red: Option<usize>,
    first_entry: Option<usize>,
}

impl SignalScan {
    /// Red at or before entry. Entry without red (or red without entry) is no violation.
    fn entered_on_red(&self) -> bool {
        match (self.first_red, self.first_entry) {
            (Some(red), Some(entry)) => entry >= red,
            _ => false,
        }
    }
}

fn scan_signal<F>(ctx: &mut AnalysisContext<'_>, sampling: Sampling, entered: F) -> Result<SignalScan>
where
    F: Fn(&Detection, &Frame) -> bool,
{
    let mut scan = SignalScan::default();

    for index in ctx.sampled(sampling).collect::<Vec<_>>() {
        let detections = ctx.detections(index)?;
        let frame = ctx.frame(index);

        for light in with_label(&detections, Label::TrafficLight) {
            scan.light_seen = true;
            if scan.first_red.is_none() && ctx.is_red_light(frame, light) {
                debug!("Red light first seen at frame {}", index);
                scan.first_red = Some(index);
            }
        }

        if scan.first_entry.is_none() && detections.iter().any(|d| entered(d, frame)) {
            debug!("Entry first seen at frame {}", index);
            scan.first_entry = Some(index);
        }
    }

    Ok(scan)
}

/// Vehicle entered the junction on red. Without any traffic light the
/// slow-duty measure substitutes, reported as a categorical annotation.
pub fn signal_violation(ctx: &mut AnalysisContext<'_>) -> Result<FactorValue> {
    let cfg = ctx.config().detectors.signal_violation.clone();
    let entry_ratio = cfg.entry_line_ratio;
    let scan = scan_signal(ctx, cfg.sampling, |det, frame| {
        det.label.is_vehicle() && det.bottom_y() > frame.height as f32 * entry_ratio
    })?;

    if !scan.light_seen {
        let fallback_sampling = ctx.config().detectors.slow_duty.fallback_sampling;
        info!("No traffic light detected, falling back to slow-duty measure");
        return Ok(match measure_slow_duty(ctx, fallback_sampling)? {
            Some(failed_to_slow) => FactorValue::categorical(format!(
                "no traffic light detected; slow-duty fallback: {}",
                failed_to_slow
            )),
            None => FactorValue::undeterminable(
                "no traffic light detected and no vehicle motion for the slow-duty fallback",
            ),
        });
    }

    debug!(
        "Signal scan: first red {:?}, first entry {:?}",
        scan.first_red, scan.first_entry
    );
    Ok(FactorValue::Bool(scan.entered_on_red()))
}

/// Pedestrian stepped into the road on red.
pub fn pedestrian_signal_violation(ctx: &mut AnalysisContext<'_>) -> Result<FactorValue> {
    let cfg = ctx.config().detectors.crosswalk.clone();
    let entry_ratio = cfg.entry_line_ratio;
    let scan = scan_signal(ctx, cfg.sampling, |det, frame| {
        det.label == Label::Person && det.bottom_y() > frame.height as f32 * entry_ratio
    })?;

    if !scan.light_seen {
        return Ok(FactorValue::undeterminable(
            "pedestrian signal not detected, ask the user",
        ));
    }
    Ok(FactorValue::Bool(scan.entered_on_red()))
}

/// Pedestrian on the roadway outside the most recently seen crosswalks, or
/// inside a crosswalk at or after the first red frame.
pub fn crosswalk_violation(ctx: &mut AnalysisContext<'_>) -> Result<FactorValue> {
    let cfg = ctx.config().detectors.crosswalk.clone();

    let mut light_seen = false;
    let mut first_red: Option<usize> = None;
    let mut crosswalks: Vec<Detection> = Vec::new();
    let mut crosswalk_seen = false;
    let mut violation = false;

    for index in ctx.sampled(cfg.sampling).collect::<Vec<_>>() {
        let detections = ctx.detections(index)?;
        let frame = ctx.frame(index);

        for light in with_label(&detections, Label::TrafficLight) {
            light_seen = true;
            if first_red.is_none() && ctx.is_red_light(frame, light) {
                first_red = Some(index);
            }
        }

        let current: Vec<Detection> = with_label(&detections, Label::Crosswalk).cloned().collect();
        if !current.is_empty() {
            crosswalk_seen = true;
            crosswalks = current;
        }

        if violation {
            continue;
        }
        let roadway_y = frame.height as f32 * cfg.roadway_line_ratio;
        for person in with_label(&detections, Label::Person) {
            let (cx, cy) = person.center();
            let inside = crosswalks.iter().any(|c| c.contains_point(cx, cy));
            let on_red = first_red.map_or(false, |red| index >= red);
            if (!inside && cy > roadway_y) || (inside && on_red) {
                debug!(
                    "Crosswalk violation at frame {} (inside crosswalk: {})",
                    index, inside
                );
                violation = true;
                break;
            }
        }
    }

    if !light_seen {
        return Ok(FactorValue::undeterminable(
            "pedestrian signal not detected, ask the user",
        ));
    }
    if !crosswalk_seen {
        return Ok(FactorValue::undeterminable(
            "crosswalk not detected, ask the user",
        ));
    }
    Ok(FactorValue::Bool(violation))
}
