// src/detectors/mod.rs
//
// Rule detector bank. One function per violation factor, each a pure
// function of the run's `AnalysisContext`:
//
//   signal: signal_violation, pedestrian_signal_violation, crosswalk_violation
//   trajectory: prior_entry, turn_duty_violation, wrong_direction,
//     unclear_entry, center_line_violation
//   proximity: tailgating, illegal_lane_change, abrupt_maneuver,
//     merge_yield_violation
//   pedestrian: protection_duty_violation, slow_duty, low_visibility, school_zone
//
// Missing scene elements come back as `FactorValue::Undeterminable`; only
// adapter/vision failures are errors.

pub mod context;
pub mod pedestrian;
pub mod proximity;
pub mod signal;
pub mod trajectory;

pub use context::{AnalysisContext, EgoSample};

use crate::error::Result;
use crate::factors::FactorValue;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactorKind {
    SignalViolation,
    PriorEntry,
    TurnDutyViolation,
    WrongDirection,
    IllegalLaneChange,
    AbruptManeuver,
    Tailgating,
    CenterLineViolation,
    UnclearEntry,
    MergeYieldViolation,
    PedestrianSignalViolation,
    CrosswalkViolation,
    ProtectionDutyViolation,
    SlowDuty,
    LowVisibility,
    SchoolZone,
}

impl FactorKind {
    pub const ALL: [FactorKind; 16] = [
        FactorKind::SignalViolation,
        FactorKind::PriorEntry,
        FactorKind::TurnDutyViolation,
        FactorKind::WrongDirection,
        FactorKind::IllegalLaneChange,
        FactorKind::AbruptManeuver,
        FactorKind::Tailgating,
        FactorKind::CenterLineViolation,
        FactorKind::UnclearEntry,
        FactorKind::MergeYieldViolation,
        FactorKind::PedestrianSignalViolation,
        FactorKind::CrosswalkViolation,
        FactorKind::ProtectionDutyViolation,
        FactorKind::SlowDuty,
        FactorKind::LowVisibility,
        FactorKind::SchoolZone,
    ];

    /// Result key
    pub fn key(&self) -> &'static str {
        match self {
            FactorKind::SignalViolation => "signal_violation",
            FactorKind::PriorEntry => "prior_entry",
            FactorKind::TurnDutyViolation => "turn_duty_violation",
            FactorKind::WrongDirection => "wrong_direction",
            FactorKind::IllegalLaneChange => "illegal_lane_change",
            FactorKind::AbruptManeuver => "abrupt_maneuver",
            FactorKind::Tailgating => "tailgating",
            FactorKind::CenterLineViolation => "center_line_violation",
            FactorKind::UnclearEntry => "unclear_entry",
            FactorKind::MergeYieldViolation => "merge_yield_violation",
            FactorKind::PedestrianSignalViolation => "pedestrian_signal_violation",
            FactorKind::CrosswalkViolation => "crosswalk_violation",
            FactorKind::ProtectionDutyViolation => "protection_duty_violation",
            FactorKind::SlowDuty => "slow_duty",
            FactorKind::LowVisibility => "low_visibility",
            FactorKind::SchoolZone => "school_zone",
        }
    }

    pub fn evaluate(&self, ctx: &mut AnalysisContext<'_>) -> Result<FactorValue> {
        match self {
            FactorKind::SignalViolation => signal::signal_violation(ctx),
            FactorKind::PriorEntry => trajectory::prior_entry(ctx),
            FactorKind::TurnDutyViolation => trajectory::turn_duty_violation(ctx),
            FactorKind::WrongDirection => trajectory::wrong_direction(ctx),
            FactorKind::IllegalLaneChange => proximity::illegal_lane_change(ctx),
            FactorKind::AbruptManeuver => proximity::abrupt_maneuver(ctx),
            FactorKind::Tailgating => proximity::tailgating(ctx),
            FactorKind::CenterLineViolation => trajectory::center_line_violation(ctx),
            FactorKind::UnclearEntry => trajectory::unclear_entry(ctx),
            FactorKind::MergeYieldViolation => proximity::merge_yield_violation(ctx),
            FactorKind::PedestrianSignalViolation => signal::pedestrian_signal_violation(ctx),
            FactorKind::CrosswalkViolation => signal::crosswalk_violation(ctx),
            FactorKind::ProtectionDutyViolation => pedestrian::protection_duty_violation(ctx),
            FactorKind::SlowDuty => pedestrian::slow_duty(ctx),
            FactorKind::LowVisibility => pedestrian::low_visibility(ctx),
            FactorKind::SchoolZone => pedestrian::school_zone(ctx),
        }
    }
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
