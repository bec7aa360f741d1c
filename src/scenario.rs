// src/scenario.rs
//
// Static scenario table: (accident type, road context) → ordered factor plan.
// The key set depends only on the two tags, never on the video.

use crate::detectors::FactorKind::{self, *};
use crate::types::{AccidentType, RoadContext};
use tracing::debug;

/// One entry of the plan: either a detector to run or a fixed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedFactor {
    Detect(FactorKind),
    Fixed { key: &'static str, value: String },
}

impl PlannedFactor {
    pub fn key(&self) -> &'static str {
        match self {
            PlannedFactor::Detect(kind) => kind.key(),
            PlannedFactor::Fixed { key, .. } => *key,
        }
    }

    fn fixed(key: &'static str, value: impl Into<String>) -> Self {
        PlannedFactor::Fixed {
            key,
            value: value.into(),
        }
    }
}

const INTERSECTION: &[FactorKind] = &[
    SignalViolation,
    PriorEntry,
    TurnDutyViolation,
    WrongDirection,
    IllegalLaneChange,
    AbruptManeuver,
];

const HIGHWAY: &[FactorKind] = &[
    Tailgating,
    WrongDirection,
    AbruptManeuver,
    IllegalLaneChange,
    MergeYieldViolation,
];

const GENERAL_ROAD: &[FactorKind] = &[
    CenterLineViolation,
    Tailgating,
    IllegalLaneChange,
    AbruptManeuver,
    WrongDirection,
];

const NARROW_ROAD: &[FactorKind] = &[
    UnclearEntry,
    Tailgating,
    IllegalLaneChange,
    AbruptManeuver,
];

const PEDESTRIAN: &[FactorKind] = &[
    PedestrianSignalViolation,
    CrosswalkViolation,
    ProtectionDutyViolation,
    SlowDuty,
];

pub fn select(accident: AccidentType, road: &RoadContext) -> Vec<PlannedFactor> {
    let plan = match accident {
        AccidentType::VehicleToVehicle => vehicle_plan(road),
        AccidentType::VehicleToPedestrian => pedestrian_plan(road),
    };
    debug!(
        "Scenario {} / {}: {:?}",
        accident,
        road,
        plan.iter().map(PlannedFactor::key).collect::<Vec<_>>()
    );
    plan
}

fn detect_all(kinds: &[FactorKind]) -> Vec<PlannedFactor> {
    kinds.iter().copied().map(PlannedFactor::Detect).collect()
}

fn vehicle_plan(road: &RoadContext) -> Vec<PlannedFactor> {
    match road {
        RoadContext::Intersection => detect_all(INTERSECTION),
        RoadContext::Highway => detect_all(HIGHWAY),
        RoadContext::GeneralRoad
        | RoadContext::MajorRoad
        | RoadContext::MinorRoad
        | RoadContext::ArterialRoad => detect_all(GENERAL_ROAD),
        RoadContext::Alley | RoadContext::Residential | RoadContext::ParkingLot => {
            detect_all(NARROW_ROAD)
        }
        other => vec![PlannedFactor::fixed(
            "error",
            format!("unknown road type: {}", other),
        )],
    }
}

fn pedestrian_plan(road: &RoadContext) -> Vec<PlannedFactor> {
    let mut plan = detect_all(PEDESTRIAN);
    match road {
        RoadContext::Night | RoadContext::LowVisibility => {
            plan.push(PlannedFactor::Detect(LowVisibility))
        }
        RoadContext::NoSidewalk => plan.push(PlannedFactor::fixed(
            "no_sidewalk",
            "no sidewalk separation; heightened slow-down and lookout duty",
        )),
        RoadContext::Highway => plan.push(PlannedFactor::fixed(
            "highway_pedestrian_fault",
            "pedestrian fault high on highways (up to 80%)",
        )),
        RoadContext::ProtectionZone => plan.push(PlannedFactor::Detect(SchoolZone)),
        _ => {}
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(plan: &[PlannedFactor]) -> Vec<&'static str> {
        plan.iter().map(PlannedFactor::key).collect()
    }

    #[test]
    fn test_selection_is_deterministic_and_non_empty() {
        for accident in [AccidentType::VehicleToVehicle, AccidentType::VehicleToPedestrian] {
            for road in RoadContext::KNOWN.iter() {
                let first = select(accident, road);
                let second = select(accident, road);
                assert!(!first.is_empty(), "{} / {}", accident, road);
                assert_eq!(first, second);
            }
        }
    }

    #[test]
    fn test_intersection_keys_in_order() {
        let plan = select(AccidentType::VehicleToVehicle, &RoadContext::Intersection);
        assert_eq!(
            keys(&plan),
            vec![
                "signal_violation",
                "prior_entry",
                "turn_duty_violation",
                "wrong_direction",
                "illegal_lane_change",
                "abrupt_maneuver",
            ]
        );
    }

    #[test]
    fn test_highway_includes_merge_yield() {
        let plan = select(AccidentType::VehicleToVehicle, &RoadContext::Highway);
        assert!(keys(&plan).contains(&"merge_yield_violation"));
    }

    #[test]
    fn test_unknown_road_yields_single_error_factor() {
        let plan = select(
            AccidentType::VehicleToVehicle,
            &RoadContext::Other("moon-base".to_string()),
        );
        assert_eq!(
            plan,
            vec![PlannedFactor::Fixed {
                key: "error",
                value: "unknown road type: moon-base".to_string()
            }]
        );

        // Pedestrian-side contexts that are not road types are errors here too
        let plan = select(AccidentType::VehicleToVehicle, &RoadContext::Night);
        assert_eq!(keys(&plan), vec!["error"]);
    }

    #[test]
    fn test_pedestrian_context_additions() {
        let base = vec![
            "pedestrian_signal_violation",
            "crosswalk_violation",
            "protection_duty_violation",
            "slow_duty",
        ];
        let plan = select(AccidentType::VehicleToPedestrian, &RoadContext::Sidewalk);
        assert_eq!(keys(&plan), base);

        let plan = select(AccidentType::VehicleToPedestrian, &RoadContext::Night);
        assert_eq!(keys(&plan).last(), Some(&"low_visibility"));

        let plan = select(AccidentType::VehicleToPedestrian, &RoadContext::ProtectionZone);
        assert_eq!(keys(&plan).last(), Some(&"school_zone"));

        let plan = select(AccidentType::VehicleToPedestrian, &RoadContext::Highway);
        assert_eq!(keys(&plan).last(), Some(&"highway_pedestrian_fault"));

        let plan = select(AccidentType::VehicleToPedestrian, &RoadContext::NoSidewalk);
        assert_eq!(keys(&plan).last(), Some(&"no_sidewalk"));
    }
}
