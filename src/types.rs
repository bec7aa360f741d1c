// src/types.rs

use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// FRAMES & DETECTIONS
// ============================================================================

/// One decoded video frame. RGB, row-major, 3 bytes per pixel.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: usize,
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(index: usize, width: usize, height: usize, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width * height * 3);
        Self {
            index,
            width,
            height,
            data,
        }
    }

    /// Uniform frame, mostly useful for synthetic sequences.
    pub fn filled(index: usize, width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        Self::new(index, width, height, data)
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let idx = (y * self.width + x) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    /// Mean ITU-R BT.601 luma over the whole frame.
    pub fn mean_luma(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .data
            .chunks_exact(3)
            .map(|p| 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64)
            .sum();
        (sum / (self.width * self.height) as f64) as f32
    }
}

/// Fixed detection vocabulary. Model class names are mapped onto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Car,
    Truck,
    Bus,
    Motorcycle,
    Bicycle,
    Person,
    TrafficLight,
    Crosswalk,
    SchoolZone,
    Other,
}

impl Label {
    pub fn from_class_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().replace('_', " ").as_str() {
            "car" => Label::Car,
            "truck" => Label::Truck,
            "bus" => Label::Bus,
            "motorcycle" => Label::Motorcycle,
            "bicycle" => Label::Bicycle,
            "person" | "pedestrian" => Label::Person,
            "traffic light" => Label::TrafficLight,
            "crosswalk" | "crossing" => Label::Crosswalk,
            "school zone" | "children zone" => Label::SchoolZone,
            _ => Label::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Car => "car",
            Label::Truck => "truck",
            Label::Bus => "bus",
            Label::Motorcycle => "motorcycle",
            Label::Bicycle => "bicycle",
            Label::Person => "person",
            Label::TrafficLight => "traffic_light",
            Label::Crosswalk => "crosswalk",
            Label::SchoolZone => "school_zone",
            Label::Other => "other",
        }
    }

    /// Car, truck or bus.
    pub fn is_vehicle(&self) -> bool {
        matches!(self, Label::Car | Label::Truck | Label::Bus)
    }

    /// Car or truck, the narrower class set the trajectory heuristics use.
    pub fn is_car_or_truck(&self) -> bool {
        matches!(self, Label::Car | Label::Truck)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which vehicle labels a detector considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClasses {
    /// car, truck, bus
    All,
    /// car, truck
    CarOrTruck,
}

impl VehicleClasses {
    pub fn contains(&self, label: Label) -> bool {
        match self {
            VehicleClasses::All => label.is_vehicle(),
            VehicleClasses::CarOrTruck => label.is_car_or_truck(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: Label,
    /// [x1, y1, x2, y2] in frame pixel coordinates
    pub bbox: [f32; 4],
    pub confidence: f32,
    pub frame_index: usize,
}

impl Detection {
    pub fn new(label: Label, bbox: [f32; 4], frame_index: usize) -> Self {
        Self {
            label,
            bbox,
            confidence: 1.0,
            frame_index,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (
            (self.bbox[0] + self.bbox[2]) * 0.5,
            (self.bbox[1] + self.bbox[3]) * 0.5,
        )
    }

    pub fn area(&self) -> f32 {
        (self.bbox[2] - self.bbox[0]).max(0.0) * (self.bbox[3] - self.bbox[1]).max(0.0)
    }

    pub fn bottom_y(&self) -> f32 {
        self.bbox[3]
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        self.bbox[0] <= x && x <= self.bbox[2] && self.bbox[1] <= y && y <= self.bbox[3]
    }
}

// ============================================================================
// SCENARIO TAGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccidentType {
    VehicleToVehicle,
    VehicleToPedestrian,
}

impl AccidentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccidentType::VehicleToVehicle => "vehicle-vehicle",
            AccidentType::VehicleToPedestrian => "vehicle-pedestrian",
        }
    }
}

impl FromStr for AccidentType {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "vehicle-vehicle" | "vehicle_vehicle" | "차대차" => Ok(AccidentType::VehicleToVehicle),
            "vehicle-pedestrian" | "vehicle_pedestrian" | "차대보행자" => {
                Ok(AccidentType::VehicleToPedestrian)
            }
            other => Err(AnalysisError::UnsupportedScenario(format!(
                "unknown accident type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for AccidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Road context tag. Unknown tags are preserved so the scenario selector can
/// report them as an error factor instead of failing the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoadContext {
    Intersection,
    Highway,
    GeneralRoad,
    MajorRoad,
    MinorRoad,
    ArterialRoad,
    Alley,
    Residential,
    ParkingLot,
    NoSidewalk,
    Sidewalk,
    ProtectionZone,
    Night,
    LowVisibility,
    Other(String),
}

impl RoadContext {
    pub const KNOWN: [RoadContext; 14] = [
        RoadContext::Intersection,
        RoadContext::Highway,
        RoadContext::GeneralRoad,
        RoadContext::MajorRoad,
        RoadContext::MinorRoad,
        RoadContext::ArterialRoad,
        RoadContext::Alley,
        RoadContext::Residential,
        RoadContext::ParkingLot,
        RoadContext::NoSidewalk,
        RoadContext::Sidewalk,
        RoadContext::ProtectionZone,
        RoadContext::Night,
        RoadContext::LowVisibility,
    ];

    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "intersection" | "교차로" => RoadContext::Intersection,
            "highway" | "고속도로" => RoadContext::Highway,
            "general-road" | "일반도로" => RoadContext::GeneralRoad,
            "major-road" | "대로" => RoadContext::MajorRoad,
            "minor-road" | "소로" => RoadContext::MinorRoad,
            "arterial-road" | "간선도로" => RoadContext::ArterialRoad,
            "alley" | "골목길" => RoadContext::Alley,
            "residential" | "주택가" => RoadContext::Residential,
            "parking-lot" | "주차장" => RoadContext::ParkingLot,
            "no-sidewalk" | "보도 없음" => RoadContext::NoSidewalk,
            "sidewalk" | "보도 있음" => RoadContext::Sidewalk,
            "protection-zone" | "보호구역" => RoadContext::ProtectionZone,
            "night" | "야간" => RoadContext::Night,
            "low-visibility" | "시야장애" => RoadContext::LowVisibility,
            other => RoadContext::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RoadContext::Intersection => "intersection",
            RoadContext::Highway => "highway",
            RoadContext::GeneralRoad => "general-road",
            RoadContext::MajorRoad => "major-road",
            RoadContext::MinorRoad => "minor-road",
            RoadContext::ArterialRoad => "arterial-road",
            RoadContext::Alley => "alley",
            RoadContext::Residential => "residential",
            RoadContext::ParkingLot => "parking-lot",
            RoadContext::NoSidewalk => "no-sidewalk",
            RoadContext::Sidewalk => "sidewalk",
            RoadContext::ProtectionZone => "protection-zone",
            RoadContext::Night => "night",
            RoadContext::LowVisibility => "low-visibility",
            RoadContext::Other(tag) => tag,
        }
    }
}

impl fmt::Display for RoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
