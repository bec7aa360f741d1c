// src/analyzer.rs
//
// Top-level entry point: video + accident type + road context → AnalysisResult.
//
//   FrameSource::load → scenario::select → per factor: detector(ctx) → result
//
// The detector is loaded once per Analyzer; frames, memo and trackers live
// only for one `analyze` call.

use crate::config::Config;
use crate::detectors::AnalysisContext;
use crate::error::{AnalysisError, Result};
use crate::factors::{AnalysisResult, FactorValue};
use crate::lane_detection::{HoughLineExtractor, LineSegmentExtractor};
use crate::object_detection::{ObjectDetector, YoloDetector};
use crate::scenario::{self, PlannedFactor};
use crate::types::{AccidentType, Frame, RoadContext};
use crate::video_processor::FrameSource;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

pub struct Analyzer<D, L = HoughLineExtractor> {
    config: Config,
    detector: D,
    lines: L,
}

impl Analyzer<YoloDetector> {
    /// Load the configured model. A missing or broken model is fatal here,
    /// never per request.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let detector = YoloDetector::new(&config.model)?;
        Ok(Self {
            config,
            detector,
            lines: HoughLineExtractor,
        })
    }
}

impl<D: ObjectDetector, L: LineSegmentExtractor> Analyzer<D, L> {
    pub fn with_parts(config: Config, detector: D, lines: L) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            detector,
            lines,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Same as `analyze`, with raw tags as the API layer receives them.
    pub fn analyze_tags(
        &mut self,
        video: impl AsRef<Path>,
        accident_tag: &str,
        road_tag: &str,
    ) -> Result<AnalysisResult> {
        let accident: AccidentType = accident_tag.parse()?;
        let road = RoadContext::from_tag(road_tag);
        self.analyze(video, accident, &road)
    }

    pub fn analyze(
        &mut self,
        video: impl AsRef<Path>,
        accident: AccidentType,
        road: &RoadContext,
    ) -> Result<AnalysisResult> {
        let frames = FrameSource::load(video)?;
        self.analyze_frames(&frames, accident, road)
    }

    /// Run the scenario's detectors over an already decoded sequence.
    pub fn analyze_frames(
        &mut self,
        frames: &[Frame],
        accident: AccidentType,
        road: &RoadContext,
    ) -> Result<AnalysisResult> {
        if frames.is_empty() {
            return Err(AnalysisError::EmptyMedia(PathBuf::from("<frames>")));
        }

        let start = Instant::now();
        let plan = scenario::select(accident, road);
        info!(
            "Analyzing {} frames as {} / {} ({} factors)",
            frames.len(),
            accident,
            road,
            plan.len()
        );

        let mut ctx = AnalysisContext::new(
            frames,
            &self.config,
            road.clone(),
            &mut self.detector,
            &self.lines,
        );
        let mut result = AnalysisResult::new();

        for planned in plan {
            match planned {
                PlannedFactor::Detect(kind) => {
                    debug!("Evaluating {}", kind);
                    let value = kind.evaluate(&mut ctx)?;
                    info!("  {} = {}", kind, value);
                    result.insert(kind.key(), value);
                }
                PlannedFactor::Fixed { key, value } => {
                    info!("  {} = {}", key, value);
                    result.insert(key, FactorValue::Categorical(value));
                }
            }
        }

        info!(
            "✓ Analysis done in {:.1}s ({} frames inferred, {} undeterminable)",
            start.elapsed().as_secs_f64(),
            ctx.inferred_frames(),
            result.undeterminable_factors().len()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{blank_frames, boxed, FixedLines, ScriptedDetector};
    use crate::types::{Detection, Label};

    const LIGHT: [f32; 4] = [300.0, 20.0, 320.0, 60.0];

    fn analyzer(detector: ScriptedDetector) -> Analyzer<ScriptedDetector, FixedLines> {
        Analyzer::with_parts(Config::default(), detector, FixedLines::none()).unwrap()
    }

    #[test]
    fn test_intersection_single_vehicle_entering() {
        let frames = blank_frames(20);
        let mut detector = ScriptedDetector::new();
        for i in 0..20 {
            detector.add(i, Detection::new(Label::TrafficLight, LIGHT, i));
        }
        // 85% of the frame height in frame 12, no red light anywhere
        detector.add(12, boxed(Label::Car, 320.0, 408.0, 60.0, 12));

        let mut analyzer = analyzer(detector);
        let result = analyzer
            .analyze_frames(&frames, AccidentType::VehicleToVehicle, &RoadContext::Intersection)
            .unwrap();

        assert_eq!(
            result.keys().collect::<Vec<_>>(),
            vec![
                "signal_violation",
                "prior_entry",
                "turn_duty_violation",
                "wrong_direction",
                "illegal_lane_change",
                "abrupt_maneuver",
            ]
        );
        assert_eq!(result.get("signal_violation"), Some(&FactorValue::Bool(false)));
        assert!(result.get("prior_entry").unwrap().is_undeterminable());
        assert!(result.undeterminable_factors().contains(&"prior_entry"));
        // Every frame inferred at most once across all detectors
        assert_eq!(analyzer.detector().calls(), 20);
    }

    #[test]
    fn test_unknown_road_type_is_error_factor() {
        let frames = blank_frames(3);
        let mut analyzer = analyzer(ScriptedDetector::new());
        let result = analyzer
            .analyze_frames(
                &frames,
                AccidentType::VehicleToVehicle,
                &RoadContext::from_tag("runway"),
            )
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            result.get("error"),
            Some(&FactorValue::categorical("unknown road type: runway"))
        );
        assert_eq!(analyzer.detector().calls(), 0);
    }

    #[test]
    fn test_pedestrian_highway_plan() {
        let frames = blank_frames(6);
        let mut analyzer = analyzer(ScriptedDetector::new());
        let result = analyzer
            .analyze_frames(&frames, AccidentType::VehicleToPedestrian, &RoadContext::Highway)
            .unwrap();
        assert_eq!(
            result.get("slow_duty"),
            Some(&FactorValue::categorical("no slow-down duty on this road"))
        );
        assert!(matches!(
            result.get("highway_pedestrian_fault"),
            Some(FactorValue::Categorical(_))
        ));
        assert!(result.get("pedestrian_signal_violation").unwrap().is_undeterminable());
    }

    #[test]
    fn test_adapter_failure_aborts_analysis() {
        let frames = blank_frames(10);
        let mut analyzer = analyzer(ScriptedDetector::new().failing_on(4));
        let err = analyzer
            .analyze_frames(&frames, AccidentType::VehicleToVehicle, &RoadContext::Highway)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Inference { frame_index: 4, .. }));
    }

    #[test]
    fn test_scenario_and_media_errors() {
        let mut analyzer = analyzer(ScriptedDetector::new());
        assert!(matches!(
            analyzer.analyze_tags("/no/such/video.mp4", "truck-bicycle", "highway"),
            Err(AnalysisError::UnsupportedScenario(_))
        ));
        assert!(matches!(
            analyzer.analyze_tags("/no/such/video.mp4", "차대차", "고속도로"),
            Err(AnalysisError::Io { .. })
        ));
        assert!(matches!(
            analyzer.analyze_frames(&[], AccidentType::VehicleToVehicle, &RoadContext::Highway),
            Err(AnalysisError::EmptyMedia(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.detectors.low_visibility.sampling.step = 0;
        assert!(matches!(
            Analyzer::with_parts(config, ScriptedDetector::new(), FixedLines::none()),
            Err(AnalysisError::Config(_))
        ));
    }
}
