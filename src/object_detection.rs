// src/object_detection.rs
//
// Detection adapter: one pretrained YOLOv8-style ONNX model behind the
// `ObjectDetector` trait. Detectors only see labeled boxes; model class
// indices are mapped onto `Label` through the configured class-name table.

use crate::config::ModelConfig;
use crate::error::{AnalysisError, Result};
use crate::preprocessing::letterbox;
use crate::types::{Detection, Frame, Label};
use ndarray::ArrayView2;
use ort::{
    execution_providers::{CPUExecutionProvider, CUDAExecutionProvider},
    session::{builder::GraphOptimizationLevel, Session},
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Anything that turns a frame into labeled boxes.
///
/// Failures abort the whole analysis; implementations must not swallow them.
pub trait ObjectDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;
}

impl<D: ObjectDetector + ?Sized> ObjectDetector for Box<D> {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        (**self).detect(frame)
    }
}

impl<D: ObjectDetector + ?Sized> ObjectDetector for &mut D {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        (**self).detect(frame)
    }
}

// ============================================================================
// SHARED DETECTOR
// ============================================================================

/// One model instance shared by concurrent analyses. Inference calls are
/// serialized through the mutex.
pub struct SharedDetector<D> {
    inner: Arc<Mutex<D>>,
}

impl<D> SharedDetector<D> {
    pub fn new(detector: D) -> Self {
        Self {
            inner: Arc::new(Mutex::new(detector)),
        }
    }
}

impl<D> Clone for SharedDetector<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: ObjectDetector> ObjectDetector for SharedDetector<D> {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        self.inner.lock().detect(frame)
    }
}

// ============================================================================
// YOLO DETECTOR
// ============================================================================

fn model_load_error(err: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::ModelLoad(err.to_string())
}

pub struct YoloDetector {
    session: Session,
    input_size: usize,
    input_name: String,
    confidence_threshold: f32,
    iou_threshold: f32,
    labels: Vec<Label>,
}

impl YoloDetector {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        info!("Loading detection model: {}", config.path);

        if !Path::new(&config.path).is_file() {
            return Err(AnalysisError::ModelLoad(format!(
                "model file not found: {}",
                config.path
            )));
        }

        let mut builder = Session::builder().map_err(model_load_error)?;
        builder = if config.use_cuda {
            info!("Enabling CUDA execution provider");
            builder
                .with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(0)
                    .build()])
                .map_err(model_load_error)?
        } else {
            builder
                .with_execution_providers([CPUExecutionProvider::default().build()])
                .map_err(model_load_error)?
        };

        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(model_load_error)?
            .with_intra_threads(config.intra_threads)
            .map_err(model_load_error)?
            .commit_from_file(&config.path)
            .map_err(model_load_error)?;

        let labels: Vec<Label> = config
            .class_names
            .iter()
            .map(|name| Label::from_class_name(name))
            .collect();

        info!("✓ Detection model ready ({} classes)", labels.len());

        Ok(Self {
            session,
            input_size: config.input_size,
            input_name: config.input_name.clone(),
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.iou_threshold,
            labels,
        })
    }
}

impl ObjectDetector for YoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let mut input = letterbox(&frame.data, frame.width, frame.height, self.input_size);
        let tensor = std::mem::take(&mut input.tensor);

        let shape = [1, 3, self.input_size, self.input_size];
        let input_value =
            ort::value::Value::from_array((shape.as_slice(), tensor.into_boxed_slice()))
                .map_err(|e| AnalysisError::inference(frame.index, e))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .map_err(|e| AnalysisError::inference(frame.index, e))?;

        let (output_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| AnalysisError::inference(frame.index, e))?;
        let dims: Vec<usize> = output_shape.iter().map(|&d| d as usize).collect();

        let raw = decode_predictions(
            &dims,
            data,
            &self.labels,
            self.confidence_threshold,
            frame.index,
        )?;

        let detections: Vec<Detection> = raw
            .into_iter()
            .map(|mut det| {
                det.bbox = clip_box(input.unmap(det.bbox), frame.width, frame.height);
                det
            })
            .collect();

        let detections = nms(detections, self.iou_threshold);
        debug!("Frame {}: {} detections", frame.index, detections.len());
        Ok(detections)
    }
}

/// Parse a `[1, 4 + classes, anchors]` (or transposed) YOLOv8 head.
/// Boxes stay in model input coordinates.
fn decode_predictions(
    dims: &[usize],
    data: &[f32],
    labels: &[Label],
    confidence_threshold: f32,
    frame_index: usize,
) -> Result<Vec<Detection>> {
    let features = 4 + labels.len();
    if dims.len() != 3 {
        return Err(AnalysisError::inference(
            frame_index,
            format!("unexpected output rank {:?}", dims),
        ));
    }

    let view = ArrayView2::from_shape((dims[1], dims[2]), data)
        .map_err(|e| AnalysisError::inference(frame_index, e))?;
    // Rows = features, columns = anchors
    let view = if dims[1] == features {
        view
    } else if dims[2] == features {
        view.reversed_axes()
    } else {
        return Err(AnalysisError::inference(
            frame_index,
            format!(
                "output shape {:?} does not match {} configured classes",
                dims,
                labels.len()
            ),
        ));
    };

    let mut detections = Vec::new();
    for anchor in view.columns() {
        let mut best_class = 0;
        let mut best_conf = 0.0f32;
        for (c, &conf) in anchor.iter().skip(4).enumerate() {
            if conf > best_conf {
                best_conf = conf;
                best_class = c;
            }
        }

        if best_conf < confidence_threshold {
            continue;
        }
        let label = labels[best_class];
        if label == Label::Other {
            continue;
        }

        let (cx, cy, w, h) = (anchor[0], anchor[1], anchor[2], anchor[3]);
        detections.push(Detection {
            label,
            bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
            confidence: best_conf,
            frame_index,
        });
    }

    Ok(detections)
}

fn clip_box(bbox: [f32; 4], width: usize, height: usize) -> [f32; 4] {
    let (w, h) = (width as f32, height as f32);
    [
        bbox[0].clamp(0.0, w),
        bbox[1].clamp(0.0, h),
        bbox[2].clamp(0.0, w),
        bbox[3].clamp(0.0, h),
    ]
}

/// Per-label non-maximum suppression. Output is sorted by descending confidence.
pub fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Detection> = Vec::with_capacity(detections.len());
    for det in detections {
        let suppressed = keep
            .iter()
            .any(|k| k.label == det.label && calculate_iou(&k.bbox, &det.bbox) >= iou_threshold);
        if !suppressed {
            keep.push(det);
        }
    }
    keep
}

pub fn calculate_iou(box1: &[f32; 4], box2: &[f32; 4]) -> f32 {
    let x1 = box1[0].max(box2[0]);
    let y1 = box1[1].max(box2[1]);
    let x2 = box1[2].min(box2[2]);
    let y2 = box1[3].min(box2[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area1 = (box1[2] - box1[0]) * (box1[3] - box1[1]);
    let area2 = (box2[2] - box2[0]) * (box2[3] - box2[1]);
    let union = area1 + area2 - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}
