// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors that abort an analysis run.
///
/// Missing scene elements (no traffic light, no crosswalk, ...) are not errors;
/// they surface as `FactorValue::Undeterminable` inside the result.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("cannot open video {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("video {0} yielded no decodable frames")]
    EmptyMedia(PathBuf),

    #[error("detection model unavailable: {0}")]
    ModelLoad(String),

    #[error("unsupported scenario: {0}")]
    UnsupportedScenario(String),

    #[error("detection failed on frame {frame_index}: {message}")]
    Inference { frame_index: usize, message: String },

    #[error("vision measurement failed: {0}")]
    Vision(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AnalysisError {
    pub fn io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Io {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn inference(frame_index: usize, message: impl std::fmt::Display) -> Self {
        Self::Inference {
            frame_index,
            message: message.to_string(),
        }
    }
}

impl From<opencv::Error> for AnalysisError {
    fn from(err: opencv::Error) -> Self {
        Self::Vision(err.to_string())
    }
}
