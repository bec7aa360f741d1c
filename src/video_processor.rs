// src/video_processor.rs
//
// Frame source: decode a whole video into memory up front. Detectors index
// frames by position ("the frame 60% through"), so there is no lazy streaming.

use crate::error::{AnalysisError, Result};
use crate::types::Frame;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTrait, VideoCaptureTraitConst},
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];

/// Upper bound on frames reserved up front; the container count is only a hint.
const MAX_PREALLOC_FRAMES: usize = 4096;

pub struct FrameSource;

impl FrameSource {
    /// Decode every frame of `path` as RGB.
    ///
    /// `Io` if the file is missing or cannot be opened, `EmptyMedia` if it
    /// decodes to zero frames.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<Frame>> {
        let path = path.as_ref();
        info!("Opening video: {}", path.display());

        if !path.is_file() {
            return Err(AnalysisError::io(path, "no such file"));
        }
        let path_str = path
            .to_str()
            .ok_or_else(|| AnalysisError::io(path, "path is not valid UTF-8"))?;

        let mut cap = VideoCapture::from_file(path_str, videoio::CAP_ANY)
            .map_err(|e| AnalysisError::io(path, e.to_string()))?;
        if !cap.is_opened()? {
            return Err(AnalysisError::io(path, "decoder could not open file"));
        }

        let fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS)?;
        let reported = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_COUNT)?;
        debug!("Container reports {} frames @ {:.1} FPS", reported, fps);

        let mut frames = Vec::with_capacity(prealloc_frames(reported));
        let mut mat = Mat::default();
        loop {
            if !VideoCaptureTrait::read(&mut cap, &mut mat)? || mat.empty() {
                break;
            }

            let mut rgb = Mat::default();
            imgproc::cvt_color(&mat, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

            let width = rgb.cols() as usize;
            let height = rgb.rows() as usize;
            let data = rgb.data_bytes()?.to_vec();
            frames.push(Frame::new(frames.len(), width, height, data));
        }

        if frames.is_empty() {
            return Err(AnalysisError::EmptyMedia(path.to_path_buf()));
        }

        let (w, h) = (frames[0].width, frames[0].height);
        info!("Decoded {} frames ({}x{})", frames.len(), w, h);
        if frames.iter().any(|f| f.width != w || f.height != h) {
            warn!("Frame size changes mid-stream; geometry thresholds assume a fixed size");
        }

        Ok(frames)
    }
}

/// Capacity to reserve for a container-reported frame count, which may be
/// negative, NaN or absurd on damaged files.
fn prealloc_frames(reported: f64) -> usize {
    if reported.is_finite() && reported > 0.0 {
        (reported as usize).min(MAX_PREALLOC_FRAMES)
    } else {
        0
    }
}

fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// All video files under `dir`, sorted by path.
pub fn find_video_files(dir: impl AsRef<Path>) -> Vec<PathBuf> {
    let mut videos: Vec<PathBuf> = WalkDir::new(dir.as_ref())
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_video_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    videos.sort();

    info!("Found {} video files", videos.len());
    videos
}
