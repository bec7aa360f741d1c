// src/analysis/object_tracker.rs
//
// Centroid tracker for keeping vehicle identities across frames.
//
// Design:
//   - Greedy nearest-centroid matching (sufficient for <20 objects per frame)
//   - A detection continues a track only within `distance_threshold` px
//   - Unmatched detections spawn new tracks
//   - Tracks coast through up to `max_missed_frames` unmatched updates
//
// One tracker instance belongs to one detector call. IDs are not comparable
// across instances.

use crate::config::TrackerConfig;
use crate::types::Detection;
use tracing::debug;

/// Track as reported by `update` for the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedObject {
    pub track_id: u32,
    pub estimated_center: (f32, f32),
    pub frame_index: usize,
}

#[derive(Debug, Clone)]
struct Track {
    id: u32,
    center: (f32, f32),
    frames_since_hit: u32,
    hits: u32,
}

pub struct CentroidTracker {
    config: TrackerConfig,
    tracks: Vec<Track>,
    next_id: u32,
}

impl CentroidTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 1,
        }
    }

    /// Associate this frame's detections with existing tracks.
    ///
    /// Returns the tracks matched or spawned by this frame, in detection order.
    pub fn update(&mut self, detections: &[&Detection], frame_index: usize) -> Vec<TrackedObject> {
        let centers: Vec<(f32, f32)> = detections.iter().map(|d| d.center()).collect();

        // All (distance, track, detection) candidates within the gate, nearest first.
        let mut candidates: Vec<(f32, usize, usize)> = Vec::new();
        for (ti, track) in self.tracks.iter().enumerate() {
            for (di, c) in centers.iter().enumerate() {
                let d = (c.0 - track.center.0).hypot(c.1 - track.center.1);
                if d <= self.config.distance_threshold {
                    candidates.push((d, ti, di));
                }
            }
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let mut track_used = vec![false; self.tracks.len()];
        let mut det_track: Vec<Option<usize>> = vec![None; centers.len()];
        for (_, ti, di) in candidates {
            if track_used[ti] || det_track[di].is_some() {
                continue;
            }
            track_used[ti] = true;
            det_track[di] = Some(ti);
        }

        for (ti, track) in self.tracks.iter_mut().enumerate() {
            if !track_used[ti] {
                track.frames_since_hit += 1;
            }
        }

        let mut output = Vec::with_capacity(centers.len());
        for (di, center) in centers.iter().enumerate() {
            let id = match det_track[di] {
                Some(ti) => {
                    let track = &mut self.tracks[ti];
                    track.center = *center;
                    track.frames_since_hit = 0;
                    track.hits += 1;
                    track.id
                }
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.tracks.push(Track {
                        id,
                        center: *center,
                        frames_since_hit: 0,
                        hits: 1,
                    });
                    debug!("Track {} spawned at ({:.0}, {:.0})", id, center.0, center.1);
                    id
                }
            };
            output.push(TrackedObject {
                track_id: id,
                estimated_center: *center,
                frame_index,
            });
        }

        let max_missed = self.config.max_missed_frames;
        self.tracks.retain(|t| {
            let keep = t.frames_since_hit <= max_missed;
            if !keep {
                debug!("Track {} dropped after {} hits", t.id, t.hits);
            }
            keep
        });

        debug!(
            "Frame {}: {} matched, {} active tracks",
            frame_index,
            output.len(),
            self.active_tracks()
        );
        output
    }

    pub fn active_tracks(&self) -> usize {
        self.tracks.len()
    }
}
