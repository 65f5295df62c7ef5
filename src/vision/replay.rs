/**
 * Replay Detector
 *
 * Plays back detections recorded as JSON lines, one array of boxes per
 * predict() call. An empty array is a frame with nothing in it; once the
 * recording runs out every call is a miss.
 */

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use log::{debug, info};
use serde::Deserialize;

use crate::geometry::{BoundingBox, Pixel};
use super::{DetectionError, DetectionSource};

#[derive(Debug, Deserialize)]
struct RecordedBox{
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    #[serde(default)]
    p: f64,
    #[serde(default)]
    label: Option<String>,
}

impl From<RecordedBox> for BoundingBox<Pixel>{
    fn from(r: RecordedBox) -> Self{
        BoundingBox::from_corners(r.x1, r.y1, r.x2, r.y2, r.p, r.label)
    }
}

pub struct ReplayDetector{
    frames: VecDeque<Vec<BoundingBox<Pixel>>>,
    model: Option<String>,
    served: usize,
}

impl ReplayDetector{
    pub fn open(path: &Path) -> Result<Self, DetectionError>{
        let text = fs::read_to_string(path)?;
        let detector = Self::parse(&text)?;
        info!("replaying {} recorded frames from {}", detector.remaining(), path.display());
        Ok(detector)
    }

    /// Blank lines are skipped; every other line must be a JSON array.
    pub fn parse(text: &str) -> Result<Self, DetectionError>{
        let mut frames = VecDeque::new();
        for (idx, line) in text.lines().enumerate(){
            let line = line.trim();
            if line.is_empty(){
                continue;
            }
            let boxes: Vec<RecordedBox> = serde_json::from_str(line)
                .map_err(|source| DetectionError::Malformed{ line: idx + 1, source })?;
            frames.push_back(boxes.into_iter().map(BoundingBox::from).collect());
        }
        Ok(ReplayDetector{ frames, model: None, served: 0 })
    }

    pub fn remaining(&self) -> usize{
        self.frames.len()
    }

    pub fn served(&self) -> usize{
        self.served
    }
}

impl DetectionSource for ReplayDetector{
    fn load_model(&mut self, name: &str) -> Result<(), DetectionError>{
        if name.is_empty(){
            return Err(DetectionError::UnknownModel(name.to_string()));
        }
        self.model = Some(name.to_string());
        Ok(())
    }

    fn predict(&mut self) -> Result<Vec<BoundingBox<Pixel>>, DetectionError>{
        self.served += 1;
        let Some(frame) = self.frames.pop_front() else{
            return Ok(Vec::new());
        };
        let model = self.model.as_deref();
        let kept: Vec<_> = frame
            .into_iter()
            .filter(|b| match (model, b.label.as_deref()){
                (Some(m), Some(l)) => m == l,
                _ => true,
            })
            .collect();
        debug!("replay frame {}: {} detections", self.served, kept.len());
        Ok(kept)
    }
}
