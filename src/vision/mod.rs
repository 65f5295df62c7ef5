/**
 * Vision
 *
 * The detector is an external service; the mission core only needs
 * "load this model" and "give me what you see now".
 */

pub mod replay;

use thiserror::Error;
use crate::geometry::{BoundingBox, Pixel};

pub use replay::ReplayDetector;

#[derive(Debug, Error)]
pub enum DetectionError{
    #[error("detector has no model named '{0}'")]
    UnknownModel(String),
    #[error("detector I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed detection record on line {line}: {source}")]
    Malformed{
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of object detections for the currently loaded model.
pub trait DetectionSource{
    fn load_model(&mut self, name: &str) -> Result<(), DetectionError>;

    /// Detections for the latest frame, in pixel coordinates. An empty
    /// vector means nothing was seen and is not an error.
    fn predict(&mut self) -> Result<Vec<BoundingBox<Pixel>>, DetectionError>;
}

impl<T: DetectionSource + ?Sized> DetectionSource for Box<T>{
    fn load_model(&mut self, name: &str) -> Result<(), DetectionError>{
        (**self).load_model(name)
    }

    fn predict(&mut self) -> Result<Vec<BoundingBox<Pixel>>, DetectionError>{
        (**self).predict()
    }
}
