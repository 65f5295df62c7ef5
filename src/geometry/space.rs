use std::fmt::Debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Marker for the coordinate space a box lives in.
pub trait Space: Copy + Clone + Debug + Default + PartialEq + Send + Sync + 'static{
    const NAME: &'static str;
}

/// Raw image pixels, resolution dependent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pixel;

/// [0, 1] on both axes, independent of resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Unit;

impl Space for Pixel{
    const NAME: &'static str = "pixel";
}

impl Space for Unit{
    const NAME: &'static str = "unit";
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError{
    #[error("invalid frame dimension {width}x{height}: both sides must be finite and positive")]
    InvalidDimension{ width: f64, height: f64 },
}

/// Image dimensions used to convert between pixel and unit space.
///
/// Only positive, finite sizes can be constructed, so normalizing
/// against a `FrameSize` never divides by zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameSize{
    width: f64,
    height: f64,
}

impl FrameSize{
    pub fn new(width: f64, height: f64) -> Result<Self, GeometryError>{
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(width) || !valid(height){
            return Err(GeometryError::InvalidDimension{ width, height });
        }
        Ok(FrameSize{ width, height })
    }

    pub fn width(&self) -> f64{
        self.width
    }

    pub fn height(&self) -> f64{
        self.height
    }

    /// Center of the frame in pixels
    pub fn center(&self) -> (f64, f64){
        (self.width / 2.0, self.height / 2.0)
    }
}

/// 480x480, the forward camera's frame as fed to the detector
impl Default for FrameSize{
    fn default() -> Self{
        FrameSize{ width: 480.0, height: 480.0 }
    }
}

impl TryFrom<(u32, u32)> for FrameSize{
    type Error = GeometryError;

    fn try_from(dims: (u32, u32)) -> Result<Self, Self::Error>{
        FrameSize::new(dims.0 as f64, dims.1 as f64)
    }
}

impl<'de> Deserialize<'de> for FrameSize{
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error>{
        #[derive(Deserialize)]
        struct Raw{
            width: f64,
            height: f64,
        }
        let raw = Raw::deserialize(deserializer)?;
        FrameSize::new(raw.width, raw.height).map_err(serde::de::Error::custom)
    }
}
