/**
 * Bounding Box
 *
 * One detection: center, size, confidence and class label.
 * Corner points and the [-1, 1] centered form are computed from
 * x/y/w/h on every access, so they can never go stale after a mutation.
 */

use std::fmt;
use std::marker::PhantomData;
use serde::{Deserialize, Serialize};

use super::space::{FrameSize, Pixel, Space, Unit};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct BoundingBox<S: Space>{
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    /// Detection confidence, nominally 0..1 (not enforced)
    pub p: f64,
    pub label: Option<String>,
    #[serde(skip)]
    space: PhantomData<S>,
}

impl<S: Space> BoundingBox<S>{
    pub fn new(x: f64, y: f64, w: f64, h: f64, p: f64, label: Option<String>) -> Self{
        BoundingBox{ x, y, w, h, p, label, space: PhantomData }
    }

    /// Build from two points on the rectangle diagonal.
    /// Callers keep x2 >= x1 and y2 >= y1; nothing is checked here.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64, p: f64, label: Option<String>) -> Self{
        let x = (x1 + x2) / 2.0;
        let y = (y1 + y2) / 2.0;
        Self::new(x, y, x2 - x1, y2 - y1, p, label)
    }

    /// Center remapped to [-1, 1]; only meaningful for unit-space boxes
    pub fn xc(&self) -> f64{
        2.0 * self.x - 1.0
    }

    pub fn yc(&self) -> f64{
        2.0 * self.y - 1.0
    }

    pub fn x1(&self) -> f64{
        self.x - self.w / 2.0
    }

    pub fn y1(&self) -> f64{
        self.y - self.h / 2.0
    }

    pub fn x2(&self) -> f64{
        self.x + self.w / 2.0
    }

    pub fn y2(&self) -> f64{
        self.y + self.h / 2.0
    }

    /// Top-left corner truncated toward zero
    pub fn p1(&self) -> (i64, i64){
        (self.x1() as i64, self.y1() as i64)
    }

    /// Bottom-right corner truncated toward zero
    pub fn p2(&self) -> (i64, i64){
        (self.x2() as i64, self.y2() as i64)
    }

    pub fn area(&self) -> f64{
        self.w * self.h
    }

    /// Exponential moving average against a fresh observation.
    ///
    /// Each of x, y, w, h, p becomes `(1 - d) * new + d * self`.
    /// `d = 0` takes the observation as-is, `d = 1` keeps the prior.
    /// The label is never replaced. Values of `d` outside 0..1 extrapolate.
    pub fn smoothed(&self, observation: &BoundingBox<S>, discount_factor: f64) -> BoundingBox<S>{
        let mut out = self.clone();
        out.smooth(observation, discount_factor);
        out
    }

    /// In-place form of [`smoothed`](Self::smoothed), returns `self` for chaining.
    pub fn smooth(&mut self, observation: &BoundingBox<S>, discount_factor: f64) -> &mut Self{
        let d = discount_factor;
        let mix = |new: f64, old: f64| (1.0 - d) * new + d * old;
        self.x = mix(observation.x, self.x);
        self.y = mix(observation.y, self.y);
        self.w = mix(observation.w, self.w);
        self.h = mix(observation.h, self.h);
        self.p = mix(observation.p, self.p);
        self
    }

    fn rescaled<T: Space>(self, frame: FrameSize, op: fn(f64, f64) -> f64) -> BoundingBox<T>{
        let (fw, fh) = (frame.width(), frame.height());
        BoundingBox{
            x: op(self.x, fw),
            y: op(self.y, fh),
            w: op(self.w, fw),
            h: op(self.h, fh),
            p: self.p,
            label: self.label,
            space: PhantomData,
        }
    }
}

impl BoundingBox<Pixel>{
    /// Map from pixel coordinates to the unit square of `frame`.
    /// Eg. a 104x104 box centered at (208, 104) in a 416x416 frame
    /// becomes 0.25x0.25 centered at (0.5, 0.25).
    pub fn normalize(&self, frame: FrameSize) -> BoundingBox<Unit>{
        self.clone().into_normalized(frame)
    }

    /// Consuming form of [`normalize`](Self::normalize); reuses the label allocation.
    pub fn into_normalized(self, frame: FrameSize) -> BoundingBox<Unit>{
        self.rescaled(frame, |v, side| v / side)
    }
}

impl BoundingBox<Unit>{
    pub fn denormalize(&self, frame: FrameSize) -> BoundingBox<Pixel>{
        self.clone().into_denormalized(frame)
    }

    pub fn into_denormalized(self, frame: FrameSize) -> BoundingBox<Pixel>{
        self.rescaled(frame, |v, side| v * side)
    }

    /// Signed offset of the center from the middle of the frame, (x - 0.5, y - 0.5).
    /// Positive x is right of center, positive y is below.
    pub fn offset_from_center(&self) -> (f64, f64){
        (self.x - 0.5, self.y - 0.5)
    }
}

impl<S: Space> fmt::Display for BoundingBox<S>{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result{
        write!(
            f,
            "x={}, y={}, w={}, h={}, p={}, item={}",
            self.xc(), self.yc(), self.w, self.h, self.p,
            self.label.as_deref().unwrap_or("None")
        )
    }
}
