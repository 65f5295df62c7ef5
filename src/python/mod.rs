use std::collections::HashMap;
use pyo3::prelude::*;
use pyo3::exceptions::PyValueError;

use crate::geometry::{BoundingBox, FrameSize, Pixel, Unit};

#[derive(Clone)]
enum Spaced{
    Pixel(BoundingBox<Pixel>),
    Unit(BoundingBox<Unit>),
}

/// Python has no types to carry the coordinate space, so it is checked at
/// runtime instead: normalizing a normalized box raises ValueError.
#[pyclass(name = "BoundingBox")]
#[derive(Clone)]
pub struct PyBoundingBox{
    inner: Spaced,
}

fn frame(width: f64, height: f64) -> PyResult<FrameSize>{
    FrameSize::new(width, height).map_err(|e| PyValueError::new_err(e.to_string()))
}

impl PyBoundingBox{
    fn smoothed_with(&self, observation: &PyBoundingBox, discount_factor: f64) -> PyResult<Self>{
        let inner = match (&self.inner, &observation.inner){
            (Spaced::Pixel(prior), Spaced::Pixel(obs)) => Spaced::Pixel(prior.smoothed(obs, discount_factor)),
            (Spaced::Unit(prior), Spaced::Unit(obs)) => Spaced::Unit(prior.smoothed(obs, discount_factor)),
            _ => return Err(PyValueError::new_err("cannot smooth boxes from different coordinate spaces")),
        };
        Ok(PyBoundingBox{ inner })
    }

    fn fields(&self) -> (f64, f64, f64, f64, f64){
        match &self.inner{
            Spaced::Pixel(b) => (b.x, b.y, b.w, b.h, b.p),
            Spaced::Unit(b) => (b.x, b.y, b.w, b.h, b.p),
        }
    }
}

#[pymethods]
impl PyBoundingBox{
    #[new]
    #[pyo3(signature = (x=0.0, y=0.0, w=0.0, h=0.0, p=0.0, label=None))]
    fn new(x: f64, y: f64, w: f64, h: f64, p: f64, label: Option<String>) -> Self{
        PyBoundingBox{ inner: Spaced::Pixel(BoundingBox::new(x, y, w, h, p, label)) }
    }

    #[staticmethod]
    #[pyo3(signature = (x1, y1, x2, y2, p=0.0, label=None))]
    fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64, p: f64, label: Option<String>) -> Self{
        PyBoundingBox{ inner: Spaced::Pixel(BoundingBox::from_corners(x1, y1, x2, y2, p, label)) }
    }

    fn normalize(&self, width: f64, height: f64) -> PyResult<Self>{
        match &self.inner{
            Spaced::Pixel(b) => Ok(PyBoundingBox{ inner: Spaced::Unit(b.normalize(frame(width, height)?)) }),
            Spaced::Unit(_) => Err(PyValueError::new_err("box is already normalized")),
        }
    }

    fn denormalize(&self, width: f64, height: f64) -> PyResult<Self>{
        match &self.inner{
            Spaced::Unit(b) => Ok(PyBoundingBox{ inner: Spaced::Pixel(b.denormalize(frame(width, height)?)) }),
            Spaced::Pixel(_) => Err(PyValueError::new_err("box is already in pixel space")),
        }
    }

    fn smooth(&self, observation: PyRef<'_, Self>, discount_factor: f64) -> PyResult<Self>{
        self.smoothed_with(&observation, discount_factor)
    }

    #[getter]
    fn normalized(&self) -> bool{
        matches!(self.inner, Spaced::Unit(_))
    }

    #[getter]
    fn x(&self) -> f64{
        self.fields().0
    }

    #[getter]
    fn y(&self) -> f64{
        self.fields().1
    }

    #[getter]
    fn w(&self) -> f64{
        self.fields().2
    }

    #[getter]
    fn h(&self) -> f64{
        self.fields().3
    }

    #[getter]
    fn p(&self) -> f64{
        self.fields().4
    }

    #[getter]
    fn label(&self) -> Option<String>{
        match &self.inner{
            Spaced::Pixel(b) => b.label.clone(),
            Spaced::Unit(b) => b.label.clone(),
        }
    }

    #[getter]
    fn xc(&self) -> f64{
        2.0 * self.fields().0 - 1.0
    }

    #[getter]
    fn yc(&self) -> f64{
        2.0 * self.fields().1 - 1.0
    }

    fn to_dict(&self) -> HashMap<&'static str, f64>{
        let (x, y, w, h, p) = self.fields();
        HashMap::from([("x", x), ("y", y), ("w", w), ("h", h), ("p", p)])
    }

    fn __str__(&self) -> String{
        match &self.inner{
            Spaced::Pixel(b) => b.to_string(),
            Spaced::Unit(b) => b.to_string(),
        }
    }
}

#[pymodule]
fn auv_mission(_py: Python<'_>, m: &PyModule) -> PyResult<()>{
    m.add_class::<PyBoundingBox>()?;
    Ok(())
}

#[cfg(test)]
mod tests{
    use super::*;

    fn pixel_box() -> PyBoundingBox{
        PyBoundingBox::new(240.0, 120.0, 48.0, 24.0, 0.9, Some("coke".into()))
    }

    #[test]
    fn test_py_normalize_round_trip(){
        let unit = pixel_box().normalize(480.0, 480.0).unwrap();
        assert!(unit.normalized());
        assert_eq!((unit.x(), unit.y()), (0.5, 0.25));

        let back = unit.denormalize(480.0, 480.0).unwrap();
        assert!(!back.normalized());
        assert_eq!((back.x(), back.w()), (240.0, 48.0));
        assert_eq!(back.label().as_deref(), Some("coke"));
    }

    #[test]
    fn test_py_normalize_twice_fails(){
        let unit = pixel_box().normalize(480.0, 480.0).unwrap();
        assert!(unit.normalize(480.0, 480.0).is_err());
        assert!(pixel_box().denormalize(480.0, 480.0).is_err());
        assert!(pixel_box().normalize(0.0, 480.0).is_err());
    }

    #[test]
    fn test_py_smooth_requires_same_space(){
        let pixel = pixel_box();
        let unit = pixel_box().normalize(480.0, 480.0).unwrap();
        assert!(pixel.smoothed_with(&unit, 0.5).is_err());
        assert!(unit.smoothed_with(&pixel, 0.5).is_err());

        let moved = PyBoundingBox::new(260.0, 120.0, 48.0, 24.0, 0.5, None);
        let smoothed = pixel.smoothed_with(&moved, 0.5).unwrap();
        assert_eq!(smoothed.x(), 250.0);
        assert_eq!(smoothed.label().as_deref(), Some("coke"));
    }
}
