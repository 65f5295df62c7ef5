/**
 * Geometry
 *
 * Detection rectangles and the coordinate spaces they live in.
 * A box in pixel space and a box in unit space are different types;
 * moving between them goes through a validated `FrameSize`.
 */

pub mod space;
pub mod bounding_box;

pub use space::{Space, Pixel, Unit, FrameSize, GeometryError};
pub use bounding_box::BoundingBox;
