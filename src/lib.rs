pub mod geometry;
pub mod vision;
pub mod control;
pub mod link;
pub mod auv;
pub mod mission;
pub mod config;

#[cfg(feature = "python")]
pub mod python;

pub use geometry::{BoundingBox, FrameSize, GeometryError, Pixel, Unit};
pub use vision::{DetectionSource, DetectionError, ReplayDetector};
pub use control::{
    MotionActuator, MotionCommand, DepthSensor, ActuatorError, CancellationToken,
    RetryPolicy, VisualServoController, ServoConfig, ServoError, CenteringOutcome,
    ConvergencePolicy, MissedFramePolicy,
};
pub use auv::{SerialVehicle, VehicleHandle, VehicleLink};
pub use mission::{
    MissionSequencer, MissionContext, MissionReport, MissionError,
    SubTask, TaskError, TaskResult, FailurePolicy, CenteringTask,
};
pub use config::{MissionConfig, ConfigError};
