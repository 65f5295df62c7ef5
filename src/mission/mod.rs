/**
 * Mission
 *
 * A mission is a fixed, ordered list of sub-tasks run one after another.
 * Vehicle handles are injected per call through `MissionContext`; no
 * sub-task keeps them past its own `run`.
 */

pub mod sequencer;
pub mod centering_task;

use thiserror::Error;

use crate::control::{
    ActuatorError, CancellationToken, DepthSensor, MotionActuator, ServoError,
};
use crate::vision::{DetectionError, DetectionSource};

pub use sequencer::{MissionSequencer, MissionReport, MissionError, FailurePolicy};
pub use centering_task::CenteringTask;

/// Shared vehicle, sensor and vision handles for the task being run.
pub struct MissionContext<'a>{
    pub actuator: &'a mut dyn MotionActuator,
    pub depth: &'a dyn DepthSensor,
    pub vision: &'a mut dyn DetectionSource,
    pub cancel: CancellationToken,
}

impl<'a> MissionContext<'a>{
    pub fn new(
        actuator: &'a mut dyn MotionActuator,
        depth: &'a dyn DepthSensor,
        vision: &'a mut dyn DetectionSource,
        cancel: CancellationToken,
    ) -> Self{
        MissionContext{ actuator, depth, vision, cancel }
    }
}

#[derive(Debug, Error)]
pub enum TaskError{
    #[error(transparent)]
    Servo(#[from] ServoError),
    #[error(transparent)]
    Actuator(#[from] ActuatorError),
    #[error(transparent)]
    Detection(#[from] DetectionError),
    #[error("{0}")]
    Failed(String),
}

impl TaskError{
    pub fn is_cancellation(&self) -> bool{
        matches!(self, TaskError::Servo(ServoError::Cancelled))
    }
}

pub type TaskResult = Result<(), TaskError>;

/// One mission phase, e.g. passing the gate or centering over a bucket.
/// `run` blocks until the phase is done or has failed.
pub trait SubTask{
    fn run(&mut self, ctx: &mut MissionContext<'_>) -> TaskResult;
}

impl<T: SubTask + ?Sized> SubTask for Box<T>{
    fn run(&mut self, ctx: &mut MissionContext<'_>) -> TaskResult{
        (**self).run(ctx)
    }
}
