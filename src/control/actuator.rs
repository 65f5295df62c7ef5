use thiserror::Error;

/// Body-frame motion request, each axis in -100..100 percent thrust.
/// Positive surge is forward, sway right, heave up, yaw clockwise.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionCommand{
    pub surge: f32,
    pub sway: f32,
    pub heave: f32,
    pub yaw: f32,
}

impl MotionCommand{
    pub fn neutral() -> Self{
        Self::default()
    }

    pub fn is_neutral(&self) -> bool{
        *self == Self::default()
    }
}

#[derive(Debug, Error)]
pub enum ActuatorError{
    #[error("vehicle link is down")]
    LinkDown,
    #[error("invalid depth target {0} m")]
    InvalidDepth(f32),
    #[error("actuator I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Accepts fire-and-forget motion requests. Repeating a command is harmless.
pub trait MotionActuator{
    fn command(&mut self, cmd: MotionCommand) -> Result<(), ActuatorError>;

    /// Turn on closed-loop depth hold
    fn enable_depth_hold(&mut self) -> Result<(), ActuatorError>;

    /// Depth-hold setpoint in metres below the surface
    fn set_depth_target(&mut self, depth_m: f32) -> Result<(), ActuatorError>;
}

pub trait DepthSensor{
    /// Latest depth in metres (positive down), None before the first reading
    fn depth(&self) -> Option<f32>;
}

impl<T: MotionActuator + ?Sized> MotionActuator for Box<T>{
    fn command(&mut self, cmd: MotionCommand) -> Result<(), ActuatorError>{
        (**self).command(cmd)
    }

    fn enable_depth_hold(&mut self) -> Result<(), ActuatorError>{
        (**self).enable_depth_hold()
    }

    fn set_depth_target(&mut self, depth_m: f32) -> Result<(), ActuatorError>{
        (**self).set_depth_target(depth_m)
    }
}
