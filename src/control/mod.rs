/**
 * Control
 *
 * Everything between a detection and a thrust request:
 * actuator/sensor traits, cancellation, bounded polling and the
 * visual-servo centering loop.
 */

pub mod actuator;
pub mod cancel;
pub mod retry;
pub mod centering;

pub use actuator::{MotionCommand, MotionActuator, DepthSensor, ActuatorError};
pub use cancel::CancellationToken;
pub use retry::{RetryPolicy, RetryBudget, BudgetExhausted};
pub use centering::{
    VisualServoController, ServoConfig, ServoError, ServoPhase,
    ConvergencePolicy, MissedFramePolicy, CenteringOutcome,
};
