/**
 * AUV backend
 *
 * Concrete vehicle behind the mission's actuator and depth-sensor traits:
 * - UART link to the STM32 board
 * - 6-DoF thrust mixing to PWM
 * - On-host depth hold
 */

pub mod thrust_mixer;
pub mod vehicle;

pub use thrust_mixer::{ThrustMixer, ThrustCommand};
pub use vehicle::{SerialVehicle, VehicleHandle, VehicleLink, VehicleState, DepthHold};
