use log::info;

use crate::control::{ServoConfig, VisualServoController};
use super::{MissionContext, SubTask, TaskResult};

/// Center the vehicle on a detected object, optionally after settling
/// into depth hold at a fixed setpoint.
pub struct CenteringTask{
    model: String,
    depth_setpoint: Option<f32>,
    config: ServoConfig,
}

impl CenteringTask{
    pub fn new(model: &str, config: ServoConfig) -> Self{
        CenteringTask{ model: model.to_string(), depth_setpoint: None, config }
    }

    pub fn with_depth_hold(mut self, depth_m: f32) -> Self{
        self.depth_setpoint = Some(depth_m);
        self
    }
}

impl SubTask for CenteringTask{
    fn run(&mut self, ctx: &mut MissionContext<'_>) -> TaskResult{
        if let Some(depth) = self.depth_setpoint{
            ctx.actuator.enable_depth_hold()?;
            ctx.actuator.set_depth_target(depth)?;
        }
        info!("{} centering started", self.model);

        let mut servo = VisualServoController::new(
            &mut *ctx.actuator,
            ctx.depth,
            &mut *ctx.vision,
            &self.model,
            self.config.clone(),
            ctx.cancel.clone(),
        );
        let outcome = servo.run()?;
        info!(
            "{} centered: {} iterations, {} commands, final {}",
            self.model, outcome.iterations, outcome.commands_sent, outcome.estimate
        );
        Ok(())
    }
}
