/**
 * Thrust Mixer
 *
 * Turns a 6-DoF thrust request (surge, sway, heave, roll, pitch, yaw)
 * into per-thruster values for the vectored six-thruster frame, and
 * those into PWM pulse widths.
 */

use crate::control::MotionCommand;
use crate::link::{ThrusterPwmCmd, NEUTRAL_PWM};

/// PWM microseconds per percent of thrust: -100 -> 1100, 100 -> 1900
const PWM_PER_PERCENT: f32 = 4.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThrustCommand{
    pub surge: f32,
    pub sway: f32,
    pub heave: f32,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl ThrustCommand{
    fn as_dof(&self) -> [f32; 6]{
        [self.surge, self.sway, self.heave, self.roll, self.pitch, self.yaw]
    }
}

impl From<MotionCommand> for ThrustCommand{
    fn from(cmd: MotionCommand) -> Self{
        ThrustCommand{
            surge: cmd.surge,
            sway: cmd.sway,
            heave: cmd.heave,
            yaw: cmd.yaw,
            ..ThrustCommand::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThrustMixer{
    /// Rows: thrusters, columns: [surge, sway, heave, roll, pitch, yaw]
    pub mix_matrix: [[f32; 6]; 6],
    /// Per-thruster saturation, percent
    pub max_thrust: f32,
}

impl Default for ThrustMixer{
    fn default() -> Self{
        Self{
            mix_matrix: [
                [1.0, -1.0, 0.0, 0.0, 0.0, -1.0],  //front-left horizontal
                [1.0, 1.0, 0.0, 0.0, 0.0, 1.0],    //front-right horizontal
                [-1.0, -1.0, 0.0, 0.0, 0.0, 1.0],  //rear-left horizontal
                [-1.0, 1.0, 0.0, 0.0, 0.0, -1.0],  //rear-right horizontal
                [0.0, 0.0, 1.0, -1.0, 1.0, 0.0],   //left vertical
                [0.0, 0.0, 1.0, 1.0, 1.0, 0.0],    //right vertical
            ],
            max_thrust: 100.0,
        }
    }
}

impl ThrustMixer{
    /// Per-thruster thrust. When any thruster would saturate, all outputs
    /// are scaled down together so the resulting force keeps its direction.
    pub fn mix(&self, cmd: &ThrustCommand) -> [f32; 6]{
        let dof = cmd.as_dof();
        let mut output = self.mix_matrix.map(|row| {
            row.iter().zip(dof.iter()).map(|(coeff, value)| coeff * value).sum::<f32>()
        });

        let peak = output.iter().fold(0.0f32, |acc, v| acc.max(v.abs()));
        if peak > self.max_thrust{
            let scale = self.max_thrust / peak;
            output.iter_mut().for_each(|v| *v *= scale);
        }
        output
    }

    pub fn thrust_to_pwm(thrust: f32) -> i32{
        NEUTRAL_PWM + (thrust * PWM_PER_PERCENT) as i32
    }

    pub fn to_pwm(&self, cmd: &ThrustCommand) -> ThrusterPwmCmd{
        ThrusterPwmCmd::new(self.mix(cmd).map(Self::thrust_to_pwm))
    }
}
