/**
 * Visual-servo centering
 *
 * Acquire a target from the detector, then keep nudging the vehicle
 * until the smoothed target center sits within `threshold` of the frame
 * center. Offsets live in unit space: dx = x - 0.5, dy = y - 0.5.
 */

use std::time::Duration;
use log::{debug, info, warn};
use serde::Deserialize;
use thiserror::Error;

use crate::geometry::{BoundingBox, FrameSize, Unit};
use crate::vision::{DetectionError, DetectionSource};
use super::actuator::{ActuatorError, DepthSensor, MotionActuator, MotionCommand};
use super::cancel::CancellationToken;
use super::retry::{BudgetExhausted, RetryPolicy};

/// When the loop may stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergencePolicy{
    /// Keep going while either axis is off target; stop once both are centered.
    #[default]
    BothAxes,
    /// Keep going only while both axes are off target; stop once either is centered.
    EitherAxis,
}

/// What to do when a centering iteration gets no detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissedFramePolicy{
    /// Issue nothing this cycle and poll again
    #[default]
    Skip,
    /// Re-send the previous command
    HoldLast,
    /// Forget the estimate and go back to acquisition
    Reacquire,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoPhase{
    Acquisition,
    Centering,
}

impl std::fmt::Display for ServoPhase{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result{
        match self{
            ServoPhase::Acquisition => write!(f, "acquisition"),
            ServoPhase::Centering => write!(f, "centering"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServoError{
    #[error("{phase} gave up after {attempts} attempts in {elapsed:?}")]
    Timeout{ phase: ServoPhase, attempts: u32, elapsed: Duration },
    #[error("centering cancelled")]
    Cancelled,
    #[error(transparent)]
    Actuator(#[from] ActuatorError),
    #[error(transparent)]
    Detection(#[from] DetectionError),
}

#[derive(Debug, Clone)]
pub struct ServoConfig{
    /// Frame the detector reports pixel coordinates in
    pub frame: FrameSize,
    /// Max |offset| per axis considered centered
    pub threshold: f64,
    /// Smoothing weight of the previous estimate, 0 = no smoothing
    pub discount_factor: f64,
    /// Thrust percent per unit of offset
    pub gain: f32,
    /// Clamp on any commanded axis
    pub max_command: f32,
    /// Upward heave is suppressed at or above this depth (m)
    pub surface_margin: f32,
    pub convergence: ConvergencePolicy,
    pub missed_frame: MissedFramePolicy,
    pub acquisition: RetryPolicy,
    pub centering: RetryPolicy,
}

impl Default for ServoConfig{
    fn default() -> Self{
        let poll = Duration::from_millis(100);
        ServoConfig{
            frame: FrameSize::default(),
            threshold: 0.2,
            discount_factor: 0.0,
            gain: 30.0,
            max_command: 50.0,
            surface_margin: 0.1,
            convergence: ConvergencePolicy::BothAxes,
            missed_frame: MissedFramePolicy::Skip,
            acquisition: RetryPolicy::new(poll).with_timeout(Duration::from_secs(60)),
            centering: RetryPolicy::new(poll).with_timeout(Duration::from_secs(120)),
        }
    }
}

impl ServoConfig{
    pub fn is_centered(&self, estimate: &BoundingBox<Unit>) -> bool{
        let (dx, dy) = estimate.offset_from_center();
        let x_ok = dx.abs() <= self.threshold;
        let y_ok = dy.abs() <= self.threshold;
        match self.convergence{
            ConvergencePolicy::BothAxes => x_ok && y_ok,
            ConvergencePolicy::EitherAxis => x_ok || y_ok,
        }
    }

    /// Proportional correction toward the frame center.
    pub fn command_for(&self, estimate: &BoundingBox<Unit>, depth: Option<f32>) -> MotionCommand{
        let (dx, dy) = estimate.offset_from_center();
        let limit = self.max_command.abs();
        let sway = (self.gain * dx as f32).clamp(-limit, limit);
        // image y grows downward, heave is positive up
        let mut heave = (-self.gain * dy as f32).clamp(-limit, limit);
        if heave > 0.0 && depth.map_or(false, |d| d <= self.surface_margin){
            heave = 0.0;
        }
        MotionCommand{ sway, heave, ..MotionCommand::neutral() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CenteringOutcome{
    /// Detector requests that came back empty during acquisition
    pub acquisition_misses: u32,
    /// Centering loop iterations (detector requests after acquisition)
    pub iterations: u32,
    pub centering_misses: u32,
    pub commands_sent: u32,
    pub estimate: BoundingBox<Unit>,
}

pub struct VisualServoController<'a>{
    actuator: &'a mut dyn MotionActuator,
    depth: &'a dyn DepthSensor,
    detector: &'a mut dyn DetectionSource,
    model: String,
    config: ServoConfig,
    cancel: CancellationToken,
}

impl<'a> VisualServoController<'a>{
    /// Depth hold and any other vehicle setup is the caller's job.
    pub fn new(
        actuator: &'a mut dyn MotionActuator,
        depth: &'a dyn DepthSensor,
        detector: &'a mut dyn DetectionSource,
        model: &str,
        config: ServoConfig,
        cancel: CancellationToken,
    ) -> Self{
        VisualServoController{
            actuator,
            depth,
            detector,
            model: model.to_string(),
            config,
            cancel,
        }
    }

    pub fn config(&self) -> &ServoConfig{
        &self.config
    }

    pub fn run(&mut self) -> Result<CenteringOutcome, ServoError>{
        self.detector.load_model(&self.model)?;
        info!("detector model '{}' loaded", self.model);

        let (mut estimate, acquisition_misses) = self.acquire()?;
        info!("target acquired after {} misses: {}", acquisition_misses, estimate);

        let mut outcome = CenteringOutcome{
            acquisition_misses,
            iterations: 0,
            centering_misses: 0,
            commands_sent: 0,
            estimate: estimate.clone(),
        };
        let mut last_command: Option<MotionCommand> = None;
        let mut budget = self.config.centering.start();

        while !self.config.is_centered(&estimate){
            if self.cancel.is_cancelled(){
                self.halt();
                return Err(ServoError::Cancelled);
            }
            if let Err(exhausted) = budget.try_attempt(){
                self.halt();
                return Err(timeout(ServoPhase::Centering, exhausted));
            }
            outcome.iterations += 1;

            match self.next_detection()?{
                Some(observation) => {
                    estimate.smooth(&observation, self.config.discount_factor);
                    let (dx, dy) = estimate.offset_from_center();
                    let depth = self.depth.depth();
                    debug!("centering: dx={:.3} dy={:.3} depth={:?}", dx, dy, depth);

                    let cmd = self.config.command_for(&estimate, depth);
                    self.actuator.command(cmd)?;
                    outcome.commands_sent += 1;
                    last_command = Some(cmd);
                }
                None => {
                    outcome.centering_misses += 1;
                    match self.config.missed_frame{
                        MissedFramePolicy::Skip => debug!("centering: no detection, skipping cycle"),
                        MissedFramePolicy::HoldLast => {
                            if let Some(cmd) = last_command{
                                self.actuator.command(cmd)?;
                                outcome.commands_sent += 1;
                            }
                        }
                        MissedFramePolicy::Reacquire => {
                            warn!("target lost, re-entering acquisition");
                            self.halt();
                            let (fresh, misses) = self.acquire()?;
                            outcome.acquisition_misses += misses;
                            estimate = fresh;
                            last_command = None;
                            // acquisition already paused between its own polls
                            continue;
                        }
                    }
                }
            }
            budget.pause();
        }

        self.actuator.command(MotionCommand::neutral())?;
        info!(
            "target centered after {} iterations ({} missed frames): {}",
            outcome.iterations, outcome.centering_misses, estimate
        );
        outcome.estimate = estimate;
        Ok(outcome)
    }

    /// Poll until the detector reports something. Returns the first
    /// detection in unit space and how many polls came back empty.
    fn acquire(&mut self) -> Result<(BoundingBox<Unit>, u32), ServoError>{
        let mut budget = self.config.acquisition.start();
        let mut misses = 0;
        loop{
            if self.cancel.is_cancelled(){
                self.halt();
                return Err(ServoError::Cancelled);
            }
            if let Err(exhausted) = budget.try_attempt(){
                self.halt();
                return Err(timeout(ServoPhase::Acquisition, exhausted));
            }
            if let Some(found) = self.next_detection()?{
                return Ok((found, misses));
            }
            misses += 1;
            debug!("acquisition: nothing yet ({} misses)", misses);
            budget.pause();
        }
    }

    fn next_detection(&mut self) -> Result<Option<BoundingBox<Unit>>, ServoError>{
        let first = self.detector.predict()?.into_iter().next();
        Ok(first.map(|b| b.into_normalized(self.config.frame)))
    }

    fn halt(&mut self){
        if let Err(e) = self.actuator.command(MotionCommand::neutral()){
            warn!("failed to send neutral command: {}", e);
        }
    }
}

fn timeout(phase: ServoPhase, exhausted: BudgetExhausted) -> ServoError{
    ServoError::Timeout{ phase, attempts: exhausted.attempts, elapsed: exhausted.elapsed }
}

#[cfg(test)]
mod tests{
    use super::*;
    use std::collections::VecDeque;
    use crate::geometry::Pixel;

    const FRAME: f64 = 480.0;

    struct ScriptedDetector{
        script: VecDeque<Option<(f64, f64)>>,
        calls: usize,
        model: Option<String>,
        /// Cancel this token while serving the given call
        cancel_on: Option<(usize, CancellationToken)>,
    }

    impl ScriptedDetector{
        /// Each entry is a unit-space center offset, None for a miss
        fn from_offsets(offsets: &[Option<(f64, f64)>]) -> Self{
            ScriptedDetector{ script: offsets.iter().copied().collect(), calls: 0, model: None, cancel_on: None }
        }
    }

    impl DetectionSource for ScriptedDetector{
        fn load_model(&mut self, name: &str) -> Result<(), DetectionError>{
            self.model = Some(name.to_string());
            Ok(())
        }

        fn predict(&mut self) -> Result<Vec<BoundingBox<Pixel>>, DetectionError>{
            self.calls += 1;
            if let Some((call, token)) = &self.cancel_on{
                if *call == self.calls{
                    token.cancel();
                }
            }
            Ok(match self.script.pop_front().flatten(){
                Some((dx, dy)) => vec![BoundingBox::new(
                    (0.5 + dx) * FRAME,
                    (0.5 + dy) * FRAME,
                    40.0,
                    40.0,
                    0.9,
                    self.model.clone(),
                )],
                None => Vec::new(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingActuator{
        commands: Vec<MotionCommand>,
    }

    impl MotionActuator for RecordingActuator{
        fn command(&mut self, cmd: MotionCommand) -> Result<(), ActuatorError>{
            self.commands.push(cmd);
            Ok(())
        }

        fn enable_depth_hold(&mut self) -> Result<(), ActuatorError>{
            Ok(())
        }

        fn set_depth_target(&mut self, _depth_m: f32) -> Result<(), ActuatorError>{
            Ok(())
        }
    }

    struct FixedDepth(Option<f32>);

    impl DepthSensor for FixedDepth{
        fn depth(&self) -> Option<f32>{
            self.0
        }
    }

    fn test_config() -> ServoConfig{
        ServoConfig{
            acquisition: RetryPolicy::new(Duration::ZERO).with_max_attempts(50),
            centering: RetryPolicy::new(Duration::ZERO).with_max_attempts(50),
            ..ServoConfig::default()
        }
    }

    fn run_with(
        detector: &mut ScriptedDetector,
        actuator: &mut RecordingActuator,
        config: ServoConfig,
    ) -> Result<CenteringOutcome, ServoError>{
        let depth = FixedDepth(Some(1.0));
        let mut servo = VisualServoController::new(
            actuator, &depth, detector, "coke", config, CancellationToken::new(),
        );
        servo.run()
    }

    #[test]
    fn test_converges_after_third_detection(){
        let mut det = ScriptedDetector::from_offsets(&[
            Some((0.4, 0.4)),
            Some((0.35, 0.35)),
            Some((0.19, 0.19)),
            Some((0.0, 0.0)),
        ]);
        let mut act = RecordingActuator::default();
        let outcome = run_with(&mut det, &mut act, test_config()).unwrap();

        assert_eq!(det.calls, 3);
        assert_eq!(det.model.as_deref(), Some("coke"));
        assert_eq!(outcome.acquisition_misses, 0);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.commands_sent, 2);
        // two corrections then the neutral stop
        assert_eq!(act.commands.len(), 3);
        assert!(act.commands[2].is_neutral());
    }

    #[test]
    fn test_acquisition_polls_through_misses(){
        let mut det = ScriptedDetector::from_offsets(&[None, None, None, Some((0.0, 0.0))]);
        let mut act = RecordingActuator::default();
        let outcome = run_with(&mut det, &mut act, test_config()).unwrap();

        assert_eq!(outcome.acquisition_misses, 3);
        assert_eq!(det.calls, 4);
        assert_eq!(outcome.iterations, 0);
    }

    #[test]
    fn test_acquisition_times_out(){
        let mut det = ScriptedDetector::from_offsets(&[]);
        let mut act = RecordingActuator::default();
        let config = ServoConfig{
            acquisition: RetryPolicy::new(Duration::ZERO).with_max_attempts(5),
            ..test_config()
        };
        let err = run_with(&mut det, &mut act, config).unwrap_err();
        assert!(matches!(err, ServoError::Timeout{ phase: ServoPhase::Acquisition, attempts: 5, .. }));
        assert_eq!(det.calls, 5);
    }

    #[test]
    fn test_centering_times_out_and_stops_vehicle(){
        let offsets = vec![Some((0.4, 0.4)); 20];
        let mut det = ScriptedDetector::from_offsets(&offsets);
        let mut act = RecordingActuator::default();
        let config = ServoConfig{
            centering: RetryPolicy::new(Duration::ZERO).with_max_attempts(4),
            ..test_config()
        };
        let err = run_with(&mut det, &mut act, config).unwrap_err();
        assert!(matches!(err, ServoError::Timeout{ phase: ServoPhase::Centering, attempts: 4, .. }));
        assert!(act.commands.last().unwrap().is_neutral());
    }

    #[test]
    fn test_both_axes_policy_needs_both_centered(){
        let mut det = ScriptedDetector::from_offsets(&[
            Some((0.4, 0.4)),
            Some((0.1, 0.4)),
            Some((0.1, 0.1)),
        ]);
        let mut act = RecordingActuator::default();
        let outcome = run_with(&mut det, &mut act, test_config()).unwrap();
        assert_eq!(det.calls, 3);
        assert_eq!(outcome.iterations, 2);
    }

    #[test]
    fn test_either_axis_policy_stops_on_first_centered_axis(){
        let mut det = ScriptedDetector::from_offsets(&[
            Some((0.4, 0.4)),
            Some((0.1, 0.4)),
            Some((0.1, 0.1)),
        ]);
        let mut act = RecordingActuator::default();
        let config = ServoConfig{ convergence: ConvergencePolicy::EitherAxis, ..test_config() };
        let outcome = run_with(&mut det, &mut act, config).unwrap();
        assert_eq!(det.calls, 2);
        assert_eq!(outcome.iterations, 1);
    }

    #[test]
    fn test_skip_policy_issues_nothing_on_miss(){
        let mut det = ScriptedDetector::from_offsets(&[
            Some((0.4, 0.4)),
            Some((0.3, 0.3)),
            None,
            Some((0.0, 0.0)),
        ]);
        let mut act = RecordingActuator::default();
        let outcome = run_with(&mut det, &mut act, test_config()).unwrap();
        assert_eq!(outcome.centering_misses, 1);
        assert_eq!(outcome.commands_sent, 2);
    }

    #[test]
    fn test_hold_last_policy_repeats_command(){
        let mut det = ScriptedDetector::from_offsets(&[
            Some((0.4, 0.4)),
            Some((0.3, 0.3)),
            None,
            Some((0.0, 0.0)),
        ]);
        let mut act = RecordingActuator::default();
        let config = ServoConfig{ missed_frame: MissedFramePolicy::HoldLast, ..test_config() };
        let outcome = run_with(&mut det, &mut act, config).unwrap();
        assert_eq!(outcome.commands_sent, 3);
        assert_eq!(act.commands[0], act.commands[1]);
    }

    #[test]
    fn test_reacquire_policy_restarts_acquisition(){
        let mut det = ScriptedDetector::from_offsets(&[
            Some((0.4, 0.4)),
            None,
            None,
            Some((0.3, 0.3)),
            Some((0.0, 0.0)),
        ]);
        let mut act = RecordingActuator::default();
        let config = ServoConfig{ missed_frame: MissedFramePolicy::Reacquire, ..test_config() };
        let outcome = run_with(&mut det, &mut act, config).unwrap();
        assert_eq!(outcome.centering_misses, 1);
        // the second empty frame is counted by acquisition
        assert_eq!(outcome.acquisition_misses, 1);
        assert_eq!(det.calls, 5);
    }

    #[test]
    fn test_cancelled_before_start(){
        let mut det = ScriptedDetector::from_offsets(&[Some((0.4, 0.4))]);
        let mut act = RecordingActuator::default();
        let depth = FixedDepth(None);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut servo = VisualServoController::new(
            &mut act, &depth, &mut det, "coke", test_config(), cancel,
        );
        assert!(matches!(servo.run(), Err(ServoError::Cancelled)));
        assert_eq!(det.calls, 0);
        assert_eq!(act.commands, vec![MotionCommand::neutral()]);
    }

    #[test]
    fn test_cancelled_while_centering(){
        let cancel = CancellationToken::new();
        let mut det = ScriptedDetector::from_offsets(&[Some((0.4, 0.4)), Some((0.3, 0.3)), Some((0.0, 0.0))]);
        det.cancel_on = Some((1, cancel.clone()));
        let mut act = RecordingActuator::default();
        let depth = FixedDepth(Some(1.0));
        let mut servo = VisualServoController::new(
            &mut act, &depth, &mut det, "coke", test_config(), cancel,
        );
        assert!(matches!(servo.run(), Err(ServoError::Cancelled)));
        // acquired on the first call, stopped before asking again
        assert_eq!(det.calls, 1);
        assert_eq!(act.commands, vec![MotionCommand::neutral()]);
    }

    #[test]
    fn test_smoothing_slows_the_estimate(){
        let mut det = ScriptedDetector::from_offsets(&[
            Some((0.4, 0.4)),
            Some((0.0, 0.0)),
            Some((0.0, 0.0)),
        ]);
        let mut act = RecordingActuator::default();
        let config = ServoConfig{ discount_factor: 0.5, ..test_config() };
        let outcome = run_with(&mut det, &mut act, config).unwrap();
        // 0.4 -> 0.2 (centered at the threshold)
        assert_eq!(outcome.iterations, 1);
        let (dx, _) = outcome.estimate.offset_from_center();
        assert!((dx - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_command_law(){
        let config = ServoConfig::default();
        let right_and_below = BoundingBox::<Unit>::new(0.9, 0.8, 0.1, 0.1, 1.0, None);
        let cmd = config.command_for(&right_and_below, Some(2.0));
        assert!(cmd.sway > 0.0);
        assert!(cmd.heave < 0.0);
        assert_eq!(cmd.surge, 0.0);

        let far_left = BoundingBox::<Unit>::new(-10.0, 0.5, 0.1, 0.1, 1.0, None);
        assert_eq!(config.command_for(&far_left, None).sway, -config.max_command);
    }

    #[test]
    fn test_no_upward_heave_near_surface(){
        let config = ServoConfig::default();
        let above = BoundingBox::<Unit>::new(0.5, 0.1, 0.1, 0.1, 1.0, None);
        assert!(config.command_for(&above, Some(2.0)).heave > 0.0);
        assert_eq!(config.command_for(&above, Some(0.05)).heave, 0.0);
    }
}
