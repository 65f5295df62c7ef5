/**
 * Serial vehicle
 *
 * Owns the UART link to the STM32 board on a background thread:
 * 1. Parses sensor frames (IMU, orientation, depth) into shared state
 * 2. Merges the latest motion request with the depth-hold loop
 * 3. Sends thruster PWM at 50Hz, and neutral on shutdown
 *
 * The mission side talks to it through a cloneable `VehicleHandle`.
 */

use std::io::{self, Read};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use log::{debug, error, info, warn};

use crate::control::{ActuatorError, DepthSensor, MotionActuator, MotionCommand};
use crate::link::{
    encode_frame, Frame, FrameDecoder, MsgType,
    DepthMsg, ImuMsg, OrientationMsg, ThrusterPwmCmd,
};
use super::thrust_mixer::{ThrustCommand, ThrustMixer};

const TX_PERIOD: Duration = Duration::from_millis(20);
const READ_TIMEOUT: Duration = Duration::from_millis(10);
const MAX_READ_FAILURES: u32 = 50;
const READ_FAILURE_BACKOFF: Duration = Duration::from_millis(20);

/// Proportional depth hold on top of the commanded heave.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthHold{
    pub enabled: bool,
    /// Setpoint, metres below the surface
    pub target: f32,
    /// Heave percent per metre of depth error
    pub kp: f32,
    pub max_heave: f32,
}

impl Default for DepthHold{
    fn default() -> Self{
        DepthHold{ enabled: false, target: 0.0, kp: 60.0, max_heave: 40.0 }
    }
}

/// Latest sensor readings plus the current motion request.
#[derive(Debug, Clone, Default)]
pub struct VehicleState{
    pub imu: Option<ImuMsg>,
    pub orientation: Option<OrientationMsg>,
    pub depth: Option<DepthMsg>,
    pub command: MotionCommand,
    pub depth_hold: DepthHold,
    pub frames_received: u64,
}

impl VehicleState{
    pub fn apply_frame(&mut self, frame: &Frame){
        self.frames_received += 1;
        match frame.msg_type{
            MsgType::Imu => {
                if let Some(imu) = ImuMsg::from_bytes(&frame.payload){
                    self.imu = Some(imu);
                }
            }
            MsgType::Orientation => {
                if let Some(orient) = OrientationMsg::from_bytes(&frame.payload){
                    self.orientation = Some(orient);
                }
            }
            MsgType::Depth => {
                if let Some(depth) = DepthMsg::from_bytes(&frame.payload){
                    self.depth = Some(depth);
                }
            }
            MsgType::Heartbeat | MsgType::Thruster => {}
        }
    }

    /// Thrust to send this cycle. Deeper than the setpoint means positive
    /// error and an upward push; with no depth reading yet the hold adds nothing.
    pub fn thrust(&self) -> ThrustCommand{
        let mut thrust = ThrustCommand::from(self.command);
        let hold = &self.depth_hold;
        if hold.enabled{
            if let Some(reading) = self.depth{
                let correction = (hold.kp * (reading.depth - hold.target))
                    .clamp(-hold.max_heave, hold.max_heave);
                thrust.heave += correction;
            }
        }
        thrust
    }
}

fn read_state(state: &RwLock<VehicleState>) -> RwLockReadGuard<'_, VehicleState>{
    state.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_state(state: &RwLock<VehicleState>) -> RwLockWriteGuard<'_, VehicleState>{
    state.write().unwrap_or_else(PoisonError::into_inner)
}

/// Mission-side view of the vehicle.
#[derive(Clone)]
pub struct VehicleHandle{
    state: Arc<RwLock<VehicleState>>,
    running: Arc<AtomicBool>,
}

impl VehicleHandle{
    pub fn snapshot(&self) -> VehicleState{
        read_state(&self.state).clone()
    }

    pub fn stop(&self){
        write_state(&self.state).command = MotionCommand::neutral();
    }

    fn ensure_link(&self) -> Result<(), ActuatorError>{
        if self.running.load(Ordering::SeqCst){
            Ok(())
        }else{
            Err(ActuatorError::LinkDown)
        }
    }
}

impl MotionActuator for VehicleHandle{
    fn command(&mut self, cmd: MotionCommand) -> Result<(), ActuatorError>{
        self.ensure_link()?;
        write_state(&self.state).command = cmd;
        Ok(())
    }

    fn enable_depth_hold(&mut self) -> Result<(), ActuatorError>{
        self.ensure_link()?;
        write_state(&self.state).depth_hold.enabled = true;
        info!("depth hold enabled");
        Ok(())
    }

    fn set_depth_target(&mut self, depth_m: f32) -> Result<(), ActuatorError>{
        if !depth_m.is_finite() || depth_m < 0.0{
            return Err(ActuatorError::InvalidDepth(depth_m));
        }
        self.ensure_link()?;
        write_state(&self.state).depth_hold.target = depth_m;
        info!("depth target set to {:.2} m", depth_m);
        Ok(())
    }
}

impl DepthSensor for VehicleHandle{
    fn depth(&self) -> Option<f32>{
        read_state(&self.state).depth.map(|d| d.depth)
    }
}

/// Consecutive failed reads. A timeout or a good read resets the count.
#[derive(Debug)]
struct ReadFailures{
    consecutive: u32,
    limit: u32,
    backoff: Duration,
}

impl ReadFailures{
    fn new(limit: u32, backoff: Duration) -> Self{
        ReadFailures{ consecutive: 0, limit, backoff }
    }

    fn reset(&mut self){
        self.consecutive = 0;
    }

    /// Count one more failure. False once the limit is reached.
    fn record(&mut self) -> bool{
        self.consecutive += 1;
        self.consecutive < self.limit
    }
}

pub struct SerialVehicle{
    port_name: String,
    baud_rate: u32,
    mixer: ThrustMixer,
    state: Arc<RwLock<VehicleState>>,
    running: Arc<AtomicBool>,
}

impl SerialVehicle{
    pub fn new(port_name: &str, baud_rate: u32) -> Self{
        SerialVehicle{
            port_name: port_name.to_string(),
            baud_rate,
            mixer: ThrustMixer::default(),
            state: Arc::new(RwLock::new(VehicleState::default())),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_mixer(mut self, mixer: ThrustMixer) -> Self{
        self.mixer = mixer;
        self
    }

    pub fn with_depth_gain(self, kp: f32, max_heave: f32) -> Self{
        {
            let mut state = write_state(&self.state);
            state.depth_hold.kp = kp;
            state.depth_hold.max_heave = max_heave;
        }
        self
    }

    pub fn handle(&self) -> VehicleHandle{
        VehicleHandle{ state: Arc::clone(&self.state), running: Arc::clone(&self.running) }
    }

    /// Open the port and start the link thread.
    pub fn start(self) -> Result<VehicleLink, ActuatorError>{
        info!("opening {} at {} baud", self.port_name, self.baud_rate);
        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| ActuatorError::Io(e.into()))?;
        info!("connected to vehicle board");

        self.running.store(true, Ordering::SeqCst);
        let handle = self.handle();
        let running = Arc::clone(&self.running);
        let thread = thread::spawn(move || self.run_loop(port));
        Ok(VehicleLink{ handle, running, thread: Some(thread) })
    }

    fn run_loop(self, mut port: Box<dyn serialport::SerialPort>){
        let mut decoder = FrameDecoder::new();
        let mut read_buf = [0u8; 256];
        let mut last_tx = Instant::now();
        let mut failures = ReadFailures::new(MAX_READ_FAILURES, READ_FAILURE_BACKOFF);

        while self.running.load(Ordering::SeqCst){
            match port.read(&mut read_buf){
                Ok(n) => {
                    failures.reset();
                    if n > 0{
                        decoder.push(&read_buf[..n]);
                        let mut state = write_state(&self.state);
                        while let Some(frame) = decoder.next_frame(){
                            state.apply_frame(&frame);
                        }
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => failures.reset(),
                Err(e) => {
                    if !self.handle_read_error(&mut failures, &e){
                        break;
                    }
                }
            }

            if last_tx.elapsed() >= TX_PERIOD{
                last_tx = Instant::now();
                let thrust = read_state(&self.state).thrust();
                let pwm = self.mixer.to_pwm(&thrust);
                send_pwm(port.as_mut(), &pwm);
            }
        }

        info!("stopping thrusters");
        send_pwm(port.as_mut(), &ThrusterPwmCmd::default());
        debug!("link closed, {} frames dropped", decoder.dropped());
    }

    /// Log and back off after a failed read. Once too many fail in a row the
    /// link is marked down, so handles report `LinkDown`, and false is returned.
    fn handle_read_error(&self, failures: &mut ReadFailures, err: &io::Error) -> bool{
        if !failures.record(){
            error!("vehicle link lost after {} consecutive read errors: {}", failures.consecutive, err);
            self.running.store(false, Ordering::SeqCst);
            return false;
        }
        warn!("vehicle read error ({} in a row): {}", failures.consecutive, err);
        if !failures.backoff.is_zero(){
            thread::sleep(failures.backoff);
        }
        true
    }
}

fn send_pwm(port: &mut dyn serialport::SerialPort, pwm: &ThrusterPwmCmd){
    let frame = match encode_frame(MsgType::Thruster, &pwm.to_bytes()){
        Ok(frame) => frame,
        Err(e) => {
            error!("cannot encode thruster frame: {}", e);
            return;
        }
    };
    if let Err(e) = port.write_all(&frame).and_then(|_| port.flush()){
        warn!("vehicle write error: {}", e);
    }
}

/// A running link. Dropping it stops the thrusters and joins the thread.
pub struct VehicleLink{
    handle: VehicleHandle,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl VehicleLink{
    pub fn handle(&self) -> VehicleHandle{
        self.handle.clone()
    }

    pub fn shutdown(&mut self){
        self.handle.stop();
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take(){
            if thread.join().is_err(){
                error!("vehicle link thread panicked");
            }
        }
    }
}

impl Drop for VehicleLink{
    fn drop(&mut self){
        self.shutdown();
    }
}
