//! Payload layouts. Little-endian, no padding.

pub const IMU_MSG_SIZE: usize = 36;         //9 * f32
pub const ORIENTATION_MSG_SIZE: usize = 12; //3 * f32
pub const DEPTH_MSG_SIZE: usize = 4;        //1 * f32
pub const THRUSTER_PWM_SIZE: usize = 24;    //6 * i32

/// PWM pulse width (µs) that leaves a thruster stopped
pub const NEUTRAL_PWM: i32 = 1500;

fn read_f32s<const N: usize>(data: &[u8]) -> Option<[f32; N]>{
    if data.len() < N * 4{
        return None;
    }
    let mut out = [0.0f32; N];
    for (slot, chunk) in out.iter_mut().zip(data.chunks_exact(4)){
        *slot = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Some(out)
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ImuMsg{
    pub accel: [f32; 3], //m/s²
    pub gyro: [f32; 3],  //rad/s
    pub mag: [f32; 3],   //µT
}

impl ImuMsg{
    pub fn from_bytes(data: &[u8]) -> Option<Self>{
        let v = read_f32s::<9>(data)?;
        Some(ImuMsg{
            accel: [v[0], v[1], v[2]],
            gyro: [v[3], v[4], v[5]],
            mag: [v[6], v[7], v[8]],
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OrientationMsg{
    pub roll: f32, //degrees
    pub pitch: f32,
    pub yaw: f32,
}

impl OrientationMsg{
    pub fn from_bytes(data: &[u8]) -> Option<Self>{
        let [roll, pitch, yaw] = read_f32s::<3>(data)?;
        Some(OrientationMsg{ roll, pitch, yaw })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DepthMsg{
    pub depth: f32, //metres, positive down
}

impl DepthMsg{
    pub fn from_bytes(data: &[u8]) -> Option<Self>{
        let [depth] = read_f32s::<1>(data)?;
        Some(DepthMsg{ depth })
    }

    pub fn to_bytes(&self) -> [u8; DEPTH_MSG_SIZE]{
        self.depth.to_le_bytes()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThrusterPwmCmd{
    pub pwm: [i32; 6], //µs per thruster
}

impl Default for ThrusterPwmCmd{
    fn default() -> Self{
        ThrusterPwmCmd{ pwm: [NEUTRAL_PWM; 6] }
    }
}

impl ThrusterPwmCmd{
    pub fn new(pwm: [i32; 6]) -> Self{
        ThrusterPwmCmd{ pwm }
    }

    pub fn to_bytes(&self) -> [u8; THRUSTER_PWM_SIZE]{
        let mut bytes = [0u8; THRUSTER_PWM_SIZE];
        for (chunk, value) in bytes.chunks_exact_mut(4).zip(self.pwm.iter()){
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        bytes
    }
}
