/**
 * Vehicle serial link
 *
 * Framing shared with the STM32 board:
 *   [SYNC 0xAA][TYPE][LEN][PAYLOAD ... LEN bytes][CHECKSUM]
 * CHECKSUM is the wrapping byte sum of TYPE, LEN and PAYLOAD.
 */

pub mod messages;

use thiserror::Error;

pub use messages::{ImuMsg, OrientationMsg, DepthMsg, ThrusterPwmCmd, NEUTRAL_PWM};

pub const SYNC_BYTE: u8 = 0xAA;
pub const MAX_MSG_SIZE: usize = 244;
const HEADER_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType{
    Imu = 0x01,
    Depth = 0x02,
    Thruster = 0x03,
    Heartbeat = 0x04,
    Orientation = 0x05,
}

impl MsgType{
    pub fn from_u8(val: u8) -> Option<Self>{
        match val{
            0x01 => Some(MsgType::Imu),
            0x02 => Some(MsgType::Depth),
            0x03 => Some(MsgType::Thruster),
            0x04 => Some(MsgType::Heartbeat),
            0x05 => Some(MsgType::Orientation),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError{
    #[error("payload of {0} bytes exceeds the {} byte limit", MAX_MSG_SIZE)]
    PayloadTooLarge(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame{
    pub msg_type: MsgType,
    pub payload: Vec<u8>,
}

pub fn checksum(data: &[u8]) -> u8{
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

pub fn encode_frame(msg_type: MsgType, payload: &[u8]) -> Result<Vec<u8>, FrameError>{
    if payload.len() > MAX_MSG_SIZE{
        return Err(FrameError::PayloadTooLarge(payload.len()));
    }
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len() + 1);
    frame.push(SYNC_BYTE);
    frame.push(msg_type as u8);
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);
    frame.push(checksum(&frame[1..]));
    Ok(frame)
}

/// Reassembles frames from an arbitrary chunked byte stream.
/// Garbage, bad checksums and unknown types are dropped, never surfaced.
#[derive(Debug, Default)]
pub struct FrameDecoder{
    buffer: Vec<u8>,
    dropped: u64,
}

impl FrameDecoder{
    pub fn new() -> Self{
        FrameDecoder{ buffer: Vec::with_capacity(512), dropped: 0 }
    }

    pub fn push(&mut self, bytes: &[u8]){
        self.buffer.extend_from_slice(bytes);
    }

    /// Frames discarded for a bad length, checksum or type
    pub fn dropped(&self) -> u64{
        self.dropped
    }

    pub fn next_frame(&mut self) -> Option<Frame>{
        loop{
            let sync_pos = match self.buffer.iter().position(|&b| b == SYNC_BYTE){
                Some(pos) => pos,
                None => {
                    self.buffer.clear();
                    return None;
                }
            };
            self.buffer.drain(..sync_pos);

            if self.buffer.len() < HEADER_LEN + 1{
                return None;
            }

            let len = self.buffer[2] as usize;
            if len > MAX_MSG_SIZE{
                // false sync, resync on the next 0xAA
                self.buffer.remove(0);
                self.dropped += 1;
                continue;
            }

            let frame_len = HEADER_LEN + len + 1;
            if self.buffer.len() < frame_len{
                return None;
            }

            if checksum(&self.buffer[1..HEADER_LEN + len]) != self.buffer[HEADER_LEN + len]{
                self.buffer.remove(0);
                self.dropped += 1;
                continue;
            }

            let type_byte = self.buffer[1];
            let payload = self.buffer[HEADER_LEN..HEADER_LEN + len].to_vec();
            self.buffer.drain(..frame_len);

            match MsgType::from_u8(type_byte){
                Some(msg_type) => return Some(Frame{ msg_type, payload }),
                None => self.dropped += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests{
    use super::*;

    #[test]
    fn test_msg_type_conversion(){
        assert_eq!(MsgType::from_u8(0x01), Some(MsgType::Imu));
        assert_eq!(MsgType::from_u8(0x05), Some(MsgType::Orientation));
        assert_eq!(MsgType::from_u8(0xFF), None);
    }

    #[test]
    fn test_encode_layout(){
        let frame = encode_frame(MsgType::Depth, &[0x01, 0x02]).unwrap();
        assert_eq!(frame, vec![0xAA, 0x02, 0x02, 0x01, 0x02, 0x02 + 0x02 + 0x01 + 0x02]);
    }

    #[test]
    fn test_encode_rejects_oversized_payload(){
        let payload = vec![0u8; MAX_MSG_SIZE + 1];
        assert_eq!(encode_frame(MsgType::Imu, &payload), Err(FrameError::PayloadTooLarge(245)));
    }

    #[test]
    fn test_decoder_handles_split_and_noise(){
        let depth = DepthMsg{ depth: 1.25 }.to_bytes();
        let frame = encode_frame(MsgType::Depth, &depth).unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.push(&[0x00, 0x13, 0x37]);
        decoder.push(&frame[..3]);
        assert!(decoder.next_frame().is_none());
        decoder.push(&frame[3..]);

        let decoded = decoder.next_frame().unwrap();
        assert_eq!(decoded.msg_type, MsgType::Depth);
        assert_eq!(DepthMsg::from_bytes(&decoded.payload).unwrap().depth, 1.25);
        assert!(decoder.next_frame().is_none());
    }

    #[test]
    fn test_decoder_drops_bad_checksum_and_recovers(){
        let mut bad = encode_frame(MsgType::Heartbeat, &[1, 2, 3]).unwrap();
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;
        let good = encode_frame(MsgType::Heartbeat, &[4]).unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.push(&bad);
        decoder.push(&good);
        let frame = decoder.next_frame().unwrap();
        assert_eq!(frame.payload, vec![4]);
        assert_eq!(decoder.dropped(), 1);
    }

    #[test]
    fn test_decoder_skips_unknown_type(){
        let mut raw = vec![SYNC_BYTE, 0x42, 0x01, 0x09];
        raw.push(checksum(&raw[1..]));
        raw.extend(encode_frame(MsgType::Imu, &[]).unwrap());

        let mut decoder = FrameDecoder::new();
        decoder.push(&raw);
        assert_eq!(decoder.next_frame().unwrap().msg_type, MsgType::Imu);
        assert_eq!(decoder.dropped(), 1);
    }
}
