//! Device → host responses
//!
//! Both responses are 8 bytes on the wire:
//!
//! ```text
//! CONFIG_RESPONSE: AA 03 <index> <f0 f1 f2 f3> <chk>
//! CURRENT_SET:     AA 05 04      <f0 f1 f2 f3> <chk>
//! ```
//!
//! CONFIG_RESPONSE carries the index where other frames carry LENGTH; the
//! host reads it as a fixed 5-byte body. The checksum still covers every
//! byte after SYNC.

use crate::frame::{checksum, SYNC_BYTE};
use crate::messages::MessageType;

/// Length of every response frame
pub const RESPONSE_FRAME_LEN: usize = 8;

/// Responses the device sends
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    /// Value of configuration entry `index`
    ConfigValue { index: u8, value: f32 },
    /// Output current now in effect
    CurrentSet { milliamps: f32 },
}

impl Response {
    pub fn msg_type(&self) -> MessageType {
        match self {
            Response::ConfigValue { .. } => MessageType::ConfigResponse,
            Response::CurrentSet { .. } => MessageType::CurrentSet,
        }
    }

    /// Serialize to the fixed-length wire frame
    pub fn to_bytes(&self) -> [u8; RESPONSE_FRAME_LEN] {
        let (second, value) = match *self {
            Response::ConfigValue { index, value } => (index, value),
            Response::CurrentSet { milliamps } => (4, milliamps),
        };

        let mut frame = [0u8; RESPONSE_FRAME_LEN];
        frame[0] = SYNC_BYTE;
        frame[1] = self.msg_type().to_byte();
        frame[2] = second;
        frame[3..7].copy_from_slice(&value.to_le_bytes());
        frame[7] = checksum(&frame[1..7]);
        frame
    }
}

/// Frame a CONFIG_RESPONSE
pub fn encode_config_response(index: u8, value: f32) -> [u8; RESPONSE_FRAME_LEN] {
    Response::ConfigValue { index, value }.to_bytes()
}

/// Frame a CURRENT_SET
pub fn encode_current_setting(milliamps: f32) -> [u8; RESPONSE_FRAME_LEN] {
    Response::CurrentSet { milliamps }.to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameDecoder;

    #[test]
    fn test_config_response_bytes() {
        let bytes = encode_config_response(3, 1.5);
        assert_eq!(bytes, [0xAA, 0x03, 0x03, 0x00, 0x00, 0xC0, 0x3F, 0x05]);
    }

    #[test]
    fn test_config_response_checksum_covers_index() {
        let a = encode_config_response(0, 2.0);
        let b = encode_config_response(1, 2.0);
        assert_eq!(b[7], a[7].wrapping_add(1));
    }

    #[test]
    fn test_current_setting_bytes() {
        let bytes = encode_current_setting(30.0);
        let raw = 30.0f32.to_le_bytes();
        assert_eq!(&bytes[..3], &[0xAA, 0x05, 0x04]);
        assert_eq!(&bytes[3..7], &raw);
        assert_eq!(bytes[7], checksum(&bytes[1..7]));
    }

    #[test]
    fn test_current_setting_is_standard_frame() {
        // The host parses CURRENT_SET with the same grammar the device uses
        let bytes = encode_current_setting(0.0033);
        let cmd = FrameDecoder::new().ingest(&bytes).command.unwrap();
        assert_eq!(cmd.msg_type(), MessageType::CurrentSet);
        assert_eq!(cmd.payload(), &0.0033f32.to_le_bytes());
    }
}
