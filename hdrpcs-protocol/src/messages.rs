//! Message types for the supply's USB link
//!
//! Message types are divided into two categories:
//! - Host → Device: current/scale/config requests
//! - Device → Host: config values and the applied current setting

use heapless::Vec;

use crate::frame::{encode_frame, FrameError, MAX_PAYLOAD_SIZE};

// Message type IDs
pub const MSG_SET_CURRENT: u8 = 0;
pub const MSG_SET_CONFIG: u8 = 1;
pub const MSG_GET_CONFIG: u8 = 2;
pub const MSG_CONFIG_RESPONSE: u8 = 3;
pub const MSG_SET_SCALE: u8 = 4;
pub const MSG_CURRENT_SET: u8 = 5;

/// Wire message type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageType {
    /// Command a current in adjustable reference mode
    SetCurrent,
    /// Write one configuration value
    SetConfig,
    /// Read configuration values
    GetConfig,
    /// One configuration value (device → host)
    ConfigResponse,
    /// Select a fixed reference stage
    SetScale,
    /// Current actually applied (device → host)
    CurrentSet,
}

impl MessageType {
    /// Parse a message type from its wire byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            MSG_SET_CURRENT => Some(MessageType::SetCurrent),
            MSG_SET_CONFIG => Some(MessageType::SetConfig),
            MSG_GET_CONFIG => Some(MessageType::GetConfig),
            MSG_CONFIG_RESPONSE => Some(MessageType::ConfigResponse),
            MSG_SET_SCALE => Some(MessageType::SetScale),
            MSG_CURRENT_SET => Some(MessageType::CurrentSet),
            _ => None,
        }
    }

    /// Convert to wire byte
    pub fn to_byte(self) -> u8 {
        match self {
            MessageType::SetCurrent => MSG_SET_CURRENT,
            MessageType::SetConfig => MSG_SET_CONFIG,
            MessageType::GetConfig => MSG_GET_CONFIG,
            MessageType::ConfigResponse => MSG_CONFIG_RESPONSE,
            MessageType::SetScale => MSG_SET_SCALE,
            MessageType::CurrentSet => MSG_CURRENT_SET,
        }
    }

    /// Returns true for messages the host sends to the device
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            MessageType::SetCurrent
                | MessageType::SetConfig
                | MessageType::GetConfig
                | MessageType::SetScale
        )
    }
}

/// A checksum-validated frame as received
///
/// The length is always the payload's length, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command {
    msg_type: MessageType,
    payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Command {
    /// Create a command, copying `payload`
    pub fn new(msg_type: MessageType, payload: &[u8]) -> Result<Self, FrameError> {
        let payload = Vec::from_slice(payload).map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self { msg_type, payload })
    }

    pub(crate) fn from_parts(msg_type: MessageType, payload: Vec<u8, MAX_PAYLOAD_SIZE>) -> Self {
        Self { msg_type, payload }
    }

    pub fn msg_type(&self) -> MessageType {
        self.msg_type
    }

    /// Payload length as carried in the LENGTH byte
    pub fn len(&self) -> u8 {
        self.payload.len() as u8
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Requests parsed from host-originated commands
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    /// Drive the output at `milliamps`
    SetCurrent { milliamps: f32 },
    /// Store `value` at configuration `index`
    SetConfig { index: u8, value: f32 },
    /// Read one configuration value, or all of them when `index` is `None`
    GetConfig { index: Option<u8> },
    /// Switch to fixed reference `stage`
    SetScale { stage: u8 },
}

fn read_f32(bytes: &[u8]) -> Result<f32, FrameError> {
    let raw: [u8; 4] = bytes.try_into().map_err(|_| FrameError::InvalidPayload)?;
    Ok(f32::from_le_bytes(raw))
}

impl Request {
    /// Parse a request from a decoded command
    pub fn from_command(cmd: &Command) -> Result<Self, FrameError> {
        let payload = cmd.payload();
        match cmd.msg_type() {
            MessageType::SetCurrent => Ok(Request::SetCurrent {
                milliamps: read_f32(payload)?,
            }),
            MessageType::SetConfig => match payload {
                [index, value @ ..] => Ok(Request::SetConfig {
                    index: *index,
                    value: read_f32(value)?,
                }),
                [] => Err(FrameError::InvalidPayload),
            },
            MessageType::GetConfig => match payload {
                [] => Ok(Request::GetConfig { index: None }),
                [index] => Ok(Request::GetConfig {
                    index: Some(*index),
                }),
                _ => Err(FrameError::InvalidPayload),
            },
            MessageType::SetScale => match payload {
                [stage] => Ok(Request::SetScale { stage: *stage }),
                _ => Err(FrameError::InvalidPayload),
            },
            other => Err(FrameError::UnexpectedMessage(other)),
        }
    }

    pub fn msg_type(&self) -> MessageType {
        match self {
            Request::SetCurrent { .. } => MessageType::SetCurrent,
            Request::SetConfig { .. } => MessageType::SetConfig,
            Request::GetConfig { .. } => MessageType::GetConfig,
            Request::SetScale { .. } => MessageType::SetScale,
        }
    }

    /// Encode this request as a host would send it
    ///
    /// Returns the number of bytes written.
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        let mut payload = [0u8; 5];
        let len = match *self {
            Request::SetCurrent { milliamps } => {
                payload[..4].copy_from_slice(&milliamps.to_le_bytes());
                4
            }
            Request::SetConfig { index, value } => {
                payload[0] = index;
                payload[1..5].copy_from_slice(&value.to_le_bytes());
                5
            }
            Request::GetConfig { index: None } => 0,
            Request::GetConfig { index: Some(index) } => {
                payload[0] = index;
                1
            }
            Request::SetScale { stage } => {
                payload[0] = stage;
                1
            }
        };
        encode_frame(self.msg_type(), &payload[..len], buffer)
    }
}
