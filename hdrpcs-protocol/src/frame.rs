//! Frame encoding and decoding for the supply's USB link.
//!
//! Frame format:
//! - SYNC (1 byte): 0xAA synchronization byte
//! - TYPE (1 byte): message type identifier
//! - LENGTH (1 byte): payload length (0-255)
//! - PAYLOAD (LENGTH bytes): type-specific data
//! - CHECKSUM (1 byte): 8-bit wrapping sum of TYPE, LENGTH and all PAYLOAD bytes
//!
//! 0xAA only has meaning while hunting for a frame start; inside a frame it
//! is ordinary data, so there is no escaping.

use heapless::Vec;

use crate::messages::{Command, MessageType};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Frame synchronization byte
pub const SYNC_BYTE: u8 = 0xAA;

/// Payload buffer capacity in bytes
pub const MAX_PAYLOAD_SIZE: usize = 255;

/// Maximum complete frame size (SYNC + TYPE + LENGTH + MAX_PAYLOAD + CHECKSUM)
pub const MAX_FRAME_SIZE: usize = 1 + 1 + 1 + MAX_PAYLOAD_SIZE + 1;

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// LENGTH exceeds the decoder's payload limit
    PayloadTooLarge,
    /// Checksum mismatch
    InvalidChecksum,
    /// Checksum matched but TYPE is not a known message
    UnknownMessageType(u8),
    /// Payload does not have the shape its message type requires
    InvalidPayload,
    /// Message type is valid but never sent in this direction
    UnexpectedMessage(MessageType),
    /// Buffer too small for encoding
    BufferTooSmall,
}

impl core::fmt::Display for FrameError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FrameError::PayloadTooLarge => f.write_str("payload length exceeds limit"),
            FrameError::InvalidChecksum => f.write_str("checksum mismatch"),
            FrameError::UnknownMessageType(t) => write!(f, "unknown message type {t:#04x}"),
            FrameError::InvalidPayload => f.write_str("malformed payload"),
            FrameError::UnexpectedMessage(t) => write!(f, "unexpected message {t:?}"),
            FrameError::BufferTooSmall => f.write_str("buffer too small"),
        }
    }
}

/// Sum of `bytes` modulo 256
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Encode a standard frame into `buffer`
///
/// Returns the number of bytes written.
pub fn encode_frame(
    msg_type: MessageType,
    payload: &[u8],
    buffer: &mut [u8],
) -> Result<usize, FrameError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLarge);
    }
    let frame_len = 4 + payload.len(); // SYNC + TYPE + LENGTH + payload + CHECKSUM
    if buffer.len() < frame_len {
        return Err(FrameError::BufferTooSmall);
    }

    buffer[0] = SYNC_BYTE;
    buffer[1] = msg_type.to_byte();
    buffer[2] = payload.len() as u8;
    buffer[3..3 + payload.len()].copy_from_slice(payload);
    buffer[3 + payload.len()] = checksum(&buffer[1..3 + payload.len()]);

    Ok(frame_len)
}

/// Encode a standard frame into a heapless Vec
pub fn encode_frame_to_vec(
    msg_type: MessageType,
    payload: &[u8],
) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
    let mut buffer = [0u8; MAX_FRAME_SIZE];
    let len = encode_frame(msg_type, payload, &mut buffer)?;
    Vec::from_slice(&buffer[..len]).map_err(|_| FrameError::BufferTooSmall)
}

/// What happens to a partially received frame when a new delivery arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ResetPolicy {
    /// Decoder state carries over between deliveries
    #[default]
    Persistent,
    /// Every delivery starts at `AwaitingSync`; a frame split across two
    /// deliveries is never decoded. Only correct when the transport hands
    /// over exactly one whole frame per delivery.
    PerDelivery,
}

/// Decoder tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DecoderConfig {
    /// Partial frame handling across deliveries
    pub reset_policy: ResetPolicy,
    /// Largest LENGTH accepted; anything above is rejected
    pub max_payload_len: u8,
}

impl DecoderConfig {
    /// Persistent state, full payload capacity
    pub const DEFAULT: Self = Self {
        reset_policy: ResetPolicy::Persistent,
        max_payload_len: MAX_PAYLOAD_SIZE as u8,
    };
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Position in the frame grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeState {
    /// Waiting for SYNC byte
    AwaitingSync,
    /// Got SYNC, waiting for TYPE
    ReadingType,
    /// Got TYPE, waiting for LENGTH
    ReadingLength,
    /// Reading payload bytes
    ReadingPayload,
    /// Waiting for CHECKSUM
    ReadingChecksum,
}

/// Decoder counters
///
/// All counters wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecoderStats {
    /// Frames that passed the checksum and had a known type
    pub frames: u32,
    /// Frames dropped for a checksum mismatch
    pub checksum_errors: u32,
    /// Frames dropped because LENGTH exceeded the limit
    pub oversize_errors: u32,
    /// Frames dropped for an unknown TYPE
    pub unknown_type_errors: u32,
    /// Bytes skipped while hunting for SYNC
    pub discarded_bytes: u32,
    /// Partial frames thrown away by a reset
    pub abandoned_frames: u32,
}

impl DecoderStats {
    const fn new() -> Self {
        Self {
            frames: 0,
            checksum_errors: 0,
            oversize_errors: 0,
            unknown_type_errors: 0,
            discarded_bytes: 0,
            abandoned_frames: 0,
        }
    }

    fn record_error(&mut self, err: FrameError) {
        let counter = match err {
            FrameError::InvalidChecksum => &mut self.checksum_errors,
            FrameError::PayloadTooLarge => &mut self.oversize_errors,
            FrameError::UnknownMessageType(_) => &mut self.unknown_type_errors,
            _ => return,
        };
        *counter = counter.wrapping_add(1);
    }
}

/// Result of pushing one delivery through the decoder
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    /// Last command completed in this delivery, if any
    pub command: Option<Command>,
    /// Number of commands completed in this delivery
    pub completed: u16,
    /// Last error seen in this delivery, if any
    pub last_error: Option<FrameError>,
}

/// Byte-at-a-time state machine that rebuilds commands from the stream
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    config: DecoderConfig,
    state: DecodeState,
    payload: Vec<u8, MAX_PAYLOAD_SIZE>,
    expected_length: u8,
    msg_type: u8,
    running_sum: u8,
    stats: DecoderStats,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a decoder with the default configuration
    pub const fn new() -> Self {
        Self::with_config(DecoderConfig::DEFAULT)
    }

    /// Create a decoder with an explicit configuration
    pub const fn with_config(config: DecoderConfig) -> Self {
        Self {
            config,
            state: DecodeState::AwaitingSync,
            payload: Vec::new(),
            expected_length: 0,
            msg_type: 0,
            running_sum: 0,
            stats: DecoderStats::new(),
        }
    }

    pub fn config(&self) -> DecoderConfig {
        self.config
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Return the counters and zero them
    pub fn take_stats(&mut self) -> DecoderStats {
        core::mem::take(&mut self.stats)
    }

    /// Discard any partial frame and go back to hunting for SYNC
    pub fn reset(&mut self) {
        if self.state != DecodeState::AwaitingSync {
            self.stats.abandoned_frames = self.stats.abandoned_frames.wrapping_add(1);
        }
        self.restart();
    }

    fn restart(&mut self) {
        self.state = DecodeState::AwaitingSync;
        self.payload.clear();
        self.expected_length = 0;
        self.msg_type = 0;
        self.running_sum = 0;
    }

    /// Feed a single byte to the decoder
    ///
    /// Returns `Ok(Some(command))` when a complete valid frame is decoded,
    /// `Ok(None)` when more bytes are needed, or `Err` when a frame was
    /// dropped. After an error the decoder is back at `AwaitingSync`.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Command>, FrameError> {
        match self.state {
            DecodeState::AwaitingSync => {
                if byte == SYNC_BYTE {
                    self.running_sum = 0;
                    self.state = DecodeState::ReadingType;
                } else {
                    self.stats.discarded_bytes = self.stats.discarded_bytes.wrapping_add(1);
                }
                Ok(None)
            }
            DecodeState::ReadingType => {
                self.msg_type = byte;
                self.running_sum = self.running_sum.wrapping_add(byte);
                self.state = DecodeState::ReadingLength;
                Ok(None)
            }
            DecodeState::ReadingLength => {
                if byte > self.config.max_payload_len {
                    return self.fail(FrameError::PayloadTooLarge);
                }
                self.expected_length = byte;
                self.running_sum = self.running_sum.wrapping_add(byte);
                self.payload.clear();
                self.state = if byte == 0 {
                    DecodeState::ReadingChecksum
                } else {
                    DecodeState::ReadingPayload
                };
                Ok(None)
            }
            DecodeState::ReadingPayload => {
                if self.payload.push(byte).is_err() {
                    return self.fail(FrameError::PayloadTooLarge);
                }
                self.running_sum = self.running_sum.wrapping_add(byte);
                if self.payload.len() == self.expected_length as usize {
                    self.state = DecodeState::ReadingChecksum;
                }
                Ok(None)
            }
            DecodeState::ReadingChecksum => {
                if byte != self.running_sum {
                    return self.fail(FrameError::InvalidChecksum);
                }
                let Some(msg_type) = MessageType::from_byte(self.msg_type) else {
                    return self.fail(FrameError::UnknownMessageType(self.msg_type));
                };

                let command = Command::from_parts(msg_type, core::mem::take(&mut self.payload));
                self.stats.frames = self.stats.frames.wrapping_add(1);
                self.restart();
                Ok(Some(command))
            }
        }
    }

    fn fail(&mut self, err: FrameError) -> Result<Option<Command>, FrameError> {
        self.stats.record_error(err);
        self.restart();
        Err(err)
    }

    /// Process one transport delivery
    ///
    /// Every byte is consumed in order. If several frames complete, only the
    /// last one is returned. Under [`ResetPolicy::PerDelivery`] the decoder
    /// first drops whatever partial frame the previous delivery left behind.
    pub fn ingest(&mut self, bytes: &[u8]) -> Ingested {
        if self.config.reset_policy == ResetPolicy::PerDelivery {
            self.reset();
        }

        let mut out = Ingested {
            command: None,
            completed: 0,
            last_error: None,
        };
        for &byte in bytes {
            match self.feed(byte) {
                Ok(Some(command)) => {
                    out.command = Some(command);
                    out.completed = out.completed.saturating_add(1);
                }
                Ok(None) => {}
                Err(e) => out.last_error = Some(e),
            }
        }
        out
    }
}
