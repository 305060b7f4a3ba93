//! HDR Precision Current Source USB Protocol
//!
//! This crate defines the command/response protocol between the host and the
//! current source over its USB virtual serial port. One request is
//! outstanding at a time; there are no sequence numbers, retransmissions or
//! flow control.
//!
//! # Protocol Overview
//!
//! All messages use a simple binary frame format:
//! ```text
//! ┌──────┬──────┬────────┬─────────────┬──────────┐
//! │ SYNC │ TYPE │ LENGTH │ PAYLOAD     │ CHECKSUM │
//! │ 1B   │ 1B   │ 1B     │ 0–255B      │ 1B       │
//! └──────┴──────┴────────┴─────────────┴──────────┘
//! ```
//!
//! Received bytes go through [`FrameDecoder`], which yields [`Command`]s;
//! [`Request::from_command`] gives them meaning. Outgoing frames come from
//! [`Response::to_bytes`].

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod frame;
pub mod messages;
pub mod response;

pub use frame::{
    checksum, encode_frame, DecodeState, DecoderConfig, DecoderStats, FrameDecoder, FrameError,
    Ingested, ResetPolicy, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, SYNC_BYTE,
};
pub use messages::{Command, MessageType, Request};
pub use response::{encode_config_response, encode_current_setting, Response, RESPONSE_FRAME_LEN};
