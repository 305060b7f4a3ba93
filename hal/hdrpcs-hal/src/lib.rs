//! HDR Precision Current Source Hardware Abstraction Layer
//!
//! This crate defines the transport traits the protocol core talks to. The
//! board firmware implements them on top of its USB device stack; host tests
//! use the recording mock.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (control loop, DAC)        │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  hdrpcs-core (link, mailbox, dispatch)  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  hdrpcs-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  USB CDC class driver (board specific)  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`serial::SerialTx`] - Transmit raw bytes

#![no_std]
#![deny(unsafe_code)]

pub mod serial;

pub use serial::{SerialTx, UsbCdcConfig};
