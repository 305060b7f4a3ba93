//! Board-agnostic core of the current source's USB link
//!
//! This crate sits between the USB transport and the control loop:
//!
//! - Link integration owning the frame decoder ([`link::UsbLink`])
//! - Single-slot hand-off from receive callback to main loop
//! - Request dispatch to the application ([`handler::CommandHandler`])
//! - Configuration table exposed over the link

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod config;
pub mod handler;
pub mod link;
pub mod mailbox;

pub use config::{ConfigError, ConfigTable};
pub use handler::{dispatch, CommandHandler, Serviced};
pub use link::{send_response, transmit_config_value, transmit_current_setting, UsbLink};
pub use mailbox::Mailbox;
