//! Request dispatch
//!
//! The control loop implements [`CommandHandler`]; [`dispatch`] turns a
//! parsed request into handler calls and the matching response frames.

use hdrpcs_hal::SerialTx;
use hdrpcs_protocol::{FrameError, MessageType, Request, Response};

use crate::config::ConfigTable;
use crate::link::send_response;

/// Application side of the link
pub trait CommandHandler {
    /// Drive the output at `milliamps` (adjustable reference mode)
    ///
    /// Returns the setting actually applied, which is reported back to the
    /// host in CURRENT_SET.
    fn set_current(&mut self, milliamps: f32) -> f32;

    /// Select fixed reference `stage`
    ///
    /// Returns the nominal current of the stage now in effect.
    fn set_scale(&mut self, stage: u8) -> f32;

    /// Configuration values exposed to the host
    fn config(&self) -> &ConfigTable;

    fn config_mut(&mut self) -> &mut ConfigTable;
}

/// Outcome of one service step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Serviced {
    /// No command was waiting
    Idle,
    /// Command handled and any response sent
    Handled(MessageType),
    /// Command dropped; nothing was sent
    Rejected(FrameError),
}

/// Apply `request` to `handler`, transmitting responses on `tx`
///
/// Transport errors are returned as-is; no retry is attempted.
pub fn dispatch<H, T>(request: Request, handler: &mut H, tx: &mut T) -> Result<Serviced, T::Error>
where
    H: CommandHandler + ?Sized,
    T: SerialTx,
{
    match request {
        Request::SetCurrent { milliamps } => {
            let applied = handler.set_current(milliamps);
            send_response(tx, &Response::CurrentSet { milliamps: applied })?;
        }
        Request::SetScale { stage } => {
            let applied = handler.set_scale(stage);
            send_response(tx, &Response::CurrentSet { milliamps: applied })?;
        }
        Request::SetConfig { index, value } => {
            if handler.config_mut().set(index, value).is_err() {
                return Ok(Serviced::Rejected(FrameError::InvalidPayload));
            }
        }
        Request::GetConfig { index: Some(index) } => match handler.config().get(index) {
            Some(value) => send_response(tx, &Response::ConfigValue { index, value })?,
            None => return Ok(Serviced::Rejected(FrameError::InvalidPayload)),
        },
        Request::GetConfig { index: None } => {
            for (index, value) in handler.config().iter() {
                send_response(tx, &Response::ConfigValue { index, value })?;
            }
        }
    }
    Ok(Serviced::Handled(request.msg_type()))
}
