//! USB link integration
//!
//! [`UsbLink`] is the one place protocol state lives. The transport glue
//! creates it once (usually as a `static`), calls [`UsbLink::on_receive`]
//! from its receive-complete callback, and the main loop drains it with
//! [`UsbLink::poll_command`] or [`UsbLink::service`].
//!
//! ```ignore
//! static LINK: UsbLink<CriticalSectionRawMutex> = UsbLink::new(DecoderConfig::DEFAULT);
//!
//! // CDC receive callback
//! fn cdc_receive(buf: &[u8]) {
//!     LINK.on_receive(buf);
//! }
//!
//! // main loop
//! loop {
//!     let _ = LINK.service(&mut supply, &mut cdc_tx);
//! }
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use hdrpcs_hal::SerialTx;
use hdrpcs_protocol::{
    Command, DecodeState, DecoderConfig, DecoderStats, FrameDecoder, FrameError, Request, Response,
};

use crate::handler::{dispatch, CommandHandler, Serviced};
use crate::mailbox::Mailbox;

/// Decoder instance plus the ready-slot it fills
pub struct UsbLink<M: RawMutex> {
    decoder: Mutex<M, RefCell<FrameDecoder>>,
    ready: Mailbox<M, Command>,
}

impl<M: RawMutex> UsbLink<M> {
    /// Create a link with an idle decoder and an empty ready-slot
    pub const fn new(config: DecoderConfig) -> Self {
        Self {
            decoder: Mutex::new(RefCell::new(FrameDecoder::with_config(config))),
            ready: Mailbox::new(),
        }
    }

    /// Ingest one transport delivery
    ///
    /// Called from the receive callback. `bytes` is not retained. Each
    /// completed command replaces whatever is waiting in the ready-slot.
    pub fn on_receive(&self, bytes: &[u8]) {
        let ingested = self
            .decoder
            .lock(|decoder| decoder.borrow_mut().ingest(bytes));

        #[cfg(feature = "defmt")]
        if let Some(err) = ingested.last_error {
            defmt::warn!("Frame dropped: {:?}", err);
        }

        if let Some(command) = ingested.command {
            #[cfg(feature = "defmt")]
            defmt::trace!(
                "RX: {} bytes, {} command(s), last {:?}",
                bytes.len(),
                ingested.completed,
                command.msg_type()
            );
            let _replaced = self.ready.post(command);
            #[cfg(feature = "defmt")]
            if _replaced {
                defmt::debug!("Unread command overwritten");
            }
        }
    }

    /// Discard any partially received frame
    pub fn reset(&self) {
        self.decoder.lock(|decoder| decoder.borrow_mut().reset());
    }

    /// Take the ready command, if one is waiting
    pub fn poll_command(&self) -> Option<Command> {
        self.ready.try_take()
    }

    /// Take the ready command and parse it as a request
    pub fn poll_request(&self) -> Option<Result<Request, FrameError>> {
        self.poll_command().map(|cmd| Request::from_command(&cmd))
    }

    /// Wait for the next command
    pub async fn next_command(&self) -> Command {
        self.ready.take().await
    }

    pub fn decoder_state(&self) -> DecodeState {
        self.decoder.lock(|decoder| decoder.borrow().state())
    }

    pub fn config(&self) -> DecoderConfig {
        self.decoder.lock(|decoder| decoder.borrow().config())
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.lock(|decoder| decoder.borrow().stats())
    }

    /// Return the decoder counters and zero them
    pub fn take_stats(&self) -> DecoderStats {
        self.decoder.lock(|decoder| decoder.borrow_mut().take_stats())
    }

    /// Handle at most one waiting command
    ///
    /// Polls the ready-slot, parses the command, dispatches it to `handler`
    /// and transmits any responses on `tx`.
    pub fn service<H, T>(&self, handler: &mut H, tx: &mut T) -> Result<Serviced, T::Error>
    where
        H: CommandHandler + ?Sized,
        T: SerialTx,
    {
        let Some(result) = self.poll_request() else {
            return Ok(Serviced::Idle);
        };

        match result {
            Ok(request) => {
                #[cfg(feature = "defmt")]
                defmt::debug!("Request: {:?}", request);
                dispatch(request, handler, tx)
            }
            Err(e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Rejected command: {:?}", e);
                Ok(Serviced::Rejected(e))
            }
        }
    }
}

/// Frame `response` and hand it to the transport
pub fn send_response<T: SerialTx + ?Sized>(
    tx: &mut T,
    response: &Response,
) -> Result<(), T::Error> {
    tx.transmit(&response.to_bytes())
}

/// Send CONFIG_RESPONSE for entry `index`
pub fn transmit_config_value<T: SerialTx + ?Sized>(
    tx: &mut T,
    index: u8,
    value: f32,
) -> Result<(), T::Error> {
    send_response(tx, &Response::ConfigValue { index, value })
}

/// Send CURRENT_SET
pub fn transmit_current_setting<T: SerialTx + ?Sized>(
    tx: &mut T,
    milliamps: f32,
) -> Result<(), T::Error> {
    send_response(tx, &Response::CurrentSet { milliamps })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::tests::Bench;
    use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex};
    use hdrpcs_hal::serial::mock::RecordingTx;
    use hdrpcs_protocol::{encode_current_setting, MessageType, ResetPolicy};

    fn link() -> UsbLink<NoopRawMutex> {
        UsbLink::new(DecoderConfig::DEFAULT)
    }

    fn encode(request: Request) -> std::vec::Vec<u8> {
        let mut buffer = [0u8; 16];
        let len = request.encode(&mut buffer).unwrap();
        buffer[..len].to_vec()
    }

    #[test]
    fn test_poll_without_traffic() {
        let link = link();
        assert!(link.poll_command().is_none());
        assert!(link.poll_command().is_none());
        assert!(link.poll_request().is_none());
    }

    #[test]
    fn test_get_config_end_to_end() {
        let link = link();
        link.on_receive(&[0xAA, 0x02, 0x00]);
        link.on_receive(&[0x02]);

        let cmd = link.poll_command().unwrap();
        assert_eq!(cmd.msg_type(), MessageType::GetConfig);
        assert_eq!(cmd.len(), 0);
        assert!(link.poll_command().is_none());
    }

    #[test]
    fn test_per_delivery_policy_drops_split_frame() {
        let link: UsbLink<NoopRawMutex> = UsbLink::new(DecoderConfig {
            reset_policy: ResetPolicy::PerDelivery,
            ..DecoderConfig::DEFAULT
        });
        link.on_receive(&[0xAA, 0x02, 0x00]);
        link.on_receive(&[0x02]);
        assert!(link.poll_command().is_none());

        link.on_receive(&[0xAA, 0x02, 0x00, 0x02]);
        assert!(link.poll_command().is_some());
    }

    #[test]
    fn test_unread_command_overwritten_across_deliveries() {
        let link = link();
        link.on_receive(&encode(Request::SetScale { stage: 1 }));
        link.on_receive(&encode(Request::SetScale { stage: 2 }));

        let request = link.poll_request().unwrap().unwrap();
        assert_eq!(request, Request::SetScale { stage: 2 });
        assert!(link.poll_command().is_none());
    }

    #[test]
    fn test_two_frames_one_delivery_keeps_second() {
        let link = link();
        let mut data = encode(Request::SetCurrent { milliamps: 1.0 });
        data.extend_from_slice(&encode(Request::SetCurrent { milliamps: 2.0 }));
        link.on_receive(&data);

        let request = link.poll_request().unwrap().unwrap();
        assert_eq!(request, Request::SetCurrent { milliamps: 2.0 });
        assert_eq!(link.stats().frames, 2);
    }

    #[test]
    fn test_reset_discards_partial() {
        let link = link();
        let data = encode(Request::SetScale { stage: 3 });
        link.on_receive(&data[..2]);
        assert_eq!(link.decoder_state(), DecodeState::ReadingLength);

        link.reset();
        link.on_receive(&data[2..]);
        assert!(link.poll_command().is_none());
        assert_eq!(link.take_stats().abandoned_frames, 1);
    }

    #[test]
    fn test_bad_checksum_leaves_slot_empty() {
        let link = link();
        let mut data = encode(Request::SetScale { stage: 3 });
        let last = data.len() - 1;
        data[last] = data[last].wrapping_add(1);
        link.on_receive(&data);

        assert!(link.poll_command().is_none());
        assert_eq!(link.stats().checksum_errors, 1);
    }

    #[test]
    fn test_service_round_trip() {
        let link = link();
        let mut bench = Bench::new();
        let mut tx = RecordingTx::new();

        assert_eq!(link.service(&mut bench, &mut tx), Ok(Serviced::Idle));

        link.on_receive(&encode(Request::SetCurrent { milliamps: 3.0 }));
        assert_eq!(
            link.service(&mut bench, &mut tx),
            Ok(Serviced::Handled(MessageType::SetCurrent))
        );
        assert_eq!(tx.sent, [encode_current_setting(3.0).to_vec()]);
        assert_eq!(link.service(&mut bench, &mut tx), Ok(Serviced::Idle));
    }

    #[test]
    fn test_service_rejects_device_message() {
        let link = link();
        let mut bench = Bench::new();
        let mut tx = RecordingTx::new();

        // A CURRENT_SET echoed back at the device
        link.on_receive(&encode_current_setting(1.0));
        assert_eq!(
            link.service(&mut bench, &mut tx),
            Ok(Serviced::Rejected(FrameError::UnexpectedMessage(
                MessageType::CurrentSet
            )))
        );
        assert!(tx.sent.is_empty());
    }

    #[test]
    fn test_transmit_helpers() {
        let mut tx = RecordingTx::new();
        transmit_config_value(&mut tx, 3, 1.5).unwrap();
        transmit_current_setting(&mut tx, 1.5).unwrap();

        assert_eq!(tx.sent[0], [0xAA, 0x03, 0x03, 0x00, 0x00, 0xC0, 0x3F, 0x05]);
        assert_eq!(tx.sent[1], [0xAA, 0x05, 0x04, 0x00, 0x00, 0xC0, 0x3F, 0x08]);
    }

    #[test]
    fn test_next_command_async() {
        let link = link();
        link.on_receive(&encode(Request::GetConfig { index: Some(0) }));
        let cmd = embassy_futures::block_on(link.next_command());
        assert_eq!(cmd.payload(), &[0]);
    }

    #[test]
    fn test_static_link_receive_from_other_thread() {
        static LINK: UsbLink<CriticalSectionRawMutex> = UsbLink::new(DecoderConfig::DEFAULT);

        let frame = encode(Request::SetScale { stage: 6 });
        let rx = std::thread::spawn(move || {
            // Deliver in 1-byte chunks, as a slow transport might
            for b in frame {
                LINK.on_receive(&[b]);
            }
        });
        rx.join().unwrap();

        let request = LINK.poll_request().unwrap().unwrap();
        assert_eq!(request, Request::SetScale { stage: 6 });
        assert_eq!(LINK.config(), DecoderConfig::DEFAULT);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_chunking_never_changes_last_request(
                stages in proptest::collection::vec(any::<u8>(), 1..6),
                noise in proptest::collection::vec(0u8..0xA0, 0..8),
                chunk in 1usize..12,
            ) {
                let mut stream = noise.clone();
                for &stage in &stages {
                    stream.extend_from_slice(&encode(Request::SetScale { stage }));
                }

                let link = link();
                for part in stream.chunks(chunk) {
                    link.on_receive(part);
                }

                let last = *stages.last().unwrap();
                prop_assert_eq!(
                    link.poll_request().unwrap().unwrap(),
                    Request::SetScale { stage: last }
                );
                prop_assert!(link.poll_command().is_none());
            }
        }
    }
}
