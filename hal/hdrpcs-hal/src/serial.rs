//! Serial transport abstractions
//!
//! The protocol core only needs one thing from the transport: a way to push
//! a finished frame out. Receiving is push-based from the transport side
//! (the USB CDC receive-complete callback hands bytes to the link), so there
//! is no receive trait here.

/// Serial transmitter
///
/// Implemented by the USB CDC class driver glue (or a UART, or a test
/// double). Transmission is fire-and-forget from the caller's point of view:
/// the implementation owns retry and failure policy.
pub trait SerialTx {
    /// Error type for transmit operations
    type Error;

    /// Hand `data` to the transport for transmission
    fn transmit(&mut self, data: &[u8]) -> Result<(), Self::Error>;
}

impl<T: SerialTx + ?Sized> SerialTx for &mut T {
    type Error = T::Error;

    fn transmit(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        (**self).transmit(data)
    }
}

/// USB virtual serial port parameters
///
/// The host side locates the supply by VID/PID; the baud rate is nominal
/// on a CDC ACM link but is still reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UsbCdcConfig {
    /// USB vendor ID
    pub vid: u16,
    /// USB product ID
    pub pid: u16,
    /// Line coding baud rate reported to the host
    pub baudrate: u32,
    /// Maximum packet size of the bulk endpoints
    pub max_packet_size: u16,
}

impl Default for UsbCdcConfig {
    fn default() -> Self {
        Self {
            vid: 1155,
            pid: 100,
            baudrate: 115200,
            max_packet_size: 64,
        }
    }
}

/// Transmitter that records everything sent, for host-side testing
#[cfg(any(test, feature = "std"))]
pub mod mock {
    extern crate std;

    use super::SerialTx;
    use std::vec::Vec;

    /// Captures transmitted frames; optionally refuses to send
    #[derive(Debug, Default)]
    pub struct RecordingTx {
        /// Every successful `transmit` call, in order
        pub sent: Vec<Vec<u8>>,
        /// When set, `transmit` fails and records nothing
        pub fail: bool,
    }

    /// Error returned by [`RecordingTx`] when `fail` is set
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Busy;

    impl RecordingTx {
        pub fn new() -> Self {
            Self::default()
        }

        /// Transmitter whose every call fails
        pub fn failing() -> Self {
            Self {
                sent: Vec::new(),
                fail: true,
            }
        }
    }

    impl SerialTx for RecordingTx {
        type Error = Busy;

        fn transmit(&mut self, data: &[u8]) -> Result<(), Self::Error> {
            if self.fail {
                return Err(Busy);
            }
            self.sent.push(data.to_vec());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::RecordingTx;
    use super::*;

    fn send_through<T: SerialTx>(mut tx: T, data: &[u8]) -> Result<(), T::Error> {
        tx.transmit(data)
    }

    #[test]
    fn test_recording_tx_captures_frames() {
        let mut tx = RecordingTx::new();
        tx.transmit(&[0xAA, 0x02, 0x00, 0x02]).unwrap();
        tx.transmit(&[0xAA]).unwrap();
        assert_eq!(tx.sent.len(), 2);
        assert_eq!(tx.sent[0], [0xAA, 0x02, 0x00, 0x02]);
    }

    #[test]
    fn test_mut_ref_forwards() {
        let mut tx = RecordingTx::new();
        send_through(&mut tx, &[1, 2, 3]).unwrap();
        assert_eq!(tx.sent[0], [1, 2, 3]);
    }

    #[test]
    fn test_failing_tx_records_nothing() {
        let mut tx = RecordingTx::failing();
        assert_eq!(tx.transmit(&[1]), Err(mock::Busy));
        assert!(tx.sent.is_empty());
    }

    #[test]
    fn test_default_usb_config_matches_host_lookup() {
        let cfg = UsbCdcConfig::default();
        assert_eq!(cfg.vid, 1155);
        assert_eq!(cfg.pid, 100);
    }
}
