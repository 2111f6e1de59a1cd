//! Bus signal layer interface.
//!
//! The engine never touches pins. Everything it needs from the SCSI bus goes
//! through [`Bus`]: phase changes, byte transfers with REQ/ACK handshakes done
//! underneath, the ATN line, and selection / reset events.

use core::future::Future;

use embedded_io_async::{ErrorType, Read, ReadExactError, Write};

use crate::config::db2scsiid;
use crate::message::NegotiatedParameters;

#[cfg(test)]
pub(crate) mod mock;
mod phase;
mod reset;

pub use phase::*;
pub use reset::*;

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// Parity error on a byte received from the initiator
    Parity,
    /// RST asserted
    Reset,
    /// REQ/ACK handshake did not complete in time
    Timeout,
    /// The initiator went away (bus free observed mid transaction)
    Disconnected,
}

impl embedded_io_async::Error for BusError {
    fn kind(&self) -> embedded_io_async::ErrorKind {
        match self {
            BusError::Parity => embedded_io_async::ErrorKind::InvalidData,
            BusError::Reset => embedded_io_async::ErrorKind::ConnectionReset,
            BusError::Timeout => embedded_io_async::ErrorKind::TimedOut,
            BusError::Disconnected => embedded_io_async::ErrorKind::NotConnected,
        }
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusPhase {
    BusFree,
    Arbitration,
    Selection,
    Reselection,
    MessageOut,
    Command,
    DataOut,
    DataIn,
    Status,
    MessageIn,
}

/// A SELECTION addressed to one of our IDs
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Selection {
    pub target: u8,
    /// SCSI-1 initiators may not put their own ID on the bus
    pub initiator: Option<u8>,
    /// ATN was asserted with SEL
    pub attention: bool,
}

impl Selection {
    /// Decodes the data bus value seen during SELECTION. `target_mask` is the
    /// set of IDs this controller answers to
    pub fn from_data_bus(db: u8, target_mask: u8, attention: bool) -> Option<Self> {
        let target = db2scsiid(db & target_mask)?;
        Some(Self {
            target,
            initiator: db2scsiid(db & !(1 << target)),
            attention,
        })
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusEvent {
    Selected(Selection),
    Reset,
}

/// SCSI bus as seen from the target.
///
/// Reads and writes transfer bytes in whatever phase was last requested.
pub trait Bus: ErrorType<Error = BusError> + Read + Write {
    /// Drive C/D, I/O and MSG for `phase`
    fn request_phase(&mut self, phase: BusPhase) -> impl Future<Output = Result<(), BusError>>;

    /// Current state of ATN
    fn attention(&self) -> bool;

    /// Arbitrate and reselect `initiator` as `target`
    fn reselect(
        &mut self,
        target: u8,
        initiator: u8,
    ) -> impl Future<Output = Result<(), BusError>>;

    /// Release every signal and go BUS FREE
    fn release(&mut self);

    /// Wait for the next selection or bus reset
    fn wait_event(&mut self) -> impl Future<Output = BusEvent>;

    /// A pending selection or reset, if any
    fn poll_event(&mut self) -> Option<BusEvent>;

    /// Apply the agreed synchronous period/offset and width for `initiator`
    fn configure_transfer(&mut self, _initiator: u8, _params: NegotiatedParameters) {}

    /// Enable parity checking on bytes received from the initiator
    fn set_parity_check(&mut self, _enabled: bool) {}
}

/// Fills `buf` in the current phase. A short read means the initiator stopped
/// answering REQ
pub async fn receive<B: Bus>(bus: &mut B, buf: &mut [u8]) -> Result<(), BusError> {
    bus.read_exact(buf).await.map_err(|e| match e {
        ReadExactError::UnexpectedEof => BusError::Timeout,
        ReadExactError::Other(e) => e,
    })
}

#[test]
fn test_selection_from_data_bus() {
    let sel = Selection::from_data_bus(0b1000_0001, 0b0000_0001, true).unwrap();
    assert_eq!(sel.target, 0);
    assert_eq!(sel.initiator, Some(7));
    assert!(sel.attention);

    let sel = Selection::from_data_bus(0b0000_0100, 0b0000_0100, false).unwrap();
    assert_eq!(sel.initiator, None);

    assert_eq!(Selection::from_data_bus(0b1000_0010, 0b0000_0001, false), None);
}
