//! Scripted bus for host tests.
//!
//! The initiator's side of a transaction is loaded up front: message bytes
//! sent with ATN, the CDB, and DATA OUT bytes. Everything the target sends
//! is recorded per phase.

use std::collections::VecDeque;
use std::vec::Vec;

use embedded_io_async::{ErrorType, Read, Write};

use crate::bus::{Bus, BusError, BusEvent, BusPhase};
use crate::message::NegotiatedParameters;

#[derive(Default)]
pub struct MockBus {
    pub phase: Option<BusPhase>,
    pub message_out: VecDeque<u8>,
    pub command: VecDeque<u8>,
    pub data_out: VecDeque<u8>,

    pub phases: Vec<BusPhase>,
    pub data_in: Vec<u8>,
    pub status: Vec<u8>,
    pub message_in: Vec<u8>,

    pub events: VecDeque<BusEvent>,
    pub reselections: Vec<(u8, u8)>,
    pub releases: usize,
    pub configured: Vec<(u8, NegotiatedParameters)>,

    /// Fail the next transfer in this phase
    pub inject: Option<(BusPhase, BusError)>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the initiator side of the next transaction and clears what
    /// was recorded
    pub fn load(&mut self, messages: &[u8], cdb: &[u8], data_out: &[u8]) {
        self.message_out = messages.iter().copied().collect();
        self.command = cdb.iter().copied().collect();
        self.data_out = data_out.iter().copied().collect();
        self.phases.clear();
        self.data_in.clear();
        self.status.clear();
        self.message_in.clear();
        self.phase = None;
    }

    pub fn entered(&self, phase: BusPhase) -> bool {
        self.phases.contains(&phase)
    }

    fn injected(&mut self) -> Result<(), BusError> {
        match self.inject {
            Some((phase, e)) if Some(phase) == self.phase => {
                self.inject = None;
                Err(e)
            }
            _ => Ok(()),
        }
    }
}

impl ErrorType for MockBus {
    type Error = BusError;
}

impl Read for MockBus {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, BusError> {
        self.injected()?;
        let source = match self.phase {
            Some(BusPhase::MessageOut) => &mut self.message_out,
            Some(BusPhase::Command) => &mut self.command,
            Some(BusPhase::DataOut) => &mut self.data_out,
            _ => return Err(BusError::Disconnected),
        };
        let mut n = 0;
        while n < buf.len() {
            match source.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl Write for MockBus {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, BusError> {
        self.injected()?;
        let sink = match self.phase {
            Some(BusPhase::DataIn) => &mut self.data_in,
            Some(BusPhase::Status) => &mut self.status,
            Some(BusPhase::MessageIn) => &mut self.message_in,
            _ => return Err(BusError::Disconnected),
        };
        sink.extend_from_slice(buf);
        Ok(buf.len())
    }
}

impl Bus for MockBus {
    async fn request_phase(&mut self, phase: BusPhase) -> Result<(), BusError> {
        self.phase = Some(phase);
        self.phases.push(phase);
        Ok(())
    }

    fn attention(&self) -> bool {
        !self.message_out.is_empty()
    }

    async fn reselect(&mut self, target: u8, initiator: u8) -> Result<(), BusError> {
        self.reselections.push((target, initiator));
        self.phases.push(BusPhase::Reselection);
        Ok(())
    }

    fn release(&mut self) {
        self.releases += 1;
        self.phase = Some(BusPhase::BusFree);
        self.phases.push(BusPhase::BusFree);
    }

    async fn wait_event(&mut self) -> BusEvent {
        match self.events.pop_front() {
            Some(event) => event,
            None => panic!("no scripted bus event"),
        }
    }

    fn poll_event(&mut self) -> Option<BusEvent> {
        self.events.pop_front()
    }

    fn configure_transfer(&mut self, initiator: u8, params: NegotiatedParameters) {
        self.configured.push((initiator, params));
    }
}
