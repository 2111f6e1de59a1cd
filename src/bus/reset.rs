use embassy_futures::select::{select, Either};
use embassy_sync::{blocking_mutex::raw::RawMutex, signal::Signal};
use embedded_io_async::{ErrorType, Read, Write};

use crate::bus::{Bus, BusError, BusEvent, BusPhase};
use crate::message::NegotiatedParameters;

/// Wraps a [`Bus`] so that a reset raised from elsewhere (typically the RST
/// line interrupt) aborts whatever transfer is in flight.
pub struct ResettableBus<'s, B: Bus, M: RawMutex> {
    inner: B,
    reset_signal: &'s Signal<M, ()>,
}

impl<'s, B: Bus, M: RawMutex> ResettableBus<'s, B, M> {
    pub fn new(inner: B, reset_signal: &'s Signal<M, ()>) -> Self {
        Self {
            inner,
            reset_signal,
        }
    }

    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl<'s, B: Bus, M: RawMutex> ErrorType for ResettableBus<'s, B, M> {
    type Error = BusError;
}

impl<'s, B: Bus, M: RawMutex> Read for ResettableBus<'s, B, M> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match select(self.inner.read(buf), self.reset_signal.wait()).await {
            Either::First(read_result) => read_result,
            Either::Second(()) => Err(BusError::Reset),
        }
    }
}

impl<'s, B: Bus, M: RawMutex> Write for ResettableBus<'s, B, M> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        match select(self.inner.write(buf), self.reset_signal.wait()).await {
            Either::First(write_result) => write_result,
            Either::Second(()) => Err(BusError::Reset),
        }
    }
}

impl<'s, B: Bus, M: RawMutex> Bus for ResettableBus<'s, B, M> {
    async fn request_phase(&mut self, phase: BusPhase) -> Result<(), BusError> {
        match select(self.inner.request_phase(phase), self.reset_signal.wait()).await {
            Either::First(result) => result,
            Either::Second(()) => Err(BusError::Reset),
        }
    }

    fn attention(&self) -> bool {
        self.inner.attention()
    }

    async fn reselect(&mut self, target: u8, initiator: u8) -> Result<(), BusError> {
        match select(
            self.inner.reselect(target, initiator),
            self.reset_signal.wait(),
        )
        .await
        {
            Either::First(result) => result,
            Either::Second(()) => Err(BusError::Reset),
        }
    }

    fn release(&mut self) {
        self.inner.release()
    }

    async fn wait_event(&mut self) -> BusEvent {
        match select(self.inner.wait_event(), self.reset_signal.wait()).await {
            Either::First(event) => event,
            Either::Second(()) => BusEvent::Reset,
        }
    }

    fn poll_event(&mut self) -> Option<BusEvent> {
        if self.reset_signal.try_take().is_some() {
            return Some(BusEvent::Reset);
        }
        self.inner.poll_event()
    }

    fn configure_transfer(&mut self, initiator: u8, params: NegotiatedParameters) {
        self.inner.configure_transfer(initiator, params)
    }

    fn set_parity_check(&mut self, enabled: bool) {
        self.inner.set_parity_check(enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{mock::MockBus, Selection};
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[test]
    fn test_pending_reset_wins_over_selection() {
        let signal = Signal::<NoopRawMutex, ()>::new();
        let mut inner = MockBus::new();
        let selection = BusEvent::Selected(Selection {
            target: 0,
            initiator: Some(7),
            attention: true,
        });
        inner.events.push_back(selection);
        let mut bus = ResettableBus::new(inner, &signal);

        signal.signal(());
        assert_eq!(bus.poll_event(), Some(BusEvent::Reset));
        assert_eq!(bus.poll_event(), Some(selection));
        assert_eq!(bus.poll_event(), None);
    }

    #[test]
    fn test_transfers_pass_through() {
        let signal = Signal::<NoopRawMutex, ()>::new();
        let mut inner = MockBus::new();
        inner.load(&[], &[0x12, 0, 0, 0, 36, 0], &[]);
        let mut bus = ResettableBus::new(inner, &signal);

        block_on(bus.request_phase(BusPhase::Command)).unwrap();
        let mut cdb = [0u8; 6];
        block_on(bus.read_exact(&mut cdb)).unwrap();
        assert_eq!(cdb[0], 0x12);
        bus.release();
        assert_eq!(bus.into_inner().releases, 1);
    }
}
