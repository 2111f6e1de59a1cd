use embedded_io_async::Write;

use crate::bus::{receive, Bus, BusError, BusPhase};

/// Direction of a data phase, named from the initiator's side
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// DATA IN, target to initiator
    In,
    /// DATA OUT, initiator to target
    Out,
}

impl Direction {
    fn phase(self) -> BusPhase {
        match self {
            Direction::In => BusPhase::DataIn,
            Direction::Out => BusPhase::DataOut,
        }
    }
}

/// Data phase of one command.
///
/// The phase is only entered on the first transfer, so a command that fails
/// its checks goes straight from COMMAND to STATUS.
pub struct DataPhase<'b, B: Bus> {
    bus: &'b mut B,
    direction: Option<Direction>,
    transferred: usize,
}

impl<'b, B: Bus> DataPhase<'b, B> {
    pub fn new(bus: &'b mut B) -> Self {
        Self {
            bus,
            direction: None,
            transferred: 0,
        }
    }

    async fn enter(&mut self, direction: Direction) -> Result<(), BusError> {
        if self.direction != Some(direction) {
            self.bus.request_phase(direction.phase()).await?;
            self.direction = Some(direction);
        }
        Ok(())
    }

    pub async fn send(&mut self, data: &[u8]) -> Result<(), BusError> {
        if data.is_empty() {
            return Ok(());
        }
        self.enter(Direction::In).await?;
        self.bus.write_all(data).await?;
        self.transferred += data.len();
        Ok(())
    }

    pub async fn receive(&mut self, buf: &mut [u8]) -> Result<(), BusError> {
        if buf.is_empty() {
            return Ok(());
        }
        self.enter(Direction::Out).await?;
        receive(self.bus, buf).await?;
        self.transferred += buf.len();
        Ok(())
    }

    /// Sends `len` zero bytes
    pub async fn pad(&mut self, mut len: usize) -> Result<(), BusError> {
        let zeros = [0u8; 64];
        while len > 0 {
            let n = len.min(zeros.len());
            self.send(&zeros[..n]).await?;
            len -= n;
        }
        Ok(())
    }

    /// Reads and discards `len` bytes
    pub async fn drain(&mut self, mut len: usize) -> Result<(), BusError> {
        let mut scratch = [0u8; 64];
        while len > 0 {
            let n = len.min(scratch.len());
            self.receive(&mut scratch[..n]).await?;
            len -= n;
        }
        Ok(())
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn transferred(&self) -> usize {
        self.transferred
    }
}
