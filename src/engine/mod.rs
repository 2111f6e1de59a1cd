//! Bus phase state machine.
//!
//! [`Engine`] owns every logical unit and walks one transaction at a time
//! through SELECTION, MESSAGE OUT, COMMAND, DATA, STATUS and MESSAGE IN,
//! handing the CDB to [`CommandHandler`] for the bound LUN. Tagged commands
//! from initiators that allow it are parked in the LUN's task queue and run
//! later after RESELECTION.

use embedded_io_async::Write;

use crate::bus::{receive, Bus, BusError, BusEvent, BusPhase, DataPhase, Direction, Selection};
use crate::config::{Config, ConfigError, Features, NUM_SCSIID, NUM_SCSILUN};
use crate::message::{read_message, Message, NegotiatedParameters, Negotiator, Response};
use crate::scsi::{
    backend::Backend,
    commands::{CommandLength, Control},
    enums::{AdditionalSenseCode, SenseKey, Status},
    handler::{respond_without_unit, CommandHandler},
    queue::{QueueError, Task},
    unit::LogicalUnit,
    CommandError,
};

mod transaction;

pub use transaction::*;

/// Smallest transfer buffer accepted, enough for any non-block response
pub const MIN_BUFFER_LEN: usize = 256;

/// Assumed when a SCSI-1 initiator selects without putting its own ID on the bus
pub const DEFAULT_INITIATOR: u8 = 7;

/// Why a transaction ended without STATUS
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Abort {
    InitiatorError,
    MessageParityError,
    /// Parity error on a byte from the initiator
    Parity,
    Timeout,
    Disconnected,
    AbortTask,
    AbortTaskSet,
    ClearTaskSet,
    LogicalUnitReset,
    TargetReset,
}

/// How a selection or reselection ended
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Not one of our IDs
    Ignored,
    Completed(Status),
    /// Task queued, the target will reselect
    Disconnected,
    Aborted(Abort),
    Reset,
}

/// One SCSI ID with its LUNs and transfer agreements
#[derive(Clone, Debug)]
pub struct TargetDevice {
    pub id: u8,
    pub luns: [Option<LogicalUnit>; NUM_SCSILUN],
    pub negotiator: Negotiator,
}

impl TargetDevice {
    fn new(id: u8, config: &Config) -> Self {
        let mut luns: [Option<LogicalUnit>; NUM_SCSILUN] = core::array::from_fn(|_| None);
        for unit in config.units.iter().filter(|u| u.id == id) {
            luns[unit.lun as usize] = Some(LogicalUnit::new(unit, &config.features));
        }
        Self {
            id,
            luns,
            negotiator: Negotiator::new(config.limits, &config.features),
        }
    }

    /// Configured LUNs as a bit mask
    pub fn lun_mask(&self) -> u8 {
        self.luns
            .iter()
            .enumerate()
            .filter(|(_, lun)| lun.is_some())
            .fold(0, |mask, (i, _)| mask | (1 << i))
    }

    pub fn unit(&self, lun: u8) -> Option<&LogicalUnit> {
        self.luns.get(lun as usize)?.as_ref()
    }

    pub fn unit_mut(&mut self, lun: u8) -> Option<&mut LogicalUnit> {
        self.luns.get_mut(lun as usize)?.as_mut()
    }

    /// Hard reset of every LUN and every agreement
    pub fn reset(&mut self, features: &Features) {
        for unit in self.luns.iter_mut().flatten() {
            unit.reset(features);
        }
        self.negotiator.reset_all();
    }
}

/// What the session loop does after MESSAGE IN
enum Next {
    Done(Outcome),
    /// Linked command: back to COMMAND
    Command,
}

pub struct Engine<'a, D: Backend> {
    config: &'a Config,
    backend: D,
    buffer: &'a mut [u8],
    devices: [Option<TargetDevice>; NUM_SCSIID],
}

impl<'a, D: Backend> Engine<'a, D> {
    /// Validates `config` and builds every configured unit.
    ///
    /// `buffer` is the transfer buffer shared by all commands. It must hold
    /// at least one block of `config.max_block_size`.
    pub fn new(config: &'a Config, backend: D, buffer: &'a mut [u8]) -> Result<Self, ConfigError> {
        config.validate()?;
        if buffer.len() < config.max_block_size.max(MIN_BUFFER_LEN) {
            return Err(ConfigError::BufferTooSmall);
        }
        let mut devices: [Option<TargetDevice>; NUM_SCSIID] = core::array::from_fn(|_| None);
        for unit in config.units.iter() {
            let id = unit.id;
            if devices[id as usize].is_none() {
                devices[id as usize] = Some(TargetDevice::new(id, config));
            }
            info!("scsi id {} lun {}: {:?}", id, unit.lun, unit.device_type);
        }
        Ok(Self {
            config,
            backend,
            buffer,
            devices,
        })
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    pub fn backend(&mut self) -> &mut D {
        &mut self.backend
    }

    pub fn device(&self, id: u8) -> Option<&TargetDevice> {
        self.devices.get(id as usize)?.as_ref()
    }

    pub fn unit(&self, id: u8, lun: u8) -> Option<&LogicalUnit> {
        self.device(id)?.unit(lun)
    }

    pub fn unit_mut(&mut self, id: u8, lun: u8) -> Option<&mut LogicalUnit> {
        self.devices.get_mut(id as usize)?.as_mut()?.unit_mut(lun)
    }

    pub fn negotiated(&self, id: u8, initiator: u8) -> Option<NegotiatedParameters> {
        Some(self.device(id)?.negotiator.get(initiator))
    }

    /// Serves the bus forever
    pub async fn run<B: Bus>(&mut self, bus: &mut B) -> ! {
        bus.set_parity_check(self.config.features.read_parity_check);
        loop {
            let event = match bus.poll_event() {
                Some(event) => event,
                None => {
                    if self.service(bus).await.is_some() {
                        continue;
                    }
                    bus.wait_event().await
                }
            };
            self.handle_event(bus, event).await;
        }
    }

    pub async fn handle_event<B: Bus>(&mut self, bus: &mut B, event: BusEvent) -> Outcome {
        match event {
            BusEvent::Selected(selection) => self.on_selected(bus, selection).await,
            BusEvent::Reset => {
                self.on_bus_reset();
                bus.release();
                Outcome::Reset
            }
        }
    }

    /// Hard reset: every unit back to power-on state, all agreements dropped
    pub fn on_bus_reset(&mut self) {
        warn!("scsi bus reset");
        let features = self.config.features;
        for device in self.devices.iter_mut().flatten() {
            device.reset(&features);
        }
    }

    /// Runs one transaction for a SELECTION, returning once the bus is free
    pub async fn on_selected<B: Bus>(&mut self, bus: &mut B, selection: Selection) -> Outcome {
        if self.device(selection.target).is_none() {
            return Outcome::Ignored;
        }
        let initiator = selection.initiator.unwrap_or(DEFAULT_INITIATOR);
        debug!("selected as {} by {}", selection.target, initiator);

        let mut tx = Transaction::new(selection.target, initiator);
        let result = self.session(bus, &mut tx, selection.attention).await;
        self.finish(bus, &tx, result)
    }

    /// Reselects the initiator of the next runnable queued task and runs it.
    /// `None` when nothing is waiting
    pub async fn service<B: Bus>(&mut self, bus: &mut B) -> Option<Outcome> {
        let mut tx = self.next_task()?;
        debug!(
            "reselecting {} for tag {:?} on {}:{}",
            tx.initiator, tx.tag, tx.target, tx.lun
        );
        let result = self.resume(bus, &mut tx).await;
        if let Some((_, tag)) = tx.tag {
            if let Some(unit) = self.unit_mut(tx.target, tx.lun) {
                unit.queue.complete(tx.initiator, tag);
            }
        }
        Some(self.finish(bus, &tx, result))
    }

    fn next_task(&mut self) -> Option<Transaction> {
        for device in self.devices.iter_mut().flatten() {
            let target = device.id;
            for (lun, unit) in device.luns.iter_mut().enumerate() {
                let Some(unit) = unit else { continue };
                let Some((initiator, tag)) = unit.queue.next_runnable() else {
                    continue;
                };
                let task = unit.queue.start(initiator, tag)?;
                return Some(Transaction::reselected(
                    target,
                    initiator,
                    lun as u8,
                    task.attribute,
                    tag,
                    task.cdb(),
                ));
            }
        }
        None
    }

    async fn resume<B: Bus>(&mut self, bus: &mut B, tx: &mut Transaction) -> Result<Outcome, BusError> {
        bus.reselect(tx.target, tx.initiator).await?;
        send_message(
            bus,
            tx,
            Message::Identify {
                disconnect_privilege: false,
                lun: tx.lun,
            },
        )
        .await?;
        if let Some((attribute, tag)) = tx.tag {
            send_message(bus, tx, Message::QueueTag { attribute, tag }).await?;
        }
        if bus.attention() {
            if let Some(outcome) = self.message_out(bus, tx).await? {
                return Ok(outcome);
            }
        }
        self.command_loop(bus, tx, true).await
    }

    /// Maps the session result onto an outcome and frees the bus
    fn finish<B: Bus>(&mut self, bus: &mut B, tx: &Transaction, result: Result<Outcome, BusError>) -> Outcome {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(BusError::Reset) => {
                self.on_bus_reset();
                Outcome::Reset
            }
            Err(BusError::Parity) => {
                error!("parity error in {:?} from {}", tx.phase, tx.initiator);
                if let Some(unit) = self.unit_mut(tx.target, tx.lun) {
                    unit.sense
                        .record_error(SenseKey::HardwareError, AdditionalSenseCode::ScsiParityError);
                }
                Outcome::Aborted(Abort::Parity)
            }
            Err(BusError::Timeout) => {
                warn!("handshake timeout in {:?}", tx.phase);
                Outcome::Aborted(Abort::Timeout)
            }
            Err(BusError::Disconnected) => {
                warn!("initiator {} went away in {:?}", tx.initiator, tx.phase);
                Outcome::Aborted(Abort::Disconnected)
            }
        };
        bus.release();
        outcome
    }

    async fn session<B: Bus>(
        &mut self,
        bus: &mut B,
        tx: &mut Transaction,
        attention: bool,
    ) -> Result<Outcome, BusError> {
        if attention {
            if let Some(outcome) = self.message_out(bus, tx).await? {
                return Ok(outcome);
            }
        }
        self.command_loop(bus, tx, false).await
    }

    /// COMMAND through MESSAGE IN, repeated for linked commands. With
    /// `have_cdb` the first CDB is already in `tx`
    async fn command_loop<B: Bus>(
        &mut self,
        bus: &mut B,
        tx: &mut Transaction,
        mut have_cdb: bool,
    ) -> Result<Outcome, BusError> {
        loop {
            if !have_cdb {
                read_command(bus, tx).await?;
            }
            have_cdb = false;
            trace!("cdb {:?} from {} lun {}", tx.cdb(), tx.initiator, tx.lun);
            if let Some(outcome) = self.check_attention(bus, tx).await? {
                return Ok(outcome);
            }

            if let Some(outcome) = self.try_queue(bus, tx).await? {
                return Ok(outcome);
            }

            let mut status = self.execute(bus, tx).await?;
            if let Some(outcome) = self.check_attention(bus, tx).await? {
                return Ok(outcome);
            }

            let control = Control::from_byte(tx.control());
            tx.linked = control.link && status == Status::Good;
            if tx.linked {
                status = Status::Intermediate;
            }
            self.set_status(tx, status);
            send_status(bus, tx, status).await?;
            if let Some(outcome) = self.check_attention(bus, tx).await? {
                return Ok(outcome);
            }

            let next = self.message_in(bus, tx, status, control).await?;
            match next {
                Next::Done(outcome) => return Ok(outcome),
                Next::Command => continue,
            }
        }
    }

    async fn message_in<B: Bus>(
        &mut self,
        bus: &mut B,
        tx: &mut Transaction,
        status: Status,
        control: Control,
    ) -> Result<Next, BusError> {
        if !tx.linked {
            send_message(bus, tx, Message::CommandComplete).await?;
            return Ok(Next::Done(Outcome::Completed(status)));
        }
        let message = if control.flag {
            Message::LinkedFlagCommandComplete
        } else {
            Message::LinkedCommandComplete
        };
        send_message(bus, tx, message).await?;
        Ok(Next::Command)
    }

    fn set_status(&mut self, tx: &mut Transaction, status: Status) {
        tx.status = status;
        if let Some(unit) = self.unit_mut(tx.target, tx.lun) {
            unit.sense.set_status(status);
        }
    }

    /// Enters MESSAGE OUT when the initiator raised ATN
    async fn check_attention<B: Bus>(
        &mut self,
        bus: &mut B,
        tx: &mut Transaction,
    ) -> Result<Option<Outcome>, BusError> {
        if bus.attention() {
            self.message_out(bus, tx).await
        } else {
            Ok(None)
        }
    }

    /// Parks a tagged command and disconnects. `None` when the command runs
    /// now
    async fn try_queue<B: Bus>(
        &mut self,
        bus: &mut B,
        tx: &mut Transaction,
    ) -> Result<Option<Outcome>, BusError> {
        if tx.queued {
            return Ok(None);
        }
        let features = self.config.features;
        let (target, lun, initiator) = (tx.target, tx.lun, tx.initiator);
        let Some(unit) = self.unit_mut(target, lun) else {
            return Ok(None);
        };

        let (attribute, tag) = match tx.tag {
            Some(tag) if features.disconnect && tx.disconnect_privilege => tag,
            // untagged or no disconnect: must not overtake queued work
            _ if !unit.queue.is_empty() => {
                debug!("lun {}:{} busy with {} tasks", target, lun, unit.queue.len());
                return self.complete_early(bus, tx, Status::Busy).await.map(Some);
            }
            _ => return Ok(None),
        };

        match unit.queue.submit(Task::new(initiator, tag, attribute, tx.cdb())) {
            Ok(()) => {
                debug!("queued tag {} from {} on {}:{}", tag, initiator, target, lun);
                send_message(bus, tx, Message::Disconnect).await?;
                Ok(Some(Outcome::Disconnected))
            }
            Err(QueueError::Full) => self.complete_early(bus, tx, Status::Busy).await.map(Some),
            Err(QueueError::Overlapped) => {
                warn!("overlapped tag {} from {}", tag, initiator);
                unit.queue.abort_initiator(initiator);
                unit.sense.record_error(
                    SenseKey::AbortedCommand,
                    AdditionalSenseCode::OverlappedCommandsAttempted,
                );
                self.complete_early(bus, tx, Status::CheckCondition)
                    .await
                    .map(Some)
            }
        }
    }

    /// STATUS and COMMAND COMPLETE without running the command
    async fn complete_early<B: Bus>(
        &mut self,
        bus: &mut B,
        tx: &mut Transaction,
        status: Status,
    ) -> Result<Outcome, BusError> {
        self.set_status(tx, status);
        send_status(bus, tx, status).await?;
        send_message(bus, tx, Message::CommandComplete).await?;
        Ok(Outcome::Completed(status))
    }

    /// Runs the CDB in `tx` through the data phase and returns its status
    async fn execute<B: Bus>(&mut self, bus: &mut B, tx: &mut Transaction) -> Result<Status, BusError> {
        let config = self.config;
        let Some(device) = self.devices.get_mut(tx.target as usize).and_then(Option::as_mut) else {
            return Err(BusError::Disconnected);
        };
        let lun_mask = device.lun_mask();

        let mut data = DataPhase::new(bus);
        let result = match device.unit_mut(tx.lun) {
            Some(unit) => {
                let mut handler = CommandHandler {
                    unit,
                    backend: &mut self.backend,
                    buffer: &mut *self.buffer,
                    features: &config.features,
                    initiator: tx.initiator,
                    lun_mask,
                };
                handler.dispatch(tx.cdb(), &mut data).await
            }
            None => {
                debug!("lun {} not configured on {}", tx.lun, tx.target);
                respond_without_unit(tx.cdb(), &mut data).await
            }
        };
        tx.direction = data.direction();
        tx.transferred = data.transferred();
        if let Some(direction) = tx.direction {
            tx.phase = match direction {
                Direction::In => BusPhase::DataIn,
                Direction::Out => BusPhase::DataOut,
            };
        }

        match result {
            Ok(()) => Ok(Status::Good),
            Err(CommandError::Failed) => Ok(Status::CheckCondition),
            Err(CommandError::Conflict) => {
                info!("reservation conflict for {}", tx.initiator);
                Ok(Status::ReservationConflict)
            }
            Err(CommandError::Transport(e)) => Err(e),
        }
    }

    /// MESSAGE OUT until ATN drops. `Some` when a message ended the
    /// transaction
    async fn message_out<B: Bus>(
        &mut self,
        bus: &mut B,
        tx: &mut Transaction,
    ) -> Result<Option<Outcome>, BusError> {
        let features = self.config.features;
        let mut pending: Option<Message> = None;
        loop {
            let message = match pending.take() {
                Some(message) => message,
                None => {
                    if !bus.attention() {
                        return Ok(None);
                    }
                    enter(bus, tx, BusPhase::MessageOut).await?;
                    match read_message(bus).await? {
                        Ok(message) => message,
                        Err(e) => {
                            warn!("bad message from {}: {:?}", tx.initiator, e);
                            send_message(bus, tx, Message::MessageReject).await?;
                            continue;
                        }
                    }
                }
            };
            trace!("message out {:?}", message);

            match message {
                Message::Identify {
                    disconnect_privilege,
                    lun,
                } => {
                    tx.lun = lun;
                    tx.identified = true;
                    tx.disconnect_privilege = disconnect_privilege;
                }
                Message::QueueTag { attribute, tag } if features.tagged_queuing => {
                    tx.tag = Some((attribute, tag));
                }
                Message::Sdtr { .. } | Message::Wdtr { .. } | Message::Ppr { .. } => {
                    pending = self.negotiate(bus, tx, &message).await?;
                }
                Message::Nop | Message::MessageReject => {}
                Message::InitiatorError => {
                    return Ok(Some(Outcome::Aborted(Abort::InitiatorError)));
                }
                Message::MessageParityError => {
                    return Ok(Some(Outcome::Aborted(Abort::MessageParityError)));
                }
                Message::AbortTask => {
                    let (initiator, tag) = (tx.initiator, tx.tag);
                    if let (Some(unit), Some((_, tag))) = (self.unit_mut(tx.target, tx.lun), tag) {
                        unit.queue.abort_task(initiator, tag);
                    }
                    return Ok(Some(Outcome::Aborted(Abort::AbortTask)));
                }
                Message::AbortTaskSet => {
                    let initiator = tx.initiator;
                    if let Some(unit) = self.unit_mut(tx.target, tx.lun) {
                        unit.queue.abort_initiator(initiator);
                    }
                    return Ok(Some(Outcome::Aborted(Abort::AbortTaskSet)));
                }
                Message::ClearTaskSet => {
                    if let Some(unit) = self.unit_mut(tx.target, tx.lun) {
                        unit.queue.clear();
                    }
                    return Ok(Some(Outcome::Aborted(Abort::ClearTaskSet)));
                }
                Message::LogicalUnitReset => {
                    if let Some(unit) = self.unit_mut(tx.target, tx.lun) {
                        unit.reset(&features);
                    }
                    return Ok(Some(Outcome::Aborted(Abort::LogicalUnitReset)));
                }
                Message::TargetReset => {
                    info!("target reset of {} from {}", tx.target, tx.initiator);
                    if let Some(device) = self.devices.get_mut(tx.target as usize).and_then(Option::as_mut) {
                        device.reset(&features);
                    }
                    return Ok(Some(Outcome::Aborted(Abort::TargetReset)));
                }
                other => {
                    debug!("rejecting {:?}", other);
                    send_message(bus, tx, Message::MessageReject).await?;
                }
            }
        }
    }

    /// One SDTR / WDTR / PPR round. Returns a message the initiator sent in
    /// place of MESSAGE REJECT, still to be handled
    async fn negotiate<B: Bus>(
        &mut self,
        bus: &mut B,
        tx: &mut Transaction,
        message: &Message,
    ) -> Result<Option<Message>, BusError> {
        let initiator = tx.initiator;
        let Some(device) = self.devices.get_mut(tx.target as usize).and_then(Option::as_mut) else {
            return Ok(None);
        };
        let negotiator = &mut device.negotiator;

        match negotiator.propose(initiator, message) {
            Response::Accept => {
                commit(bus, negotiator);
                Ok(None)
            }
            Response::Reject => {
                send_message(bus, tx, Message::MessageReject).await?;
                Ok(None)
            }
            Response::Counter(counter) => {
                send_message(bus, tx, counter).await?;
                if !bus.attention() {
                    commit(bus, negotiator);
                    return Ok(None);
                }
                enter(bus, tx, BusPhase::MessageOut).await?;
                match read_message(bus).await? {
                    Ok(Message::MessageReject) => {
                        negotiator.reject();
                        Ok(None)
                    }
                    Ok(next) => {
                        commit(bus, negotiator);
                        Ok(Some(next))
                    }
                    Err(e) => {
                        warn!("bad reply to counter proposal: {:?}", e);
                        negotiator.reject();
                        send_message(bus, tx, Message::MessageReject).await?;
                        Ok(None)
                    }
                }
            }
        }
    }
}

fn commit<B: Bus>(bus: &mut B, negotiator: &mut Negotiator) {
    if let Some((initiator, params)) = negotiator.commit() {
        bus.configure_transfer(initiator, params);
    }
}

async fn enter<B: Bus>(bus: &mut B, tx: &mut Transaction, phase: BusPhase) -> Result<(), BusError> {
    if tx.phase != phase {
        bus.request_phase(phase).await?;
        tx.phase = phase;
    }
    Ok(())
}

async fn send_message<B: Bus>(bus: &mut B, tx: &mut Transaction, message: Message) -> Result<(), BusError> {
    enter(bus, tx, BusPhase::MessageIn).await?;
    bus.write_all(&message.encode()).await
}

async fn send_status<B: Bus>(bus: &mut B, tx: &mut Transaction, status: Status) -> Result<(), BusError> {
    enter(bus, tx, BusPhase::Status).await?;
    bus.write_all(&[status.into()]).await
}

/// COMMAND phase: the opcode selects how many more bytes follow
async fn read_command<B: Bus>(bus: &mut B, tx: &mut Transaction) -> Result<(), BusError> {
    enter(bus, tx, BusPhase::Command).await?;
    let mut cdb = [0u8; MAX_CDB_LEN];
    receive(bus, &mut cdb[..1]).await?;
    let len = CommandLength::for_opcode(cdb[0]).bytes();
    receive(bus, &mut cdb[1..len]).await?;
    tx.set_cdb(&cdb[..len]);
    if !tx.identified {
        // SCSI-1: LUN in CDB byte 1 bits 7..5
        tx.lun = cdb[1] >> 5;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::MockBus;
    use crate::config::UnitConfig;
    use crate::message::codes;
    use crate::scsi::backend::UnitAddress;
    use crate::scsi::enums::DeviceType;
    use crate::storage::{RamDisk, BLOCK_SIZE};
    use embassy_futures::block_on;

    const BLOCKS: usize = 8;
    const IDENTIFY_LUN0: u8 = codes::IDENTIFY;

    fn config(features: Features) -> Config {
        Config {
            features,
            ..Config::default()
        }
        .with_unit(UnitConfig::new(0, 0, DeviceType::Disk))
        .unwrap()
        .with_unit(UnitConfig::new(3, 0, DeviceType::Optical))
        .unwrap()
    }

    fn ram() -> RamDisk<BLOCKS> {
        let mut ram = RamDisk::new();
        ram.add(UnitAddress { id: 0, lun: 0 }).unwrap();
        ram.add(UnitAddress { id: 3, lun: 0 }).unwrap();
        ram
    }

    fn select(target: u8, attention: bool) -> Selection {
        Selection {
            target,
            initiator: Some(7),
            attention,
        }
    }

    fn run(engine: &mut Engine<'_, RamDisk<BLOCKS>>, bus: &mut MockBus, selection: Selection) -> Outcome {
        block_on(engine.on_selected(bus, selection))
    }

    #[test]
    fn test_test_unit_ready_end_to_end() {
        let config = config(Features::default());
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        let mut bus = MockBus::new();

        bus.load(&[IDENTIFY_LUN0], &[0x00, 0, 0, 0, 0, 0], &[]);
        assert_eq!(run(&mut engine, &mut bus, select(0, true)), Outcome::Completed(Status::Good));
        assert_eq!(
            bus.phases,
            [
                BusPhase::MessageOut,
                BusPhase::Command,
                BusPhase::Status,
                BusPhase::MessageIn,
                BusPhase::BusFree
            ]
        );
        assert_eq!(bus.status, [0x00]);
        assert_eq!(bus.message_in, [codes::COMMAND_COMPLETE]);
        assert!(engine.unit(0, 0).unwrap().sense.peek().is_none());
    }

    #[test]
    fn test_unconfigured_id_is_ignored() {
        let config = config(Features::default());
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        let mut bus = MockBus::new();
        bus.load(&[], &[0x00, 0, 0, 0, 0, 0], &[]);
        assert_eq!(run(&mut engine, &mut bus, select(5, false)), Outcome::Ignored);
        assert!(bus.phases.is_empty());
    }

    #[test]
    fn test_read_beyond_capacity_has_no_data_phase() {
        let config = config(Features::default());
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        let mut bus = MockBus::new();

        // READ(10) lba 7, 2 blocks on an 8 block disk
        bus.load(&[IDENTIFY_LUN0], &[0x28, 0, 0, 0, 0, 7, 0, 0, 2, 0], &[]);
        assert_eq!(
            run(&mut engine, &mut bus, select(0, true)),
            Outcome::Completed(Status::CheckCondition)
        );
        assert!(!bus.entered(BusPhase::DataIn));
        let sense = engine.unit(0, 0).unwrap().sense.peek();
        assert_eq!(sense.key, SenseKey::IllegalRequest);
        assert_eq!(sense.asc, AdditionalSenseCode::InvalidLba);
    }

    #[test]
    fn test_read_and_write_through_the_bus() {
        let config = config(Features::default());
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        let mut bus = MockBus::new();

        let data = [0x5A; BLOCK_SIZE];
        bus.load(&[], &[0x0A, 0, 0, 2, 1, 0], &data);
        assert_eq!(run(&mut engine, &mut bus, select(0, false)), Outcome::Completed(Status::Good));
        assert!(bus.entered(BusPhase::DataOut));

        bus.load(&[], &[0x08, 0, 0, 2, 1, 0], &[]);
        assert_eq!(run(&mut engine, &mut bus, select(0, false)), Outcome::Completed(Status::Good));
        assert_eq!(bus.data_in, data);
    }

    #[test]
    fn test_unsupported_opcode() {
        let config = config(Features::default());
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        let mut bus = MockBus::new();

        bus.load(&[IDENTIFY_LUN0], &[0x1F, 0, 0, 0, 0, 0], &[]);
        assert_eq!(
            run(&mut engine, &mut bus, select(0, true)),
            Outcome::Completed(Status::CheckCondition)
        );
        assert!(!bus.entered(BusPhase::DataIn));
        assert!(!bus.entered(BusPhase::DataOut));
        let unit = engine.unit(0, 0).unwrap();
        assert_eq!(unit.sense.peek().key, SenseKey::IllegalRequest);
        assert_eq!(unit.sense.peek().asc, AdditionalSenseCode::InvalidFieldInCdb);
        assert_eq!(unit.sense.peek_status(), Status::CheckCondition);
    }

    #[test]
    fn test_request_sense_clears() {
        let config = config(Features::default());
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        let mut bus = MockBus::new();

        bus.load(&[IDENTIFY_LUN0], &[0x1F, 0, 0, 0, 0, 0], &[]);
        run(&mut engine, &mut bus, select(0, true));

        bus.load(&[IDENTIFY_LUN0], &[0x03, 0, 0, 0, 18, 0], &[]);
        assert_eq!(run(&mut engine, &mut bus, select(0, true)), Outcome::Completed(Status::Good));
        assert_eq!(bus.data_in.len(), 18);
        assert_eq!(bus.data_in[2] & 0x0F, 0x05);
        assert_eq!(bus.data_in[12], 0x24);

        bus.load(&[IDENTIFY_LUN0], &[0x03, 0, 0, 0, 18, 0], &[]);
        run(&mut engine, &mut bus, select(0, true));
        assert_eq!(bus.data_in[2] & 0x0F, 0x00);
        assert_eq!(bus.data_in[12], 0x00);
    }

    #[test]
    fn test_mode_sense_all_pages_ascending() {
        let config = config(Features::default());
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        let mut bus = MockBus::new();

        // DBD set, all pages
        bus.load(&[IDENTIFY_LUN0], &[0x1A, 0x08, 0x3F, 0, 0xFF, 0], &[]);
        assert_eq!(run(&mut engine, &mut bus, select(0, true)), Outcome::Completed(Status::Good));

        let response = &bus.data_in;
        assert_eq!(response[0] as usize, response.len() - 1);
        assert_eq!(response[3], 0);
        let mut codes = std::vec::Vec::new();
        let mut pos = 4;
        while pos < response.len() {
            codes.push(response[pos] & 0x3F);
            pos += response[pos + 1] as usize + 2;
        }
        assert_eq!(pos, response.len());
        assert_eq!(codes, [0x01, 0x02, 0x03, 0x04, 0x08, 0x30]);
    }

    #[test]
    fn test_mode_select_then_sense_round_trip() {
        let config = config(Features::default());
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        let mut bus = MockBus::new();

        let mut caching = [0u8; 20];
        caching[0] = 0x08;
        caching[1] = 18;
        caching[2] = 0x04;
        let mut params = std::vec![0u8, 0, 0, 0];
        params.extend_from_slice(&caching);

        bus.load(&[IDENTIFY_LUN0], &[0x15, 0x10, 0, 0, params.len() as u8, 0], &params);
        assert_eq!(run(&mut engine, &mut bus, select(0, true)), Outcome::Completed(Status::Good));

        bus.load(&[IDENTIFY_LUN0], &[0x1A, 0x08, 0x08, 0, 0xFF, 0], &[]);
        run(&mut engine, &mut bus, select(0, true));
        assert_eq!(&bus.data_in[4..], &caching);

        // wrong page length leaves the page untouched
        let mut short = std::vec![0u8, 0, 0, 0, 0x08, 10];
        short.extend_from_slice(&[0xFF; 10]);
        bus.load(&[IDENTIFY_LUN0], &[0x15, 0x10, 0, 0, short.len() as u8, 0], &short);
        assert_eq!(
            run(&mut engine, &mut bus, select(0, true)),
            Outcome::Completed(Status::CheckCondition)
        );
        assert_eq!(
            engine.unit(0, 0).unwrap().sense.peek().asc,
            AdditionalSenseCode::InvalidFieldInCdb
        );
        assert_eq!(
            engine.unit(0, 0).unwrap().mode_pages.get_page(crate::scsi::enums::PageCode::Caching).unwrap().bytes(),
            &caching
        );
    }

    #[test]
    fn test_negotiation_reject_keeps_previous_agreement() {
        let features = Features {
            synchronous: true,
            ..Features::default()
        };
        let config = config(features);
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        let mut bus = MockBus::new();

        // within limits: accepted silently
        bus.load(&[IDENTIFY_LUN0, 0x01, 3, 0x01, 50, 8], &[0x00, 0, 0, 0, 0, 0], &[]);
        run(&mut engine, &mut bus, select(0, true));
        assert_eq!(bus.message_in, [codes::COMMAND_COMPLETE]);
        let agreed = NegotiatedParameters {
            period: 50,
            offset: 8,
            width: 0,
        };
        assert_eq!(engine.negotiated(0, 7), Some(agreed));
        assert_eq!(bus.configured, [(7, agreed)]);

        // too fast: counter proposal, which the initiator rejects
        bus.load(
            &[IDENTIFY_LUN0, 0x01, 3, 0x01, 12, 31, codes::MESSAGE_REJECT],
            &[0x00, 0, 0, 0, 0, 0],
            &[],
        );
        assert_eq!(run(&mut engine, &mut bus, select(0, true)), Outcome::Completed(Status::Good));
        assert_eq!(bus.message_in, [0x01, 3, 0x01, 50, 15, codes::COMMAND_COMPLETE]);
        assert_eq!(engine.negotiated(0, 7), Some(agreed));
        assert_eq!(bus.configured.len(), 1);
    }

    #[test]
    fn test_unknown_message_is_rejected() {
        let config = config(Features::default());
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        let mut bus = MockBus::new();

        bus.load(&[IDENTIFY_LUN0, codes::CLEAR_ACA], &[0x00, 0, 0, 0, 0, 0], &[]);
        assert_eq!(run(&mut engine, &mut bus, select(0, true)), Outcome::Completed(Status::Good));
        assert_eq!(bus.message_in, [codes::MESSAGE_REJECT, codes::COMMAND_COMPLETE]);
    }

    #[test]
    fn test_linked_commands() {
        let config = config(Features::default());
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        let mut bus = MockBus::new();

        bus.load(
            &[IDENTIFY_LUN0],
            &[0x00, 0, 0, 0, 0, 0x03, 0x00, 0, 0, 0, 0, 0],
            &[],
        );
        assert_eq!(run(&mut engine, &mut bus, select(0, true)), Outcome::Completed(Status::Good));
        assert_eq!(bus.status, [0x10, 0x00]);
        assert_eq!(
            bus.message_in,
            [codes::LINKED_FLG_CMD_COMPLETE, codes::COMMAND_COMPLETE]
        );
        assert_eq!(bus.releases, 1);
    }

    #[test]
    fn test_disconnect_and_reselect() {
        let config = config(Features::default());
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        engine
            .backend()
            .unit_mut(UnitAddress { id: 0, lun: 0 })
            .unwrap()
            .block_mut(1)
            .unwrap()
            .as_bytes_mut()
            .fill(0xC3);
        let mut bus = MockBus::new();

        let identify = codes::IDENTIFY | codes::IDENTIFY_DISCONNECT_PRIVILEGE;
        bus.load(&[identify, codes::SIMPLE_QUEUE_TAG, 5], &[0x08, 0, 0, 1, 1, 0], &[]);
        assert_eq!(run(&mut engine, &mut bus, select(0, true)), Outcome::Disconnected);
        assert_eq!(bus.message_in, [codes::DISCONNECT]);
        assert!(bus.status.is_empty());
        assert_eq!(engine.unit(0, 0).unwrap().queue.len(), 1);

        // untagged command while the task waits
        bus.load(&[codes::IDENTIFY], &[0x00, 0, 0, 0, 0, 0], &[]);
        assert_eq!(run(&mut engine, &mut bus, select(0, true)), Outcome::Completed(Status::Busy));

        bus.load(&[], &[], &[]);
        assert_eq!(
            block_on(engine.service(&mut bus)),
            Some(Outcome::Completed(Status::Good))
        );
        assert_eq!(bus.reselections, [(0, 7)]);
        assert_eq!(bus.message_in, [codes::IDENTIFY, codes::SIMPLE_QUEUE_TAG, 5, codes::COMMAND_COMPLETE]);
        assert_eq!(bus.data_in, [0xC3; BLOCK_SIZE]);
        assert!(engine.unit(0, 0).unwrap().queue.is_empty());
        assert_eq!(block_on(engine.service(&mut bus)), None);
    }

    #[test]
    fn test_parity_error_aborts_and_sets_sense() {
        let config = config(Features::default());
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        let mut bus = MockBus::new();

        bus.load(&[IDENTIFY_LUN0], &[0x00, 0, 0, 0, 0, 0], &[]);
        bus.inject = Some((BusPhase::Command, BusError::Parity));
        assert_eq!(run(&mut engine, &mut bus, select(0, true)), Outcome::Aborted(Abort::Parity));
        assert!(bus.status.is_empty());
        assert_eq!(bus.phases.last(), Some(&BusPhase::BusFree));
        let sense = engine.unit(0, 0).unwrap().sense.peek();
        assert_eq!(sense.key, SenseKey::HardwareError);
        assert_eq!(sense.asc, AdditionalSenseCode::ScsiParityError);
    }

    #[test]
    fn test_initiator_error_aborts_without_sense() {
        let config = config(Features::default());
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        let mut bus = MockBus::new();

        bus.load(&[IDENTIFY_LUN0, codes::INITIATOR_ERROR], &[0x00, 0, 0, 0, 0, 0], &[]);
        assert_eq!(
            run(&mut engine, &mut bus, select(0, true)),
            Outcome::Aborted(Abort::InitiatorError)
        );
        assert!(!bus.entered(BusPhase::Command));
        assert!(engine.unit(0, 0).unwrap().sense.peek().is_none());
    }

    #[test]
    fn test_missing_lun() {
        let config = config(Features::default());
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        let mut bus = MockBus::new();

        // SCSI-1 style: no ATN, LUN 2 in CDB byte 1
        bus.load(&[], &[0x12, 0x40, 0, 0, 36, 0], &[]);
        assert_eq!(run(&mut engine, &mut bus, select(0, false)), Outcome::Completed(Status::Good));
        assert_eq!(bus.data_in[0], 0x7F);

        bus.load(&[], &[0x00, 0x40, 0, 0, 0, 0], &[]);
        assert_eq!(
            run(&mut engine, &mut bus, select(0, false)),
            Outcome::Completed(Status::CheckCondition)
        );
    }

    #[test]
    fn test_bus_reset_restores_defaults() {
        let features = Features {
            synchronous: true,
            unit_attention_on_reset: true,
            ..Features::default()
        };
        let config = config(features);
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        engine.unit_mut(0, 0).unwrap().unit_attention = None;
        let mut bus = MockBus::new();

        bus.load(&[IDENTIFY_LUN0, 0x01, 3, 0x01, 50, 8], &[0x00, 0, 0, 0, 0, 0], &[]);
        run(&mut engine, &mut bus, select(0, true));
        assert!(engine.negotiated(0, 7).unwrap().is_synchronous());

        assert_eq!(block_on(engine.handle_event(&mut bus, BusEvent::Reset)), Outcome::Reset);
        assert_eq!(engine.negotiated(0, 7), Some(NegotiatedParameters::default()));

        bus.load(&[IDENTIFY_LUN0], &[0x00, 0, 0, 0, 0, 0], &[]);
        assert_eq!(
            run(&mut engine, &mut bus, select(0, true)),
            Outcome::Completed(Status::CheckCondition)
        );
        assert_eq!(
            engine.unit(0, 0).unwrap().sense.peek().key,
            SenseKey::UnitAttention
        );
    }

    #[test]
    fn test_optical_write_refused() {
        let config = config(Features::default());
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        let mut bus = MockBus::new();

        bus.load(&[IDENTIFY_LUN0], &[0x0A, 0, 0, 0, 1, 0], &[0; BLOCK_SIZE]);
        assert_eq!(
            run(&mut engine, &mut bus, select(3, true)),
            Outcome::Completed(Status::CheckCondition)
        );
        assert!(!bus.entered(BusPhase::DataOut));
        assert_eq!(engine.unit(3, 0).unwrap().sense.peek().key, SenseKey::DataProtect);
    }

    /// Parks a tagged READ(6) from `initiator` on 0:0
    fn queue_read(engine: &mut Engine<'_, RamDisk<BLOCKS>>, bus: &mut MockBus, initiator: u8, tag: u8) {
        let identify = codes::IDENTIFY | codes::IDENTIFY_DISCONNECT_PRIVILEGE;
        bus.load(&[identify, codes::SIMPLE_QUEUE_TAG, tag], &[0x08, 0, 0, 1, 1, 0], &[]);
        let selection = Selection {
            target: 0,
            initiator: Some(initiator),
            attention: true,
        };
        assert_eq!(run(engine, bus, selection), Outcome::Disconnected);
    }

    fn negotiate_sync(engine: &mut Engine<'_, RamDisk<BLOCKS>>, bus: &mut MockBus) -> NegotiatedParameters {
        bus.load(&[IDENTIFY_LUN0, 0x01, 3, 0x01, 50, 8], &[0x00, 0, 0, 0, 0, 0], &[]);
        run(engine, bus, select(0, true));
        let agreed = engine.negotiated(0, 7).unwrap();
        assert!(agreed.is_synchronous());
        agreed
    }

    #[test]
    fn test_abort_task_set_spares_other_initiators() {
        let config = config(Features::default());
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        let mut bus = MockBus::new();

        queue_read(&mut engine, &mut bus, 7, 5);
        queue_read(&mut engine, &mut bus, 6, 9);
        queue_read(&mut engine, &mut bus, 7, 6);
        assert_eq!(engine.unit(0, 0).unwrap().queue.len(), 3);

        bus.load(&[IDENTIFY_LUN0, codes::ABORT_TASK_SET], &[], &[]);
        assert_eq!(
            run(&mut engine, &mut bus, select(0, true)),
            Outcome::Aborted(Abort::AbortTaskSet)
        );
        assert!(!bus.entered(BusPhase::Command));
        let queue = &engine.unit(0, 0).unwrap().queue;
        assert_eq!(queue.len(), 1);
        assert!(queue.get(6, 9).is_some());
    }

    #[test]
    fn test_abort_task_removes_only_the_tagged_task() {
        let config = config(Features::default());
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        let mut bus = MockBus::new();

        queue_read(&mut engine, &mut bus, 7, 5);
        queue_read(&mut engine, &mut bus, 7, 6);

        bus.load(&[IDENTIFY_LUN0, codes::SIMPLE_QUEUE_TAG, 5, codes::ABORT_TASK], &[], &[]);
        assert_eq!(
            run(&mut engine, &mut bus, select(0, true)),
            Outcome::Aborted(Abort::AbortTask)
        );
        let queue = &engine.unit(0, 0).unwrap().queue;
        assert!(queue.get(7, 5).is_none());
        assert!(queue.get(7, 6).is_some());
    }

    #[test]
    fn test_target_reset_clears_negotiation_and_posts_unit_attention() {
        let features = Features {
            synchronous: true,
            unit_attention_on_reset: true,
            ..Features::default()
        };
        let config = config(features);
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        engine.unit_mut(0, 0).unwrap().unit_attention = None;
        engine.unit_mut(3, 0).unwrap().unit_attention = None;
        let mut bus = MockBus::new();

        negotiate_sync(&mut engine, &mut bus);
        queue_read(&mut engine, &mut bus, 7, 5);

        bus.load(&[IDENTIFY_LUN0, codes::TARGET_RESET], &[], &[]);
        assert_eq!(
            run(&mut engine, &mut bus, select(0, true)),
            Outcome::Aborted(Abort::TargetReset)
        );
        assert_eq!(engine.negotiated(0, 7), Some(NegotiatedParameters::default()));
        let unit = engine.unit(0, 0).unwrap();
        assert!(unit.queue.is_empty());
        assert_eq!(unit.unit_attention, Some(AdditionalSenseCode::UnitPowerOnReset));
        // other targets are untouched
        assert_eq!(engine.unit(3, 0).unwrap().unit_attention, None);
    }

    #[test]
    fn test_abort_keeps_negotiated_parameters() {
        let features = Features {
            synchronous: true,
            ..Features::default()
        };
        let config = config(features);
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        let mut bus = MockBus::new();

        let agreed = negotiate_sync(&mut engine, &mut bus);
        bus.load(&[IDENTIFY_LUN0, codes::ABORT_TASK_SET], &[], &[]);
        assert_eq!(
            run(&mut engine, &mut bus, select(0, true)),
            Outcome::Aborted(Abort::AbortTaskSet)
        );
        assert_eq!(engine.negotiated(0, 7), Some(agreed));
    }

    #[test]
    fn test_clear_task_set_drops_every_initiator() {
        let config = config(Features::default());
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        let mut bus = MockBus::new();

        queue_read(&mut engine, &mut bus, 7, 5);
        queue_read(&mut engine, &mut bus, 6, 9);

        bus.load(&[IDENTIFY_LUN0, codes::CLEAR_TASK_SET], &[], &[]);
        assert_eq!(
            run(&mut engine, &mut bus, select(0, true)),
            Outcome::Aborted(Abort::ClearTaskSet)
        );
        assert!(engine.unit(0, 0).unwrap().queue.is_empty());
    }

    #[test]
    fn test_logical_unit_reset_keeps_negotiation() {
        let features = Features {
            synchronous: true,
            ..Features::default()
        };
        let config = config(features);
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, ram(), &mut buffer).unwrap();
        let mut bus = MockBus::new();

        let agreed = negotiate_sync(&mut engine, &mut bus);
        bus.load(&[IDENTIFY_LUN0], &[0x16, 0, 0, 0, 0, 0], &[]);
        assert_eq!(run(&mut engine, &mut bus, select(0, true)), Outcome::Completed(Status::Good));
        assert_eq!(engine.unit(0, 0).unwrap().reserved_by, Some(7));
        queue_read(&mut engine, &mut bus, 7, 5);

        bus.load(&[IDENTIFY_LUN0, codes::LOGICAL_UNIT_RESET], &[], &[]);
        assert_eq!(
            run(&mut engine, &mut bus, select(0, true)),
            Outcome::Aborted(Abort::LogicalUnitReset)
        );
        let unit = engine.unit(0, 0).unwrap();
        assert!(unit.queue.is_empty());
        assert_eq!(unit.reserved_by, None);
        assert_eq!(engine.negotiated(0, 7), Some(agreed));
    }

    #[test]
    fn test_buffer_too_small() {
        let config = config(Features::default());
        let mut buffer = [0u8; 512];
        assert!(matches!(
            Engine::new(&config, ram(), &mut buffer),
            Err(ConfigError::BufferTooSmall)
        ));
    }
}
