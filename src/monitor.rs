//! Read-only state dumps for a debug shell.
//!
//! The engine task and the shell share the engine through an
//! `embassy_sync` [`Mutex`]. Snapshots are copied out under the lock, so the
//! shell never holds it while printing.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use heapless::Vec;

use crate::engine::Engine;
use crate::message::NegotiatedParameters;
use crate::scsi::{
    backend::{Backend, UnitAddress},
    enums::{AdditionalSenseCode, DeviceType, PageCode, Status},
    mode_page::MAX_PAGES,
    sense::SenseRecord,
    unit::LinkState,
};

/// Engine shared between the bus task and the monitor
pub type SharedEngine<'a, M, D> = Mutex<M, Engine<'a, D>>;

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LunSnapshot {
    pub address: UnitAddress,
    pub device_type: DeviceType,
    pub removable: bool,
    pub ready: bool,
    pub prevent_removal: bool,
    pub reserved_by: Option<u8>,
    pub sense: SenseRecord,
    pub status: Status,
    pub unit_attention: Option<AdditionalSenseCode>,
    pub queued_tasks: usize,
    pub mode_pages: Vec<PageCode, MAX_PAGES>,
    pub tape_position: Option<u32>,
    pub link: Option<LinkState>,
}

pub fn dump_lun_state<D: Backend>(engine: &Engine<'_, D>, id: u8, lun: u8) -> Option<LunSnapshot> {
    let unit = engine.unit(id, lun)?;
    let mut mode_pages = Vec::new();
    for page in unit.mode_pages.get_all_pages() {
        // never more pages than the registry holds
        let _ = mode_pages.push(page.code());
    }
    Some(LunSnapshot {
        address: unit.address,
        device_type: unit.device_type,
        removable: unit.removable,
        ready: unit.ready,
        prevent_removal: unit.prevent_removal,
        reserved_by: unit.reserved_by,
        sense: *unit.sense.peek(),
        status: unit.sense.peek_status(),
        unit_attention: unit.unit_attention,
        queued_tasks: unit.queue.len(),
        mode_pages,
        tape_position: (unit.device_type == DeviceType::Tape).then_some(unit.tape_position),
        link: (unit.device_type == DeviceType::Ethernet).then_some(unit.link),
    })
}

/// Agreement between target `id` and `initiator`. `None` for unconfigured IDs
pub fn dump_negotiated<D: Backend>(
    engine: &Engine<'_, D>,
    id: u8,
    initiator: u8,
) -> Option<NegotiatedParameters> {
    engine.negotiated(id, initiator)
}

pub async fn lun_state<M: RawMutex, D: Backend>(
    engine: &SharedEngine<'_, M, D>,
    id: u8,
    lun: u8,
) -> Option<LunSnapshot> {
    dump_lun_state(&*engine.lock().await, id, lun)
}

pub async fn negotiated<M: RawMutex, D: Backend>(
    engine: &SharedEngine<'_, M, D>,
    id: u8,
    initiator: u8,
) -> Option<NegotiatedParameters> {
    dump_negotiated(&*engine.lock().await, id, initiator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Features, UnitConfig};
    use crate::scsi::enums::SenseKey;
    use crate::storage::RamDisk;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    fn config() -> Config {
        Config {
            features: Features {
                support_tape: true,
                ..Features::default()
            },
            ..Config::default()
        }
        .with_unit(UnitConfig::new(0, 0, DeviceType::Disk))
        .unwrap()
        .with_unit(UnitConfig::new(4, 0, DeviceType::Tape))
        .unwrap()
    }

    #[test]
    fn test_dump_lun_state() {
        let config = config();
        let mut buffer = [0u8; 2048];
        let mut engine = Engine::new(&config, RamDisk::<4>::new(), &mut buffer).unwrap();
        let _ = engine.unit_mut(0, 0).unwrap().fail_invalid_field();

        let disk = dump_lun_state(&engine, 0, 0).unwrap();
        assert_eq!(disk.sense.key, SenseKey::IllegalRequest);
        assert_eq!(disk.status, Status::CheckCondition);
        assert_eq!(disk.tape_position, None);
        assert_eq!(disk.mode_pages.first(), Some(&PageCode::RwErrorRecovery));

        let tape = dump_lun_state(&engine, 4, 0).unwrap();
        assert_eq!(tape.tape_position, Some(0));
        assert!(tape.removable);
        assert!(dump_lun_state(&engine, 4, 1).is_none());
        assert!(dump_lun_state(&engine, 5, 0).is_none());
    }

    #[test]
    fn test_shared_engine() {
        let config = config();
        let mut buffer = [0u8; 2048];
        let engine = Engine::new(&config, RamDisk::<4>::new(), &mut buffer).unwrap();
        let shared: SharedEngine<'_, NoopRawMutex, _> = Mutex::new(engine);

        assert_eq!(
            block_on(negotiated(&shared, 0, 7)),
            Some(NegotiatedParameters::default())
        );
        assert_eq!(block_on(negotiated(&shared, 2, 7)), None);
        assert!(block_on(lun_state(&shared, 4, 0)).is_some());
    }
}
