use crate::config::{Features, Identification, UnitConfig};
use crate::scsi::{
    backend::{BackendError, UnitAddress},
    enums::{AdditionalSenseCode, DeviceType, SenseKey},
    mode_page::ModePages,
    queue::TaskQueue,
    sense::SenseState,
    CommandError,
};

/// Dayna SCSI/Link adapter state
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkState {
    pub mac_address: [u8; 6],
    pub enabled: bool,
    pub frames_received: u32,
    pub frames_sent: u32,
    pub frames_lost: u32,
}

/// Everything the target tracks for one configured LUN
#[derive(Clone, Debug)]
pub struct LogicalUnit {
    pub address: UnitAddress,
    pub device_type: DeviceType,
    pub removable: bool,
    pub identification: Identification,
    /// Medium loaded and spun up
    pub ready: bool,
    pub prevent_removal: bool,
    /// Initiator holding a RESERVE
    pub reserved_by: Option<u8>,
    pub sense: SenseState,
    pub mode_pages: ModePages,
    pub queue: TaskQueue,
    /// Reported once to the next command other than INQUIRY / REQUEST SENSE
    pub unit_attention: Option<AdditionalSenseCode>,
    /// Current block on sequential access units
    pub tape_position: u32,
    pub link: LinkState,
    factory_mac: [u8; 6],
}

impl LogicalUnit {
    pub fn new(config: &UnitConfig, features: &Features) -> Self {
        let mut unit = Self {
            address: UnitAddress {
                id: config.id,
                lun: config.lun,
            },
            device_type: config.device_type,
            removable: config.removable,
            identification: config.identification,
            ready: true,
            prevent_removal: false,
            reserved_by: None,
            sense: SenseState::default(),
            mode_pages: ModePages::for_device(config.device_type, features),
            queue: TaskQueue::new(),
            unit_attention: None,
            tape_position: 0,
            link: LinkState::default(),
            factory_mac: config.mac_address,
        };
        unit.reset(features);
        unit
    }

    /// Power on / hard reset. The unit is re-initialised, never dropped
    pub fn reset(&mut self, features: &Features) {
        self.ready = true;
        self.prevent_removal = false;
        self.reserved_by = None;
        self.sense.clear();
        self.mode_pages.reset();
        self.queue.clear();
        self.tape_position = 0;
        self.link = LinkState {
            mac_address: self.factory_mac,
            ..LinkState::default()
        };
        self.unit_attention = features
            .unit_attention_on_reset
            .then_some(AdditionalSenseCode::UnitPowerOnReset);
    }

    pub fn post_unit_attention(&mut self, asc: AdditionalSenseCode) {
        self.unit_attention = Some(asc);
    }

    /// Records sense and returns the matching error
    pub fn fail(&mut self, key: SenseKey, asc: AdditionalSenseCode) -> CommandError {
        self.sense.record_error(key, asc);
        CommandError::Failed
    }

    pub fn fail_lba(&mut self, lba: u32) -> CommandError {
        self.sense.record_error_with_information(
            SenseKey::IllegalRequest,
            AdditionalSenseCode::InvalidLba,
            lba,
        );
        CommandError::Failed
    }

    pub fn fail_invalid_field(&mut self) -> CommandError {
        self.fail(SenseKey::IllegalRequest, AdditionalSenseCode::InvalidFieldInCdb)
    }

    /// Translates a storage error into sense data
    pub fn fail_backend(&mut self, e: BackendError, lba: u32) -> CommandError {
        error!("backend error on lba {}: {:?}", lba, e);
        match e {
            BackendError::NoMedia => self.fail(SenseKey::NotReady, AdditionalSenseCode::NoMedia),
            BackendError::InvalidLba => self.fail_lba(lba),
            BackendError::MediumError => {
                self.sense.record_error_with_information(
                    SenseKey::MediumError,
                    AdditionalSenseCode::UnrecoveredReadError,
                    lba,
                );
                CommandError::Failed
            }
            BackendError::WriteProtected => {
                self.fail(SenseKey::DataProtect, AdditionalSenseCode::WriteProtected)
            }
            BackendError::HardwareError => {
                self.fail(SenseKey::HardwareError, AdditionalSenseCode::NoAdditionalSenseInformation)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_reinitialises() {
        let features = Features {
            unit_attention_on_reset: true,
            ..Features::default()
        };
        let mut unit = LogicalUnit::new(&UnitConfig::new(2, 0, DeviceType::Ethernet), &features);
        assert_eq!(unit.unit_attention, Some(AdditionalSenseCode::UnitPowerOnReset));
        assert_eq!(unit.link.mac_address, [0x00, 0x80, 0x19, 0x00, 2, 0]);

        unit.unit_attention = None;
        unit.reserved_by = Some(7);
        unit.link.enabled = true;
        unit.link.mac_address = [1; 6];
        let _ = unit.fail_invalid_field();

        unit.reset(&features);
        assert_eq!(unit.reserved_by, None);
        assert!(!unit.link.enabled);
        assert_eq!(unit.link.mac_address, [0x00, 0x80, 0x19, 0x00, 2, 0]);
        assert!(unit.sense.peek().is_none());
        assert_eq!(unit.unit_attention, Some(AdditionalSenseCode::UnitPowerOnReset));
    }

    #[test]
    fn test_backend_error_translation() {
        let mut unit = LogicalUnit::new(&UnitConfig::new(0, 0, DeviceType::Disk), &Features::default());
        assert_eq!(unit.fail_backend(BackendError::MediumError, 9), CommandError::Failed);
        assert_eq!(unit.sense.peek().key, SenseKey::MediumError);
        assert_eq!(unit.sense.peek().information, Some(9));

        let _ = unit.fail_backend(BackendError::WriteProtected, 0);
        assert_eq!(unit.sense.peek().key, SenseKey::DataProtect);
        assert_eq!(unit.sense.peek().asc, AdditionalSenseCode::WriteProtected);
    }
}
