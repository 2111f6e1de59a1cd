//! Target configuration.
//!
//! Built once at startup and handed to [`Engine::new`](crate::engine::Engine::new) by
//! reference. Nothing in here changes while the engine runs.

use heapless::Vec;

use crate::scsi::enums::DeviceType;

/// Maximum number of supported SCSI IDs
pub const NUM_SCSIID: usize = 8;
/// Maximum number of LUNs per SCSI ID
pub const NUM_SCSILUN: usize = 8;
/// Maximum number of configured virtual devices across all IDs
pub const NUM_VDEV: usize = 8;
/// Largest block size a unit may report
pub const MAX_BLOCKSIZE: usize = 1 << 15;

/// Optional behaviour, toggled per build
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Features {
    /// Accept synchronous transfer agreements (SDTR/PPR offsets above zero)
    pub synchronous: bool,
    /// Honour the disconnect privilege from IDENTIFY and queue tagged commands
    pub disconnect: bool,
    /// Accept SIMPLE / HEAD OF QUEUE / ORDERED queue tag messages
    pub tagged_queuing: bool,
    /// Have the bus layer check parity on bytes received from the initiator
    pub read_parity_check: bool,
    pub support_disk: bool,
    pub support_optical: bool,
    pub support_tape: bool,
    pub support_ethernet: bool,
    /// Apple mode page 0x30 and the 0xEE vendor command
    pub support_apple: bool,
    /// SASI compatibility (Sharp X68000): SET DRIVE PARAMETER, 4 byte sense
    pub support_sasi: bool,
    /// Post POWER ON / RESET unit attention after every hard reset
    pub unit_attention_on_reset: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            synchronous: false,
            disconnect: true,
            tagged_queuing: true,
            read_parity_check: false,
            support_disk: true,
            support_optical: true,
            support_tape: false,
            support_ethernet: false,
            support_apple: true,
            support_sasi: false,
            unit_attention_on_reset: false,
        }
    }
}

impl Features {
    pub fn supports(&self, device_type: DeviceType) -> bool {
        match device_type {
            DeviceType::Disk => self.support_disk,
            DeviceType::Optical => self.support_optical,
            DeviceType::Tape => self.support_tape,
            DeviceType::Ethernet => self.support_ethernet,
        }
    }
}

/// Ceiling applied to SDTR / WDTR / PPR proposals
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferLimits {
    /// Shortest transfer period factor accepted (units of 4ns)
    pub min_period: u8,
    /// Largest REQ/ACK offset accepted
    pub max_offset: u8,
    /// Largest transfer width exponent (0 = 8 bit, 1 = 16 bit)
    pub max_width: u8,
}

impl Default for TransferLimits {
    fn default() -> Self {
        Self {
            min_period: 50,
            max_offset: 15,
            max_width: 0,
        }
    }
}

/// INQUIRY identification strings, space padded
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct Identification {
    pub vendor: [u8; 8],
    pub product: [u8; 16],
    pub revision: [u8; 4],
}

impl Identification {
    pub fn new(vendor: &str, product: &str, revision: &str) -> Self {
        let mut ident = Self {
            vendor: [b' '; 8],
            product: [b' '; 16],
            revision: [b' '; 4],
        };
        copy_padded(&mut ident.vendor, vendor);
        copy_padded(&mut ident.product, product);
        copy_padded(&mut ident.revision, revision);
        ident
    }

    pub fn for_device(device_type: DeviceType) -> Self {
        match device_type {
            DeviceType::Disk => Self::new("QUANTUM", "FIREBALL1", "1.0"),
            DeviceType::Optical => Self::new("SONY", "CDU-55S", "1.0"),
            DeviceType::Tape => Self::new("ARCHIVE", "VIPER 150", "1.0"),
            DeviceType::Ethernet => Self::new("Dayna", "SCSI/Link", "2.0f"),
        }
    }
}

fn copy_padded(dst: &mut [u8], src: &str) {
    for (d, s) in dst.iter_mut().zip(src.bytes()) {
        *d = s;
    }
}

/// One virtual device mapped onto a SCSI ID and LUN
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct UnitConfig {
    pub id: u8,
    pub lun: u8,
    pub device_type: DeviceType,
    pub removable: bool,
    pub identification: Identification,
    /// Station address for Ethernet units
    pub mac_address: [u8; 6],
}

impl UnitConfig {
    pub fn new(id: u8, lun: u8, device_type: DeviceType) -> Self {
        Self {
            id,
            lun,
            device_type,
            removable: matches!(device_type, DeviceType::Optical | DeviceType::Tape),
            identification: Identification::for_device(device_type),
            mac_address: [0x00, 0x80, 0x19, 0x00, id, lun],
        }
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    NoUnits,
    TooManyUnits,
    InvalidId(u8),
    InvalidLun(u8),
    DuplicateUnit { id: u8, lun: u8 },
    UnsupportedDeviceType(DeviceType),
    BlockSizeTooLarge(usize),
    /// The transfer buffer cannot hold one block of `max_block_size`
    BufferTooSmall,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub features: Features,
    pub limits: TransferLimits,
    /// Largest block size any backend may report; the transfer buffer must fit it
    pub max_block_size: usize,
    pub units: Vec<UnitConfig, NUM_VDEV>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            features: Features::default(),
            limits: TransferLimits::default(),
            max_block_size: 2048,
            units: Vec::new(),
        }
    }
}

impl Config {
    /// Adds a unit, failing when the device table is full
    pub fn with_unit(mut self, unit: UnitConfig) -> Result<Self, ConfigError> {
        self.units.push(unit).map_err(|_| ConfigError::TooManyUnits)?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.units.is_empty() {
            return Err(ConfigError::NoUnits);
        }
        if self.max_block_size > MAX_BLOCKSIZE {
            return Err(ConfigError::BlockSizeTooLarge(self.max_block_size));
        }
        for (i, unit) in self.units.iter().enumerate() {
            if unit.id as usize >= NUM_SCSIID {
                return Err(ConfigError::InvalidId(unit.id));
            }
            if unit.lun as usize >= NUM_SCSILUN {
                return Err(ConfigError::InvalidLun(unit.lun));
            }
            if !self.features.supports(unit.device_type) {
                return Err(ConfigError::UnsupportedDeviceType(unit.device_type));
            }
            if self.units[..i]
                .iter()
                .any(|other| other.id == unit.id && other.lun == unit.lun)
            {
                return Err(ConfigError::DuplicateUnit {
                    id: unit.id,
                    lun: unit.lun,
                });
            }
        }
        Ok(())
    }

    /// Bit mask of the SCSI IDs this controller answers to, the `target_mask`
    /// a [`Bus`](crate::bus::Bus) implementation hands to
    /// [`Selection::from_data_bus`](crate::bus::Selection::from_data_bus)
    pub fn id_mask(&self) -> u8 {
        self.units.iter().fold(0, |mask, unit| mask | (1 << unit.id))
    }
}

const fn build_db2scsiid() -> [u8; 256] {
    let mut table = [0xFF; 256];
    let mut db = 1;
    while db < 256 {
        let mut id = 7;
        while db & (1 << id) == 0 {
            id -= 1;
        }
        table[db] = id as u8;
        db += 1;
    }
    table
}

/// Data bus value during SELECTION → highest asserted SCSI ID, 0xFF when none
pub const DB2SCSIID: [u8; 256] = build_db2scsiid();

pub fn db2scsiid(db: u8) -> Option<u8> {
    match DB2SCSIID[db as usize] {
        0xFF => None,
        id => Some(id),
    }
}

#[test]
fn test_db2scsiid() {
    assert_eq!(db2scsiid(0), None);
    assert_eq!(db2scsiid(0b0000_0001), Some(0));
    assert_eq!(db2scsiid(0b1000_0001), Some(7));
    assert_eq!(db2scsiid(0b0001_0110), Some(4));
}

#[test]
fn test_validate_rejects_duplicates_and_disabled_types() {
    let config = Config::default()
        .with_unit(UnitConfig::new(0, 0, DeviceType::Disk))
        .unwrap()
        .with_unit(UnitConfig::new(0, 0, DeviceType::Disk))
        .unwrap();
    assert_eq!(
        config.validate(),
        Err(ConfigError::DuplicateUnit { id: 0, lun: 0 })
    );

    let config = Config::default()
        .with_unit(UnitConfig::new(3, 0, DeviceType::Tape))
        .unwrap();
    assert_eq!(
        config.validate(),
        Err(ConfigError::UnsupportedDeviceType(DeviceType::Tape))
    );

    let config = Config::default()
        .with_unit(UnitConfig::new(8, 0, DeviceType::Disk))
        .unwrap();
    assert_eq!(config.validate(), Err(ConfigError::InvalidId(8)));
}

#[test]
fn test_id_mask() {
    let config = Config::default()
        .with_unit(UnitConfig::new(0, 0, DeviceType::Disk))
        .unwrap()
        .with_unit(UnitConfig::new(3, 1, DeviceType::Optical))
        .unwrap();
    assert_eq!(config.validate(), Ok(()));
    assert_eq!(config.id_mask(), 0b0000_1001);

    // initiator 7 selecting ID 3, ID 5 is not ours
    let selection = crate::bus::Selection::from_data_bus(0b1000_1000, config.id_mask(), false);
    assert_eq!(selection.map(|s| (s.target, s.initiator)), Some((3, Some(7))));
    assert_eq!(
        crate::bus::Selection::from_data_bus(0b1010_0000, config.id_mask(), false),
        None
    );
}
