use num_enum::IntoPrimitive;

/// Device class emulated by a logical unit
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceType {
    Disk,
    Tape,
    Optical,
    /// Dayna SCSI/Link compatible Ethernet adapter
    Ethernet,
}

/// PERIPHERAL DEVICE TYPE reported by INQUIRY
#[repr(u8)]
#[derive(IntoPrimitive, Clone, Copy, Eq, PartialEq, Debug)]
pub enum PeripheralDeviceType {
    DirectAccess = 0x00,
    SequentialAccess = 0x01,
    Processor = 0x03,
    CdRom = 0x05,
    /// Peripheral qualifier 011b with device type 1Fh: no logical unit present
    NotPresent = 0x7F,
}

impl DeviceType {
    pub fn peripheral_device_type(&self) -> PeripheralDeviceType {
        match self {
            DeviceType::Disk => PeripheralDeviceType::DirectAccess,
            DeviceType::Tape => PeripheralDeviceType::SequentialAccess,
            DeviceType::Optical => PeripheralDeviceType::CdRom,
            DeviceType::Ethernet => PeripheralDeviceType::Processor,
        }
    }

    /// Whether the unit is addressed in logical blocks
    pub fn is_block_device(&self) -> bool {
        !matches!(self, DeviceType::Ethernet)
    }

    /// Block size used when the backend has not reported one yet
    pub fn default_block_size(&self) -> u32 {
        match self {
            DeviceType::Optical => 2048,
            DeviceType::Ethernet => 0,
            DeviceType::Disk | DeviceType::Tape => 512,
        }
    }
}
