use num_enum::{IntoPrimitive, TryFromPrimitive};

#[repr(u8)]
#[derive(TryFromPrimitive, IntoPrimitive, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PageCode {
    VendorSpecific = 0x00,
    RwErrorRecovery = 0x01,
    DisconnectReconnect = 0x02,
    FormatParameters = 0x03,
    RigidGeometry = 0x04,
    Caching = 0x08,
    Apple = 0x30,
    AllPages = 0x3F,
}

impl PageCode {
    /// Page code as it appears in byte 0 of a page, with the PS bit masked off
    pub fn from_page_byte(byte: u8) -> Option<Self> {
        Self::try_from(byte & 0x3F).ok()
    }
}
