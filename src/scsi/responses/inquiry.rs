use overlay_macro::overlay;

use crate::config::Identification;
use crate::scsi::enums::{PeripheralDeviceType, ScsiVersion};

/// Standard INQUIRY data (SCSI-2, 36 bytes)
#[overlay]
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct InquiryResponse {
    /// 011b when no logical unit is present at this LUN
    #[overlay(bytes=0..=0, bits=5..=7)]
    pub peripheral_qualifier: u8,

    #[overlay(bytes=0..=0, bits=0..=4)]
    pub peripheral_device_type: u8,

    ///A removable medium ( RMB ) bit set to zero indicates that the medium is not removable. A RMB bit set to one indicates that the medium is removable.
    #[overlay(bytes=1..=1, bits=7..=7)]
    pub removable_medium: bool,

    ///The VERSION field indicates the implemented version of the standard
    #[overlay(bytes=2..=2, bits=0..=7)]
    pub version: u8,

    ///A RESPONSE DATA FORMAT field set to 2h indicates SCSI-2 format inquiry data
    #[overlay(bytes=3..=3, bits=0..=3)]
    pub response_data_format: u8,

    ///Set to total length in bytes minus 5
    #[overlay(bytes=4..=4, bits=0..=7)]
    pub additional_length: u8,

    ///Wide 16-bit transfers (WBUS16)
    #[overlay(bytes=7..=7, bits=5..=5)]
    pub wide_bus_16: bool,

    ///Synchronous transfers (SYNC)
    #[overlay(bytes=7..=7, bits=4..=4)]
    pub sync: bool,

    ///The CMDQUE bit indicates that the logical unit supports tagged command queuing
    #[overlay(bytes=7..=7, bits=1..=1)]
    pub command_queue: bool,

    #[overlay(bytes=8..=15)]
    pub vendor_identification: [u8; 8],

    #[overlay(bytes=16..=31)]
    pub product_identification: [u8; 16],

    #[overlay(bytes=32..=35)]
    pub product_revision_level: [u8; 4],
}

impl InquiryResponse {
    pub const MINIMUM_SIZE: usize = 36;

    /// Header fields shared by every response, identification left blank
    fn scsi2(peripheral: PeripheralDeviceType) -> Self {
        let peripheral: u8 = peripheral.into();
        let mut response = Self::new();
        response.set_peripheral_qualifier(peripheral >> 5);
        response.set_peripheral_device_type(peripheral & 0x1F);
        response.set_version(ScsiVersion::Scsi2.into());
        response.set_response_data_format(2);
        response.set_additional_length((Self::MINIMUM_SIZE - 5) as u8);
        response
    }

    pub fn for_unit(
        peripheral_device_type: PeripheralDeviceType,
        identification: &Identification,
    ) -> Self {
        let mut response = Self::scsi2(peripheral_device_type);
        response.set_vendor_identification(&identification.vendor);
        response.set_product_identification(&identification.product);
        response.set_product_revision_level(&identification.revision);
        response
    }

    /// Reply for a LUN with no unit behind it
    pub fn not_present() -> Self {
        Self::scsi2(PeripheralDeviceType::NotPresent)
    }
}

#[test]
fn test_inquiry_response_layout() {
    let ident = Identification::new("QUANTUM", "FIREBALL1", "1.0");
    let mut response = InquiryResponse::for_unit(PeripheralDeviceType::CdRom, &ident);
    response.set_removable_medium(true);
    response.set_command_queue(true);
    let bytes = response.as_bytes();
    assert_eq!(&bytes[..8], &[0x05, 0x80, 0x02, 0x02, 31, 0, 0, 0x02]);
    assert_eq!(&bytes[8..16], b"QUANTUM ");
    assert_eq!(&bytes[32..36], b"1.0 ");
}

#[test]
fn test_inquiry_not_present() {
    let response = InquiryResponse::not_present();
    assert_eq!(response.peripheral_qualifier(), 0b011);
    assert_eq!(response.as_bytes()[0], 0x7F);
    assert_eq!(&response.as_bytes()[8..16], &[0; 8]);
}
