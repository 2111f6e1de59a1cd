use packing::Packed;

use crate::scsi::commands::Control;

#[derive(Clone, Copy, Eq, PartialEq, Default, Debug, Packed)]
#[packed(big_endian, lsb0)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InquiryCommand {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    /// If set, return vital data related to the page_code field
    #[pkd(0, 0, 1, 1)]
    pub enable_vital_product_data: bool,

    /// What kind of vital data to return
    #[pkd(7, 0, 2, 2)]
    pub page_code: u8,

    /// Byte 3 is reserved in SCSI-2 so this is effectively byte 4
    #[pkd(7, 0, 3, 4)]
    pub allocation_length: u16,

    #[pkd(7, 0, 5, 5)]
    pub control: Control,
}

/*
 if evpd
    return data related to page_code
    if unsupported(page_code)
        return CHECK_CONDITION and set SENSE:
            key: ILLEGAL_REQUEST
            additional code: INVALID_FIELD_IN_CDB

 if !evpd
    return standard inquiry data
    if page_code != 0
        return CHECK_CONDITION and set SENSE:
            key: ILLEGAL_REQUEST
            additional code: INVALID_FIELD_IN_CDB
*/

#[test]
fn test_inquiry() {
    let mut bytes = [0x12, 0, 0, 0, 36, 0];
    let mut cmd = InquiryCommand {
        op_code: 0x12,
        allocation_length: 36,
        ..Default::default()
    };
    assert_eq!(cmd, InquiryCommand::unpack(&bytes).unwrap());

    bytes[1] |= 0b00000001;
    bytes[2] = 0x80;
    cmd.enable_vital_product_data = true;
    cmd.page_code = 0x80;
    assert_eq!(cmd, InquiryCommand::unpack(&bytes).unwrap());

    bytes[5] = 0x01;
    cmd.control.link = true;
    assert_eq!(cmd, InquiryCommand::unpack(&bytes).unwrap());
}
