use overlay_macro::overlay;

use crate::scsi::{enums::ResponseCode, sense::SenseRecord};

/// Fixed format sense data
#[overlay]
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct RequestSenseResponse {
    /// INFORMATION holds a meaningful value
    #[overlay(bytes=0..=0, bits=7..=7)]
    pub valid: bool,

    #[overlay(bytes=0..=0, bits=0..=6)]
    pub response_code: u8,

    #[overlay(bytes=2..=2, bits=7..=7)]
    pub filemark: bool,

    #[overlay(bytes=2..=2, bits=6..=6)]
    pub end_of_medium: bool,

    #[overlay(bytes=2..=2, bits=5..=5)]
    pub incorrect_length_indicator: bool,

    #[overlay(bytes=2..=2, bits=0..=3)]
    pub sense_key: u8,

    #[overlay(bytes=3..=6)]
    pub information: u32,

    /// n-7
    #[overlay(bytes=7..=7, bits=0..=7)]
    pub additional_sense_length: u8,

    #[overlay(bytes=8..=11)]
    pub command_specific_information: u32,

    #[overlay(bytes=12..=12, bits=0..=7)]
    pub additional_sense_code: u8,

    #[overlay(bytes=13..=13, bits=0..=7)]
    pub additional_sense_code_qualifier: u8,

    #[overlay(bytes=14..=14, bits=0..=7)]
    pub field_replaceable_unit_code: u8,

    #[overlay(bytes=15..=17)]
    pub sense_key_specific: [u8; 3],
}

impl RequestSenseResponse {
    /// Sent when the allocation length is zero (SCSI-1 / SASI hosts)
    pub const SHORT_BYTES: usize = 4;
}

impl From<SenseRecord> for RequestSenseResponse {
    fn from(sense: SenseRecord) -> Self {
        let mut response = Self::new();
        response.set_response_code(ResponseCode::default().into());
        response.set_sense_key(sense.key.into());
        if let Some(information) = sense.information {
            response.set_valid(true);
            response.set_information(information);
        }
        response.set_additional_sense_length(Self::BYTE_LEN as u8 - 8);
        response.set_additional_sense_code(sense.asc.asc());
        response.set_additional_sense_code_qualifier(sense.asc.ascq());
        response
    }
}

#[test]
fn test_request_sense_layout() {
    use crate::scsi::enums::{AdditionalSenseCode, SenseKey};

    let response = RequestSenseResponse::from(SenseRecord {
        key: SenseKey::IllegalRequest,
        asc: AdditionalSenseCode::InvalidLba,
        information: Some(0x0102_0304),
    });
    let bytes = response.as_bytes();
    assert_eq!(bytes.len(), 18);
    assert_eq!(bytes[0], 0xF0);
    assert_eq!(bytes[2], 0x05);
    assert_eq!(&bytes[3..7], &[1, 2, 3, 4]);
    assert_eq!(bytes[7], 10);
    assert_eq!(bytes[12], 0x21);
    assert_eq!(bytes[13], 0x00);
}
