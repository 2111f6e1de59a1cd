use num_enum::{IntoPrimitive, TryFromPrimitive};

/// VERSION field of the standard INQUIRY data
#[repr(u8)]
#[derive(TryFromPrimitive, IntoPrimitive, Clone, Copy, Eq, PartialEq, Debug, Default)]
pub enum ScsiVersion {
    //The device does not claim conformance to any standard.
    None = 0x00,
    //SCSI-1 (ANSI X3.131-1986)
    Scsi1 = 0x01,
    //SCSI-2 (ANSI X3.131-1994)
    #[default]
    Scsi2 = 0x02,
}
