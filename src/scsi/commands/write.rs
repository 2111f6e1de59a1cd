use packing::Packed;

use crate::scsi::commands::Control;

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WriteXCommand {
    pub lba: u32,
    /// Number of blocks
    pub transfer_length: u32,
    /// WRITE AND VERIFY: read back after writing
    pub verify: bool,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
pub struct Write6Command {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    #[pkd(4, 0, 1, 3)]
    pub lba: u32,

    #[pkd(7, 0, 4, 4)]
    pub transfer_length: u8,

    #[pkd(7, 0, 5, 5)]
    pub control: Control,
}

impl From<Write6Command> for WriteXCommand {
    fn from(w: Write6Command) -> Self {
        Self {
            lba: w.lba,
            transfer_length: match w.transfer_length {
                0 => 256,
                n => n.into(),
            },
            verify: false,
        }
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
pub struct Write10Command {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    #[pkd(3, 3, 1, 1)]
    pub fua: bool,

    #[pkd(7, 0, 2, 5)]
    pub lba: u32,

    #[pkd(7, 0, 7, 8)]
    pub transfer_length: u16,

    #[pkd(7, 0, 9, 9)]
    pub control: Control,
}

impl From<Write10Command> for WriteXCommand {
    fn from(w: Write10Command) -> Self {
        Self {
            lba: w.lba,
            transfer_length: w.transfer_length.into(),
            verify: false,
        }
    }
}

/// WRITE AND VERIFY(10), same layout as WRITE(10) with BYTCHK in place of FUA
#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
pub struct WriteAndVerify10Command {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    #[pkd(1, 1, 1, 1)]
    pub byte_check: bool,

    #[pkd(7, 0, 2, 5)]
    pub lba: u32,

    #[pkd(7, 0, 7, 8)]
    pub transfer_length: u16,

    #[pkd(7, 0, 9, 9)]
    pub control: Control,
}

impl From<WriteAndVerify10Command> for WriteXCommand {
    fn from(w: WriteAndVerify10Command) -> Self {
        Self {
            lba: w.lba,
            transfer_length: w.transfer_length.into(),
            verify: true,
        }
    }
}

#[test]
fn test_write_and_verify_sets_verify() {
    let cmd: WriteXCommand =
        WriteAndVerify10Command::unpack(&[0x2E, 0x02, 0, 0, 0x01, 0x00, 0, 0, 0x04, 0])
            .unwrap()
            .into();
    assert_eq!(cmd.lba, 0x100);
    assert_eq!(cmd.transfer_length, 4);
    assert!(cmd.verify);
}
