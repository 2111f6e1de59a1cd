use packing::Packed;

use crate::scsi::commands::Control;

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadXCommand {
    pub lba: u32,
    /// Number of blocks
    pub transfer_length: u32,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
pub struct Read6Command {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    #[pkd(4, 0, 1, 3)]
    pub lba: u32,

    #[pkd(7, 0, 4, 4)]
    pub transfer_length: u8,

    #[pkd(7, 0, 5, 5)]
    pub control: Control,
}

impl From<Read6Command> for ReadXCommand {
    fn from(r: Read6Command) -> Self {
        Self {
            lba: r.lba,
            // zero means 256 blocks for the 6 byte form
            transfer_length: match r.transfer_length {
                0 => 256,
                n => n.into(),
            },
        }
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
pub struct Read10Command {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    #[pkd(4, 4, 1, 1)]
    pub dpo: bool,

    #[pkd(3, 3, 1, 1)]
    pub fua: bool,

    #[pkd(7, 0, 2, 5)]
    pub lba: u32,

    #[pkd(7, 0, 7, 8)]
    pub transfer_length: u16,

    #[pkd(7, 0, 9, 9)]
    pub control: Control,
}

impl From<Read10Command> for ReadXCommand {
    fn from(r: Read10Command) -> Self {
        Self {
            lba: r.lba,
            transfer_length: r.transfer_length.into(),
        }
    }
}

#[test]
fn test_read10_parse() {
    let data = [0x28, 0, 0, 0, 0x1E, 0x80, 0, 0, 0x8, 0];
    let cmd: ReadXCommand = Read10Command::unpack(&data).unwrap().into();
    assert_eq!(cmd.lba, 0x1E80);
    assert_eq!(cmd.transfer_length, 8);
}

#[test]
fn test_read6_zero_length_is_256() {
    let data = [0x08, 0xE1, 0x02, 0x03, 0, 0];
    let cmd: ReadXCommand = Read6Command::unpack(&data).unwrap().into();
    assert_eq!(cmd.lba, 0x01_0203);
    assert_eq!(cmd.transfer_length, 256);
}
