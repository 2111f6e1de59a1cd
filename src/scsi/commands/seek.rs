use packing::Packed;

use crate::scsi::commands::Control;

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SeekCommand {
    pub lba: u32,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
pub struct Seek6Command {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    #[pkd(4, 0, 1, 3)]
    pub lba: u32,

    #[pkd(7, 0, 5, 5)]
    pub control: Control,
}

impl From<Seek6Command> for SeekCommand {
    fn from(s: Seek6Command) -> Self {
        Self { lba: s.lba }
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
pub struct Seek10Command {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    #[pkd(7, 0, 2, 5)]
    pub lba: u32,

    #[pkd(7, 0, 9, 9)]
    pub control: Control,
}

impl From<Seek10Command> for SeekCommand {
    fn from(s: Seek10Command) -> Self {
        Self { lba: s.lba }
    }
}
