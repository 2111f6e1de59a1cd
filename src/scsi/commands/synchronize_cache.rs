use packing::Packed;

use crate::scsi::commands::Control;

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SynchronizeCache10Command {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    #[pkd(1, 1, 1, 1)]
    pub immediate: bool,

    #[pkd(7, 0, 2, 5)]
    pub lba: u32,

    #[pkd(7, 0, 7, 8)]
    pub number_of_blocks: u16,

    #[pkd(7, 0, 9, 9)]
    pub control: Control,
}
