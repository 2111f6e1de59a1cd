use packing::Packed;

use crate::scsi::commands::Control;

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadCapacity10Command {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    #[pkd(7, 0, 2, 5)]
    pub lba: u32,

    /// Partial medium indicator
    #[pkd(0, 0, 8, 8)]
    pub pmi: bool,

    #[pkd(7, 0, 9, 9)]
    pub control: Control,
}
