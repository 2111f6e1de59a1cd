use packing::Packed;

use crate::scsi::commands::Control;

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadDefectDataCommand {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    /// PLIST / GLIST bits and the requested defect list format
    #[pkd(7, 0, 2, 2)]
    pub format: u8,

    #[pkd(7, 0, 7, 8)]
    pub allocation_length: u16,

    #[pkd(7, 0, 9, 9)]
    pub control: Control,
}
