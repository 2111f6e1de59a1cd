use packing::Packed;

use crate::scsi::commands::Control;

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReportLunsCommand {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    #[pkd(7, 0, 2, 2)]
    pub select_report: u8,

    #[pkd(7, 0, 6, 9)]
    pub allocation_length: u32,

    #[pkd(7, 0, 11, 11)]
    pub control: Control,
}
