use packing::Packed;

use crate::scsi::commands::Control;

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FormatCommand {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    /// A parameter list (defect list header) follows in DATA_OUT
    #[pkd(4, 4, 1, 1)]
    pub format_data: bool,

    #[pkd(3, 3, 1, 1)]
    pub complete_list: bool,

    #[pkd(2, 0, 1, 1)]
    pub defect_list_format: u8,

    #[pkd(7, 0, 5, 5)]
    pub control: Control,
}
