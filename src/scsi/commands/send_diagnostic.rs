use packing::Packed;

use crate::scsi::commands::Control;

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SendDiagnosticCommand {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    #[pkd(2, 2, 1, 1)]
    pub self_test: bool,

    #[pkd(7, 0, 3, 4)]
    pub parameter_list_length: u16,

    #[pkd(7, 0, 5, 5)]
    pub control: Control,
}
