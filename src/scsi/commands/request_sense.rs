use packing::Packed;

use crate::scsi::commands::Control;

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RequestSenseCommand {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    /// Zero asks for the 4 byte SCSI-1 sense format
    #[pkd(7, 0, 4, 4)]
    pub allocation_length: u8,

    #[pkd(7, 0, 5, 5)]
    pub control: Control,
}
