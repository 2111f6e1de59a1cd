use packing::Packed;

use crate::scsi::commands::Control;

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Verify10Command {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    /// Compare against data sent by the initiator instead of a medium check
    #[pkd(1, 1, 1, 1)]
    pub byte_check: bool,

    #[pkd(7, 0, 2, 5)]
    pub lba: u32,

    #[pkd(7, 0, 7, 8)]
    pub verification_length: u16,

    #[pkd(7, 0, 9, 9)]
    pub control: Control,
}
