use num_enum::TryFromPrimitive;
use packing::Packed;

/// PC field of MODE SENSE, bits 7..6 of CDB byte 2
#[repr(u8)]
#[derive(TryFromPrimitive, Packed, Clone, Copy, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PageControl {
    /// Current values
    #[default]
    CurrentValues = 0b00,
    /// Changeable values
    ChangeableValues = 0b01,
    /// Default values
    DefaultValues = 0b10,
    /// Saved values
    SavedValues = 0b11,
}
