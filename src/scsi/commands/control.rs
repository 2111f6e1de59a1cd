use packing::Packed;

/// This is the last byte on all commands
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default, Packed)]
#[packed(big_endian, lsb0)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Control {
    #[pkd(7, 6, 0, 0)]
    pub vendor_specific: u8,

    /// Request LINKED COMMAND COMPLETE (WITH FLAG) on success
    #[pkd(1, 1, 0, 0)]
    pub flag: bool,

    /// Another command follows in the same nexus
    #[pkd(0, 0, 0, 0)]
    pub link: bool,
}

impl Control {
    pub fn from_byte(byte: u8) -> Self {
        // every bit pattern is a valid control byte
        Self::unpack(&[byte]).unwrap_or_default()
    }
}

#[test]
fn test_control_bits() {
    let control = Control::from_byte(0b1100_0011);
    assert_eq!(control.vendor_specific, 0b11);
    assert!(control.flag);
    assert!(control.link);
    assert_eq!(Control::from_byte(0), Control::default());
}
