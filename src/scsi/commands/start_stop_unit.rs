use packing::Packed;

use crate::scsi::commands::Control;

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StartStopUnitCommand {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    #[pkd(0, 0, 1, 1)]
    pub immediate: bool,

    /// With `start` clear: eject, with `start` set: load
    #[pkd(1, 1, 4, 4)]
    pub load_eject: bool,

    #[pkd(0, 0, 4, 4)]
    pub start: bool,

    #[pkd(7, 0, 5, 5)]
    pub control: Control,
}

#[test]
fn test_start_stop_eject() {
    let cmd = StartStopUnitCommand::unpack(&[0x1B, 0x01, 0, 0, 0x02, 0]).unwrap();
    assert!(cmd.immediate);
    assert!(cmd.load_eject);
    assert!(!cmd.start);
}
