use packing::Packed;

use crate::scsi::{
    commands::{CommandLength, Control},
    enums::PageControl,
};

/* After a logical unit reset, the device server shall respond in the following manner:
a) if default values are requested, report the default values;
b) if saved values are requested, report valid restored mode parameters, or restore the mode parameters and
report them. If saved parameters are not implemented, respond as defined in 6.11.5; or
c) if current values are requested and the current values have been sent by the application client via a MODE
SELECT command, the current values shall be returned. If the current values have not been sent, the
device server shall return the default values.
*/

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeSenseXCommand {
    pub command_length: CommandLength,
    pub disable_block_descriptors: bool,
    pub page_control: PageControl,
    /// 0x3F requests every page
    pub page_code: u8,
    pub allocation_length: u16,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
pub struct ModeSense6Command {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    #[pkd(3, 3, 1, 1)]
    pub disable_block_descriptors: bool,

    #[pkd(7, 6, 2, 2)]
    pub page_control: PageControl,

    #[pkd(5, 0, 2, 2)]
    pub page_code: u8,

    #[pkd(7, 0, 4, 4)]
    pub allocation_length: u8,

    #[pkd(7, 0, 5, 5)]
    pub control: Control,
}

impl From<ModeSense6Command> for ModeSenseXCommand {
    fn from(m: ModeSense6Command) -> Self {
        Self {
            command_length: CommandLength::C6,
            disable_block_descriptors: m.disable_block_descriptors,
            page_control: m.page_control,
            page_code: m.page_code,
            allocation_length: m.allocation_length.into(),
        }
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
pub struct ModeSense10Command {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    #[pkd(3, 3, 1, 1)]
    pub disable_block_descriptors: bool,

    #[pkd(7, 6, 2, 2)]
    pub page_control: PageControl,

    #[pkd(5, 0, 2, 2)]
    pub page_code: u8,

    #[pkd(7, 0, 7, 8)]
    pub allocation_length: u16,

    #[pkd(7, 0, 9, 9)]
    pub control: Control,
}

impl From<ModeSense10Command> for ModeSenseXCommand {
    fn from(m: ModeSense10Command) -> Self {
        Self {
            command_length: CommandLength::C10,
            disable_block_descriptors: m.disable_block_descriptors,
            page_control: m.page_control,
            page_code: m.page_code,
            allocation_length: m.allocation_length,
        }
    }
}

#[test]
fn test_mode_sense6_fields() {
    let cmd: ModeSenseXCommand = ModeSense6Command::unpack(&[0x1A, 0x08, 0x7F, 0, 0xFF, 0])
        .unwrap()
        .into();
    assert!(cmd.disable_block_descriptors);
    assert_eq!(cmd.page_control, PageControl::ChangeableValues);
    assert_eq!(cmd.page_code, 0x3F);
    assert_eq!(cmd.allocation_length, 0xFF);
}

#[test]
fn test_mode_sense10_fields() {
    let cmd: ModeSenseXCommand =
        ModeSense10Command::unpack(&[0x5A, 0, 0xC1, 0, 0, 0, 0, 0x02, 0x00, 0])
            .unwrap()
            .into();
    assert!(!cmd.disable_block_descriptors);
    assert_eq!(cmd.page_control, PageControl::SavedValues);
    assert_eq!(cmd.page_code, 0x01);
    assert_eq!(cmd.allocation_length, 0x200);
}
