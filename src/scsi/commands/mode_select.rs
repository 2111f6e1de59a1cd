use packing::Packed;

use crate::scsi::commands::{CommandLength, Control};

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeSelectXCommand {
    pub command_length: CommandLength,
    /// PF: parameters follow the page format
    pub page_format: bool,
    /// SP: save pages to non-volatile storage
    pub save_pages: bool,
    pub parameter_list_length: u16,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
pub struct ModeSelect6Command {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    #[pkd(4, 4, 1, 1)]
    pub page_format: bool,

    #[pkd(0, 0, 1, 1)]
    pub save_pages: bool,

    #[pkd(7, 0, 4, 4)]
    pub parameter_list_length: u8,

    #[pkd(7, 0, 5, 5)]
    pub control: Control,
}

impl From<ModeSelect6Command> for ModeSelectXCommand {
    fn from(m: ModeSelect6Command) -> Self {
        Self {
            command_length: CommandLength::C6,
            page_format: m.page_format,
            save_pages: m.save_pages,
            parameter_list_length: m.parameter_list_length.into(),
        }
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
pub struct ModeSelect10Command {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    #[pkd(4, 4, 1, 1)]
    pub page_format: bool,

    #[pkd(0, 0, 1, 1)]
    pub save_pages: bool,

    #[pkd(7, 0, 7, 8)]
    pub parameter_list_length: u16,

    #[pkd(7, 0, 9, 9)]
    pub control: Control,
}

impl From<ModeSelect10Command> for ModeSelectXCommand {
    fn from(m: ModeSelect10Command) -> Self {
        Self {
            command_length: CommandLength::C10,
            page_format: m.page_format,
            save_pages: m.save_pages,
            parameter_list_length: m.parameter_list_length,
        }
    }
}

#[test]
fn test_mode_select10_parse() {
    let cmd: ModeSelectXCommand =
        ModeSelect10Command::unpack(&[0x55, 0x11, 0, 0, 0, 0, 0, 0x01, 0x04, 0])
            .unwrap()
            .into();
    assert!(cmd.page_format);
    assert!(cmd.save_pages);
    assert_eq!(cmd.parameter_list_length, 0x104);
}
