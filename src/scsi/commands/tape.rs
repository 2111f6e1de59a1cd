//! Sequential access commands

use packing::Packed;

use crate::scsi::commands::Control;

/// READ(6) / WRITE(6) on a sequential access device
#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TapeTransferCommand {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    /// Suppress incorrect length indicator (READ only)
    #[pkd(1, 1, 1, 1)]
    pub sili: bool,

    /// `transfer_length` counts fixed size blocks instead of bytes
    #[pkd(0, 0, 1, 1)]
    pub fixed: bool,

    #[pkd(7, 0, 2, 4)]
    pub transfer_length: u32,

    #[pkd(7, 0, 5, 5)]
    pub control: Control,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WriteFilemarksCommand {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    #[pkd(7, 0, 2, 4)]
    pub count: u32,

    #[pkd(7, 0, 5, 5)]
    pub control: Control,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpaceCode {
    Blocks,
    Filemarks,
    EndOfData,
    Other(u8),
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpaceCommand {
    pub code: SpaceCode,
    /// Signed; negative counts move towards the beginning of the medium
    pub count: i32,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
pub struct Space6Command {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    #[pkd(2, 0, 1, 1)]
    pub code: u8,

    #[pkd(7, 0, 2, 4)]
    pub count: u32,

    #[pkd(7, 0, 5, 5)]
    pub control: Control,
}

impl From<Space6Command> for SpaceCommand {
    fn from(s: Space6Command) -> Self {
        Self {
            code: match s.code {
                0 => SpaceCode::Blocks,
                1 => SpaceCode::Filemarks,
                3 => SpaceCode::EndOfData,
                c => SpaceCode::Other(c),
            },
            // sign extend the 24 bit count
            count: ((s.count << 8) as i32) >> 8,
        }
    }
}

#[test]
fn test_space_negative_count() {
    let cmd: SpaceCommand = Space6Command::unpack(&[0x11, 0x00, 0xFF, 0xFF, 0xFE, 0])
        .unwrap()
        .into();
    assert_eq!(cmd.code, SpaceCode::Blocks);
    assert_eq!(cmd.count, -2);
}

#[test]
fn test_tape_transfer_fixed() {
    let cmd = TapeTransferCommand::unpack(&[0x08, 0x01, 0x00, 0x00, 0x04, 0]).unwrap();
    assert!(cmd.fixed);
    assert!(!cmd.sili);
    assert_eq!(cmd.transfer_length, 4);
}
