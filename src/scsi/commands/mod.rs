mod command;
mod control;
mod format;
mod inquiry;
mod mode_select;
mod mode_sense;
pub mod op_code;
mod prevent_allow_medium_removal;
mod read;
mod read_capacity;
mod read_defect_data;
mod read_toc;
mod report_luns;
mod request_sense;
mod scsilink;
mod seek;
mod send_diagnostic;
mod start_stop_unit;
mod synchronize_cache;
mod tape;
mod verify;
mod write;

pub use command::*;
pub use control::*;
pub use format::*;
pub use inquiry::*;
pub use mode_select::*;
pub use mode_sense::*;
pub use prevent_allow_medium_removal::*;
pub use read::*;
pub use read_capacity::*;
pub use read_defect_data::*;
pub use read_toc::*;
pub use report_luns::*;
pub use request_sense::*;
pub use scsilink::*;
pub use seek::*;
pub use send_diagnostic::*;
pub use start_stop_unit::*;
pub use synchronize_cache::*;
pub use tape::*;
pub use verify::*;
pub use write::*;

use packing::Packed;

use crate::scsi::Error;

/// CDB length class
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandLength {
    C6,
    C10,
    C12,
}

impl CommandLength {
    /// Length class from the opcode group (bits 7..5).
    ///
    /// Groups 1 and 2 are 10 bytes, group 5 is 12 bytes. Group 0 and the
    /// reserved/vendor groups 3, 4, 6 and 7 are read as 6 byte CDBs, which is
    /// what the Dayna, SASI and Apple vendor commands use.
    pub fn for_opcode(op_code: u8) -> Self {
        match op_code >> 5 {
            1 | 2 => CommandLength::C10,
            5 => CommandLength::C12,
            _ => CommandLength::C6,
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            CommandLength::C6 => 6,
            CommandLength::C10 => 10,
            CommandLength::C12 => 12,
        }
    }
}

/// Unpacks a CDB layout from `cdb`, refusing CDBs shorter than the layout
pub(crate) fn checked_extract<T>(cdb: &[u8]) -> Result<T, Error>
where
    T: Packed,
    Error: From<<T as Packed>::Error>,
{
    if cdb.len() < T::BYTES {
        Err(Error::InsufficientDataForCommand)?;
    }
    Ok(T::unpack(cdb)?)
}

#[test]
fn test_command_length_groups() {
    assert_eq!(CommandLength::for_opcode(0x00), CommandLength::C6);
    assert_eq!(CommandLength::for_opcode(0x1F), CommandLength::C6);
    assert_eq!(CommandLength::for_opcode(0x28), CommandLength::C10);
    assert_eq!(CommandLength::for_opcode(0x5A), CommandLength::C10);
    assert_eq!(CommandLength::for_opcode(0xA0), CommandLength::C12);
    assert_eq!(CommandLength::for_opcode(0x80), CommandLength::C6);
    assert_eq!(CommandLength::for_opcode(0xC2), CommandLength::C6);
    assert_eq!(CommandLength::for_opcode(0xEE), CommandLength::C6);
}
