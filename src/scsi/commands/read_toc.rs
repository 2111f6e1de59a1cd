use packing::Packed;

use crate::scsi::commands::Control;

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadTocCommand {
    /// Addresses as minute/second/frame instead of LBA
    pub msf: bool,
    pub format: u8,
    pub starting_track: u8,
    pub allocation_length: u16,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
pub struct ReadToc10Command {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    #[pkd(1, 1, 1, 1)]
    pub msf: bool,

    #[pkd(3, 0, 2, 2)]
    pub format: u8,

    #[pkd(7, 0, 6, 6)]
    pub starting_track: u8,

    #[pkd(7, 0, 7, 8)]
    pub allocation_length: u16,

    #[pkd(7, 0, 9, 9)]
    pub control: Control,
}

impl From<ReadToc10Command> for ReadTocCommand {
    fn from(r: ReadToc10Command) -> Self {
        Self {
            msf: r.msf,
            // older drivers put the format in the top bits of the control byte
            format: match r.format {
                0 => r.control.vendor_specific,
                f => f,
            },
            starting_track: r.starting_track,
            allocation_length: r.allocation_length,
        }
    }
}

#[test]
fn test_read_toc_format_from_control_byte() {
    let cmd: ReadTocCommand =
        ReadToc10Command::unpack(&[0x43, 0x02, 0, 0, 0, 0, 1, 0, 0x0C, 0x40])
            .unwrap()
            .into();
    assert!(cmd.msf);
    assert_eq!(cmd.format, 1);
    assert_eq!(cmd.starting_track, 1);
    assert_eq!(cmd.allocation_length, 12);
}
