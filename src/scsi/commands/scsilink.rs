//! Dayna SCSI/Link Ethernet adapter vendor commands

use packing::Packed;

use crate::scsi::commands::{op_code, Control};

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScsiLinkCommand {
    /// READ(6): return one received frame behind a 6 byte header
    Receive { allocation_length: u16 },
    /// WRITE(6): transmit one frame
    Send { length: u16 },
    /// Return the adapter statistics block
    Stats { allocation_length: u8 },
    /// Set the multicast filter (parameter bytes are consumed and ignored)
    Set { parameter_length: u8 },
    Enable { enable: bool },
    /// Replace the station address
    SetMac { parameter_length: u8 },
    SetMode { parameter_length: u8 },
}

/// Shared 6 byte layout of the adapter commands
#[derive(Clone, Copy, Eq, PartialEq, Debug, Packed)]
#[packed(big_endian, lsb0)]
pub struct ScsiLink6Command {
    #[pkd(7, 0, 0, 0)]
    pub op_code: u8,

    #[pkd(7, 0, 3, 4)]
    pub length: u16,

    #[pkd(7, 0, 5, 5)]
    pub control: Control,
}

impl From<ScsiLink6Command> for ScsiLinkCommand {
    fn from(c: ScsiLink6Command) -> Self {
        let short = (c.length & 0xFF) as u8;
        match c.op_code {
            op_code::SCSILINK_RECEIVE => ScsiLinkCommand::Receive {
                allocation_length: c.length,
            },
            op_code::SCSILINK_SEND => ScsiLinkCommand::Send { length: c.length },
            op_code::SCSILINK_STATS => ScsiLinkCommand::Stats {
                allocation_length: short,
            },
            // the enable flag is bit 7 of the control byte
            op_code::SCSILINK_ENABLE => ScsiLinkCommand::Enable {
                enable: c.control.vendor_specific & 0b10 != 0,
            },
            op_code::SCSILINK_SETMAC => ScsiLinkCommand::SetMac {
                parameter_length: short,
            },
            op_code::SCSILINK_SETMODE => ScsiLinkCommand::SetMode {
                parameter_length: short,
            },
            _ => ScsiLinkCommand::Set {
                parameter_length: short,
            },
        }
    }
}

#[test]
fn test_scsilink_enable_and_receive() {
    let cmd: ScsiLinkCommand =
        ScsiLink6Command::unpack(&[op_code::SCSILINK_ENABLE, 0, 0, 0, 0, 0x80])
            .unwrap()
            .into();
    assert_eq!(cmd, ScsiLinkCommand::Enable { enable: true });

    let cmd: ScsiLinkCommand =
        ScsiLink6Command::unpack(&[op_code::SCSILINK_RECEIVE, 0, 0, 0x05, 0xF4, 0])
            .unwrap()
            .into();
    assert_eq!(
        cmd,
        ScsiLinkCommand::Receive {
            allocation_length: 0x5F4
        }
    );
}
