use overlay_macro::overlay;

use crate::scsi::commands::CommandLength;

#[overlay]
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct ModeParameterHeader6 {
    /// Excludes itself
    #[overlay(bytes=0..=0, bits=0..=7)]
    pub mode_data_length: u8,

    #[overlay(bytes=1..=1, bits=0..=7)]
    pub medium_type: u8,

    #[overlay(bytes=2..=2, bits=7..=7)]
    pub write_protected: bool,

    #[overlay(bytes=3..=3, bits=0..=7)]
    pub block_descriptor_length: u8,
}

#[overlay]
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct ModeParameterHeader10 {
    /// Excludes itself
    #[overlay(bytes=0..=1)]
    pub mode_data_length: u16,

    #[overlay(bytes=2..=2, bits=0..=7)]
    pub medium_type: u8,

    #[overlay(bytes=3..=3, bits=7..=7)]
    pub write_protected: bool,

    #[overlay(bytes=6..=7)]
    pub block_descriptor_length: u16,
}

/// Short block descriptor
#[overlay]
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct BlockDescriptor {
    #[overlay(bytes=0..=0, bits=0..=7)]
    pub density_code: u8,

    #[overlay(bytes=1..=3)]
    pub number_of_blocks: u32,

    #[overlay(bytes=5..=7)]
    pub block_length: u32,
}

/// Header plus optional block descriptor in front of MODE SENSE pages
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct ModeParameterHeader {
    pub command_length: CommandLength,
    pub medium_type: u8,
    /// WP bit of the device specific parameter
    pub write_protected: bool,
    /// Block count and block length for the short block descriptor
    pub block_descriptor: Option<(u32, u32)>,
}

impl ModeParameterHeader {
    pub fn header_len(&self) -> usize {
        match self.command_length {
            CommandLength::C6 => ModeParameterHeader6::BYTE_LEN,
            _ => ModeParameterHeader10::BYTE_LEN,
        }
    }

    /// Bytes in front of the first page
    pub fn len(&self) -> usize {
        self.header_len()
            + match self.block_descriptor {
                Some(_) => BlockDescriptor::BYTE_LEN,
                None => 0,
            }
    }

    /// Writes header and block descriptor to `buf`. `total_len` is the full
    /// response length, pages included
    pub fn write(&self, buf: &mut [u8], total_len: usize) {
        let descriptor_len = self.len() - self.header_len();
        let header_len = self.header_len();
        match self.command_length {
            CommandLength::C6 => {
                let mut header = ModeParameterHeader6::new();
                header.set_mode_data_length((total_len - 1).min(0xFF) as u8);
                header.set_medium_type(self.medium_type);
                header.set_write_protected(self.write_protected);
                header.set_block_descriptor_length(descriptor_len as u8);
                buf[..header_len].copy_from_slice(header.as_bytes());
            }
            _ => {
                let mut header = ModeParameterHeader10::new();
                header.set_mode_data_length((total_len - 2).min(0xFFFF) as u16);
                header.set_medium_type(self.medium_type);
                header.set_write_protected(self.write_protected);
                header.set_block_descriptor_length(descriptor_len as u16);
                buf[..header_len].copy_from_slice(header.as_bytes());
            }
        }
        if let Some((blocks, block_length)) = self.block_descriptor {
            let mut descriptor = BlockDescriptor::new();
            descriptor.set_number_of_blocks(blocks.min(0xFF_FFFF));
            descriptor.set_block_length(block_length & 0xFF_FFFF);
            buf[header_len..header_len + BlockDescriptor::BYTE_LEN]
                .copy_from_slice(descriptor.as_bytes());
        }
    }
}

#[test]
fn test_mode_parameter_header6() {
    let header = ModeParameterHeader {
        command_length: CommandLength::C6,
        medium_type: 0,
        write_protected: true,
        block_descriptor: Some((0x1000, 512)),
    };
    let mut buf = [0u8; 12];
    header.write(&mut buf, 12);
    assert_eq!(buf, [11, 0, 0x80, 8, 0, 0, 0x10, 0, 0, 0, 0x02, 0]);
}

#[test]
fn test_mode_parameter_header10_without_descriptor() {
    let header = ModeParameterHeader {
        command_length: CommandLength::C10,
        medium_type: 0,
        write_protected: false,
        block_descriptor: None,
    };
    let mut buf = [0u8; 8];
    header.write(&mut buf, 0x20);
    assert_eq!(buf, [0, 0x1E, 0, 0, 0, 0, 0, 0]);
}
