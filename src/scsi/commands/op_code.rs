//! Operation codes. Some values are reused by different device classes.

/* 6 byte commands */
pub const TEST_UNIT_READY: u8 = 0x00;
pub const REZERO_UNIT: u8 = 0x01;
/// Sequential access devices
pub const REWIND: u8 = 0x01;
pub const REQUEST_SENSE: u8 = 0x03;
pub const FORMAT_UNIT: u8 = 0x04;
pub const READ_BLOCK_LIMITS: u8 = 0x05;
pub const FORMAT_UNIT_ALT: u8 = 0x06;
pub const REASSIGN_BLOCKS: u8 = 0x07;
pub const READ6: u8 = 0x08;
pub const WRITE6: u8 = 0x0A;
pub const SEEK6: u8 = 0x0B;
pub const WRITE_FILEMARKS: u8 = 0x10;
pub const SPACE: u8 = 0x11;
pub const INQUIRY: u8 = 0x12;
pub const MODE_SELECT6: u8 = 0x15;
pub const RESERVE6: u8 = 0x16;
pub const RELEASE6: u8 = 0x17;
pub const ERASE: u8 = 0x19;
pub const MODE_SENSE6: u8 = 0x1A;
pub const START_STOP_UNIT: u8 = 0x1B;
pub const SEND_DIAGNOSTIC: u8 = 0x1D;
pub const PREVENT_REMOVAL: u8 = 0x1E;

/* 10 byte commands */
pub const READ_CAPACITY10: u8 = 0x25;
pub const READ10: u8 = 0x28;
pub const WRITE10: u8 = 0x2A;
pub const SEEK10: u8 = 0x2B;
pub const WRITE_AND_VERIFY10: u8 = 0x2E;
pub const VERIFY10: u8 = 0x2F;
pub const SYNCHRONIZE_CACHE10: u8 = 0x35;
pub const READ_DEFECT_DATA: u8 = 0x37;
pub const READ_TOC: u8 = 0x43;
pub const MODE_SELECT10: u8 = 0x55;
pub const RESERVE10: u8 = 0x56;
pub const RELEASE10: u8 = 0x57;
pub const MODE_SENSE10: u8 = 0x5A;

/* 12 byte commands */
pub const REPORT_LUNS: u8 = 0xA0;

/* Vendor specific */
/// SASI (Sharp X68000)
pub const SET_DRIVE_PARAMETER: u8 = 0xC2;
/// Issued by Apple drivers, purpose unknown
pub const MAC_UNKNOWN: u8 = 0xEE;

/* Dayna SCSI/Link Ethernet */
pub const SCSILINK_RECEIVE: u8 = 0x08;
pub const SCSILINK_STATS: u8 = 0x09;
pub const SCSILINK_SEND: u8 = 0x0A;
pub const SCSILINK_SET: u8 = 0x0C;
pub const SCSILINK_ENABLE: u8 = 0x0E;
pub const SCSILINK_SETMAC: u8 = 0x40;
pub const SCSILINK_SETMODE: u8 = 0x80;
