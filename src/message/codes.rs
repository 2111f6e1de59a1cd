//! SCSI message codes

pub const COMMAND_COMPLETE: u8 = 0x00;
pub const EXTENDED_MESSAGE: u8 = 0x01;
pub const SAVE_POINTERS: u8 = 0x02;
pub const RESTORE_POINTERS: u8 = 0x03;
pub const DISCONNECT: u8 = 0x04;
pub const INITIATOR_ERROR: u8 = 0x05;
pub const ABORT_TASK_SET: u8 = 0x06;
pub const MESSAGE_REJECT: u8 = 0x07;
pub const NOP: u8 = 0x08;
pub const MSG_PARITY_ERROR: u8 = 0x09;
pub const LINKED_CMD_COMPLETE: u8 = 0x0A;
pub const LINKED_FLG_CMD_COMPLETE: u8 = 0x0B;
pub const TARGET_RESET: u8 = 0x0C;
pub const ABORT_TASK: u8 = 0x0D;
pub const CLEAR_TASK_SET: u8 = 0x0E;
pub const INITIATE_RECOVERY: u8 = 0x0F;
pub const RELEASE_RECOVERY: u8 = 0x10;
pub const CLEAR_ACA: u8 = 0x16;
pub const LOGICAL_UNIT_RESET: u8 = 0x17;
pub const SIMPLE_QUEUE_TAG: u8 = 0x20;
pub const HEAD_OF_QUEUE_TAG: u8 = 0x21;
pub const ORDERED_QUEUE_TAG: u8 = 0x22;
pub const IGNORE_WIDE_RESIDUE: u8 = 0x23;
pub const ACA: u8 = 0x24;
pub const QAS_REQUEST: u8 = 0x55;
pub const IDENTIFY: u8 = 0x80;

/* Extended message codes, second byte after the length */
pub const EXTENDED_MODIFY_DATA_POINTER: u8 = 0x00;
pub const EXTENDED_SDTR: u8 = 0x01;
/// SCSI-1 only
pub const EXTENDED_EXTENDED_IDENTIFY: u8 = 0x02;
pub const EXTENDED_WDTR: u8 = 0x03;
pub const EXTENDED_PPR: u8 = 0x04;
pub const EXTENDED_MODIFY_BIDI_DATA_PTR: u8 = 0x05;

/// IDENTIFY: initiator grants disconnect privilege
pub const IDENTIFY_DISCONNECT_PRIVILEGE: u8 = 0x40;
/// IDENTIFY: LUN field
pub const IDENTIFY_LUN_MASK: u8 = 0x07;
