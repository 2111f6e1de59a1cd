//! Message system: parsing and encoding of SCSI messages, and transfer
//! agreement negotiation.

use heapless::Vec;

use crate::bus::{receive, Bus, BusError};
use crate::scsi::queue::TaskAttribute;

pub mod codes;
mod negotiator;

pub use negotiator::*;

use codes::*;

/// Longest extended message kept; longer ones are read and rejected
const MAX_EXTENDED_LEN: usize = 6;

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Message {
    CommandComplete,
    SavePointers,
    RestorePointers,
    Disconnect,
    InitiatorError,
    AbortTaskSet,
    MessageReject,
    Nop,
    MessageParityError,
    LinkedCommandComplete,
    LinkedFlagCommandComplete,
    TargetReset,
    AbortTask,
    ClearTaskSet,
    LogicalUnitReset,
    Identify { disconnect_privilege: bool, lun: u8 },
    QueueTag { attribute: TaskAttribute, tag: u8 },
    IgnoreWideResidue(u8),
    Sdtr { period: u8, offset: u8 },
    Wdtr { width: u8 },
    Ppr { period: u8, offset: u8, width: u8, options: u8 },
    /// Anything this target does not implement
    Unsupported(u8),
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageError {
    /// Fewer bytes than the message format needs
    Truncated,
    /// Extended message with a length that does not match its code
    Malformed,
}

impl Message {
    /// Total length of the message starting with `first`, given the bytes
    /// seen so far. `None` while the length byte of an extended message is
    /// still missing
    pub fn expected_len(bytes: &[u8]) -> Option<usize> {
        match *bytes.first()? {
            EXTENDED_MESSAGE => bytes.get(1).map(|len| 2 + *len as usize),
            0x20..=0x2F => Some(2),
            _ => Some(1),
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Message, MessageError> {
        let first = *bytes.first().ok_or(MessageError::Truncated)?;
        let len = Self::expected_len(bytes).ok_or(MessageError::Truncated)?;
        if bytes.len() < len {
            return Err(MessageError::Truncated);
        }
        if first & IDENTIFY != 0 {
            return Ok(Message::Identify {
                disconnect_privilege: first & IDENTIFY_DISCONNECT_PRIVILEGE != 0,
                lun: first & IDENTIFY_LUN_MASK,
            });
        }
        Ok(match first {
            COMMAND_COMPLETE => Message::CommandComplete,
            EXTENDED_MESSAGE => return Self::parse_extended(&bytes[2..len]),
            SAVE_POINTERS => Message::SavePointers,
            RESTORE_POINTERS => Message::RestorePointers,
            DISCONNECT => Message::Disconnect,
            INITIATOR_ERROR => Message::InitiatorError,
            ABORT_TASK_SET => Message::AbortTaskSet,
            MESSAGE_REJECT => Message::MessageReject,
            NOP => Message::Nop,
            MSG_PARITY_ERROR => Message::MessageParityError,
            LINKED_CMD_COMPLETE => Message::LinkedCommandComplete,
            LINKED_FLG_CMD_COMPLETE => Message::LinkedFlagCommandComplete,
            TARGET_RESET => Message::TargetReset,
            ABORT_TASK => Message::AbortTask,
            CLEAR_TASK_SET => Message::ClearTaskSet,
            LOGICAL_UNIT_RESET => Message::LogicalUnitReset,
            SIMPLE_QUEUE_TAG => Message::QueueTag {
                attribute: TaskAttribute::Simple,
                tag: bytes[1],
            },
            HEAD_OF_QUEUE_TAG => Message::QueueTag {
                attribute: TaskAttribute::HeadOfQueue,
                tag: bytes[1],
            },
            ORDERED_QUEUE_TAG => Message::QueueTag {
                attribute: TaskAttribute::Ordered,
                tag: bytes[1],
            },
            IGNORE_WIDE_RESIDUE => Message::IgnoreWideResidue(bytes[1]),
            other => Message::Unsupported(other),
        })
    }

    fn parse_extended(body: &[u8]) -> Result<Message, MessageError> {
        match body {
            [EXTENDED_SDTR, period, offset] => Ok(Message::Sdtr {
                period: *period,
                offset: *offset,
            }),
            [EXTENDED_WDTR, width] => Ok(Message::Wdtr { width: *width }),
            [EXTENDED_PPR, period, _, offset, width, options] => Ok(Message::Ppr {
                period: *period,
                offset: *offset,
                width: *width,
                options: *options,
            }),
            [EXTENDED_SDTR, ..] | [EXTENDED_WDTR, ..] | [EXTENDED_PPR, ..] | [] => {
                Err(MessageError::Malformed)
            }
            [code, ..] => Ok(Message::Unsupported(*code)),
        }
    }

    pub fn encode(&self) -> Vec<u8, 8> {
        let mut out = Vec::new();
        let bytes: &[u8] = match *self {
            Message::CommandComplete => &[COMMAND_COMPLETE],
            Message::SavePointers => &[SAVE_POINTERS],
            Message::RestorePointers => &[RESTORE_POINTERS],
            Message::Disconnect => &[DISCONNECT],
            Message::InitiatorError => &[INITIATOR_ERROR],
            Message::AbortTaskSet => &[ABORT_TASK_SET],
            Message::MessageReject => &[MESSAGE_REJECT],
            Message::Nop => &[NOP],
            Message::MessageParityError => &[MSG_PARITY_ERROR],
            Message::LinkedCommandComplete => &[LINKED_CMD_COMPLETE],
            Message::LinkedFlagCommandComplete => &[LINKED_FLG_CMD_COMPLETE],
            Message::TargetReset => &[TARGET_RESET],
            Message::AbortTask => &[ABORT_TASK],
            Message::ClearTaskSet => &[CLEAR_TASK_SET],
            Message::LogicalUnitReset => &[LOGICAL_UNIT_RESET],
            Message::Identify {
                disconnect_privilege,
                lun,
            } => {
                let mut identify = IDENTIFY | (lun & IDENTIFY_LUN_MASK);
                if disconnect_privilege {
                    identify |= IDENTIFY_DISCONNECT_PRIVILEGE;
                }
                let _ = out.push(identify);
                return out;
            }
            Message::QueueTag { attribute, tag } => {
                let code = match attribute {
                    TaskAttribute::Simple => SIMPLE_QUEUE_TAG,
                    TaskAttribute::HeadOfQueue => HEAD_OF_QUEUE_TAG,
                    TaskAttribute::Ordered => ORDERED_QUEUE_TAG,
                };
                let _ = out.extend_from_slice(&[code, tag]);
                return out;
            }
            Message::IgnoreWideResidue(n) => {
                let _ = out.extend_from_slice(&[IGNORE_WIDE_RESIDUE, n]);
                return out;
            }
            Message::Sdtr { period, offset } => {
                let _ = out.extend_from_slice(&[EXTENDED_MESSAGE, 3, EXTENDED_SDTR, period, offset]);
                return out;
            }
            Message::Wdtr { width } => {
                let _ = out.extend_from_slice(&[EXTENDED_MESSAGE, 2, EXTENDED_WDTR, width]);
                return out;
            }
            Message::Ppr {
                period,
                offset,
                width,
                options,
            } => {
                let _ = out.extend_from_slice(&[
                    EXTENDED_MESSAGE,
                    6,
                    EXTENDED_PPR,
                    period,
                    0,
                    offset,
                    width,
                    options,
                ]);
                return out;
            }
            Message::Unsupported(code) => {
                let _ = out.push(code);
                return out;
            }
        };
        let _ = out.extend_from_slice(bytes);
        out
    }
}

/// Reads one message during MESSAGE OUT.
///
/// Malformed or oversized messages come back as `Ok(Err(..))` so the caller
/// can answer them with MESSAGE REJECT; bus failures are the outer error.
pub async fn read_message<B: Bus>(bus: &mut B) -> Result<Result<Message, MessageError>, BusError> {
    let mut bytes = [0u8; 2 + MAX_EXTENDED_LEN];
    receive(bus, &mut bytes[..1]).await?;
    let mut have = 1;
    loop {
        let len = match Message::expected_len(&bytes[..have]) {
            Some(len) => len,
            None => {
                receive(bus, &mut bytes[1..2]).await?;
                have = 2;
                continue;
            }
        };
        if len > bytes.len() {
            // consume the rest so the initiator can move on
            let mut rest = len - have;
            let mut scratch = [0u8; 8];
            while rest > 0 {
                let n = rest.min(scratch.len());
                receive(bus, &mut scratch[..n]).await?;
                rest -= n;
            }
            return Ok(Err(MessageError::Malformed));
        }
        receive(bus, &mut bytes[have..len]).await?;
        return Ok(Message::parse(&bytes[..len]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identify_and_tags() {
        assert_eq!(
            Message::parse(&[0xC1]),
            Ok(Message::Identify {
                disconnect_privilege: true,
                lun: 1
            })
        );
        assert_eq!(
            Message::parse(&[0x22, 9]),
            Ok(Message::QueueTag {
                attribute: TaskAttribute::Ordered,
                tag: 9
            })
        );
        assert_eq!(Message::parse(&[0x20]), Err(MessageError::Truncated));
    }

    #[test]
    fn test_parse_extended() {
        assert_eq!(
            Message::parse(&[0x01, 3, 0x01, 25, 15]),
            Ok(Message::Sdtr {
                period: 25,
                offset: 15
            })
        );
        assert_eq!(
            Message::parse(&[0x01, 2, 0x03, 1]),
            Ok(Message::Wdtr { width: 1 })
        );
        assert_eq!(
            Message::parse(&[0x01, 2, 0x01, 25]),
            Err(MessageError::Malformed)
        );
        assert_eq!(
            Message::parse(&[0x01, 5, 0x00, 0, 0, 0, 1]),
            Ok(Message::Unsupported(0x00))
        );
    }

    #[test]
    fn test_encode() {
        assert_eq!(
            Message::Sdtr {
                period: 50,
                offset: 8
            }
            .encode()
            .as_slice(),
            &[0x01, 3, 0x01, 50, 8]
        );
        assert_eq!(
            Message::Identify {
                disconnect_privilege: true,
                lun: 2
            }
            .encode()
            .as_slice(),
            &[0xC2]
        );
    }

    #[test]
    fn test_read_message_from_bus() {
        use crate::bus::{mock::MockBus, BusPhase};

        let mut bus = MockBus::new();
        bus.load(&[0x01, 3, 0x01, 25, 15, 0x01, 9, 0, 0, 0, 0, 0, 0, 0, 0, 0], &[], &[]);
        bus.phase = Some(BusPhase::MessageOut);
        embassy_futures::block_on(async {
            assert_eq!(
                read_message(&mut bus).await,
                Ok(Ok(Message::Sdtr {
                    period: 25,
                    offset: 15
                }))
            );
            assert_eq!(
                read_message(&mut bus).await,
                Ok(Err(MessageError::Malformed))
            );
            assert!(bus.message_out.is_empty());
            assert_eq!(read_message(&mut bus).await, Err(BusError::Timeout));
        });
    }
}
