use crate::bus::{BusPhase, Direction};
use crate::scsi::commands::CommandLength;
use crate::scsi::enums::Status;
use crate::scsi::queue::TaskAttribute;

/// Longest CDB accepted (group 5)
pub const MAX_CDB_LEN: usize = 12;

/// One initiator-target nexus, from SELECTION (or RESELECTION) to BUS FREE
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transaction {
    pub initiator: u8,
    pub target: u8,
    pub lun: u8,
    /// LUN came from IDENTIFY rather than CDB byte 1
    pub identified: bool,
    pub disconnect_privilege: bool,
    pub tag: Option<(TaskAttribute, u8)>,
    /// Running a task picked up from the queue after reselection
    pub queued: bool,
    cdb: [u8; MAX_CDB_LEN],
    cdb_len: u8,
    pub command_length: CommandLength,
    pub direction: Option<Direction>,
    pub transferred: usize,
    pub phase: BusPhase,
    pub status: Status,
    pub linked: bool,
}

impl Transaction {
    pub fn new(target: u8, initiator: u8) -> Self {
        Self {
            initiator,
            target,
            lun: 0,
            identified: false,
            disconnect_privilege: false,
            tag: None,
            queued: false,
            cdb: [0; MAX_CDB_LEN],
            cdb_len: 0,
            command_length: CommandLength::C6,
            direction: None,
            transferred: 0,
            phase: BusPhase::Selection,
            status: Status::Good,
            linked: false,
        }
    }

    /// Nexus rebuilt from a queued task
    pub fn reselected(
        target: u8,
        initiator: u8,
        lun: u8,
        attribute: TaskAttribute,
        tag: u8,
        cdb: &[u8],
    ) -> Self {
        let mut tx = Self::new(target, initiator);
        tx.lun = lun;
        tx.identified = true;
        tx.disconnect_privilege = true;
        tx.tag = Some((attribute, tag));
        tx.queued = true;
        tx.phase = BusPhase::Reselection;
        tx.set_cdb(cdb);
        tx
    }

    /// Starts a new command on this nexus
    pub fn set_cdb(&mut self, cdb: &[u8]) {
        let len = cdb.len().min(MAX_CDB_LEN);
        self.cdb = [0; MAX_CDB_LEN];
        self.cdb[..len].copy_from_slice(&cdb[..len]);
        self.cdb_len = len as u8;
        self.command_length = CommandLength::for_opcode(self.op_code());
        self.direction = None;
        self.transferred = 0;
        self.status = Status::Good;
        self.linked = false;
    }

    pub fn cdb(&self) -> &[u8] {
        &self.cdb[..self.cdb_len as usize]
    }

    pub fn op_code(&self) -> u8 {
        self.cdb[0]
    }

    /// Control byte, the last byte of the CDB
    pub fn control(&self) -> u8 {
        match self.cdb_len {
            0 => 0,
            n => self.cdb[n as usize - 1],
        }
    }
}

#[test]
fn test_set_cdb_tracks_length_and_control() {
    let mut tx = Transaction::new(0, 7);
    tx.set_cdb(&[0x28, 0, 0, 0, 0, 4, 0, 0, 1, 0x01]);
    assert_eq!(tx.op_code(), 0x28);
    assert_eq!(tx.command_length, CommandLength::C10);
    assert_eq!(tx.cdb().len(), 10);
    assert_eq!(tx.control(), 0x01);

    tx.transferred = 512;
    tx.set_cdb(&[0x00, 0, 0, 0, 0, 0]);
    assert_eq!(tx.transferred, 0);
    assert_eq!(tx.control(), 0);
}
