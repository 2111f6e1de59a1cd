use packing::Error as PackingError;

use crate::bus::BusError;

/// CDB decode failure
#[allow(clippy::enum_variant_names)]
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// No command with this opcode exists for the unit's device type
    UnhandledOpCode,
    /// The identified opcode requires more data than was sent
    InsufficientDataForCommand,
    /// A CDB field holds a value its layout does not allow
    InvalidField,
}

impl From<PackingError> for Error {
    fn from(e: PackingError) -> Error {
        match e {
            PackingError::InsufficientBytes => Error::InsufficientDataForCommand,
            _ => Error::InvalidField,
        }
    }
}

/// Why a command did not complete with GOOD status
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Sense data has been recorded, report CHECK CONDITION
    Failed,
    /// Unit is reserved by another initiator
    Conflict,
    /// The bus failed underneath the command, the transaction is aborted
    Transport(BusError),
}

impl From<BusError> for CommandError {
    fn from(e: BusError) -> Self {
        CommandError::Transport(e)
    }
}
