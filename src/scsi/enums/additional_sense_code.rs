use num_enum::{IntoPrimitive, TryFromPrimitive};

// Only the codes this target reports. ASCQ is zero for every one of them.
#[repr(u8)]
#[derive(TryFromPrimitive, IntoPrimitive, Clone, Copy, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdditionalSenseCode {
    /// ASC 0x00 - NO ADDITIONAL SENSE INFORMATION
    #[default]
    NoAdditionalSenseInformation = 0x00,
    /// ASC 0x0C - WRITE ERROR
    WriteError = 0x0C,
    /// ASC 0x11 - UNRECOVERED READ ERROR
    UnrecoveredReadError = 0x11,
    /// ASC 0x1A - PARAMETER LIST LENGTH ERROR
    ParameterListLengthError = 0x1A,
    /// ASC 0x1D - MISCOMPARE DURING VERIFY OPERATION
    MiscompareDuringVerify = 0x1D,
    /// ASC 0x20 - INVALID COMMAND OPERATION CODE
    InvalidCommandOperationCode = 0x20,
    /// ASC 0x21 - LOGICAL BLOCK ADDRESS OUT OF RANGE
    InvalidLba = 0x21,
    /// ASC 0x24 - INVALID FIELD IN CDB
    InvalidFieldInCdb = 0x24,
    /// ASC 0x25 - LOGICAL UNIT NOT SUPPORTED
    LogicalUnitNotSupported = 0x25,
    /// ASC 0x26 - INVALID FIELD IN PARAMETER LIST
    InvalidFieldInParameterList = 0x26,
    /// ASC 0x27 - WRITE PROTECTED
    WriteProtected = 0x27,
    /// ASC 0x28 - NOT READY TO READY CHANGE, MEDIUM MAY HAVE CHANGED
    NotReadyToReadyChange = 0x28,
    /// ASC 0x29 - POWER ON, RESET, OR BUS DEVICE RESET OCCURRED
    UnitPowerOnReset = 0x29,
    /// ASC 0x39 - SAVING PARAMETERS NOT SUPPORTED
    SavingParametersNotSupported = 0x39,
    /// ASC 0x3A - MEDIUM NOT PRESENT
    NoMedia = 0x3A,
    /// ASC 0x47 - SCSI PARITY ERROR
    ScsiParityError = 0x47,
    /// ASC 0x4E - OVERLAPPED COMMANDS ATTEMPTED
    OverlappedCommandsAttempted = 0x4E,
    /// ASC 0x53 - MEDIUM REMOVAL PREVENTED (ASCQ 0x02)
    MediumRemovalPrevented = 0x53,
    /// ASC 0xC0 - vendor specific, opcode error
    ErrorInOpcode = 0xC0,
}

impl AdditionalSenseCode {
    /// Returns the ASC byte for this variant
    pub fn asc(&self) -> u8 {
        (*self).into()
    }

    /// Returns the ASCQ byte for this variant
    pub fn ascq(&self) -> u8 {
        match self {
            AdditionalSenseCode::MediumRemovalPrevented => 0x02,
            _ => 0x00,
        }
    }
}
