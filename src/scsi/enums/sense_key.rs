use num_enum::{IntoPrimitive, TryFromPrimitive};

#[repr(u8)]
#[derive(TryFromPrimitive, IntoPrimitive, Clone, Copy, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SenseKey {
    /// No specific sense key information to be reported.
    #[default]
    NoSense = 0x0,
    /// The command completed successfully with some recovery action performed by the target.
    RecoveredError = 0x1,
    /// The logical unit is not accessible, e.g. no medium is loaded.
    NotReady = 0x2,
    /// The command terminated with a non-recovered error caused by a flaw in the medium.
    MediumError = 0x3,
    /// Non-recoverable hardware failure (controller failure, parity error, ...).
    HardwareError = 0x4,
    /// Illegal parameter in the CDB or in the parameter list.
    IllegalRequest = 0x5,
    /// Removable medium changed or the target was reset.
    UnitAttention = 0x6,
    /// A read or write was attempted on a protected block.
    DataProtect = 0x7,
    /// Blank medium or end-of-data encountered on a sequential device.
    BlankCheck = 0x8,
    /// The target aborted the command, e.g. on overlapped commands.
    AbortedCommand = 0xB,
    /// Source data did not match the data read from the medium.
    Miscompare = 0xE,
}
