use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Status byte sent in the STATUS phase
#[repr(u8)]
#[derive(TryFromPrimitive, IntoPrimitive, Clone, Copy, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    #[default]
    Good = 0x00,
    CheckCondition = 0x02,
    Busy = 0x08,
    /// Successful completion of a linked command
    Intermediate = 0x10,
    ReservationConflict = 0x18,
}
