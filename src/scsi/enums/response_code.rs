use num_enum::IntoPrimitive;

#[repr(u8)]
#[derive(IntoPrimitive, Clone, Copy, Eq, PartialEq, Debug, Default)]
pub enum ResponseCode {
    /// Current error, fixed format
    #[default]
    FixedSenseData = 0x70,
    /// Deferred error, fixed format
    DeferredSenseData = 0x71,
}
