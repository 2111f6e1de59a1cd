use core::future::Future;

/// Physical address of a logical unit
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnitAddress {
    pub id: u8,
    pub lun: u8,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BackendError {
    /// No medium loaded
    NoMedia,
    /// Address is invalid or out of range
    InvalidLba,
    /// Error during reading or writing the medium
    MediumError,
    WriteProtected,
    HardwareError,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Capacity {
    pub block_count: u32,
    /// Bytes per block. Determines the size of the buffers passed to read/write
    pub block_size: u32,
}

impl Capacity {
    /// The last valid logical block address
    pub fn max_lba(&self) -> u32 {
        self.block_count.saturating_sub(1)
    }
}

/// Storage behind the logical units.
///
/// One backend serves every unit; calls carry the [`UnitAddress`] they are for.
pub trait Backend {
    /// Read the blocks starting at `lba` into the provided buffer. `buf` holds a
    /// whole number of blocks
    fn read_blocks(
        &mut self,
        unit: UnitAddress,
        lba: u32,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<(), BackendError>>;

    /// Write the `data` buffer to the blocks starting at `lba`
    fn write_blocks(
        &mut self,
        unit: UnitAddress,
        lba: u32,
        data: &[u8],
    ) -> impl Future<Output = Result<(), BackendError>>;

    fn capacity(&mut self, unit: UnitAddress) -> Result<Capacity, BackendError>;

    /// Medium state. Called before every medium access command
    fn status(&mut self, _unit: UnitAddress) -> Result<(), BackendError> {
        Ok(())
    }

    /// Commit anything cached for `unit`
    fn flush(&mut self, _unit: UnitAddress) -> impl Future<Output = Result<(), BackendError>> {
        async { Ok(()) }
    }

    /// Load (`true`) or eject (`false`) removable media
    fn load_eject(&mut self, _unit: UnitAddress, _load: bool) -> Result<(), BackendError> {
        Ok(())
    }

    /// Copy one pending Ethernet frame into `buf`, returning its length. Zero
    /// means nothing is pending
    fn receive_frame(
        &mut self,
        _unit: UnitAddress,
        _buf: &mut [u8],
    ) -> impl Future<Output = Result<usize, BackendError>> {
        async { Ok(0) }
    }

    fn send_frame(
        &mut self,
        _unit: UnitAddress,
        _frame: &[u8],
    ) -> impl Future<Output = Result<(), BackendError>> {
        async { Ok(()) }
    }
}
