//! RAM backed storage.
//!
//! Every configured unit gets a fixed array of 512 byte blocks. Ethernet
//! units loop sent frames back to the receive side.

use heapless::Vec;

use crate::config::NUM_VDEV;
use crate::scsi::backend::{Backend, BackendError, Capacity, UnitAddress};

pub const BLOCK_SIZE: usize = 512;
/// Largest Ethernet frame held for loopback
pub const MAX_FRAME: usize = 1514;

#[derive(Copy, Clone)]
pub struct Block([u8; BLOCK_SIZE]);

impl Block {
    const fn new() -> Self {
        Self([0; BLOCK_SIZE])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

pub struct RamUnit<const BLOCKS: usize> {
    pub address: UnitAddress,
    /// Medium loaded
    pub present: bool,
    pub write_protected: bool,
    blocks: [Block; BLOCKS],
    frame: Option<Vec<u8, MAX_FRAME>>,
}

impl<const BLOCKS: usize> RamUnit<BLOCKS> {
    fn new(address: UnitAddress) -> Self {
        Self {
            address,
            present: true,
            write_protected: false,
            blocks: [Block::new(); BLOCKS],
            frame: None,
        }
    }

    pub fn block(&self, lba: u32) -> Option<&Block> {
        self.blocks.get(lba as usize)
    }

    pub fn block_mut(&mut self, lba: u32) -> Option<&mut Block> {
        self.blocks.get_mut(lba as usize)
    }

    fn check_present(&self) -> Result<(), BackendError> {
        if self.present {
            Ok(())
        } else {
            Err(BackendError::NoMedia)
        }
    }

    /// Blocks covered by a transfer of `len` bytes at `lba`
    fn range(&self, lba: u32, len: usize) -> Result<core::ops::Range<usize>, BackendError> {
        if len % BLOCK_SIZE != 0 {
            return Err(BackendError::HardwareError);
        }
        let start = lba as usize;
        let end = start + len / BLOCK_SIZE;
        if end > BLOCKS {
            return Err(BackendError::InvalidLba);
        }
        Ok(start..end)
    }
}

/// In memory [`Backend`] for up to [`NUM_VDEV`] units of `BLOCKS` blocks each
pub struct RamDisk<const BLOCKS: usize> {
    units: Vec<RamUnit<BLOCKS>, NUM_VDEV>,
}

impl<const BLOCKS: usize> Default for RamDisk<BLOCKS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const BLOCKS: usize> RamDisk<BLOCKS> {
    pub fn new() -> Self {
        Self { units: Vec::new() }
    }

    /// Adds a zeroed medium for `address`. `None` when the table is full
    pub fn add(&mut self, address: UnitAddress) -> Option<&mut RamUnit<BLOCKS>> {
        if self.unit(address).is_none() {
            self.units.push(RamUnit::new(address)).ok()?;
        }
        self.unit_mut(address)
    }

    pub fn unit(&self, address: UnitAddress) -> Option<&RamUnit<BLOCKS>> {
        self.units.iter().find(|u| u.address == address)
    }

    pub fn unit_mut(&mut self, address: UnitAddress) -> Option<&mut RamUnit<BLOCKS>> {
        self.units.iter_mut().find(|u| u.address == address)
    }

    fn lookup(&mut self, address: UnitAddress) -> Result<&mut RamUnit<BLOCKS>, BackendError> {
        self.unit_mut(address).ok_or(BackendError::NoMedia)
    }
}

impl<const BLOCKS: usize> Backend for RamDisk<BLOCKS> {
    async fn read_blocks(
        &mut self,
        unit: UnitAddress,
        lba: u32,
        buf: &mut [u8],
    ) -> Result<(), BackendError> {
        let unit = self.lookup(unit)?;
        unit.check_present()?;
        let range = unit.range(lba, buf.len())?;
        trace!("ram read lba {} blocks {}", lba, range.len());
        for (chunk, block) in buf.chunks_exact_mut(BLOCK_SIZE).zip(&unit.blocks[range]) {
            chunk.copy_from_slice(block.as_bytes());
        }
        Ok(())
    }

    async fn write_blocks(
        &mut self,
        unit: UnitAddress,
        lba: u32,
        data: &[u8],
    ) -> Result<(), BackendError> {
        let unit = self.lookup(unit)?;
        unit.check_present()?;
        if unit.write_protected {
            return Err(BackendError::WriteProtected);
        }
        let range = unit.range(lba, data.len())?;
        trace!("ram write lba {} blocks {}", lba, range.len());
        for (chunk, block) in data.chunks_exact(BLOCK_SIZE).zip(&mut unit.blocks[range]) {
            block.as_bytes_mut().copy_from_slice(chunk);
        }
        Ok(())
    }

    fn capacity(&mut self, unit: UnitAddress) -> Result<Capacity, BackendError> {
        let unit = self.lookup(unit)?;
        unit.check_present()?;
        Ok(Capacity {
            block_count: BLOCKS as u32,
            block_size: BLOCK_SIZE as u32,
        })
    }

    fn status(&mut self, unit: UnitAddress) -> Result<(), BackendError> {
        self.lookup(unit)?.check_present()
    }

    fn load_eject(&mut self, unit: UnitAddress, load: bool) -> Result<(), BackendError> {
        self.lookup(unit)?.present = load;
        Ok(())
    }

    async fn receive_frame(
        &mut self,
        unit: UnitAddress,
        buf: &mut [u8],
    ) -> Result<usize, BackendError> {
        let unit = self.lookup(unit)?;
        match unit.frame.take() {
            Some(frame) => {
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                Ok(len)
            }
            None => Ok(0),
        }
    }

    async fn send_frame(&mut self, unit: UnitAddress, frame: &[u8]) -> Result<(), BackendError> {
        let unit = self.lookup(unit)?;
        let frame = Vec::from_slice(frame).map_err(|_| BackendError::HardwareError)?;
        unit.frame = Some(frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    const DISK: UnitAddress = UnitAddress { id: 0, lun: 0 };

    #[test]
    fn test_read_write_and_range() {
        let mut ram = RamDisk::<4>::new();
        ram.add(DISK).unwrap();

        let data = [0xA5; 2 * BLOCK_SIZE];
        block_on(ram.write_blocks(DISK, 2, &data)).unwrap();
        let mut buf = [0; BLOCK_SIZE];
        block_on(ram.read_blocks(DISK, 3, &mut buf)).unwrap();
        assert_eq!(buf, [0xA5; BLOCK_SIZE]);

        assert_eq!(
            block_on(ram.write_blocks(DISK, 3, &data)),
            Err(BackendError::InvalidLba)
        );
        assert_eq!(ram.capacity(DISK).unwrap().max_lba(), 3);
    }

    #[test]
    fn test_media_state() {
        let mut ram = RamDisk::<2>::new();
        ram.add(DISK).unwrap().write_protected = true;
        assert_eq!(
            block_on(ram.write_blocks(DISK, 0, &[0; BLOCK_SIZE])),
            Err(BackendError::WriteProtected)
        );

        ram.load_eject(DISK, false).unwrap();
        assert_eq!(ram.status(DISK), Err(BackendError::NoMedia));
        assert_eq!(
            ram.capacity(UnitAddress { id: 1, lun: 0 }),
            Err(BackendError::NoMedia)
        );
    }

    #[test]
    fn test_frame_loopback() {
        let mut ram = RamDisk::<1>::new();
        let link = UnitAddress { id: 2, lun: 0 };
        ram.add(link).unwrap();
        let mut buf = [0; 64];
        assert_eq!(block_on(ram.receive_frame(link, &mut buf)), Ok(0));
        block_on(ram.send_frame(link, &[1, 2, 3])).unwrap();
        assert_eq!(block_on(ram.receive_frame(link, &mut buf)), Ok(3));
        assert_eq!(&buf[..3], &[1, 2, 3]);
    }
}
