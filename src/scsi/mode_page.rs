//! Mode page registry

use heapless::Vec;

use crate::config::Features;
use crate::scsi::enums::{DeviceType, PageCode};

/// Longest page kept, header included
pub const MAX_PAGE_LEN: usize = 24;
/// Pages per logical unit
pub const MAX_PAGES: usize = 8;

const RW_ERROR_RECOVERY: [u8; 12] = [0x01, 0x0A, 0x26, 0x08, 0, 0, 0, 0, 0x08, 0, 0, 0];

const DISCONNECT_RECONNECT: [u8; 16] = [
    0x02, 0x0E, 0x10, 0x10, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

// 32 sectors per track, 512 bytes per sector, soft sectored
const FORMAT_PARAMETERS: [u8; 24] = [
    0x03, 0x16, 0, 1, 0, 0, 0, 0, 0, 0, 0, 32, 0x02, 0x00, 0, 1, 0, 0, 0, 0, 0x40, 0, 0, 0,
];

// 1024 cylinders, 16 heads, 5400 rpm
const RIGID_GEOMETRY: [u8; 24] = [
    0x04, 0x16, 0x00, 0x04, 0x00, 16, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0x15, 0x18, 0, 0,
];

const CACHING: [u8; 20] = [
    0x08, 0x12, 0, 0, 0xFF, 0xFF, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0, 0, 0, 0, 0,
];

const APPLE: [u8; 24] = *b"\x30\x16APPLE COMPUTER, INC   ";

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModePageError {
    /// No page with this code on the unit
    UnknownPage,
    /// Supplied bytes do not match the page's declared size
    LengthMismatch,
    /// The registry is full
    Full,
}

/// One mode page: current values plus the factory defaults
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct ModePage {
    code: PageCode,
    len: u8,
    current: [u8; MAX_PAGE_LEN],
    default: [u8; MAX_PAGE_LEN],
}

impl ModePage {
    /// `bytes` is the whole page, header included
    pub fn new(bytes: &[u8]) -> Result<Self, ModePageError> {
        let code = bytes
            .first()
            .and_then(|b| PageCode::from_page_byte(*b))
            .ok_or(ModePageError::UnknownPage)?;
        if bytes.len() > MAX_PAGE_LEN || bytes.len() < 2 || bytes[1] as usize + 2 != bytes.len()
        {
            return Err(ModePageError::LengthMismatch);
        }
        let mut page = [0; MAX_PAGE_LEN];
        page[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            code,
            len: bytes.len() as u8,
            current: page,
            default: page,
        })
    }

    pub fn code(&self) -> PageCode {
        self.code
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn bytes(&self) -> &[u8] {
        &self.current[..self.len()]
    }

    pub fn default_bytes(&self) -> &[u8] {
        &self.default[..self.len()]
    }

    /// Changeable mask: header as is, every parameter bit set
    pub fn changeable_bytes(&self) -> [u8; MAX_PAGE_LEN] {
        let mut mask = [0; MAX_PAGE_LEN];
        mask[0] = self.current[0];
        mask[1] = self.current[1];
        mask[2..self.len()].fill(0xFF);
        mask
    }
}

/// Mode pages of one logical unit, kept in ascending page code order
#[derive(Clone, Debug, Default)]
pub struct ModePages {
    pages: Vec<ModePage, MAX_PAGES>,
}

impl ModePages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory pages for a unit of `device_type`
    pub fn for_device(device_type: DeviceType, features: &Features) -> Self {
        let mut pages = Self::new();
        let defaults: &[&[u8]] = match device_type {
            DeviceType::Disk => &[
                &RW_ERROR_RECOVERY,
                &DISCONNECT_RECONNECT,
                &FORMAT_PARAMETERS,
                &RIGID_GEOMETRY,
                &CACHING,
            ],
            DeviceType::Optical | DeviceType::Tape => &[&RW_ERROR_RECOVERY, &DISCONNECT_RECONNECT],
            DeviceType::Ethernet => &[],
        };
        for bytes in defaults {
            pages.register_default(bytes);
        }
        if features.support_apple && device_type.is_block_device() {
            pages.register_default(&APPLE);
        }
        pages
    }

    fn register_default(&mut self, bytes: &[u8]) {
        if let Err(e) = ModePage::new(bytes).and_then(|page| self.register(page)) {
            error!("mode page {} not registered: {:?}", bytes[0], e);
        }
    }

    /// Adds a page, keeping ascending order. Replaces a page with the same code
    pub fn register(&mut self, page: ModePage) -> Result<(), ModePageError> {
        match self.pages.binary_search_by_key(&page.code, |p| p.code) {
            Ok(i) => self.pages[i] = page,
            Err(i) => self
                .pages
                .insert(i, page)
                .map_err(|_| ModePageError::Full)?,
        }
        Ok(())
    }

    pub fn get_page(&self, code: PageCode) -> Option<&ModePage> {
        self.pages.iter().find(|p| p.code == code)
    }

    /// Every page in ascending page code order
    pub fn get_all_pages(&self) -> impl Iterator<Item = &ModePage> {
        self.pages.iter()
    }

    /// Validates `bytes` against the page's declared size before replacing it.
    /// On error the stored page is left unchanged
    pub fn set_page(&mut self, code: PageCode, bytes: &[u8]) -> Result<(), ModePageError> {
        let page = self
            .pages
            .iter_mut()
            .find(|p| p.code == code)
            .ok_or(ModePageError::UnknownPage)?;
        if bytes.len() != page.len() || bytes[1] != page.current[1] {
            return Err(ModePageError::LengthMismatch);
        }
        page.current[..bytes.len()].copy_from_slice(bytes);
        // pages are never saveable so PS always reads back as zero
        page.current[0] &= 0x3F;
        Ok(())
    }

    /// Restores factory values on every page
    pub fn reset(&mut self) {
        for page in self.pages.iter_mut() {
            page.current = page.default;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pages_ascending() {
        let pages = ModePages::for_device(DeviceType::Disk, &Features::default());
        let codes: std::vec::Vec<u8> = pages.get_all_pages().map(|p| p.code().into()).collect();
        assert_eq!(codes, [0x01, 0x02, 0x03, 0x04, 0x08, 0x30]);
        assert_eq!(pages.get_all_pages().map(|p| p.len()).sum::<usize>(), 12 + 16 + 24 + 24 + 20 + 24);

        let features = Features {
            support_apple: false,
            ..Features::default()
        };
        let pages = ModePages::for_device(DeviceType::Optical, &features);
        let codes: std::vec::Vec<u8> = pages.get_all_pages().map(|p| p.code().into()).collect();
        assert_eq!(codes, [0x01, 0x02]);

        let pages = ModePages::for_device(DeviceType::Ethernet, &Features::default());
        assert_eq!(pages.get_all_pages().count(), 0);
    }

    #[test]
    fn test_set_page_round_trip() {
        let mut pages = ModePages::for_device(DeviceType::Disk, &Features::default());
        let mut caching = CACHING;
        caching[2] = 0x04;
        caching[12] = 0x7A;
        pages.set_page(PageCode::Caching, &caching).unwrap();
        assert_eq!(pages.get_page(PageCode::Caching).unwrap().bytes(), &caching);
        assert_eq!(
            pages.get_page(PageCode::Caching).unwrap().default_bytes(),
            &CACHING
        );

        pages.reset();
        assert_eq!(pages.get_page(PageCode::Caching).unwrap().bytes(), &CACHING);
    }

    #[test]
    fn test_set_page_length_mismatch_keeps_old_content() {
        let mut pages = ModePages::for_device(DeviceType::Disk, &Features::default());
        let short = [0x08, 0x0A, 0x04, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            pages.set_page(PageCode::Caching, &short),
            Err(ModePageError::LengthMismatch)
        );
        assert_eq!(pages.get_page(PageCode::Caching).unwrap().bytes(), &CACHING);
        assert_eq!(
            pages.set_page(PageCode::VendorSpecific, &[0x00, 0x00]),
            Err(ModePageError::UnknownPage)
        );
    }

    #[test]
    fn test_changeable_mask() {
        let pages = ModePages::for_device(DeviceType::Disk, &Features::default());
        let page = pages.get_page(PageCode::RwErrorRecovery).unwrap();
        let mask = page.changeable_bytes();
        assert_eq!(&mask[..2], &[0x01, 0x0A]);
        assert!(mask[2..12].iter().all(|b| *b == 0xFF));
    }
}
