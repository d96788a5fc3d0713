//! Static partition of the flash block into configuration, image/script and log regions.
//!
//! A `RegionMap` is meant to be built in a `const` item: every layout check in
//! [`RegionMap::new`] is an assertion, so a misconfigured map fails to compile instead of
//! corrupting neighbouring regions at runtime.

use crate::raw::{LOG_RECORD_LEN, RECORD_LEN};

/// Smallest unit the flash can erase.
pub const ERASE_BLOCK_SIZE: usize = 0x800;

/// Memory-mapped start of the Flex-NVM flash block.
pub const FLEX_NVM_BASE: u32 = 0x1000_0000;
/// Size of the Flex-NVM flash block.
pub const FLEX_NVM_SIZE: usize = 0x1_0000;

/// The layout used by the controller: one erase block of configuration, 30 KiB for images and
/// scripts, and the remaining 32 KiB for the log (2730 records).
pub const FLEX_NVM: RegionMap =
    RegionMap::new(FLEX_NVM_BASE, FLEX_NVM_SIZE, 0x800, 0x7800, 0x8000);

#[derive(strum::EnumIter, strum::Display, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegionKind {
    Config,
    Images,
    Log,
}

/// A byte range in absolute (memory-mapped) addresses. The range never wraps the address space.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Region {
    base: u32,
    len: usize,
}

impl Region {
    /// `None` if `base + len` does not fit the 32-bit address space.
    pub const fn new(base: u32, len: usize) -> Option<Region> {
        if len > (u32::MAX - base) as usize {
            return None;
        }
        Some(Region { base, len })
    }

    pub const fn base(&self) -> u32 {
        self.base
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// First address past the region.
    pub const fn end(&self) -> u32 {
        self.base + self.len as u32
    }

    /// Whether `[address, address + len)` lies entirely inside this region.
    pub const fn contains(&self, address: u32, len: usize) -> bool {
        if address < self.base {
            return false;
        }
        let offset = (address - self.base) as usize;
        offset <= self.len && len <= self.len - offset
    }

    pub const fn overlaps(&self, other: &Region) -> bool {
        self.base < other.end() && other.base < self.end()
    }

    /// Base addresses of the erase blocks covering this region.
    pub fn blocks(&self) -> impl Iterator<Item = u32> + use<> {
        (self.base..self.end()).step_by(ERASE_BLOCK_SIZE)
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegionMap {
    base: u32,
    size: usize,
    config: Region,
    images: Region,
    log: Region,
}

impl RegionMap {
    /// Lays out the configuration, image and log regions back to back starting at `base`.
    ///
    /// Panics if a region is empty or not a multiple of [`ERASE_BLOCK_SIZE`], if `base` is not
    /// erase-block aligned, if the regions don't fit into `size`, if the configuration record does
    /// not fit the configuration region or if the log can't hold a single record.
    pub const fn new(
        base: u32,
        size: usize,
        config_len: usize,
        images_len: usize,
        log_len: usize,
    ) -> Self {
        assert!(
            base as usize % ERASE_BLOCK_SIZE == 0,
            "flash base must be erase block aligned"
        );
        assert!(
            size % ERASE_BLOCK_SIZE == 0,
            "flash size must be a multiple of the erase block"
        );
        assert!(
            size <= (u32::MAX - base) as usize,
            "flash block exceeds the address space"
        );
        assert!(
            config_len > 0 && config_len % ERASE_BLOCK_SIZE == 0,
            "config region must be a non-empty multiple of the erase block"
        );
        assert!(
            images_len > 0 && images_len % ERASE_BLOCK_SIZE == 0,
            "image region must be a non-empty multiple of the erase block"
        );
        assert!(
            log_len > 0 && log_len % ERASE_BLOCK_SIZE == 0,
            "log region must be a non-empty multiple of the erase block"
        );
        assert!(
            config_len <= size && images_len <= size - config_len,
            "regions exceed the flash block"
        );
        assert!(
            log_len <= size - config_len - images_len,
            "regions exceed the flash block"
        );
        assert!(
            RECORD_LEN <= config_len,
            "config record does not fit the config region"
        );
        assert!(
            LOG_RECORD_LEN <= log_len,
            "log region can't hold a single record"
        );

        let config = Region {
            base,
            len: config_len,
        };
        let images = Region {
            base: config.end(),
            len: images_len,
        };
        let log = Region {
            base: images.end(),
            len: log_len,
        };

        Self {
            base,
            size,
            config,
            images,
            log,
        }
    }

    pub const fn base(&self) -> u32 {
        self.base
    }

    pub const fn size(&self) -> usize {
        self.size
    }

    pub const fn region_for(&self, kind: RegionKind) -> Region {
        match kind {
            RegionKind::Config => self.config,
            RegionKind::Images => self.images,
            RegionKind::Log => self.log,
        }
    }

    /// Number of log records the log region holds.
    pub const fn log_capacity(&self) -> usize {
        self.log.len / LOG_RECORD_LEN
    }

    /// The region containing `[address, address + len)`, if exactly one does.
    pub fn region_of(&self, address: u32, len: usize) -> Option<RegionKind> {
        use strum::IntoEnumIterator;

        RegionKind::iter().find(|&kind| self.region_for(kind).contains(address, len))
    }

    /// Translates an absolute address into the offset the flash driver expects.
    pub(crate) const fn offset_of(&self, address: u32) -> u32 {
        address - self.base
    }
}
