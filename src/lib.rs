//! Bare metal store for the configuration and the ride log of the Velo Bling-Bling controller.
//!
//! The Flex-NVM flash block is split into three erase-block aligned regions (see [`layout`]):
//!
//! * **config**: one [`ParamRecord`], the serialized [`ActiveConfig`] followed by a validity tag
//! * **images**: image and script blobs, opaque to this crate
//! * **log**: an array of 12-byte [`LogRecord`]s addressed by index
//!
//! All access goes through a [`FlashStore`], which owns the flash driver, the region map and the
//! readiness state. Any `NorFlash` implementation that can report command completion via
//! [`platform::Ready`] can be used.
//!
//! ```ignore
//! let mut store = FlashStore::new(FLEX_NVM, flash)?;
//! let mut config = ActiveConfig::default();
//! store.init(&mut config)?;
//! config.trip_distance += 1.2;
//! store.save_params(&config)?;
//! ```
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

pub mod config;
pub mod error;
pub mod layout;
mod log;
mod maintenance;
mod params;
pub mod platform;
mod raw;

pub use config::ActiveConfig;
pub use layout::{FLEX_NVM, Region, RegionKind, RegionMap};
pub use log::LogRecord;
pub use params::{ConfigOrigin, set_config, set_params};
pub use raw::{CONFIG_LEN, LOG_RECORD_LEN, ParamRecord, RECORD_LEN, VALID_TAG};

use crate::error::Error;
use crate::layout::ERASE_BLOCK_SIZE;
use crate::platform::{AlignedOps, Platform};
use crate::raw::{ERASED_BYTE, MAX_ALIGN};
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

/// Number of readiness polls after which an operation gives up with [`Error::FlashBusy`].
pub const DEFAULT_POLL_LIMIT: u32 = 1_000_000;

/// Readiness of the flash. `Busy` from issuing an erase or program until the flash reports the
/// command complete.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashState {
    Idle,
    Busy,
}

/// The store context: flash driver, region map and readiness state.
pub struct FlashStore<T: Platform> {
    pub(crate) hal: T,
    pub(crate) map: RegionMap,
    pub(crate) state: FlashState,
    pub(crate) poll_limit: u32,

    // set when a save or erase of the config region failed halfway
    pub(crate) config_suspect: bool,
}

impl<T: Platform> FlashStore<T> {
    /// Wraps the flash driver. The driver's offsets are relative to `map.base()`, so its capacity
    /// has to cover `map.size()`.
    pub fn new(map: RegionMap, hal: T) -> Result<FlashStore<T>, Error> {
        const {
            assert!(
                ERASE_BLOCK_SIZE % T::ERASE_SIZE == 0,
                "flash erase size must divide the erase block"
            );
            assert!(
                T::WRITE_SIZE <= MAX_ALIGN && T::READ_SIZE <= MAX_ALIGN,
                "flash write or read size too large"
            );
            assert!(
                LOG_RECORD_LEN % T::WRITE_SIZE == 0 && LOG_RECORD_LEN % T::READ_SIZE == 0,
                "log records must be aligned to the flash write and read size"
            );
        }

        if hal.capacity() < map.size() {
            return Err(Error::FlashTooSmall);
        }

        Ok(Self {
            hal,
            map,
            state: FlashState::Busy,
            poll_limit: DEFAULT_POLL_LIMIT,
            config_suspect: false,
        })
    }

    /// Sets the number of readiness polls before giving up with [`Error::FlashBusy`].
    pub fn with_poll_limit(mut self, poll_limit: u32) -> Self {
        self.poll_limit = poll_limit.max(1);
        self
    }

    pub fn region_map(&self) -> &RegionMap {
        &self.map
    }

    /// Last observed readiness. Use [`FlashStore::poll`] to refresh it.
    pub fn state(&self) -> FlashState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == FlashState::Idle
    }

    /// Queries the flash once and updates the readiness state.
    pub fn poll(&mut self) -> FlashState {
        if self.hal.is_ready() {
            self.state = FlashState::Idle;
        }
        self.state
    }

    /// Gives back the flash driver.
    pub fn release(self) -> T {
        self.hal
    }

    /// Polls the flash until it reports ready.
    fn poll_ready(&mut self) -> Result<(), Error> {
        for _ in 0..self.poll_limit {
            if self.hal.is_ready() {
                return Ok(());
            }
            core::hint::spin_loop();
        }

        #[cfg(feature = "defmt")]
        warn!("flash still busy after {} polls", self.poll_limit);

        Err(Error::FlashBusy)
    }

    /// Blocks until the flash is ready and marks the store idle. Queries the flash on every call:
    /// commands issued by other writers on the same flash are not tracked in `state`.
    pub(crate) fn wait_ready(&mut self) -> Result<(), Error> {
        match self.poll_ready() {
            Ok(()) => {
                self.state = FlashState::Idle;
                Ok(())
            }
            Err(e) => {
                self.state = FlashState::Busy;
                Err(e)
            }
        }
    }

    /// Runs a sequence of erase and program commands as one unit: the store stays `Busy` from the
    /// first command until the flash has completed the last one.
    pub(crate) fn transaction<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, Error>,
    ) -> Result<R, Error> {
        self.wait_ready()?;
        self.state = FlashState::Busy;

        let result = f(self);

        // a driver error leaves the command state unknown, wait for the flash anyway
        let ready = self.wait_ready();
        let value = result?;
        ready.map(|()| value)
    }

    /// Erases every erase block of `region`. Only valid inside [`FlashStore::transaction`].
    pub(crate) fn erase_region(&mut self, region: Region) -> Result<(), Error> {
        debug_assert_eq!(self.state, FlashState::Busy);

        for block in region.blocks() {
            let from = self.map.offset_of(block);

            #[cfg(feature = "defmt")]
            trace!("erase block @{:#08x}", block);

            #[cfg(feature = "debug-logs")]
            println!("  store: erase block 0x{block:0>8x}");

            self.poll_ready()?;
            self.hal
                .erase(from, from + ERASE_BLOCK_SIZE as u32)
                .map_err(|_| Error::HardwareFault)?;
        }

        Ok(())
    }

    /// Programs `bytes` at the absolute `address`. A trailing partial write unit is padded with
    /// the erased pattern and skipped if it only holds erased bytes. Only valid inside
    /// [`FlashStore::transaction`].
    pub(crate) fn program(&mut self, address: u32, bytes: &[u8]) -> Result<(), Error> {
        debug_assert_eq!(self.state, FlashState::Busy);

        let offset = self.map.offset_of(address);

        #[cfg(feature = "defmt")]
        trace!("program @{:#08x}: [{}]", address, bytes.len());

        #[cfg(feature = "debug-logs")]
        println!(
            "  store: program 0x{address:0>8x}[0x{:04x}]",
            bytes.len()
        );

        let pivot = T::align_write_floor(bytes.len());
        let header = &bytes[..pivot];
        let trailer = &bytes[pivot..];

        if !header.is_empty() {
            self.poll_ready()?;
            self.hal
                .write(offset, header)
                .map_err(|_| Error::HardwareFault)?;
        }

        if trailer.iter().any(|&b| b != ERASED_BYTE) {
            let mut buf = [ERASED_BYTE; MAX_ALIGN];
            buf[..trailer.len()].copy_from_slice(trailer);

            self.poll_ready()?;
            self.hal
                .write(offset + pivot as u32, &buf[..T::WRITE_SIZE])
                .map_err(|_| Error::HardwareFault)?;
        }

        Ok(())
    }

    /// Reads into `buf` from the absolute `address` once the flash is idle. `address` and
    /// `buf.len()` must be aligned to the driver's read size.
    pub(crate) fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Error> {
        self.wait_ready()?;

        #[cfg(feature = "defmt")]
        trace!("read @{:#08x}: [{}]", address, buf.len());

        self.hal
            .read(self.map.offset_of(address), buf)
            .map_err(|_| Error::HardwareFault)
    }
}
