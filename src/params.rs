//! Lifecycle of the configuration record: load with fallback to defaults, save, clear.

use crate::config::ActiveConfig;
use crate::error::Error;
use crate::layout::RegionKind;
use crate::platform::{AlignedOps, Platform};
use crate::raw::{
    ParamRecord, RECORD_BUF_LEN, RECORD_LEN, Reader, VALID_TAG, Writer, visit_config,
};
use crate::FlashStore;
#[cfg(feature = "defmt")]
use defmt::{debug, warn};

/// Where the active configuration came from after a load.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigOrigin {
    /// Loaded from a valid record in flash.
    Stored,
    /// Flash held no valid record, the compiled-in defaults were installed.
    Defaults,
}

/// Copies a validated record into `config`. `config` is left untouched if the tag doesn't match
/// or any field holds a value the record shape can't contain.
pub fn set_config(record: &ParamRecord, config: &mut ActiveConfig) -> Result<(), Error> {
    if !record.is_valid() {
        return Err(Error::InvalidRecord);
    }

    let mut staged = config.clone();
    let mut reader = Reader::new(record.config_bytes());
    visit_config(&mut reader, &mut staged);
    reader.finish()?;

    *config = staged;
    Ok(())
}

/// Serializes `config` into a record carrying the validity tag, ready to be programmed.
pub fn set_params(config: &ActiveConfig) -> ParamRecord {
    let mut record = ParamRecord::ERASED;
    let mut scratch = config.clone();

    let mut writer = Writer::new(record.config_bytes_mut());
    visit_config(&mut writer, &mut scratch);
    let written = writer.finish();
    debug_assert_eq!(written, Some(crate::raw::CONFIG_LEN));

    record.set_tag(VALID_TAG);
    record
}

impl<T: Platform> FlashStore<T> {
    /// Called once at boot. Waits for the flash to become ready, then loads the stored
    /// configuration into `config` or, if there is none, installs the defaults. Flash is not
    /// written either way.
    pub fn init(&mut self, config: &mut ActiveConfig) -> Result<ConfigOrigin, Error> {
        self.wait_ready()?;

        let origin = self.get_params(config)?;

        #[cfg(feature = "defmt")]
        debug!("init: configuration from {}", origin);

        Ok(origin)
    }

    /// Reads the raw configuration record.
    pub fn read_params(&mut self) -> Result<ParamRecord, Error> {
        let region = self.map.region_for(RegionKind::Config);

        let mut buf = [0u8; RECORD_BUF_LEN];
        let len = T::align_read(RECORD_LEN);
        self.read(region.base(), &mut buf[..len])?;

        let mut record = ParamRecord::ERASED;
        record.as_bytes_mut().copy_from_slice(&buf[..RECORD_LEN]);
        Ok(record)
    }

    /// Loads the stored configuration into `config`. An invalid record, a record left behind by a
    /// failed save and a read fault all install the defaults instead. Only [`Error::FlashBusy`]
    /// is returned.
    pub fn get_params(&mut self, config: &mut ActiveConfig) -> Result<ConfigOrigin, Error> {
        if self.config_suspect {
            #[cfg(feature = "defmt")]
            warn!("config region suspect after failed write, using defaults");

            *config = ActiveConfig::default();
            return Ok(ConfigOrigin::Defaults);
        }

        let loaded = match self.read_params() {
            Ok(record) => set_config(&record, config),
            Err(Error::FlashBusy) => return Err(Error::FlashBusy),
            Err(e) => Err(e),
        };

        match loaded {
            Ok(()) => Ok(ConfigOrigin::Stored),
            Err(_e) => {
                #[cfg(feature = "defmt")]
                warn!("no valid configuration ({}), using defaults", _e);

                #[cfg(feature = "debug-logs")]
                println!("params: no valid configuration ({_e}), using defaults");

                *config = ActiveConfig::default();
                Ok(ConfigOrigin::Defaults)
            }
        }
    }

    /// Erases the config region and programs `config` with a valid tag. The store stays busy for
    /// the whole erase and program sequence. The write unit holding the tag is programmed last,
    /// so a save interrupted at any point reads back as invalid.
    pub fn save_params(&mut self, config: &ActiveConfig) -> Result<(), Error> {
        let record = set_params(config);
        let region = self.map.region_for(RegionKind::Config);

        #[cfg(feature = "debug-logs")]
        println!("params: save {record:?} @0x{:0>8x}", region.base());

        // busy before the first command: nothing was issued, so the suspect flag is left alone
        self.wait_ready()?;

        let result = self.transaction(|store| {
            store.erase_region(region)?;

            let bytes = record.as_bytes();
            let pivot = T::align_write_floor(RECORD_LEN - 1);
            store.program(region.base(), &bytes[..pivot])?;
            store.program(region.base() + pivot as u32, &bytes[pivot..])
        });

        self.config_suspect = result.is_err();
        result
    }

    /// Erases the config region. The next load finds no valid record and installs the defaults.
    pub fn clear_params(&mut self) -> Result<(), Error> {
        let region = self.map.region_for(RegionKind::Config);

        // see save_params
        self.wait_ready()?;

        let result = self.transaction(|store| store.erase_region(region));

        self.config_suspect = result.is_err();
        result
    }
}
