//! Fixed-width ride log addressed by record index.
//!
//! Records are never rewritten in place: a slot can be programmed once after the log region has
//! been erased with [`FlashStore::erase_flash`]. Unwritten slots read as [`LogRecord::ERASED`].

use crate::error::Error;
use crate::layout::RegionKind;
use crate::platform::Platform;
use crate::raw::{ERASED_BYTE, LOG_RECORD_LEN};
use crate::FlashStore;
#[cfg(feature = "defmt")]
use defmt::trace;

/// One log sample.
#[derive(Debug, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogRecord {
    pub trip_distance: f32,
    pub altitude: f32,
    pub temperature: f32,
}

impl LogRecord {
    /// The content of a slot that was never written: all bits set, which reads as NaN.
    pub const ERASED: LogRecord = LogRecord {
        trip_distance: f32::from_bits(u32::MAX),
        altitude: f32::from_bits(u32::MAX),
        temperature: f32::from_bits(u32::MAX),
    };

    pub const fn new(trip_distance: f32, altitude: f32, temperature: f32) -> Self {
        Self {
            trip_distance,
            altitude,
            temperature,
        }
    }

    /// Whether this is the content of an unwritten slot, i.e. "no data".
    pub fn is_erased(&self) -> bool {
        self.to_bytes().iter().all(|&b| b == ERASED_BYTE)
    }

    pub fn to_bytes(&self) -> [u8; LOG_RECORD_LEN] {
        let mut raw = [0u8; LOG_RECORD_LEN];
        raw[0..4].copy_from_slice(&self.trip_distance.to_le_bytes());
        raw[4..8].copy_from_slice(&self.altitude.to_le_bytes());
        raw[8..12].copy_from_slice(&self.temperature.to_le_bytes());
        raw
    }

    pub fn from_bytes(raw: &[u8; LOG_RECORD_LEN]) -> Self {
        let field = |at: usize| f32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);
        Self {
            trip_distance: field(0),
            altitude: field(4),
            temperature: field(8),
        }
    }
}

/// Bitwise, so that two erased records compare equal despite being NaN.
impl PartialEq for LogRecord {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for LogRecord {}

impl<T: Platform> FlashStore<T> {
    /// Number of records the log region holds. Valid indices are `0..log_capacity()`.
    pub fn log_capacity(&self) -> usize {
        self.map.log_capacity()
    }

    /// Absolute address of the record at `index`.
    pub fn log_address(&self, index: i32) -> Result<u32, Error> {
        let index = usize::try_from(index).map_err(|_| Error::OutOfRange)?;
        if index >= self.log_capacity() {
            return Err(Error::OutOfRange);
        }

        let offset = index
            .checked_mul(LOG_RECORD_LEN)
            .and_then(|offset| u32::try_from(offset).ok())
            .ok_or(Error::OutOfRange)?;
        Ok(self.map.region_for(RegionKind::Log).base() + offset)
    }

    /// Programs `record` into slot `index`.
    ///
    /// The slot must still be erased: flash can't reprogram a slot in place, so a slot that
    /// already holds data is rejected with [`Error::SlotProgrammed`]. Start a new logging session
    /// with [`FlashStore::erase_flash`].
    pub fn save_logdata(&mut self, index: i32, record: &LogRecord) -> Result<(), Error> {
        let address = self.log_address(index)?;

        let mut current = [0u8; LOG_RECORD_LEN];
        self.read(address, &mut current)?;
        if current.iter().any(|&b| b != ERASED_BYTE) {
            return Err(Error::SlotProgrammed);
        }

        #[cfg(feature = "defmt")]
        trace!("save_logdata: [{}] @{:#08x}", index, address);

        #[cfg(feature = "debug-logs")]
        println!("log: save [{index}] @0x{address:0>8x}: {record:?}");

        let raw = record.to_bytes();
        self.transaction(|store| store.program(address, &raw))
    }

    /// Reads slot `index`. A slot that was never written returns [`LogRecord::ERASED`].
    pub fn get_logdata(&mut self, index: i32) -> Result<LogRecord, Error> {
        let address = self.log_address(index)?;

        let mut raw = [0u8; LOG_RECORD_LEN];
        self.read(address, &mut raw)?;

        Ok(LogRecord::from_bytes(&raw))
    }
}
