use thiserror::Error;

/// Errors that can occur during store operations. Marked as non-exhaustive to allow for future
/// additions without breaking the API. `OutOfRange`, `FlashBusy` and `SlotProgrammed` are the
/// ones a caller is expected to handle; `InvalidRecord` and `HardwareFault` are already resolved
/// to the compiled-in defaults by the configuration loaders.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The validity tag does not match or a field holds a value this record shape can't contain.
    /// Either nothing was saved yet or the record was written by an incompatible layout.
    #[error("invalid configuration record")]
    InvalidRecord,

    /// The log record index is negative or beyond the capacity of the log region.
    #[error("log record index out of range")]
    OutOfRange,

    /// The flash did not report ready within the configured number of polls.
    #[error("flash busy")]
    FlashBusy,

    /// The flash driver's capacity is smaller than the region map.
    #[error("flash too small for region map")]
    FlashTooSmall,

    /// The internal error value is returned from the provided `NorFlash` implementation.
    #[error("flash hardware fault")]
    HardwareFault,

    /// The log slot already holds data. Log slots can only be programmed once between erases.
    #[error("log slot already programmed")]
    SlotProgrammed,
}
