use embedded_storage::nor_flash::NorFlash;

/// The flash primitive the store runs on: erase, program and read from `NorFlash`, plus a
/// readiness query for the controller's command-complete flag.
pub trait Platform: Ready + NorFlash {}

impl<T: Ready + NorFlash> Platform for T {}

pub trait Ready {
    /// Returns `false` while an erase or program command is still executing.
    fn is_ready(&mut self) -> bool;
}

impl<T: Ready> Ready for &mut T {
    fn is_ready(&mut self) -> bool {
        T::is_ready(self)
    }
}

pub trait AlignedOps: Platform {
    fn align_read(size: usize) -> usize {
        align_ceil(size, Self::READ_SIZE)
    }

    fn align_write_floor(size: usize) -> usize {
        align_floor(size, Self::WRITE_SIZE)
    }
}

#[inline(always)]
pub(crate) const fn align_ceil(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size.saturating_add(alignment - 1) & !(alignment - 1)
    } else {
        size.saturating_add(alignment - 1) / alignment * alignment
    }
}

#[inline(always)]
pub(crate) const fn align_floor(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size & !(alignment - 1)
    } else {
        size / alignment * alignment
    }
}

impl<T: Platform> AlignedOps for T {}
