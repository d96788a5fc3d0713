use crate::error::Error;
use crate::layout::RegionKind;
use crate::platform::Platform;
use crate::FlashStore;
#[cfg(feature = "defmt")]
use defmt::info;
use strum::IntoEnumIterator;

impl<T: Platform> FlashStore<T> {
    /// Factory reset: erases the config, image and log regions.
    ///
    /// This is the only operation that erases across region boundaries. Nothing in the store
    /// calls it implicitly.
    pub fn erase_flash(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        info!("erase_flash: erasing all regions");

        // busy before the first command leaves the suspect flag alone
        self.wait_ready()?;

        let map = self.map;
        let result = self.transaction(|store| {
            RegionKind::iter().try_for_each(|kind| store.erase_region(map.region_for(kind)))
        });

        self.config_suspect = result.is_err();
        result
    }
}
