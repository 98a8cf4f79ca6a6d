//! Fuzz target: `RuntimeConfig::load_from`
//!
//! Treats the input as the persisted document and checks that loading
//! never panics and that whatever comes out can be saved and reloaded
//! unchanged.
//!
//! cargo fuzz run fuzz_runtime_config

#![no_main]

use labsentinel::app::ports::{ConfigError, ConfigPort};
use labsentinel::app::runtime_config::RuntimeConfig;
use libfuzzer_sys::fuzz_target;

struct Bytes(Option<Vec<u8>>);

impl ConfigPort for Bytes {
    fn read_raw(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        Ok(self.0.clone())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), ConfigError> {
        self.0 = Some(data.to_vec());
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let mut store = Bytes(Some(data.to_vec()));
    let cfg = RuntimeConfig::load_from(&store);

    // Non-finite floats serialise as null and reload as defaults.
    if cfg.threshold.temp_high.is_finite() && cfg.threshold.temp_low.is_finite() {
        cfg.save_to(&mut store).unwrap();
        assert_eq!(RuntimeConfig::load_from(&store), cfg);
    }
});
