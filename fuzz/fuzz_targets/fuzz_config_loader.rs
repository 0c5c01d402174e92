#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing may fail; validation must never panic on whatever parsed.
    if let Ok(cfg) = toml::from_str::<tapwatch_config::Config>(data) {
        let _ = cfg.validate();
    }
});
