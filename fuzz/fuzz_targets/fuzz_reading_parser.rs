#![no_main]
use libfuzzer_sys::fuzz_target;
use tapwatch_core::parser::{FormatHints, ValueDomain, parse};

fuzz_target!(|data: &str| {
    let hints = FormatHints::default();
    for domain in [ValueDomain::default(), ValueDomain::decimal()] {
        // Any accepted value must be finite and inside the domain.
        if let Ok(v) = parse(data, &hints, &domain) {
            assert!(v.is_finite());
            assert!(domain.contains(v));
        }
    }
});
