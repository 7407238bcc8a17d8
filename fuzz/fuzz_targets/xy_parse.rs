//! Fuzz target for raw XY text parsing, in both sampling modes.

#![no_main]

use ecgconv::ir::io_xy::{from_xy_slice, XySampling};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_xy_slice(data, XySampling::Constant);
    let _ = from_xy_slice(data, XySampling::Variable);
});
