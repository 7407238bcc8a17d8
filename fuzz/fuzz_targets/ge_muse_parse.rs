//! Fuzz target for GE MUSE text parsing.

#![no_main]

use ecgconv::ir::io_ge_muse::from_ge_muse_slice;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Cap input size to avoid excessive memory usage.
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_ge_muse_slice(data);
});
