//! Fuzz target for WFDB header parsing.

#![no_main]

use ecgconv::ir::io_wfdb::from_wfdb_header_str;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = from_wfdb_header_str(text);
    }
});
