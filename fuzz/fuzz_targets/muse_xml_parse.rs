//! Fuzz target for MUSE XML parsing.
//!
//! Exercises the XML walk, base64 decoding and limb-lead derivation.

#![no_main]

use ecgconv::ir::io_muse_xml::from_muse_xml_slice;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_muse_xml_slice(data);
});
