#![allow(dead_code)]

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use ecgconv::format::FormatTag;
use ecgconv::ir::{EcgRecord, SignalMatrix};

pub const TWELVE: &str = "I,II,III,aVR,aVL,aVF,V1,V2,V3,V4,V5,V6";

/// Two-lead record with small distinct values on every channel.
pub fn two_lead_record() -> EcgRecord {
    let signals = SignalMatrix::from_rows(vec![
        vec![0, 12, -40, 250, 1000, -1000, 3],
        vec![-7, 0, 7, 2047, -2048, 15, -15],
    ])
    .expect("build matrix");
    EcgRecord::new(FormatTag::Rdt, 500.0, signals)
        .with_adu_gain(200)
        .with_lead_names("I,II")
        .expect("two lead names")
}

/// Twelve-lead record; channel `c` holds `c * 10 + s` at sample `s`.
pub fn twelve_lead_record(samples: usize) -> EcgRecord {
    let rows = (0..12)
        .map(|c| (0..samples).map(|s| (c * 10 + s) as i32).collect())
        .collect();
    EcgRecord::new(
        FormatTag::Rdt,
        250.0,
        SignalMatrix::from_rows(rows).expect("build matrix"),
    )
    .with_lead_names(TWELVE)
    .expect("twelve lead names")
}

pub fn muse_lead_data(id: &str, samples: &[i16]) -> String {
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    format!(
        "<LeadData><LeadSampleCountTotal>{}</LeadSampleCountTotal>\
         <LeadAmplitudeUnitsPerBit>4.88</LeadAmplitudeUnitsPerBit>\
         <LeadID>{}</LeadID><WaveFormData>{}</WaveFormData></LeadData>",
        samples.len(),
        id,
        STANDARD.encode(bytes)
    )
}

/// A MUSE document whose rhythm waveform holds the eight independent leads.
pub fn muse_xml_document() -> String {
    let leads: String = ["I", "II", "V1", "V2", "V3", "V4", "V5", "V6"]
        .iter()
        .enumerate()
        .map(|(idx, id)| {
            let base = (idx as i16 + 1) * 10;
            muse_lead_data(id, &[base, base + 2, base + 4])
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<RestingECG>\
         <Waveform><WaveformType>Median</WaveformType><SampleBase>500</SampleBase>{}</Waveform>\
         <Waveform><WaveformType>Rhythm</WaveformType><SampleBase>500</SampleBase>{}</Waveform>\
         </RestingECG>",
        muse_lead_data("I", &[1]),
        leads
    )
}

pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, contents).expect("write fixture file");
}
