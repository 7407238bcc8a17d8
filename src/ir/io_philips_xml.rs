//! Philips SierraECG XML (`restingecgdata`) reader, schema 1.03 and 1.04.
//!
//! Signal characteristics come from `<signalcharacteristics>`; samples from
//! `<parsedwaveforms>`, stored channel after channel. Its attributes describe
//! the block:
//!
//! - `leadlabels`: space-separated channel labels
//! - `dataencoding`: `Base64` (little-endian `i16`) or `Plain` (integers)
//! - `compression`: only uncompressed data is supported; XLI is rejected
//! - `durationperchannel`: channel length in milliseconds
//!
//! The original document and its schema version are kept as the payload.

use std::fs;
use std::path::Path;

use roxmltree::Node;

use super::model::{FormatPayload, LoadedSignals, SignalMatrix};
use super::xml::{self, XmlContext};
use crate::error::EcgError;
use crate::format::{LoadRequest, SignalLoader};
use crate::leads::LeadName;

const FORMAT_NAME: &str = "PHILIPS";
const MICROVOLTS_PER_MILLIVOLT: f64 = 1000.0;

/// SierraECG schema revision a loader is registered for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhilipsVersion {
    V103,
    V104,
}

impl PhilipsVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhilipsVersion::V103 => "1.03",
            PhilipsVersion::V104 => "1.04",
        }
    }
}

/// Built-in Philips SierraECG collaborator.
#[derive(Clone, Copy, Debug)]
pub struct PhilipsLoader {
    version: PhilipsVersion,
}

impl PhilipsLoader {
    pub fn new(version: PhilipsVersion) -> Self {
        Self { version }
    }
}

impl SignalLoader for PhilipsLoader {
    fn load(&self, request: &LoadRequest<'_>) -> Result<LoadedSignals, EcgError> {
        read_philips_xml(request.file_path, self.version)
    }
}

/// Reads a SierraECG document.
pub fn read_philips_xml(path: &Path, version: PhilipsVersion) -> Result<LoadedSignals, EcgError> {
    let xml = fs::read_to_string(path).map_err(EcgError::Io)?;
    parse_philips_xml(&xml, version, path)
}

/// Parses a SierraECG document from a string.
pub fn from_philips_xml_str(xml: &str, version: PhilipsVersion) -> Result<LoadedSignals, EcgError> {
    parse_philips_xml(xml, version, Path::new("<memory>"))
}

fn parse_philips_xml(
    xml: &str,
    version: PhilipsVersion,
    path: &Path,
) -> Result<LoadedSignals, EcgError> {
    let ctx = XmlContext::new(FORMAT_NAME, path);
    let document = ctx.parse(xml)?;
    let root = document.root_element();
    if root.tag_name().name() != "restingecgdata" {
        return Err(ctx.error("missing <restingecgdata> root element"));
    }

    let document_version = xml::find_descendant(root, "documentversion")
        .and_then(xml::element_text)
        .unwrap_or_else(|| version.as_str().to_string());
    if document_version != version.as_str() {
        log::warn!(
            "Philips document declares version {} but was loaded as {}",
            document_version,
            version.as_str()
        );
    }

    let characteristics = xml::find_descendant(root, "signalcharacteristics")
        .ok_or_else(|| ctx.error("missing <signalcharacteristics>"))?;
    let sampling_rate: f64 = ctx.required_number(characteristics, "samplingrate")?;
    let valid_channels: usize = ctx.required_number(characteristics, "numberchannelsvalid")?;
    let allocated_channels = xml::child_text(characteristics, "numberchannelsallocated")
        .and_then(|raw| xml::parse_number::<usize>(&raw))
        .unwrap_or(valid_channels);
    let resolution_uv = xml::child_text(characteristics, "resolution")
        .and_then(|raw| xml::parse_number::<f64>(&raw));

    if valid_channels == 0 {
        return Err(ctx.error("numberchannelsvalid is zero"));
    }

    let waveforms = xml::find_descendant(root, "parsedwaveforms")
        .ok_or_else(|| ctx.error("missing <parsedwaveforms>"))?;
    let samples = decode_waveforms(&ctx, waveforms)?;

    let samples_per_channel = match waveforms.attribute("durationperchannel") {
        Some(raw) => {
            let duration_ms: f64 = xml::parse_number(raw)
                .ok_or_else(|| ctx.error(format!("invalid durationperchannel '{raw}'")))?;
            (duration_ms * sampling_rate / 1000.0).round() as usize
        }
        None => samples.len() / valid_channels,
    };
    let needed = samples_per_channel.checked_mul(valid_channels).ok_or_else(|| {
        ctx.error(format!(
            "{valid_channels} channel(s) of {samples_per_channel} samples overflows"
        ))
    })?;
    if samples.len() < needed {
        return Err(ctx.error(format!(
            "{} samples cannot fill {} channel(s) of {} samples",
            samples.len(),
            valid_channels,
            samples_per_channel
        )));
    }

    let rows = samples
        .chunks_exact(samples_per_channel.max(1))
        .take(valid_channels)
        .map(<[i32]>::to_vec)
        .collect::<Vec<_>>();
    let signals = if samples_per_channel == 0 {
        SignalMatrix::zeros(valid_channels, 0)
    } else {
        SignalMatrix::from_rows(rows)?
    };

    let mut loaded = LoadedSignals::new(signals, sampling_rate)
        .with_allocated_channels(allocated_channels)
        .with_payload(FormatPayload::PhilipsXml {
            version: document_version,
            document: xml.to_string(),
        });
    if let Some(labels) = waveforms.attribute("leadlabels") {
        loaded = loaded.with_lead_names(
            labels
                .split_whitespace()
                .take(valid_channels)
                .map(|label| {
                    LeadName::from_str_loose(label)
                        .map(|lead| lead.as_str().to_string())
                        .unwrap_or_else(|| label.to_string())
                })
                .collect(),
        );
    }
    if let Some(gain) = resolution_uv.and_then(gain_from_resolution) {
        loaded = loaded.with_adu_gain(gain);
    }
    Ok(loaded)
}

fn decode_waveforms(ctx: &XmlContext<'_>, node: Node<'_, '_>) -> Result<Vec<i32>, EcgError> {
    if let Some(compression) = node.attribute("compression") {
        if !matches!(
            compression.to_ascii_lowercase().as_str(),
            "" | "none" | "uncompressed"
        ) {
            return Err(ctx.error(format!(
                "compressed waveforms ({compression}) are not supported"
            )));
        }
    }

    let text = node.text().unwrap_or_default();
    match node.attribute("dataencoding").unwrap_or("Plain") {
        encoding if encoding.eq_ignore_ascii_case("base64") => {
            xml::decode_base64_i16_le(text).map_err(|message| ctx.error(message))
        }
        encoding if encoding.eq_ignore_ascii_case("plain") => {
            xml::parse_int_list(text).map_err(|message| ctx.error(message))
        }
        other => Err(ctx.error(format!("unsupported dataencoding '{other}'"))),
    }
}

fn gain_from_resolution(resolution_uv: f64) -> Option<u32> {
    let gain = (MICROVOLTS_PER_MILLIVOLT / resolution_uv).round();
    (gain.is_finite() && gain >= 1.0 && gain <= u32::MAX as f64).then_some(gain as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(version: &str, attrs: &str, body: &str) -> String {
        format!(
            "<restingecgdata><documentinfo><documentversion>{version}</documentversion></documentinfo>\
             <dataacquisition><signalcharacteristics><samplingrate>500</samplingrate>\
             <resolution>5</resolution><numberchannelsallocated>16</numberchannelsallocated>\
             <numberchannelsvalid>2</numberchannelsvalid></signalcharacteristics></dataacquisition>\
             <waveforms><parsedwaveforms {attrs}>{body}</parsedwaveforms></waveforms></restingecgdata>"
        )
    }

    #[test]
    fn reads_plain_channel_contiguous_samples() {
        let xml = document(
            "1.04",
            r#"dataencoding="Plain" durationperchannel="6" leadlabels="I II""#,
            "1 2 3 -1 -2 -3",
        );
        let loaded = from_philips_xml_str(&xml, PhilipsVersion::V104).unwrap();

        assert_eq!(loaded.channel_count, 2);
        assert_eq!(loaded.samples_per_channel, 3);
        assert_eq!(loaded.allocated_channels, 16);
        assert_eq!(loaded.adu_gain, Some(200));
        assert_eq!(loaded.signals.channel(1), &[-1, -2, -3]);
        assert_eq!(
            loaded.lead_names,
            Some(vec!["I".to_string(), "II".to_string()])
        );
        match loaded.payload {
            Some(FormatPayload::PhilipsXml { version, .. }) => assert_eq!(version, "1.04"),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn reads_base64_samples_without_duration() {
        // [1, 2, 3, 4] as little-endian i16
        let xml = document("1.03", r#"dataencoding="Base64""#, "AQACAAMABAA=");
        let loaded = from_philips_xml_str(&xml, PhilipsVersion::V103).unwrap();
        assert_eq!(loaded.signals.channel(0), &[1, 2]);
        assert_eq!(loaded.signals.channel(1), &[3, 4]);
        assert!(loaded.lead_names.is_none());
    }

    #[test]
    fn rejects_xli_compression() {
        let xml = document("1.04", r#"dataencoding="Base64" compression="XLI""#, "AAAA");
        let err = from_philips_xml_str(&xml, PhilipsVersion::V104).unwrap_err();
        assert!(err.to_string().contains("XLI"));
    }

    #[test]
    fn rejects_short_sample_block() {
        let xml = document("1.04", r#"durationperchannel="10""#, "1 2 3");
        assert!(from_philips_xml_str(&xml, PhilipsVersion::V104).is_err());
    }

    #[test]
    fn rejects_duration_that_overflows_sample_count() {
        let xml = document("1.04", r#"durationperchannel="1e300""#, "1 2 3");
        let err = from_philips_xml_str(&xml, PhilipsVersion::V104).unwrap_err();
        assert!(err.to_string().contains("overflows"), "{err}");
    }
}
