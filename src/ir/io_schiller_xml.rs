//! Schiller SEMA XML reader.
//!
//! Waveforms are `<wavedata>` blocks anywhere in the document; the rhythm
//! block (`<type>ECG_RHYTHMS</type>`) is preferred. Each block gives a
//! `<samplerate>`, an optional `<resolution>` in microvolts per bit, and one
//! `<channel>` per lead with a `<name>` and comma-separated `<data>`.
//! The original document is kept as the payload.

use std::fs;
use std::path::Path;

use roxmltree::Node;

use super::model::{FormatPayload, LoadedSignals, SignalMatrix};
use super::xml::{self, XmlContext};
use crate::error::EcgError;
use crate::format::{LoadRequest, SignalLoader};
use crate::leads::LeadName;

const FORMAT_NAME: &str = "SCHILLER";
const RHYTHM_TYPE: &str = "ECG_RHYTHMS";
const MICROVOLTS_PER_MILLIVOLT: f64 = 1000.0;

/// Built-in Schiller collaborator.
#[derive(Clone, Copy, Debug, Default)]
pub struct SchillerLoader;

impl SignalLoader for SchillerLoader {
    fn load(&self, request: &LoadRequest<'_>) -> Result<LoadedSignals, EcgError> {
        read_schiller_xml(request.file_path)
    }
}

/// Reads a Schiller SEMA document.
pub fn read_schiller_xml(path: &Path) -> Result<LoadedSignals, EcgError> {
    let xml = fs::read_to_string(path).map_err(EcgError::Io)?;
    parse_schiller_xml(&xml, path)
}

/// Parses a Schiller SEMA document from a string.
pub fn from_schiller_xml_str(xml: &str) -> Result<LoadedSignals, EcgError> {
    parse_schiller_xml(xml, Path::new("<memory>"))
}

fn parse_schiller_xml(xml: &str, path: &Path) -> Result<LoadedSignals, EcgError> {
    let ctx = XmlContext::new(FORMAT_NAME, path);
    let document = ctx.parse(xml)?;

    let blocks: Vec<Node<'_, '_>> = document
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "wavedata")
        .collect();
    let wavedata = blocks
        .iter()
        .find(|block| xml::child_text(**block, "type").as_deref() == Some(RHYTHM_TYPE))
        .or_else(|| blocks.first())
        .copied()
        .ok_or_else(|| ctx.error("no <wavedata> element found"))?;

    let sampling_rate: f64 = ctx.required_number(wavedata, "samplerate")?;
    let resolution_uv = xml::child_text(wavedata, "resolution")
        .and_then(|raw| xml::parse_number::<f64>(&raw));

    let mut labels = Vec::new();
    let mut rows = Vec::new();
    for channel in xml::child_elements(wavedata, "channel") {
        let name = ctx.required_text(channel, "name")?;
        let data = xml::child_text(channel, "data").unwrap_or_default();
        let samples = xml::parse_int_list(&data)
            .map_err(|message| ctx.error(format!("channel {name}: {message}")))?;
        labels.push(
            LeadName::from_str_loose(&name)
                .map(|lead| lead.as_str().to_string())
                .unwrap_or(name),
        );
        rows.push(samples);
    }
    if rows.is_empty() {
        return Err(ctx.error("<wavedata> has no <channel> elements"));
    }

    let signals = SignalMatrix::from_rows(rows)?;
    let mut loaded = LoadedSignals::new(signals, sampling_rate)
        .with_lead_names(labels)
        .with_payload(FormatPayload::SchillerXml(xml.to_string()));
    if let Some(gain) = resolution_uv
        .map(|res| (MICROVOLTS_PER_MILLIVOLT / res).round())
        .filter(|gain| gain.is_finite() && *gain >= 1.0 && *gain <= u32::MAX as f64)
    {
        loaded = loaded.with_adu_gain(gain as u32);
    }
    Ok(loaded)
}
