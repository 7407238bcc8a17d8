//! GE MUSE XML (`RestingECG`) reader.
//!
//! Waveforms live in `<Waveform>` elements; the rhythm waveform is preferred
//! over the median beat. Each `<LeadData>` carries a `<LeadID>` and the samples
//! as base64-encoded little-endian `i16` in `<WaveFormData>`.
//!
//! MUSE stores only the eight independent leads (I, II, V1-V6). When exactly
//! that set is present the four dependent limb leads are derived, giving the
//! standard twelve-lead order. The original document is kept as the record
//! payload.

use std::fs;
use std::path::Path;

use roxmltree::Node;

use super::model::{FormatPayload, LoadedSignals, SignalMatrix};
use super::xml::{self, XmlContext};
use crate::error::EcgError;
use crate::format::{LoadRequest, SignalLoader};
use crate::leads::{LeadName, TWELVE_LEAD};

const FORMAT_NAME: &str = "MUSEXML";
const PREFERRED_WAVEFORM: &str = "Rhythm";
const MICROVOLTS_PER_MILLIVOLT: f64 = 1000.0;
const INDEPENDENT_LEADS: [LeadName; 8] = [
    LeadName::I,
    LeadName::II,
    LeadName::V1,
    LeadName::V2,
    LeadName::V3,
    LeadName::V4,
    LeadName::V5,
    LeadName::V6,
];

/// Built-in MUSE XML collaborator.
#[derive(Clone, Copy, Debug, Default)]
pub struct MuseXmlLoader;

impl SignalLoader for MuseXmlLoader {
    fn load(&self, request: &LoadRequest<'_>) -> Result<LoadedSignals, EcgError> {
        read_muse_xml(request.file_path)
    }
}

/// Reads a MUSE XML document.
pub fn read_muse_xml(path: &Path) -> Result<LoadedSignals, EcgError> {
    let xml = fs::read_to_string(path).map_err(EcgError::Io)?;
    parse_muse_xml(&xml, path)
}

/// Parses a MUSE XML document from a string.
pub fn from_muse_xml_str(xml: &str) -> Result<LoadedSignals, EcgError> {
    parse_muse_xml(xml, Path::new("<memory>"))
}

/// Parses a MUSE XML document from bytes.
///
/// Useful for fuzzing without requiring UTF-8 upfront.
pub fn from_muse_xml_slice(bytes: &[u8]) -> Result<LoadedSignals, EcgError> {
    let xml = std::str::from_utf8(bytes).map_err(|err| EcgError::FormatParse {
        format: FORMAT_NAME,
        path: Path::new("<memory>").to_path_buf(),
        message: format!("invalid UTF-8: {err}"),
    })?;
    from_muse_xml_str(xml)
}

/// Derives III, aVR, aVL and aVF from leads I and II.
///
/// Uses Einthoven's and Goldberger's relations with integer arithmetic
/// (division truncates toward zero). Returns the four leads in that order.
pub fn derive_limb_leads(lead_i: &[i32], lead_ii: &[i32]) -> [Vec<i32>; 4] {
    let pairs = || lead_i.iter().zip(lead_ii);
    [
        pairs().map(|(&i, &ii)| ii - i).collect(),
        pairs().map(|(&i, &ii)| -(i + ii) / 2).collect(),
        pairs().map(|(&i, &ii)| i - ii / 2).collect(),
        pairs().map(|(&i, &ii)| ii - i / 2).collect(),
    ]
}

struct MuseLead {
    label: String,
    units_per_bit: Option<f64>,
    reported_samples: Option<usize>,
    samples: Vec<i32>,
}

fn parse_muse_xml(xml: &str, path: &Path) -> Result<LoadedSignals, EcgError> {
    let ctx = XmlContext::new(FORMAT_NAME, path);
    let document = ctx.parse(xml)?;
    let root = document.root_element();
    if root.tag_name().name() != "RestingECG" {
        return Err(ctx.error("missing <RestingECG> root element"));
    }

    let waveforms: Vec<Node<'_, '_>> = xml::child_elements(root, "Waveform").collect();
    let waveform = waveforms
        .iter()
        .find(|w| xml::child_text(**w, "WaveformType").as_deref() == Some(PREFERRED_WAVEFORM))
        .or_else(|| waveforms.first())
        .copied()
        .ok_or_else(|| ctx.error("no <Waveform> element found"))?;

    let sampling_rate: f64 = ctx.required_number(waveform, "SampleBase")?;

    let leads = xml::child_elements(waveform, "LeadData")
        .map(|node| parse_lead(&ctx, node))
        .collect::<Result<Vec<_>, _>>()?;
    if leads.is_empty() {
        return Err(ctx.error("waveform has no <LeadData> elements"));
    }
    let allocated_channels = leads.len();
    let number_of_points = leads
        .iter()
        .map(|lead| lead.reported_samples.unwrap_or(lead.samples.len()))
        .sum();
    let units_per_bit = leads.iter().find_map(|lead| lead.units_per_bit);

    let (labels, rows) = if is_independent_set(&leads) {
        log::debug!("MUSE XML holds the 8 independent leads; deriving III, aVR, aVL, aVF");
        twelve_lead_rows(leads)
    } else {
        leads
            .into_iter()
            .map(|lead| (lead.label, lead.samples))
            .unzip()
    };

    let signals = SignalMatrix::from_rows(rows)?;
    let mut loaded = LoadedSignals::new(signals, sampling_rate)
        .with_lead_names(labels)
        .with_allocated_channels(allocated_channels)
        .with_number_of_points(number_of_points)
        .with_payload(FormatPayload::MuseXml(xml.to_string()));
    if let Some(gain) = units_per_bit.and_then(gain_from_units_per_bit) {
        loaded = loaded.with_adu_gain(gain);
    }
    Ok(loaded)
}

fn parse_lead(ctx: &XmlContext<'_>, node: Node<'_, '_>) -> Result<MuseLead, EcgError> {
    let lead_id = ctx.required_text(node, "LeadID")?;
    let data = ctx.required_text(node, "WaveFormData")?;
    let mut samples = xml::decode_base64_i16_le(&data)
        .map_err(|message| ctx.error(format!("lead {lead_id}: {message}")))?;

    let reported_samples = xml::child_text(node, "LeadSampleCountTotal")
        .and_then(|raw| xml::parse_number::<usize>(&raw));
    if let Some(reported) = reported_samples {
        if reported > samples.len() {
            return Err(ctx.error(format!(
                "lead {} declares {} samples but holds {}",
                lead_id,
                reported,
                samples.len()
            )));
        }
        samples.truncate(reported);
    }

    let label = LeadName::from_str_loose(&lead_id)
        .map(|lead| lead.as_str().to_string())
        .unwrap_or(lead_id);

    Ok(MuseLead {
        label,
        units_per_bit: xml::child_text(node, "LeadAmplitudeUnitsPerBit")
            .and_then(|raw| xml::parse_number(&raw)),
        reported_samples,
        samples,
    })
}

fn is_independent_set(leads: &[MuseLead]) -> bool {
    leads.len() == INDEPENDENT_LEADS.len()
        && INDEPENDENT_LEADS
            .iter()
            .all(|name| leads.iter().any(|lead| lead.label == name.as_str()))
}

/// Reorders the independent set into twelve-lead order, deriving the rest.
fn twelve_lead_rows(mut leads: Vec<MuseLead>) -> (Vec<String>, Vec<Vec<i32>>) {
    let mut take = |name: LeadName| -> Vec<i32> {
        leads
            .iter_mut()
            .find(|lead| lead.label == name.as_str())
            .map(|lead| std::mem::take(&mut lead.samples))
            .unwrap_or_default()
    };

    let lead_i = take(LeadName::I);
    let lead_ii = take(LeadName::II);
    let [lead_iii, avr, avl, avf] = derive_limb_leads(&lead_i, &lead_ii);
    let mut rows = vec![lead_i, lead_ii, lead_iii, avr, avl, avf];
    for name in &INDEPENDENT_LEADS[2..] {
        rows.push(take(*name));
    }

    let labels = TWELVE_LEAD.split(',').map(str::to_string).collect();
    (labels, rows)
}

fn gain_from_units_per_bit(units_per_bit: f64) -> Option<u32> {
    let gain = (MICROVOLTS_PER_MILLIVOLT / units_per_bit).round();
    (gain.is_finite() && gain >= 1.0 && gain <= u32::MAX as f64).then_some(gain as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    fn encode(samples: &[i16]) -> String {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        STANDARD.encode(bytes)
    }

    fn lead_data(id: &str, samples: &[i16]) -> String {
        format!(
            "<LeadData><LeadSampleCountTotal>{}</LeadSampleCountTotal>\
             <LeadAmplitudeUnitsPerBit>5</LeadAmplitudeUnitsPerBit>\
             <LeadID>{}</LeadID><WaveFormData>{}</WaveFormData></LeadData>",
            samples.len(),
            id,
            encode(samples)
        )
    }

    fn document(waveforms: &[(&str, Vec<String>)]) -> String {
        let mut xml = String::from("<RestingECG>");
        for (kind, leads) in waveforms {
            xml.push_str(&format!(
                "<Waveform><WaveformType>{kind}</WaveformType><SampleBase>500</SampleBase>{}</Waveform>",
                leads.concat()
            ));
        }
        xml.push_str("</RestingECG>");
        xml
    }

    #[test]
    fn derives_twelve_leads_from_independent_set() {
        let leads: Vec<String> = ["I", "II", "V1", "V2", "V3", "V4", "V5", "V6"]
            .iter()
            .enumerate()
            .map(|(idx, id)| lead_data(id, &[10 * (idx as i16 + 1), 4]))
            .collect();
        let xml = document(&[("Rhythm", leads)]);

        let loaded = from_muse_xml_str(&xml).unwrap();
        assert_eq!(loaded.channel_count, 12);
        assert_eq!(loaded.allocated_channels, 8);
        assert_eq!(loaded.adu_gain, Some(200));
        assert_eq!(loaded.lead_names.as_ref().unwrap().join(","), TWELVE_LEAD);
        // I = 10, II = 20
        assert_eq!(loaded.signals.channel(2)[0], 10); // III
        assert_eq!(loaded.signals.channel(3)[0], -15); // aVR
        assert_eq!(loaded.signals.channel(4)[0], 0); // aVL
        assert_eq!(loaded.signals.channel(5)[0], 15); // aVF
        assert_eq!(loaded.signals.channel(6)[0], 30); // V1
        assert!(matches!(loaded.payload, Some(FormatPayload::MuseXml(_))));
    }

    #[test]
    fn prefers_rhythm_waveform() {
        let xml = document(&[
            ("Median", vec![lead_data("I", &[1])]),
            ("Rhythm", vec![lead_data("I", &[7, 8, 9])]),
        ]);
        let loaded = from_muse_xml_str(&xml).unwrap();
        assert_eq!(loaded.signals.channel(0), &[7, 8, 9]);
    }

    #[test]
    fn other_lead_sets_pass_through() {
        let xml = document(&[("Rhythm", vec![lead_data("II", &[1, 2]), lead_data("V5", &[3, 4])])]);
        let loaded = from_muse_xml_str(&xml).unwrap();
        assert_eq!(loaded.channel_count, 2);
        assert_eq!(
            loaded.lead_names,
            Some(vec!["II".to_string(), "V5".to_string()])
        );
    }

    #[test]
    fn sample_count_larger_than_data_is_rejected() {
        let xml = "<RestingECG><Waveform><SampleBase>500</SampleBase><LeadData>\
                   <LeadSampleCountTotal>5</LeadSampleCountTotal><LeadID>I</LeadID>\
                   <WaveFormData>AQA=</WaveFormData></LeadData></Waveform></RestingECG>";
        assert!(from_muse_xml_str(xml).is_err());
    }

    #[test]
    fn derive_limb_leads_follows_einthoven() {
        let [iii, avr, avl, avf] = derive_limb_leads(&[100, -40], &[60, 20]);
        assert_eq!(iii, vec![-40, 60]);
        assert_eq!(avr, vec![-80, 10]);
        assert_eq!(avl, vec![70, -50]);
        assert_eq!(avf, vec![10, 40]);
    }
}
