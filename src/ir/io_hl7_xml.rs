//! HL7 annotated ECG (aECG) XML reader and writer.
//!
//! Only the rhythm waveform series is handled. The reader walks every
//! `<sequence>` element: the one coded `TIME_ABSOLUTE` / `TIME_RELATIVE`
//! supplies the sample interval (`<increment value=".." unit="s|ms"/>`), and
//! each one coded `MDC_ECG_LEAD_<label>` supplies a channel as a
//! whitespace-separated `<digits>` list scaled by `<scale unit="uV"/>`.
//!
//! The ADU gain maps onto the scale as `scale_uV = 1000 / adu_gain`.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use roxmltree::Node;

use super::model::{EcgRecord, LoadedSignals, SignalMatrix};
use super::xml::{self, XmlContext};
use crate::error::EcgError;
use crate::format::{LoadRequest, SignalLoader, SignalWriter, WriteTarget};
use crate::leads::LeadName;

const FORMAT_NAME: &str = "HL7";
const LEAD_CODE_PREFIX: &str = "MDC_ECG_LEAD_";
const TIME_CODES: [&str; 2] = ["TIME_ABSOLUTE", "TIME_RELATIVE"];
const MICROVOLTS_PER_MILLIVOLT: f64 = 1000.0;

/// Built-in HL7 aECG collaborator.
#[derive(Clone, Copy, Debug, Default)]
pub struct Hl7Codec;

impl SignalLoader for Hl7Codec {
    fn load(&self, request: &LoadRequest<'_>) -> Result<LoadedSignals, EcgError> {
        read_hl7_xml(request.file_path)
    }
}

impl SignalWriter for Hl7Codec {
    fn write(&self, record: &EcgRecord, target: &WriteTarget<'_>) -> Result<usize, EcgError> {
        write_hl7_xml(&target.file_path, record)
    }
}

/// Reads an HL7 aECG document.
pub fn read_hl7_xml(path: &Path) -> Result<LoadedSignals, EcgError> {
    let xml = fs::read_to_string(path).map_err(EcgError::Io)?;
    parse_hl7_xml(&xml, path)
}

/// Writes `record` as an HL7 aECG document and returns the sample count per lead.
pub fn write_hl7_xml(path: &Path, record: &EcgRecord) -> Result<usize, EcgError> {
    let xml = render_hl7_xml(record, path)?;
    fs::write(path, xml).map_err(EcgError::Io)?;
    Ok(record.samples_per_channel())
}

/// Parses an HL7 aECG document from a string.
pub fn from_hl7_xml_str(xml: &str) -> Result<LoadedSignals, EcgError> {
    parse_hl7_xml(xml, Path::new("<memory>"))
}

/// Renders `record` as an HL7 aECG document.
pub fn to_hl7_xml_string(record: &EcgRecord) -> Result<String, EcgError> {
    render_hl7_xml(record, Path::new("<memory>"))
}

// ============================================================================
// Parsing
// ============================================================================

struct LeadSequence {
    label: String,
    scale_uv: Option<f64>,
    samples: Vec<i32>,
}

fn parse_hl7_xml(xml: &str, path: &Path) -> Result<LoadedSignals, EcgError> {
    let ctx = XmlContext::new(FORMAT_NAME, path);
    let document = ctx.parse(xml)?;
    let root = document.root_element();
    if root.tag_name().name() != "AnnotatedECG" {
        return Err(ctx.error("missing <AnnotatedECG> root element"));
    }

    let mut increment_secs = None;
    let mut leads = Vec::new();

    for sequence in root
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "sequence")
    {
        let Some(code) = xml::child_element(sequence, "code").and_then(|c| c.attribute("code"))
        else {
            continue;
        };
        let value = ctx.required_child(sequence, "value")?;

        if TIME_CODES.contains(&code) {
            if increment_secs.is_none() {
                increment_secs = Some(parse_increment(&ctx, value)?);
            }
        } else if let Some(label) = code.strip_prefix(LEAD_CODE_PREFIX) {
            leads.push(parse_lead_sequence(&ctx, label, value)?);
        }
    }

    let increment = increment_secs.ok_or_else(|| ctx.error("no time sequence found"))?;
    if leads.is_empty() {
        return Err(ctx.error("no MDC_ECG_LEAD_* sequences found"));
    }

    let scale_uv = leads.iter().find_map(|lead| lead.scale_uv);
    if leads
        .iter()
        .filter_map(|lead| lead.scale_uv)
        .any(|scale| Some(scale) != scale_uv)
    {
        log::warn!("HL7 leads use different scales; using the first lead's scale");
    }

    let labels = leads.iter().map(|lead| lead.label.clone()).collect();
    let signals = SignalMatrix::from_rows(leads.into_iter().map(|lead| lead.samples).collect())?;

    let mut loaded = LoadedSignals::new(signals, 1.0 / increment).with_lead_names(labels);
    if let Some(gain) = scale_uv.and_then(gain_from_scale) {
        loaded = loaded.with_adu_gain(gain);
    }
    Ok(loaded)
}

fn parse_increment(ctx: &XmlContext<'_>, value: Node<'_, '_>) -> Result<f64, EcgError> {
    let increment = ctx.required_child(value, "increment")?;
    let amount: f64 = ctx.number_attr(increment, "value")?;
    let seconds = match increment.attribute("unit").unwrap_or("s") {
        "s" => amount,
        "ms" => amount / 1000.0,
        other => return Err(ctx.error(format!("unsupported time unit '{other}'"))),
    };
    if seconds.is_finite() && seconds > 0.0 {
        Ok(seconds)
    } else {
        Err(ctx.error(format!("invalid sample increment {amount}")))
    }
}

fn parse_lead_sequence(
    ctx: &XmlContext<'_>,
    code_label: &str,
    value: Node<'_, '_>,
) -> Result<LeadSequence, EcgError> {
    let digits = ctx.required_text(value, "digits")?;
    let samples = xml::parse_int_list(&digits)
        .map_err(|message| ctx.error(format!("lead {code_label}: {message}")))?;

    let scale_uv = match xml::child_element(value, "scale") {
        Some(scale) => {
            let amount: f64 = ctx.number_attr(scale, "value")?;
            match scale.attribute("unit").unwrap_or("uV") {
                "uV" => Some(amount),
                "mV" => Some(amount * MICROVOLTS_PER_MILLIVOLT),
                other => return Err(ctx.error(format!("unsupported scale unit '{other}'"))),
            }
        }
        None => None,
    };

    let label = LeadName::from_str_loose(code_label)
        .map(|lead| lead.as_str().to_string())
        .unwrap_or_else(|| code_label.to_string());

    Ok(LeadSequence {
        label,
        scale_uv,
        samples,
    })
}

fn gain_from_scale(scale_uv: f64) -> Option<u32> {
    let gain = (MICROVOLTS_PER_MILLIVOLT / scale_uv).round();
    (gain.is_finite() && gain >= 1.0 && gain <= u32::MAX as f64).then_some(gain as u32)
}

// ============================================================================
// Rendering
// ============================================================================

fn render_hl7_xml(record: &EcgRecord, path: &Path) -> Result<String, EcgError> {
    if record.channel_count() == 0 {
        return Err(EcgError::FormatWrite {
            format: FORMAT_NAME,
            path: path.to_path_buf(),
            message: "record has no channels".to_string(),
        });
    }

    let increment = 1.0 / record.sampling_rate();
    let scale_uv = MICROVOLTS_PER_MILLIVOLT / record.adu_gain() as f64;

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(
        "<AnnotatedECG xmlns=\"urn:hl7-org:v3\" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\n",
    );
    out.push_str("  <component>\n    <series>\n      <component>\n        <sequenceSet>\n");

    let _ = write!(
        out,
        "          <component>\n            <sequence>\n              \
         <code code=\"TIME_ABSOLUTE\" codeSystem=\"2.16.840.1.113883.5.4\"/>\n              \
         <value xsi:type=\"GLIST_TS\">\n                \
         <head value=\"0\" unit=\"s\"/>\n                \
         <increment value=\"{increment}\" unit=\"s\"/>\n              \
         </value>\n            </sequence>\n          </component>\n"
    );

    for (channel, samples) in record.signals().rows().enumerate() {
        let label = xml::xml_escape(&record.channel_label(channel));
        let digits = samples
            .iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        let _ = write!(
            out,
            "          <component>\n            <sequence>\n              \
             <code code=\"{LEAD_CODE_PREFIX}{label}\" codeSystem=\"2.16.840.1.113883.6.24\"/>\n              \
             <value xsi:type=\"SLIST_PQ\">\n                \
             <origin value=\"0\" unit=\"uV\"/>\n                \
             <scale value=\"{scale_uv}\" unit=\"uV\"/>\n                \
             <digits>{digits}</digits>\n              \
             </value>\n            </sequence>\n          </component>\n"
        );
    }

    out.push_str("        </sequenceSet>\n      </component>\n    </series>\n  </component>\n");
    out.push_str("</AnnotatedECG>\n");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatTag;

    #[test]
    fn parses_time_and_lead_sequences() {
        let xml = r#"<AnnotatedECG xmlns="urn:hl7-org:v3">
  <sequence>
    <code code="TIME_ABSOLUTE"/>
    <value><increment value="2" unit="ms"/></value>
  </sequence>
  <sequence>
    <code code="MDC_ECG_LEAD_I"/>
    <value><scale value="2.5" unit="uV"/><digits>1 2 3</digits></value>
  </sequence>
  <sequence>
    <code code="MDC_ECG_LEAD_AVR"/>
    <value><scale value="2.5" unit="uV"/><digits>-1 -2 -3</digits></value>
  </sequence>
</AnnotatedECG>"#;

        let loaded = from_hl7_xml_str(xml).unwrap();
        assert!((loaded.sampling_rate - 500.0).abs() < 1e-9);
        assert_eq!(loaded.adu_gain, Some(400));
        assert_eq!(
            loaded.lead_names,
            Some(vec!["I".to_string(), "aVR".to_string()])
        );
        assert_eq!(loaded.signals.channel(1), &[-1, -2, -3]);
    }

    #[test]
    fn missing_time_sequence_is_rejected() {
        let xml = r#"<AnnotatedECG><sequence><code code="MDC_ECG_LEAD_I"/><value><digits>1</digits></value></sequence></AnnotatedECG>"#;
        assert!(from_hl7_xml_str(xml).is_err());
    }

    #[test]
    fn wrong_root_is_rejected() {
        assert!(from_hl7_xml_str("<ECG/>").is_err());
    }

    #[test]
    fn rendered_document_parses_back() {
        let signals = SignalMatrix::from_rows(vec![vec![10, -20, 30], vec![0, 1, 2]]).unwrap();
        let record = EcgRecord::new(FormatTag::Rdt, 500.0, signals)
            .with_adu_gain(200)
            .with_lead_names("V1,V2")
            .unwrap();

        let loaded = from_hl7_xml_str(&to_hl7_xml_string(&record).unwrap()).unwrap();
        assert_eq!(loaded.signals, *record.signals());
        assert_eq!(loaded.adu_gain, Some(200));
        assert!((loaded.sampling_rate - 500.0).abs() < 1e-9);
        assert_eq!(
            loaded.lead_names,
            Some(vec!["V1".to_string(), "V2".to_string()])
        );
    }

    #[test]
    fn gain_from_scale_rejects_degenerate_scales() {
        assert_eq!(gain_from_scale(5.0), Some(200));
        assert_eq!(gain_from_scale(0.0), None);
        assert_eq!(gain_from_scale(1e9), None);
    }
}
