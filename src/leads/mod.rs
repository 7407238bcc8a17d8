//! Canonical lead vocabulary and lead-name normalization.
//!
//! Vendor files label their channels however they like. Before a record is
//! installed, the raw labels are checked against [`LeadName`]; a record whose
//! labels all validate keeps them verbatim, otherwise a fixed label set is
//! chosen from the channel count (see [`normalize_lead_names`]).

use std::fmt;
use std::str::FromStr;

use crate::format::FormatTag;

/// A recognized physiological lead label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LeadName {
    I,
    II,
    III,
    AVR,
    AVL,
    AVF,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    V7,
    V8,
    V9,
    V3R,
    V4R,
    V5R,
    V6R,
    VX,
    VY,
    VZ,
    X,
    Y,
    Z,
}

impl LeadName {
    /// Every vocabulary entry, in a stable order.
    pub const ALL: [LeadName; 25] = [
        LeadName::I,
        LeadName::II,
        LeadName::III,
        LeadName::AVR,
        LeadName::AVL,
        LeadName::AVF,
        LeadName::V1,
        LeadName::V2,
        LeadName::V3,
        LeadName::V4,
        LeadName::V5,
        LeadName::V6,
        LeadName::V7,
        LeadName::V8,
        LeadName::V9,
        LeadName::V3R,
        LeadName::V4R,
        LeadName::V5R,
        LeadName::V6R,
        LeadName::VX,
        LeadName::VY,
        LeadName::VZ,
        LeadName::X,
        LeadName::Y,
        LeadName::Z,
    ];

    /// The canonical spelling of this lead.
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadName::I => "I",
            LeadName::II => "II",
            LeadName::III => "III",
            LeadName::AVR => "aVR",
            LeadName::AVL => "aVL",
            LeadName::AVF => "aVF",
            LeadName::V1 => "V1",
            LeadName::V2 => "V2",
            LeadName::V3 => "V3",
            LeadName::V4 => "V4",
            LeadName::V5 => "V5",
            LeadName::V6 => "V6",
            LeadName::V7 => "V7",
            LeadName::V8 => "V8",
            LeadName::V9 => "V9",
            LeadName::V3R => "V3R",
            LeadName::V4R => "V4R",
            LeadName::V5R => "V5R",
            LeadName::V6R => "V6R",
            LeadName::VX => "VX",
            LeadName::VY => "VY",
            LeadName::VZ => "VZ",
            LeadName::X => "X",
            LeadName::Y => "Y",
            LeadName::Z => "Z",
        }
    }

    /// Looks a label up ignoring ASCII case.
    ///
    /// Collaborators use this to map vendor spellings such as `AVR` onto the
    /// vocabulary before reporting labels; the normalizer itself stays exact.
    pub fn from_str_loose(label: &str) -> Option<LeadName> {
        let label = label.trim();
        LeadName::ALL
            .iter()
            .copied()
            .find(|lead| lead.as_str().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for LeadName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a label is not part of the vocabulary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownLead(pub String);

impl fmt::Display for UnknownLead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown lead '{}'", self.0)
    }
}

impl std::error::Error for UnknownLead {}

impl FromStr for LeadName {
    type Err = UnknownLead;

    /// Exact, case-sensitive lookup.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LeadName::ALL
            .iter()
            .copied()
            .find(|lead| lead.as_str() == s)
            .ok_or_else(|| UnknownLead(s.to_string()))
    }
}

/// Standard 12-lead label set.
pub const TWELVE_LEAD: &str = "I,II,III,aVR,aVL,aVF,V1,V2,V3,V4,V5,V6";

/// 15-lead set with right-sided and posterior chest leads.
pub const FIFTEEN_LEAD_RIGHT_POSTERIOR: &str =
    "I,II,III,aVR,aVL,aVF,V1,V2,V3,V4,V5,V6,V3R,V4R,V7";

/// 15-lead set with Frank orthogonal leads.
pub const FIFTEEN_LEAD_FRANK: &str = "I,II,III,aVR,aVL,aVF,V1,V2,V3,V4,V5,V6,VX,VY,VZ";

/// Formats whose 15-lead recordings carry V3R, V4R and V7.
fn uses_right_posterior_set(format: FormatTag) -> bool {
    matches!(
        format,
        FormatTag::MuseXml | FormatTag::Philips103 | FormatTag::Philips104
    )
}

/// Fixed label set for a channel count, if one exists.
pub fn fallback_lead_names(channel_count: usize, source_format: FormatTag) -> Option<&'static str> {
    match (channel_count, uses_right_posterior_set(source_format)) {
        (12, _) => Some(TWELVE_LEAD),
        (15, true) => Some(FIFTEEN_LEAD_RIGHT_POSTERIOR),
        (15, false) => Some(FIFTEEN_LEAD_FRANK),
        _ => None,
    }
}

/// Reconciles raw channel labels with the canonical vocabulary.
///
/// If every label is a vocabulary entry and there is one label per channel,
/// the labels are returned joined with `,` in their original order. Otherwise
/// the result comes from [`fallback_lead_names`]. Validation is all-or-nothing:
/// a single unrecognized label discards the whole list.
pub fn normalize_lead_names(
    raw_labels: Option<&[String]>,
    channel_count: usize,
    source_format: FormatTag,
) -> Option<String> {
    if let Some(labels) = raw_labels.filter(|labels| !labels.is_empty()) {
        match first_invalid_label(labels, channel_count) {
            None => return Some(labels.join(",")),
            Some(reason) => log::info!("Lead labels rejected: {reason}"),
        }
    }

    let fallback = fallback_lead_names(channel_count, source_format);
    log::info!(
        "Setting lead names from channel count {} ({}): {:?}",
        channel_count,
        source_format,
        fallback
    );
    fallback.map(str::to_string)
}

fn first_invalid_label(labels: &[String], channel_count: usize) -> Option<String> {
    if let Some(bad) = labels.iter().find(|label| label.parse::<LeadName>().is_err()) {
        return Some(format!("lead not found: '{bad}'"));
    }
    if labels.len() != channel_count {
        return Some(format!(
            "{} label(s) for {} channel(s)",
            labels.len(),
            channel_count
        ));
    }
    None
}

/// Splits a normalized lead-name string back into labels.
pub fn split_lead_names(lead_names: &str) -> impl Iterator<Item = &str> {
    lead_names.split(',').filter(|label| !label.is_empty())
}
